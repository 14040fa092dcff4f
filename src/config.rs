//! §6 "Environment / config file": `key = value` lines read by the
//! server binary, grounded in `TimblServer::getConfig` in
//! `original_source/src/ServerBase.cxx`. Recognized keys configure the
//! listener; any other key declares a named pre-loaded experiment
//! (§0.5 multi-experiment server mode).

use std::collections::BTreeMap;
use std::path::Path;

use crate::error::ConfigError;
use crate::error::MemlearnError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Protocol {
    Tcp,
    Http,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub port: u16,
    pub maxconn: usize,
    pub protocol: Protocol,
    /// name -> option string, for `BASE <name>` multi-experiment mode.
    pub experiments: BTreeMap<String, String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 7000,
            maxconn: 10,
            protocol: Protocol::Tcp,
            experiments: BTreeMap::new(),
        }
    }
}

impl ServerConfig {
    pub fn from_file(path: impl AsRef<Path>) -> crate::Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::parse(&text)
    }

    pub fn parse(text: &str) -> crate::Result<Self> {
        let mut config = Self::default();
        for (lineno, raw) in text.lines().enumerate() {
            let line = raw.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let (key, value) = line.split_once('=').ok_or_else(|| {
                MemlearnError::Config(ConfigError::InvalidValue {
                    option: format!("line {}", lineno + 1),
                    value: raw.to_owned(),
                })
            })?;
            let key = key.trim();
            let value = value.trim();
            match key {
                "port" => {
                    config.port = value.parse().map_err(|_| {
                        MemlearnError::Config(ConfigError::InvalidValue {
                            option: "port".into(),
                            value: value.into(),
                        })
                    })?;
                }
                "maxconn" => {
                    config.maxconn = value.parse().map_err(|_| {
                        MemlearnError::Config(ConfigError::InvalidValue {
                            option: "maxconn".into(),
                            value: value.into(),
                        })
                    })?;
                }
                "protocol" => {
                    config.protocol = match value {
                        "tcp" => Protocol::Tcp,
                        "http" => Protocol::Http,
                        other => {
                            return Err(MemlearnError::Config(ConfigError::InvalidValue {
                                option: "protocol".into(),
                                value: other.into(),
                            }))
                        }
                    };
                }
                name => {
                    config.experiments.insert(name.to_owned(), value.to_owned());
                }
            }
        }
        Ok(config)
    }
}
