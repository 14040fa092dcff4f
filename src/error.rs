//! Error taxonomy (§7). Kinds, not exception hierarchies: each variant
//! names one of the failure classes the spec distinguishes so callers
//! can match on *kind* rather than parse message strings.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, MemlearnError>;

#[derive(Debug, Error)]
pub enum MemlearnError {
    /// invalid option value, illegal option combination, or an attempt
    /// to change a single-assignment option after the model is realized.
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    /// cannot open/read/write a file, or a socket accept failure.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// malformed instance line or malformed trie file.
    #[error("parse error: {0}")]
    Parse(String),

    /// a distribution decrement would drive a weight negative by more
    /// than epsilon. Treated as a programming bug: callers should abort
    /// with the diagnostic rather than attempt recovery.
    #[error("distribution error: {0}")]
    Distribution(String),

    /// a session received an ill-formed request; the session continues.
    #[error("classification error: {0}")]
    Classification(String),

    /// the server's connection cap was exceeded.
    #[error("resource error: {0}")]
    Resource(String),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("unknown option: {0}")]
    UnknownOption(String),

    #[error("invalid value {value:?} for option {option}")]
    InvalidValue { option: String, value: String },

    #[error("illegal combination: {0}")]
    IllegalCombination(String),

    #[error("option {0} is single-assignment and the model is already realized")]
    Locked(String),

    #[error("per-feature metric {metric} is invalid for feature {feature}: {reason}")]
    InvalidFeatureMetric {
        feature: String,
        metric: String,
        reason: String,
    },
}
