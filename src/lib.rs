#![allow(dead_code)]

//! Memory-based (instance-based) supervised learner.
//!
//! Training examples are interned into a feature-value indexed trie
//! (`trie`); classification walks that trie under one of several
//! regimes (`search`, `trie::algorithms`) using a pluggable distance
//! kernel (`metric`). The `server` feature exposes the trained model
//! over a line-oriented TCP protocol and an HTTP query protocol to
//! many concurrent read-only sessions.

pub mod bestarray;
pub mod config;
pub mod distribution;
pub mod error;
pub mod instance;
pub mod metric;
pub mod options;
pub mod search;
pub mod symbol;
pub mod trie;

#[cfg(feature = "server")]
pub mod server;

pub use error::MemlearnError;
pub use error::Result;

/// epsilon below which weight deltas and distance ties are treated as zero.
pub const EPSILON: f32 = 1e-6;

/// initialize logging. Mirrors the teacher's `init()` in `lib.rs`: a
/// combined terminal + file logger under `logs/`, one file per process
/// start. Call once, from the server binary's `main`.
#[cfg(feature = "server")]
pub fn init_logging() -> anyhow::Result<()> {
    use std::time::SystemTime;
    use std::time::UNIX_EPOCH;

    std::fs::create_dir_all("logs")?;
    let config = simplelog::ConfigBuilder::new()
        .set_location_level(log::LevelFilter::Off)
        .set_target_level(log::LevelFilter::Off)
        .set_thread_level(log::LevelFilter::Off)
        .build();
    let time = SystemTime::now().duration_since(UNIX_EPOCH)?.as_secs();
    let file = simplelog::WriteLogger::new(
        log::LevelFilter::Debug,
        config.clone(),
        std::fs::File::create(format!("logs/{}.log", time))?,
    );
    let term = simplelog::TermLogger::new(
        log::LevelFilter::Info,
        config,
        simplelog::TerminalMode::Mixed,
        simplelog::ColorChoice::Auto,
    );
    simplelog::CombinedLogger::init(vec![term, file])
        .map_err(|e| anyhow::anyhow!("initialize logger: {e}"))
}
