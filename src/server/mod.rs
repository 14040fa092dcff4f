//! Concurrent multi-client classification server (§6). [`model`] and
//! [`bases`] hold the frozen, `Arc`-shared training artifacts;
//! [`session`] runs the TCP line protocol; [`http`] runs the HTTP/XML
//! protocol; [`daemon`] is the pidfile/daemonization hook run once at
//! startup, before either listener binds.

pub mod bases;
pub mod daemon;
pub mod http;
pub mod line;
pub mod model;
pub mod session;

pub use bases::BaseTable;
pub use model::{ClassificationResult, SharedModel, TrainedModel};
