//! Backup Remote Files Library
//!
//! Periodically retrieves remote files over HTTP (basic auth), stores them
//! locally and exports the outcome of every retrieval as Prometheus metrics.
//! Failed retrievals are retried on their own, shorter cadence until they
//! succeed.

pub mod api;
pub mod build_info;
pub mod config;
pub mod daemon;
pub mod fetch;
pub mod metrics;
pub mod retrieval;
pub mod scheduler;
pub mod utils;

// Re-export commonly used types
pub use build_info::BuildInfo;
pub use config::Config;
pub use utils::errors::Error;
pub type Result<T> = std::result::Result<T, Error>;
