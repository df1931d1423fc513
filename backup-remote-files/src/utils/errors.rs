//! Startup error types for the exporter.
//!
//! Per-item retrieval failures live in [`crate::fetch::FetchError`]; they are
//! absorbed by the sweep and never reach this type.

use crate::utils::duration::DurationError;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Failed to read configuration file {path}: {source}")]
    ReadConfig {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse configuration file: {0}")]
    ParseConfig(#[from] toml::de::Error),

    #[error("Invalid duration for '{field}': {source}")]
    InvalidDuration {
        field: &'static str,
        #[source]
        source: DurationError,
    },

    /// A built-in default failed to parse. This is a bug, not an operator error.
    #[error("Built-in default for '{field}' is invalid: {source}")]
    InvalidDefault {
        field: &'static str,
        #[source]
        source: DurationError,
    },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Metrics error: {0}")]
    Metrics(#[from] prometheus::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
