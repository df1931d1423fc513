//! Utility modules for the exporter.

pub mod duration;
pub mod errors;
pub mod logger;

pub use errors::{Error, Result};
