//! Configuration management for the exporter.
//!
//! Loads a typed TOML file. Durations are human-readable strings (see
//! [`crate::utils::duration`]); unknown keys are rejected.
//!
//! ```toml
//! interval = "1d"
//! retryInterval = "1h"
//! metricsPrefix = "backupremotefiles"
//!
//! [backups.router]
//! url = "https://192.0.2.1/backup.cfg"
//! username = "admin"
//! password = "secret"
//! outputFile = "/var/backups/router.cfg"
//! ```

use crate::retrieval::BackupItem;
use crate::utils::duration::parse_duration;
use crate::utils::{Error, Result};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_INTERVAL: &str = "1d";
pub const DEFAULT_RETRY_INTERVAL: &str = "1d";
pub const DEFAULT_METRICS_PREFIX: &str = "backupremotefiles";

/// Validated configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Tracked files, ordered by id
    pub backups: Vec<BackupConfig>,

    /// Cadence of full sweeps
    pub interval: Duration,

    /// Cadence of retry sweeps while some retrieval is failing
    pub retry_interval: Duration,

    /// Namespace of every exported metric
    pub metrics_prefix: String,

    /// Per-request bound on a retrieval; `None` waits indefinitely
    pub fetch_timeout: Option<Duration>,

    pub log: LogConfig,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackupConfig {
    pub id: String,
    pub url: String,
    pub username: String,
    pub password: String,
    pub output_file: PathBuf,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LogConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// On-disk layout, before durations are parsed.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct RawConfig {
    backups: BTreeMap<String, RawBackup>,
    interval: Option<String>,
    retry_interval: Option<String>,
    metrics_prefix: Option<String>,
    fetch_timeout: Option<String>,
    #[serde(default)]
    log: LogConfig,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct RawBackup {
    url: String,
    username: String,
    password: String,
    output_file: PathBuf,
}

impl Config {
    /// Load configuration from a TOML file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|source| Error::ReadConfig {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&content)
    }

    /// Parse and validate configuration from TOML text
    pub fn parse(content: &str) -> Result<Self> {
        let raw: RawConfig = toml::from_str(content)?;

        let interval = duration_or_default("interval", raw.interval.as_deref(), DEFAULT_INTERVAL)?;
        let retry_interval = duration_or_default(
            "retryInterval",
            raw.retry_interval.as_deref(),
            DEFAULT_RETRY_INTERVAL,
        )?;
        let fetch_timeout = raw
            .fetch_timeout
            .as_deref()
            .map(|value| {
                parse_duration(value).map_err(|source| Error::InvalidDuration {
                    field: "fetchTimeout",
                    source,
                })
            })
            .transpose()?;

        let metrics_prefix = raw
            .metrics_prefix
            .unwrap_or_else(|| DEFAULT_METRICS_PREFIX.to_string());
        if metrics_prefix.is_empty() {
            return Err(Error::Config("metricsPrefix must not be empty".into()));
        }

        let mut backups = Vec::with_capacity(raw.backups.len());
        for (id, backup) in raw.backups {
            if backup.url.trim().is_empty() {
                return Err(Error::Config(format!("backup '{}' has an empty url", id)));
            }
            if backup.output_file.as_os_str().is_empty() {
                return Err(Error::Config(format!("backup '{}' has an empty outputFile", id)));
            }
            backups.push(BackupConfig {
                id,
                url: backup.url,
                username: backup.username,
                password: backup.password,
                output_file: backup.output_file,
            });
        }

        Ok(Config {
            backups,
            interval,
            retry_interval,
            metrics_prefix,
            fetch_timeout,
            log: raw.log,
        })
    }

    /// Tracked items in their initial state
    pub fn items(&self) -> Vec<BackupItem> {
        self.backups.iter().cloned().map(BackupItem::from).collect()
    }
}

fn duration_or_default(field: &'static str, value: Option<&str>, default: &str) -> Result<Duration> {
    match value {
        Some(v) => parse_duration(v).map_err(|source| Error::InvalidDuration { field, source }),
        None => parse_duration(default).map_err(|source| Error::InvalidDefault { field, source }),
    }
}
