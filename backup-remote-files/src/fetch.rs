//! Retrieval of a single remote file.
//!
//! [`HttpFetcher`] issues a GET with basic authentication and streams the body
//! into the destination file. The destination is only created once the server
//! has answered with a success status, so an unreachable server or an error
//! status leaves the previous copy alone. A body that fails mid-stream leaves
//! a truncated file behind.

use crate::retrieval::BackupItem;
use async_trait::async_trait;
use futures_util::StreamExt;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tracing::{error, info};

/// What to fetch and where to put it.
#[derive(Debug, Clone, Copy)]
pub struct FetchRequest<'a> {
    pub id: &'a str,
    pub url: &'a str,
    pub username: &'a str,
    pub password: &'a str,
    pub destination: &'a Path,
}

impl<'a> From<&'a BackupItem> for FetchRequest<'a> {
    fn from(item: &'a BackupItem) -> Self {
        Self {
            id: &item.id,
            url: &item.url,
            username: &item.username,
            password: &item.password,
            destination: &item.destination,
        }
    }
}

#[derive(Error, Debug)]
pub enum FetchError {
    #[error("Request failed: {0}")]
    Request(#[source] reqwest::Error),

    #[error("HTTP {0}")]
    Status(reqwest::StatusCode),

    #[error("Failed to open {} for writing: {source}", path.display())]
    CreateFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Transfer interrupted: {0}")]
    Body(#[source] reqwest::Error),

    #[error("Failed to write {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl FetchError {
    /// Whether the remote side answered successfully and the transfer began.
    ///
    /// `true` means the failure happened while writing locally (or while
    /// reading an already-started body); `false` means the remote request
    /// itself failed.
    pub fn attempted(&self) -> bool {
        match self {
            FetchError::Request(_) | FetchError::Status(_) => false,
            FetchError::CreateFile { .. } | FetchError::Body(_) | FetchError::Write { .. } => true,
        }
    }
}

/// Performs one blocking retrieval of one item.
#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch(&self, request: &FetchRequest<'_>) -> Result<(), FetchError>;
}

/// HTTP(S) fetcher backed by a shared reqwest client.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    /// Build a fetcher; `timeout` bounds each whole request when set.
    pub fn new(timeout: Option<Duration>) -> Result<Self, reqwest::Error> {
        let mut builder = reqwest::Client::builder()
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")));
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        Ok(Self {
            client: builder.build()?,
        })
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, request: &FetchRequest<'_>) -> Result<(), FetchError> {
        let response = self
            .client
            .get(request.url)
            .basic_auth(request.username, Some(request.password))
            .send()
            .await
            .map_err(|e| {
                error!(id = %request.id, url = %request.url, error = %e, "Failed to read data");
                FetchError::Request(e)
            })?;

        let status = response.status();
        if !status.is_success() {
            error!(id = %request.id, url = %request.url, %status, "Remote answered with an error status");
            return Err(FetchError::Status(status));
        }

        let destination = request.destination;
        let mut file = tokio::fs::File::create(destination).await.map_err(|source| {
            error!(id = %request.id, filename = %destination.display(), error = %source, "Failed to open file for writing");
            FetchError::CreateFile {
                path: destination.to_path_buf(),
                source,
            }
        })?;

        let write_error = |source: std::io::Error| {
            error!(id = %request.id, filename = %destination.display(), error = %source, "Failed to write contents to file");
            FetchError::Write {
                path: destination.to_path_buf(),
                source,
            }
        };

        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| {
                error!(id = %request.id, url = %request.url, error = %e, "Transfer interrupted");
                FetchError::Body(e)
            })?;
            file.write_all(&chunk).await.map_err(write_error)?;
        }
        file.flush().await.map_err(write_error)?;

        info!(id = %request.id, filename = %destination.display(), "Successfully retrieved file");
        Ok(())
    }
}
