//! Sweep execution: one pass of retrievals over a working set of items.
//!
//! For every item the sweep records two things:
//! - `last_succeeded`, which decides whether the item belongs to the next
//!   retry sweep. It follows the *remote* side only: a file that was served
//!   but could not be stored locally is not retried before the next full sweep.
//! - the exported metrics (`backup_status`, `backup_failed`, ...), which report
//!   every failure, local or remote.

use crate::config::BackupConfig;
use crate::fetch::{FetchRequest, Fetcher};
use crate::metrics::{Counter, Gauge, MetricsSink};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info, warn};

/// One tracked remote file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackupItem {
    pub id: String,
    pub url: String,
    pub username: String,
    pub password: String,
    pub destination: PathBuf,
    /// Whether the latest remote retrieval succeeded; starts `true`.
    pub last_succeeded: bool,
}

impl From<BackupConfig> for BackupItem {
    fn from(config: BackupConfig) -> Self {
        Self {
            id: config.id,
            url: config.url,
            username: config.username,
            password: config.password,
            destination: config.output_file,
            last_succeeded: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SweepKind {
    /// Every tracked item
    Full,
    /// Only items whose last retrieval failed
    Retry,
}

impl SweepKind {
    /// Whether `item` belongs to this kind of sweep.
    pub fn includes(self, item: &BackupItem) -> bool {
        match self {
            SweepKind::Full => true,
            SweepKind::Retry => !item.last_succeeded,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SweepResult {
    /// Every item of the working set ended with `last_succeeded == true`
    pub all_succeeded: bool,
    pub attempted: usize,
    pub failed: usize,
}

/// Runs sweeps against a fetcher and records the outcome in a metrics sink.
pub struct RetrievalState<F, M> {
    fetcher: F,
    metrics: Arc<M>,
}

impl<F: Fetcher, M: MetricsSink> RetrievalState<F, M> {
    pub fn new(fetcher: F, metrics: Arc<M>) -> Self {
        Self { fetcher, metrics }
    }

    /// Retrieve every item of `items` selected by `kind`, one at a time.
    pub async fn sweep(&self, kind: SweepKind, items: &mut [BackupItem]) -> SweepResult {
        match kind {
            SweepKind::Full => info!("Starting retrieving files to backup"),
            SweepKind::Retry => info!("Retrying failed retrievals"),
        }

        let working_set: Vec<&mut BackupItem> =
            items.iter_mut().filter(|item| kind.includes(item)).collect();
        let result = self.run_sweep(kind, working_set).await;

        info!(
            items = result.attempted,
            failed = result.failed,
            "End of retrieving files to backup"
        );
        result
    }

    /// Retrieve each item of an explicit working set.
    ///
    /// Per-item failures never abort the sweep; they only show up in the
    /// item's flag, the metrics and the returned result.
    pub async fn run_sweep(
        &self,
        kind: SweepKind,
        working_set: Vec<&mut BackupItem>,
    ) -> SweepResult {
        let mut result = SweepResult {
            all_succeeded: true,
            attempted: 0,
            failed: 0,
        };

        for item in working_set {
            if kind == SweepKind::Retry {
                info!(id = %item.id, "Retrying...");
            }
            if !self.retrieve(item).await {
                result.failed += 1;
            }
            result.attempted += 1;
            result.all_succeeded &= item.last_succeeded;
        }

        self.metrics.inc_counter(Counter::Sweeps);
        result
    }

    /// Retrieve one item; returns whether it is reported as successful.
    async fn retrieve(&self, item: &mut BackupItem) -> bool {
        item.last_succeeded = true;

        let outcome = self.fetcher.fetch(&FetchRequest::from(&*item)).await;
        if let Err(e) = outcome {
            item.last_succeeded = e.attempted();
            warn!(id = %item.id, error = %e, retry = !item.last_succeeded, "Retrieval failed");
            self.record_failure(&item.id);
            return false;
        }

        let size = match tokio::fs::metadata(&item.destination).await {
            Ok(metadata) => metadata.len(),
            Err(e) => {
                // Served fine remotely, so the item stays out of retry sweeps.
                error!(id = %item.id, filename = %item.destination.display(), error = %e, "Failed to get file stats");
                self.record_failure(&item.id);
                return false;
            }
        };

        self.metrics.set_gauge(Gauge::Status, &item.id, 1.0);
        self.metrics.set_gauge(Gauge::Size, &item.id, size as f64);
        self.metrics
            .set_gauge(Gauge::Time, &item.id, chrono::Utc::now().timestamp() as f64);
        true
    }

    fn record_failure(&self, id: &str) {
        self.metrics.set_gauge(Gauge::Status, id, 0.0);
        self.metrics.inc_counter(Counter::BackupFailed { id });
    }
}
