//! Retrieval metrics.
//!
//! The sweep only needs [`MetricsSink`]: set a per-item gauge, bump a
//! counter. [`PrometheusMetrics`] implements it over a private registry that
//! the `/metrics` route renders in the Prometheus text format.

use crate::build_info::BuildInfo;
use crate::utils::Result;
use prometheus::{Encoder, GaugeVec, IntCounter, IntCounterVec, Opts, Registry, TextEncoder};

/// Per-item gauges, all labelled by `id`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Gauge {
    /// 1 when the latest retrieval succeeded, 0 otherwise
    Status,
    /// Size in bytes of the latest retrieved file
    Size,
    /// Unix timestamp of the latest successful retrieval
    Time,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Counter<'a> {
    /// Failed retrievals of one item
    BackupFailed { id: &'a str },
    /// Sweep invocations
    Sweeps,
}

/// Write side of the metrics, as used by the sweep.
///
/// Both operations may be repeated freely; gauges are last-write-wins.
pub trait MetricsSink: Send + Sync {
    fn set_gauge(&self, gauge: Gauge, id: &str, value: f64);
    fn inc_counter(&self, counter: Counter<'_>);
}

pub struct PrometheusMetrics {
    registry: Registry,
    build_info: GaugeVec,
    status: GaugeVec,
    size: GaugeVec,
    time: GaugeVec,
    backup_failed: IntCounterVec,
    backup_nb: IntCounter,
}

impl PrometheusMetrics {
    /// Register every series under `namespace`.
    pub fn new(namespace: &str) -> Result<Self> {
        let registry = Registry::new();

        let build_info = GaugeVec::new(
            Opts::new("build_info", "Build information").namespace(namespace),
            &["goarch", "goos", "goversion", "version"],
        )?;
        let status = GaugeVec::new(
            Opts::new("backup_status", "Status of latest backup").namespace(namespace),
            &["id"],
        )?;
        let size = GaugeVec::new(
            Opts::new("backup_size", "Size of latest backup").namespace(namespace),
            &["id"],
        )?;
        let time = GaugeVec::new(
            Opts::new("backup_time", "Timestamp of latest backup").namespace(namespace),
            &["id"],
        )?;
        let backup_failed = IntCounterVec::new(
            Opts::new("backup_failed", "Number of failed backups").namespace(namespace),
            &["id"],
        )?;
        let backup_nb = IntCounter::with_opts(
            Opts::new("backup_nb", "Number of retrievals").namespace(namespace),
        )?;

        registry.register(Box::new(build_info.clone()))?;
        registry.register(Box::new(status.clone()))?;
        registry.register(Box::new(size.clone()))?;
        registry.register(Box::new(time.clone()))?;
        registry.register(Box::new(backup_failed.clone()))?;
        registry.register(Box::new(backup_nb.clone()))?;

        Ok(Self {
            registry,
            build_info,
            status,
            size,
            time,
            backup_failed,
            backup_nb,
        })
    }

    /// Publish build info and create the failure series of every item at 0.
    pub fn initialize<'a>(&self, build: &BuildInfo, ids: impl IntoIterator<Item = &'a str>) {
        self.build_info
            .with_label_values(&[
                build.arch.as_str(),
                build.os.as_str(),
                build.rust_version.as_str(),
                build.version.as_str(),
            ])
            .set(1.0);
        for id in ids {
            self.backup_failed.with_label_values(&[id]).inc_by(0);
        }
    }

    pub fn gauge(&self, gauge: Gauge, id: &str) -> f64 {
        self.gauge_vec(gauge).with_label_values(&[id]).get()
    }

    pub fn counter(&self, counter: Counter<'_>) -> u64 {
        match counter {
            Counter::BackupFailed { id } => self.backup_failed.with_label_values(&[id]).get(),
            Counter::Sweeps => self.backup_nb.get(),
        }
    }

    /// Encode every registered series in the Prometheus text format.
    pub fn render(&self) -> Result<String> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buffer)?;
        Ok(String::from_utf8_lossy(&buffer).into_owned())
    }

    fn gauge_vec(&self, gauge: Gauge) -> &GaugeVec {
        match gauge {
            Gauge::Status => &self.status,
            Gauge::Size => &self.size,
            Gauge::Time => &self.time,
        }
    }
}

impl MetricsSink for PrometheusMetrics {
    fn set_gauge(&self, gauge: Gauge, id: &str, value: f64) {
        self.gauge_vec(gauge).with_label_values(&[id]).set(value);
    }

    fn inc_counter(&self, counter: Counter<'_>) {
        match counter {
            Counter::BackupFailed { id } => self.backup_failed.with_label_values(&[id]).inc(),
            Counter::Sweeps => self.backup_nb.inc(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn build() -> BuildInfo {
        BuildInfo {
            version: "1.0.0".to_string(),
            arch: "x86_64".to_string(),
            os: "linux".to_string(),
            rust_version: "rust1.80".to_string(),
            profile: "release".to_string(),
        }
    }

    #[test]
    fn test_initialize_exposes_build_info_and_zero_failures() {
        let metrics = PrometheusMetrics::new("backuprf").unwrap();
        metrics.initialize(&build(), ["router", "switch"]);

        let text = metrics.render().unwrap();
        assert!(text.contains(
            r#"backuprf_build_info{goarch="x86_64",goos="linux",goversion="rust1.80",version="1.0.0"} 1"#
        ));
        assert!(text.contains(r#"backuprf_backup_failed{id="router"} 0"#));
        assert!(text.contains(r#"backuprf_backup_failed{id="switch"} 0"#));
        assert!(text.contains("backuprf_backup_nb 0"));
    }

    #[test]
    fn test_sink_operations() {
        let metrics = PrometheusMetrics::new("backuprf").unwrap();

        metrics.set_gauge(Gauge::Status, "router", 0.0);
        metrics.set_gauge(Gauge::Status, "router", 1.0);
        metrics.set_gauge(Gauge::Size, "router", 11.0);
        metrics.inc_counter(Counter::BackupFailed { id: "router" });
        metrics.inc_counter(Counter::BackupFailed { id: "router" });
        metrics.inc_counter(Counter::Sweeps);

        assert_eq!(metrics.gauge(Gauge::Status, "router"), 1.0);
        assert_eq!(metrics.gauge(Gauge::Size, "router"), 11.0);
        assert_eq!(metrics.counter(Counter::BackupFailed { id: "router" }), 2);
        assert_eq!(metrics.counter(Counter::Sweeps), 1);

        let text = metrics.render().unwrap();
        assert!(text.contains(r#"backuprf_backup_status{id="router"} 1"#));
        assert!(text.contains(r#"backuprf_backup_size{id="router"} 11"#));
        assert!(text.contains("# TYPE backuprf_backup_failed counter"));
        assert!(text.contains("# TYPE backuprf_backup_size gauge"));
    }

    #[test]
    fn test_invalid_namespace_is_rejected() {
        assert!(PrometheusMetrics::new("not a prefix").is_err());
    }
}
