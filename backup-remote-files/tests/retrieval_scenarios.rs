//! End-to-end retrieval scenarios: configuration file → HTTP fetch → metrics.

use backup_remote_files::fetch::HttpFetcher;
use backup_remote_files::metrics::{Counter, Gauge, PrometheusMetrics};
use backup_remote_files::retrieval::RetrievalState;
use backup_remote_files::scheduler::{RetryTimer, Scheduler};
use backup_remote_files::Config;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use wiremock::matchers::method;
use wiremock::{Mock, MockServer, ResponseTemplate};

const WANTED: &str = "voh0ahch3E";

/// Unroutable: nothing listens on port 1.
const DEAD_URL: &str = "http://127.0.0.1:1/backup";

fn write_config(dir: &Path, backups: &[(&str, &str)]) -> std::path::PathBuf {
    let mut content = String::from(
        "interval = '1m'\nretryInterval = '10s'\nmetricsPrefix = 'backuprf'\nfetchTimeout = '5s'\n",
    );
    for (id, url) in backups {
        let output = dir.join(format!("{}.out", id));
        content.push_str(&format!(
            "\n[backups.{}]\nurl = '{}'\nusername = ''\npassword = ''\noutputFile = '{}'\n",
            id,
            url,
            output.display()
        ));
    }
    let path = dir.join("config.toml");
    std::fs::write(&path, content).unwrap();
    path
}

fn build(config: &Config) -> (Scheduler<HttpFetcher, PrometheusMetrics>, Arc<PrometheusMetrics>) {
    let metrics = Arc::new(PrometheusMetrics::new(&config.metrics_prefix).unwrap());
    let fetcher = HttpFetcher::new(config.fetch_timeout).unwrap();
    let retrieval = RetrievalState::new(fetcher, metrics.clone());
    let scheduler = Scheduler::new(
        retrieval,
        config.items(),
        config.interval,
        config.retry_interval,
    );
    (scheduler, metrics)
}

async fn serving(body: String) -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string(body))
        .mount(&server)
        .await;
    server
}

#[tokio::test]
async fn test_single_item_is_retrieved() {
    let server = serving(format!("{}\n", WANTED)).await;
    let dir = TempDir::new().unwrap();
    let uri = server.uri();
    let config = Config::from_file(&write_config(dir.path(), &[(WANTED, uri.as_str())])).unwrap();
    assert_eq!(config.interval, Duration::from_secs(60));
    let (mut scheduler, metrics) = build(&config);

    let result = scheduler.start().await;

    assert!(result.all_succeeded);
    assert_eq!(metrics.gauge(Gauge::Status, WANTED), 1.0);
    assert_eq!(metrics.gauge(Gauge::Size, WANTED), 11.0);
    assert_eq!(metrics.counter(Counter::Sweeps), 1);
    let contents = std::fs::read_to_string(dir.path().join(format!("{}.out", WANTED))).unwrap();
    assert_eq!(contents, format!("{}\n", WANTED));

    let text = metrics.render().unwrap();
    assert!(text.contains(&format!(r#"backuprf_backup_status{{id="{}"}} 1"#, WANTED)));
}

#[tokio::test]
async fn test_unreachable_item_arms_retry() {
    let dir = TempDir::new().unwrap();
    let config = Config::from_file(&write_config(dir.path(), &[("router", DEAD_URL)])).unwrap();
    let (mut scheduler, metrics) = build(&config);

    let result = scheduler.start().await;

    assert!(!result.all_succeeded);
    assert_eq!(metrics.gauge(Gauge::Status, "router"), 0.0);
    assert_eq!(metrics.counter(Counter::BackupFailed { id: "router" }), 1);
    assert!(!scheduler.items()[0].last_succeeded);
    assert!(scheduler.retry_timer().is_armed());
}

#[tokio::test]
async fn test_recovered_item_disarms_retry() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(1)
        .with_priority(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string("restored"))
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let uri = server.uri();
    let config = Config::from_file(&write_config(dir.path(), &[("router", uri.as_str())])).unwrap();
    let (mut scheduler, metrics) = build(&config);

    assert!(!scheduler.start().await.all_succeeded);
    assert!(scheduler.retry_timer().is_armed());

    let result = scheduler.retry_sweep().await;

    assert!(result.all_succeeded);
    assert_eq!(result.attempted, 1);
    assert!(scheduler.items()[0].last_succeeded);
    assert_eq!(scheduler.retry_timer(), RetryTimer::Disarmed);
    assert_eq!(metrics.gauge(Gauge::Status, "router"), 1.0);
    assert_eq!(metrics.gauge(Gauge::Size, "router"), 8.0);
    assert_eq!(metrics.counter(Counter::BackupFailed { id: "router" }), 1);
    assert_eq!(metrics.counter(Counter::Sweeps), 2);
}

#[tokio::test]
async fn test_mixed_items_only_retry_failures() {
    let server = serving("data".to_string()).await;
    let dir = TempDir::new().unwrap();
    let uri = server.uri();
    let config = Config::from_file(&write_config(
        dir.path(),
        &[("good", uri.as_str()), ("bad", DEAD_URL)],
    ))
    .unwrap();
    let (mut scheduler, metrics) = build(&config);

    let result = scheduler.start().await;
    assert!(!result.all_succeeded);
    assert_eq!(result.attempted, 2);

    let result = scheduler.retry_sweep().await;
    assert!(!result.all_succeeded);
    assert_eq!(result.attempted, 1);

    assert_eq!(metrics.counter(Counter::BackupFailed { id: "bad" }), 2);
    assert_eq!(metrics.counter(Counter::BackupFailed { id: "good" }), 0);
    assert_eq!(metrics.gauge(Gauge::Status, "good"), 1.0);
    assert_eq!(server.received_requests().await.unwrap().len(), 1);
}
