//! Host stats snapshots and the polling loop.

mod common;

use common::start_collector;
use robodash::poller::{JsonFileSource, Poller, PollerConfig, StatsSnapshot, StatsSource};
use robodash::{Client, Config, Error};
use serde_json::json;
use std::io::Write;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

const CLUSTER_JSON: &str = r#"{
    "workers": 2,
    "worker_status": [
        {"pid": 101, "last_status": {"backlog": 1, "running": 2, "pool_capacity": 4}},
        {"pid": 102, "last_status": {"backlog": 3, "running": 1, "pool_capacity": 4}}
    ]
}"#;

const SINGLE_JSON: &str =
    r#"{"backlog": 5, "running": 3, "busy_threads": 2, "pool_capacity": 16, "max_threads": 16}"#;

fn offline_client() -> Client {
    Client::new(&Config::default()).unwrap()
}

// ---------------------------------------------------------------------------
// Snapshots
// ---------------------------------------------------------------------------

#[test]
fn cluster_snapshot_sums_worker_figures() {
    let snapshot = StatsSnapshot::from_json(CLUSTER_JSON).unwrap();
    assert!(matches!(snapshot, StatsSnapshot::Cluster(_)));
    assert_eq!(
        snapshot.metrics(),
        vec![("Workers", 2), ("Backlog", 4), ("Running", 3), ("Capacity", 8)]
    );
}

#[test]
fn single_snapshot_reports_busy_threads() {
    let snapshot = StatsSnapshot::from_json(SINGLE_JSON).unwrap();
    assert!(matches!(snapshot, StatsSnapshot::Single(_)));
    assert_eq!(
        snapshot.metrics(),
        vec![("Backlog", 5), ("Running", 3), ("Busy", 2), ("Capacity", 16)]
    );
}

#[test]
fn incomplete_snapshot_is_an_error() {
    assert!(StatsSnapshot::from_json(r#"{"backlog": 1}"#).is_err());
    assert!(StatsSnapshot::from_json("not json").is_err());
}

#[test]
fn json_file_source_reads_the_current_document() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(SINGLE_JSON.as_bytes()).unwrap();

    let source = JsonFileSource::new(file.path());
    assert_eq!(
        source.snapshot().unwrap(),
        StatsSnapshot::from_json(SINGLE_JSON).unwrap()
    );
}

#[test]
fn json_file_source_reports_missing_file() {
    let source = JsonFileSource::new("/nonexistent/robodash-stats.json");
    assert!(matches!(source.snapshot(), Err(Error::Stats(_))));
}

// ---------------------------------------------------------------------------
// Ticks
// ---------------------------------------------------------------------------

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn tick_measures_each_metric_with_prefix() {
    let collector = start_collector().await;
    let config = Config {
        host: collector.url.clone(),
        ..Config::with_token("secret-token")
    };
    let client = Client::new(&config).unwrap();

    let mut poller = Poller::new(
        client.clone(),
        || StatsSnapshot::from_json(CLUSTER_JSON),
        PollerConfig {
            prefix: Some("Puma".to_string()),
            ..PollerConfig::default()
        },
    )
    .unwrap();

    assert_eq!(poller.tick().unwrap(), 4);
    client.drain_async().await;

    let mut reported: Vec<_> = collector
        .received()
        .into_iter()
        .map(|r| {
            assert_eq!(r.file, "measurements.json");
            (r.body["name"].clone(), r.body["value"].clone())
        })
        .collect();
    reported.sort_by_key(|(name, _)| name.to_string());
    assert_eq!(
        reported,
        vec![
            (json!("Puma Backlog"), json!(4)),
            (json!("Puma Capacity"), json!(8)),
            (json!("Puma Running"), json!(3)),
            (json!("Puma Workers"), json!(2)),
        ]
    );
}

#[test]
fn tick_without_token_submits_nothing() {
    let mut poller = Poller::new(
        offline_client(),
        || StatsSnapshot::from_json(SINGLE_JSON),
        PollerConfig::default(),
    )
    .unwrap();
    assert_eq!(poller.tick().unwrap(), 0);
}

#[test]
fn tick_surfaces_source_errors() {
    let mut poller = Poller::new(
        offline_client(),
        || -> robodash::Result<StatsSnapshot> { Err(Error::Stats("server not booted".to_string())) },
        PollerConfig::default(),
    )
    .unwrap();
    assert!(poller.tick().is_err());
}

#[test]
fn zero_interval_is_rejected() {
    let result = Poller::new(
        offline_client(),
        || StatsSnapshot::from_json(SINGLE_JSON),
        PollerConfig {
            interval: Duration::ZERO,
            prefix: None,
        },
    );
    assert!(matches!(result, Err(Error::Config(_))));
}

// ---------------------------------------------------------------------------
// Loop
// ---------------------------------------------------------------------------

#[tokio::test]
async fn loop_reads_stats_file_on_current_thread_runtime() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(SINGLE_JSON.as_bytes()).unwrap();

    let reads = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&reads);
    let file_source = JsonFileSource::new(file.path());
    let source = move || {
        counter.fetch_add(1, Ordering::SeqCst);
        file_source.snapshot()
    };

    let poller = Poller::new(
        offline_client(),
        source,
        PollerConfig {
            interval: Duration::from_millis(10),
            prefix: None,
        },
    )
    .unwrap();
    let shutdown = poller.shutdown_handle();
    let handle = poller.spawn();

    let deadline = Instant::now() + Duration::from_secs(5);
    while reads.load(Ordering::SeqCst) < 3 {
        assert!(Instant::now() < deadline, "poller stopped ticking");
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    shutdown.shutdown();
    tokio::time::timeout(Duration::from_secs(1), handle)
        .await
        .expect("poller did not stop")
        .expect("poller task failed");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn loop_survives_failing_ticks() {
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);
    let source = move || {
        let call = counter.fetch_add(1, Ordering::SeqCst);
        if call % 2 == 0 {
            Err(Error::Stats("flaky".to_string()))
        } else if call == 3 {
            panic!("stats source blew up");
        } else {
            StatsSnapshot::from_json(SINGLE_JSON)
        }
    };

    let poller = Poller::new(
        offline_client(),
        source,
        PollerConfig {
            interval: Duration::from_millis(10),
            prefix: None,
        },
    )
    .unwrap();
    let shutdown = poller.shutdown_handle();
    let handle = poller.spawn();

    let deadline = Instant::now() + Duration::from_secs(5);
    while calls.load(Ordering::SeqCst) < 6 {
        assert!(Instant::now() < deadline, "poller stopped ticking");
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    shutdown.shutdown();
    tokio::time::timeout(Duration::from_secs(1), handle)
        .await
        .expect("poller did not stop")
        .expect("poller task failed");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn shutdown_interrupts_the_sleep_between_ticks() {
    let poller = Poller::new(
        offline_client(),
        || StatsSnapshot::from_json(SINGLE_JSON),
        PollerConfig {
            interval: Duration::from_secs(3600),
            prefix: None,
        },
    )
    .unwrap();
    let shutdown = poller.shutdown_handle();
    let handle = poller.spawn();

    tokio::time::sleep(Duration::from_millis(50)).await;
    shutdown.shutdown();

    tokio::time::timeout(Duration::from_millis(500), handle)
        .await
        .expect("poller kept sleeping")
        .expect("poller task failed");
}
