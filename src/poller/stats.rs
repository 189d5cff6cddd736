//! Host statistics snapshots and where they come from.

use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

/// Load figures reported by one worker process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct WorkerLoad {
    pub backlog: i64,
    pub running: i64,
    pub pool_capacity: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct WorkerStatus {
    pub last_status: WorkerLoad,
}

/// Stats from a host running several worker processes.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ClusterStats {
    pub workers: i64,
    pub worker_status: Vec<WorkerStatus>,
}

/// Stats from a host running a single worker process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct SingleStats {
    pub backlog: i64,
    pub running: i64,
    pub busy_threads: i64,
    pub pool_capacity: i64,
}

/// One reading of the host's statistics, in either of its two shapes.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum StatsSnapshot {
    Cluster(ClusterStats),
    Single(SingleStats),
}

impl StatsSnapshot {
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Metric names and values to report for this snapshot.
    ///
    /// Cluster snapshots sum their per-worker figures.
    pub fn metrics(&self) -> Vec<(&'static str, i64)> {
        match self {
            Self::Cluster(cluster) => {
                let sum = |pick: fn(&WorkerLoad) -> i64| -> i64 {
                    cluster
                        .worker_status
                        .iter()
                        .map(|worker| pick(&worker.last_status))
                        .sum()
                };
                vec![
                    ("Workers", cluster.workers),
                    ("Backlog", sum(|load| load.backlog)),
                    ("Running", sum(|load| load.running)),
                    ("Capacity", sum(|load| load.pool_capacity)),
                ]
            }
            Self::Single(single) => vec![
                ("Backlog", single.backlog),
                ("Running", single.running),
                ("Busy", single.busy_threads),
                ("Capacity", single.pool_capacity),
            ],
        }
    }
}

/// Supplier of host statistics. Called once per poller tick.
pub trait StatsSource: Send + Sync + 'static {
    fn snapshot(&self) -> Result<StatsSnapshot>;
}

impl<F> StatsSource for F
where
    F: Fn() -> Result<StatsSnapshot> + Send + Sync + 'static,
{
    fn snapshot(&self) -> Result<StatsSnapshot> {
        self()
    }
}

/// Reads a JSON stats document the host rewrites on disk.
#[derive(Debug, Clone)]
pub struct JsonFileSource {
    path: PathBuf,
}

impl JsonFileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl StatsSource for JsonFileSource {
    fn snapshot(&self) -> Result<StatsSnapshot> {
        let content = std::fs::read_to_string(&self.path).map_err(|e| {
            Error::Stats(format!("cannot read {}: {e}", self.path.display()))
        })?;
        StatsSnapshot::from_json(&content)
    }
}
