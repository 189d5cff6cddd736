//! Fixed-interval poller that turns host statistics into measurements.
//!
//! Each tick reads one [`StatsSnapshot`] from a [`StatsSource`] and issues
//! one `measure` per metric. A failed tick is logged and the loop carries
//! on; only the shutdown handle stops it, and it does so even in the middle
//! of the sleep between ticks.

pub mod stats;

pub use stats::{
    ClusterStats, JsonFileSource, SingleStats, StatsSnapshot, StatsSource, WorkerLoad,
    WorkerStatus,
};

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::{Handle, RuntimeFlavor};
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tracing::{debug, info, info_span, warn};

use crate::client::Client;
use crate::error::{Error, Result};
use crate::event::Measure;

/// Configuration for the poller.
#[derive(Debug, Clone)]
pub struct PollerConfig {
    /// Time between ticks.
    pub interval: Duration,
    /// Prepended to every metric name, separated by a space
    /// (`"Puma"` turns `Backlog` into `Puma Backlog`).
    pub prefix: Option<String>,
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(1),
            prefix: None,
        }
    }
}

/// Signals a running [`Poller`] to stop.
#[derive(Debug, Clone, Default)]
pub struct PollerShutdown {
    notify: Arc<Notify>,
}

impl PollerShutdown {
    pub fn shutdown(&self) {
        self.notify.notify_one();
    }
}

pub struct Poller<S> {
    client: Client,
    source: S,
    config: PollerConfig,
    shutdown: PollerShutdown,
    ticks: u64,
}

impl<S: StatsSource> Poller<S> {
    /// Fails when `config.interval` is zero.
    pub fn new(client: Client, source: S, config: PollerConfig) -> Result<Self> {
        if config.interval.is_zero() {
            return Err(Error::Config("poll interval must be non-zero".to_string()));
        }
        Ok(Self {
            client,
            source,
            config,
            shutdown: PollerShutdown::default(),
            ticks: 0,
        })
    }

    /// Handle that stops the loop started by [`Poller::spawn`].
    pub fn shutdown_handle(&self) -> PollerShutdown {
        self.shutdown.clone()
    }

    fn metric_name(&self, name: &str) -> String {
        match &self.config.prefix {
            Some(prefix) => format!("{prefix} {name}"),
            None => name.to_string(),
        }
    }

    /// Read one snapshot and report each metric. Returns how many
    /// measurements were submitted.
    pub fn tick(&mut self) -> Result<usize> {
        self.ticks = self.ticks.wrapping_add(1);
        let snapshot = self.source.snapshot()?;

        let mut submitted = 0;
        for (name, value) in snapshot.metrics() {
            if self.client.measure(Measure::new(self.metric_name(name), value)) {
                submitted += 1;
            }
        }

        debug!(tick = self.ticks, submitted, "reported host stats");
        Ok(submitted)
    }

    /// Run ticks on the current tokio runtime until shut down.
    pub fn spawn(mut self) -> JoinHandle<()> {
        tokio::spawn(async move {
            let shutdown = Arc::clone(&self.shutdown.notify);
            let mut interval = tokio::time::interval(self.config.interval);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

            info!(interval = ?self.config.interval, "stats poller started");

            loop {
                tokio::select! {
                    _ = shutdown.notified() => {
                        info!("stats poller shutting down");
                        break;
                    }
                    _ = interval.tick() => {}
                }

                let span = info_span!("robodash.poll", tick = self.ticks + 1);
                let outcome = span.in_scope(|| {
                    off_worker(|| catch_unwind(AssertUnwindSafe(|| self.tick())))
                });
                match outcome {
                    Ok(Ok(_)) => {}
                    Ok(Err(e)) => warn!(error = %e, "metrics collection failed"),
                    Err(_) => warn!("metrics collection panicked"),
                }
            }
        })
    }
}

/// Run a tick that may do blocking I/O without stalling the other tasks on
/// a multi-thread worker. Current-thread runtimes cannot hand off, so the
/// tick runs inline there.
fn off_worker<R>(f: impl FnOnce() -> R) -> R {
    match Handle::try_current().map(|handle| handle.runtime_flavor()) {
        Ok(RuntimeFlavor::MultiThread) => tokio::task::block_in_place(f),
        _ => f(),
    }
}
