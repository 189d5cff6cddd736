//! The dispatcher: spawn one delivery per event, never wait for it, and
//! join everything on the way out.

use reqwest::Url;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, HeaderValue};
use secrecy::SecretString;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, PoisonError, RwLock};
use std::future::Future;
use std::time::Instant;
use tokio::runtime::{Handle, Runtime};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{Instrument, debug, info};

use super::registry::TaskRegistry;
use super::sink::{DefaultSink, DiagnosticSink, warn_safely};
use crate::config::Config;
use crate::config::secrets::authorization_value;
use crate::error::{Error, Result};
use crate::telemetry::delivery::{record_failure, record_status, start_delivery_span};
use crate::telemetry::metrics;

/// Observable lifecycle of a [`Dispatcher`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    /// No token configured; submissions are refused.
    Uninitialized,
    /// Token configured but reporting is disabled.
    Configured,
    /// Accepting submissions.
    Active,
    /// `drain` has started; submissions are refused.
    Draining,
    /// Every task has been joined.
    Terminated,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Open,
    Draining,
    Terminated,
}

/// What a drain caller has left to do once the phase has been settled.
enum DrainStep {
    /// This caller moved the engine to draining and owns the handles.
    Join(Vec<JoinHandle<()>>),
    /// Another caller is joining; wait until it reports termination.
    Wait(watch::Receiver<bool>),
    Done,
}

/// Dispatch engine.
///
/// Owns a small private tokio runtime that runs delivery tasks, so it can
/// be driven from plain synchronous code or from inside any host runtime.
/// Dropping the dispatcher drains it.
pub struct Dispatcher {
    base_url: String,
    authorization: Option<HeaderValue>,
    enabled: AtomicBool,
    http: reqwest::Client,
    phase: RwLock<Phase>,
    terminated: watch::Sender<bool>,
    tasks: Arc<TaskRegistry>,
    sink: Arc<dyn DiagnosticSink>,
    handle: Handle,
    runtime: Option<Runtime>,
}

impl Dispatcher {
    /// Build a dispatcher from configuration.
    ///
    /// Fails if the host is not an absolute http(s) URL, the token cannot
    /// be used as a header value, or the runtime or HTTP client cannot be
    /// built. A missing token is not an error.
    pub fn new(config: &Config) -> Result<Self> {
        let base_url = normalize_host(&config.host)?;
        let authorization = config
            .api_token
            .as_ref()
            .map(authorization_header)
            .transpose()?;

        let http = reqwest::Client::builder()
            .connect_timeout(config.connect_timeout)
            .read_timeout(config.read_timeout)
            .timeout(config.connect_timeout + config.read_timeout)
            .user_agent(concat!("robodash-rs/", env!("CARGO_PKG_VERSION")))
            .build()?;

        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(2)
            .thread_name("robodash-dispatch")
            .enable_all()
            .build()?;

        Ok(Self {
            base_url,
            authorization,
            enabled: AtomicBool::new(config.enabled),
            http,
            phase: RwLock::new(Phase::Open),
            terminated: watch::channel(false).0,
            tasks: Arc::new(TaskRegistry::default()),
            sink: Arc::new(DefaultSink),
            handle: runtime.handle().clone(),
            runtime: Some(runtime),
        })
    }

    /// Replace the sink that receives delivery-failure diagnostics.
    pub fn with_sink(mut self, sink: Arc<dyn DiagnosticSink>) -> Self {
        self.sink = sink;
        self
    }

    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::Relaxed);
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Relaxed)
    }

    pub fn state(&self) -> EngineState {
        match *self.phase.read().unwrap_or_else(PoisonError::into_inner) {
            Phase::Draining => EngineState::Draining,
            Phase::Terminated => EngineState::Terminated,
            Phase::Open if self.authorization.is_none() => EngineState::Uninitialized,
            Phase::Open if !self.is_enabled() => EngineState::Configured,
            Phase::Open => EngineState::Active,
        }
    }

    /// Number of deliveries spawned and not yet finished.
    pub fn in_flight(&self) -> usize {
        self.tasks.len()
    }

    /// Full URL an endpoint is posted to.
    pub fn endpoint_url(&self, endpoint: &str) -> String {
        format!("{}/api/{endpoint}.json", self.base_url)
    }

    /// Hand `payload` to a new delivery task for `endpoint`.
    ///
    /// Returns `false` without spawning when reporting is disabled, no
    /// token is configured, or draining has begun. Otherwise spawns exactly
    /// one task and returns `true` without waiting for it.
    pub fn submit(&self, endpoint: &str, payload: serde_json::Value) -> bool {
        // Held across the spawn so `drain` cannot start between the check
        // and the registration.
        let phase = self.phase.read().unwrap_or_else(PoisonError::into_inner);

        let authorization = match (*phase, self.is_enabled(), &self.authorization) {
            (Phase::Open, true, Some(authorization)) => authorization.clone(),
            (Phase::Open, true, None) => return skip("unauthenticated"),
            (Phase::Open, false, _) => return skip("disabled"),
            _ => return skip("draining"),
        };

        let id = self.tasks.next_id();
        let delivery = Delivery {
            http: self.http.clone(),
            url: self.endpoint_url(endpoint),
            endpoint: endpoint.to_string(),
            authorization,
            payload,
            sink: Arc::clone(&self.sink),
        };
        let span = start_delivery_span(endpoint, id);
        self.tasks
            .spawn(&self.handle, id, delivery.run().instrument(span));
        drop(phase);

        metrics::reports_submitted().add(
            1,
            &[opentelemetry::KeyValue::new("endpoint", endpoint.to_string())],
        );
        true
    }

    /// Block until every registered delivery has finished.
    ///
    /// Later submissions are refused. Safe to call repeatedly, with nothing
    /// in flight, and from inside an async context (the wait then happens on
    /// a helper thread so the caller's runtime is never re-entered). A call
    /// made while another drain is still joining waits for that drain.
    pub fn drain(&self) {
        match self.begin_drain() {
            DrainStep::Join(handles) => {
                let _finish = FinishDrain(self);
                if !handles.is_empty() {
                    block_outside_runtime(&self.handle, join_all(handles));
                }
            }
            DrainStep::Wait(receiver) => {
                block_outside_runtime(&self.handle, wait_terminated(receiver));
            }
            DrainStep::Done => {}
        }
    }

    /// Await every registered delivery. Same contract as [`Self::drain`].
    pub async fn drain_async(&self) {
        match self.begin_drain() {
            DrainStep::Join(handles) => {
                let _finish = FinishDrain(self);
                join_all(handles).await;
            }
            DrainStep::Wait(receiver) => wait_terminated(receiver).await,
            DrainStep::Done => {}
        }
    }

    fn begin_drain(&self) -> DrainStep {
        let mut phase = self.phase.write().unwrap_or_else(PoisonError::into_inner);
        match *phase {
            Phase::Open => {}
            // Subscribed under the lock, so the termination signal cannot be
            // sent in between and missed.
            Phase::Draining => return DrainStep::Wait(self.terminated.subscribe()),
            Phase::Terminated => return DrainStep::Done,
        }
        *phase = Phase::Draining;
        drop(phase);

        let handles = self.tasks.take_all();
        info!(in_flight = handles.len(), "draining deliveries");
        DrainStep::Join(handles)
    }

    fn finish_drain(&self) {
        *self.phase.write().unwrap_or_else(PoisonError::into_inner) = Phase::Terminated;
        self.terminated.send_replace(true);
        debug!("all deliveries joined");
    }
}

/// Marks the drain finished even if the joining caller is cancelled, so
/// waiting callers are never left hanging.
struct FinishDrain<'a>(&'a Dispatcher);

impl Drop for FinishDrain<'_> {
    fn drop(&mut self) {
        self.0.finish_drain();
    }
}

impl Drop for Dispatcher {
    fn drop(&mut self) {
        self.drain();
        if let Some(runtime) = self.runtime.take() {
            runtime.shutdown_background();
        }
    }
}

/// Everything one delivery task owns.
struct Delivery {
    http: reqwest::Client,
    url: String,
    endpoint: String,
    authorization: HeaderValue,
    payload: serde_json::Value,
    sink: Arc<dyn DiagnosticSink>,
}

impl Delivery {
    async fn run(self) {
        let started = Instant::now();
        let span = tracing::Span::current();
        let labels = [opentelemetry::KeyValue::new(
            "endpoint",
            self.endpoint.clone(),
        )];

        match self.send().await {
            Ok(status) => {
                record_status(&span, status);
                debug!(status, "delivered");
            }
            Err(e) => {
                record_failure(&span);
                metrics::deliveries_failed().add(1, &labels);
                warn_safely(self.sink.as_ref(), &format!("request failed: {e}"));
            }
        }

        metrics::delivery_duration_ms().record(elapsed_ms(started), &labels);
    }

    async fn send(&self) -> Result<u16> {
        let response = self
            .http
            .post(&self.url)
            .header(AUTHORIZATION, self.authorization.clone())
            .header(CONTENT_TYPE, "application/json")
            .body(serde_json::to_vec(&self.payload)?)
            .send()
            .await?
            .error_for_status()?;
        Ok(response.status().as_u16())
    }
}

/// Run `future` to completion on the dispatcher runtime, from a helper thread
/// when the caller is itself inside a runtime.
fn block_outside_runtime<F>(handle: &Handle, future: F)
where
    F: Future<Output = ()> + Send,
{
    if Handle::try_current().is_ok() {
        std::thread::scope(|scope| {
            scope.spawn(|| handle.block_on(future));
        });
    } else {
        handle.block_on(future);
    }
}

async fn wait_terminated(mut receiver: watch::Receiver<bool>) {
    // The sender lives as long as the dispatcher, which outlives the wait.
    let _ = receiver.wait_for(|terminated| *terminated).await;
}

async fn join_all(handles: Vec<JoinHandle<()>>) {
    for handle in handles {
        // A panicked delivery has already been removed from the registry;
        // there is nothing left to report.
        let _ = handle.await;
    }
}

fn elapsed_ms(started: Instant) -> f64 {
    started.elapsed().as_secs_f64() * 1000.0
}

fn skip(reason: &'static str) -> bool {
    metrics::reports_skipped().add(1, &[opentelemetry::KeyValue::new("reason", reason)]);
    false
}

fn authorization_header(token: &SecretString) -> Result<HeaderValue> {
    let mut value = HeaderValue::from_str(&authorization_value(token))
        .map_err(|_| Error::Config("api token contains invalid header characters".to_string()))?;
    value.set_sensitive(true);
    Ok(value)
}

fn normalize_host(host: &str) -> Result<String> {
    let trimmed = host.trim().trim_end_matches('/');
    let url = Url::parse(trimmed).map_err(|e| Error::Config(format!("invalid host {host:?}: {e}")))?;
    match url.scheme() {
        "http" | "https" => Ok(trimmed.to_string()),
        other => Err(Error::Config(format!(
            "host must use http or https, got {other}"
        ))),
    }
}
