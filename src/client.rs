//! Reporting API. The public entry point for application code.
//!
//! Every call validates its event, builds the JSON body and hands it to the
//! [`Dispatcher`], then returns straight away. The returned `bool` says
//! whether a delivery was started, never whether it arrived.
//!
//! ```no_run
//! use robodash::{Client, Config, Count, Measure, Ping};
//! use std::time::Duration;
//!
//! let client = Client::new(&Config::with_token("secret")).expect("client");
//!
//! client.ping("nightly backup");
//! client.ping(
//!     Ping::new("invoice sync")
//!         .schedule("every 30 minutes")
//!         .grace_period(Duration::from_secs(300)),
//! );
//! client.count(Count::new("signups", 3));
//! client.measure(Measure::new("queue depth", 17).unit("jobs"));
//!
//! // Optional: dropping the last clone drains as well.
//! client.drain();
//! ```

use std::sync::Arc;
use tracing::debug;

use crate::config::Config;
use crate::engine::{DiagnosticSink, Dispatcher, EngineState};
use crate::error::Result;
use crate::event::{Count, Measure, Ping, ReportEvent};
use crate::telemetry::metrics;

/// Cheaply cloneable handle to one dispatch engine.
///
/// Clones share the engine. When the last clone is dropped the engine
/// drains, so deliveries still in flight get their chance to land.
#[derive(Clone)]
pub struct Client {
    engine: Arc<Dispatcher>,
}

impl Client {
    pub fn new(config: &Config) -> Result<Self> {
        Ok(Self::from_dispatcher(Dispatcher::new(config)?))
    }

    /// Like [`Client::new`], with a custom diagnostic sink.
    pub fn with_sink(config: &Config, sink: Arc<dyn DiagnosticSink>) -> Result<Self> {
        Ok(Self::from_dispatcher(Dispatcher::new(config)?.with_sink(sink)))
    }

    pub fn from_dispatcher(engine: Dispatcher) -> Self {
        Self {
            engine: Arc::new(engine),
        }
    }

    /// Report a heartbeat.
    pub fn ping(&self, ping: impl Into<Ping>) -> bool {
        self.report(ReportEvent::Ping(ping.into()))
    }

    /// Report an integer tally. Float values are truncated toward zero.
    pub fn count(&self, count: Count) -> bool {
        self.report(ReportEvent::Count(count))
    }

    /// Report a measurement.
    pub fn measure(&self, measure: Measure) -> bool {
        self.report(ReportEvent::Measure(measure))
    }

    /// Validate and submit any event.
    ///
    /// Invalid events (empty name, non-finite or out-of-range numbers) are
    /// dropped and answered with `false`.
    pub fn report(&self, event: ReportEvent) -> bool {
        let payload = match event.payload() {
            Ok(payload) => payload,
            Err(e) => {
                debug!(endpoint = event.endpoint(), error = %e, "dropping invalid event");
                metrics::reports_skipped()
                    .add(1, &[opentelemetry::KeyValue::new("reason", "invalid")]);
                return false;
            }
        };
        self.engine.submit(event.endpoint(), payload)
    }

    /// Block until every delivery started so far has finished. Reporting
    /// calls made afterwards return `false`.
    pub fn drain(&self) {
        self.engine.drain();
    }

    pub async fn drain_async(&self) {
        self.engine.drain_async().await;
    }

    pub fn set_enabled(&self, enabled: bool) {
        self.engine.set_enabled(enabled);
    }

    pub fn state(&self) -> EngineState {
        self.engine.state()
    }

    pub fn in_flight(&self) -> usize {
        self.engine.in_flight()
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.engine
    }
}
