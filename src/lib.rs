//! # robodash
//!
//! Fire-and-forget reporting of heartbeats ("pings"), counts and
//! measurements to a Robodash collector.
//!
//! Reporting calls never block on the network and never fail loudly: each
//! one spawns a single delivery task with short connect/read timeouts and
//! answers `true` if a delivery was started. Failed deliveries are logged
//! through a pluggable sink and otherwise forgotten. Draining the
//! [`Client`] (or dropping its last clone) waits for outstanding deliveries
//! so a short-lived process does not exit before they land.
//!
//! The [`poller`] module turns periodic host statistics into measurements.

pub mod client;
pub mod config;
pub mod engine;
pub mod error;
pub mod event;
pub mod poller;
pub mod schedule;
pub mod telemetry;

pub use client::Client;
pub use config::Config;
pub use engine::{DiagnosticSink, Dispatcher, EngineState};
pub use error::{Error, Result};
pub use event::{Count, Measure, Number, Ping, ReportEvent};
pub use schedule::{Period, Schedule};
