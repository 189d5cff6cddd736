//! Dispatch engine: fire-and-forget delivery of report payloads.

pub mod dispatch;
mod registry;
pub mod sink;

pub use dispatch::{Dispatcher, EngineState};
pub use sink::{DefaultSink, DiagnosticSink, SilentSink, warn_safely};
