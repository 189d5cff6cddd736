//! Where delivery diagnostics go.
//!
//! A failed delivery is worth a warning, but never worth disturbing the
//! host. Diagnostics are handed to a [`DiagnosticSink`] through
//! [`warn_safely`], which swallows any panic the sink raises. Failure to log
//! is itself silent.

use std::io::Write as _;
use std::panic::{AssertUnwindSafe, catch_unwind};

/// Receives best-effort diagnostics from delivery tasks.
pub trait DiagnosticSink: Send + Sync + 'static {
    fn warn(&self, message: &str);
}

/// Default sink.
///
/// Routes through `tracing` when the host has installed a global
/// subscriber, otherwise writes a `[robodash]` line to stderr. Write
/// errors (closed or broken stderr) are ignored.
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultSink;

impl DiagnosticSink for DefaultSink {
    fn warn(&self, message: &str) {
        if tracing::dispatcher::has_been_set() {
            tracing::warn!(target: "robodash", "{message}");
        } else {
            let _ = writeln!(std::io::stderr().lock(), "[robodash] {message}");
        }
    }
}

/// Sink that drops everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct SilentSink;

impl DiagnosticSink for SilentSink {
    fn warn(&self, _message: &str) {}
}

/// Deliver `message` to `sink`, ignoring any panic it raises.
pub fn warn_safely(sink: &dyn DiagnosticSink, message: &str) {
    let _ = catch_unwind(AssertUnwindSafe(|| sink.warn(message)));
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Exploding;

    impl DiagnosticSink for Exploding {
        fn warn(&self, _message: &str) {
            panic!("sink is broken");
        }
    }

    #[test]
    fn panicking_sink_is_swallowed() {
        warn_safely(&Exploding, "request failed");
    }
}
