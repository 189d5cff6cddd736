//! Metric instrument factories for the dispatch engine.
//!
//! Uses the OTel Meter API with the globally-registered `MeterProvider`.
//! Without an installed provider every instrument is a no-op, so library
//! users who never call [`super::init_telemetry`] pay nothing.

use opentelemetry::metrics::{Counter, Histogram, Meter};

fn meter() -> Meter {
    opentelemetry::global::meter("robodash")
}

/// Counter: events handed to a delivery task.
/// Labels: `endpoint`.
pub fn reports_submitted() -> Counter<u64> {
    meter()
        .u64_counter("robodash.reports.submitted")
        .with_description("Events accepted for delivery")
        .build()
}

/// Counter: reporting calls answered with `false`.
/// Labels: `reason` ("disabled" | "unauthenticated" | "draining" | "invalid").
pub fn reports_skipped() -> Counter<u64> {
    meter()
        .u64_counter("robodash.reports.skipped")
        .with_description("Reporting calls that did not spawn a delivery")
        .build()
}

/// Counter: deliveries that failed in flight.
/// Labels: `endpoint`.
pub fn deliveries_failed() -> Counter<u64> {
    meter()
        .u64_counter("robodash.deliveries.failed")
        .with_description("Deliveries that ended in a network or HTTP error")
        .build()
}

/// Histogram: wall time of one delivery attempt in milliseconds.
/// Labels: `endpoint`.
pub fn delivery_duration_ms() -> Histogram<f64> {
    meter()
        .f64_histogram("robodash.delivery.duration_ms")
        .with_description("Delivery attempt duration in milliseconds")
        .with_unit("ms")
        .build()
}
