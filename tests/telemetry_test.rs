//! Integration tests for telemetry initialization and span helpers.

use robodash::telemetry::delivery::{record_failure, record_status, start_delivery_span};
use robodash::telemetry::{TelemetryConfig, init_telemetry};

#[test]
fn telemetry_initializes_without_endpoint() {
    // A global subscriber can only be set once per process; a second init
    // in the same binary returns Err, which is acceptable here.
    let _guard = init_telemetry(TelemetryConfig {
        endpoint: None,
        service_name: "robodash-test".to_string(),
        log_level: "debug".to_string(),
    });
}

#[test]
fn delivery_span_records_status() {
    let span = start_delivery_span("ping", 7);
    record_status(&span, 201);
}

#[test]
fn delivery_span_records_failure() {
    let span = start_delivery_span("measurements", 8);
    record_failure(&span);
}
