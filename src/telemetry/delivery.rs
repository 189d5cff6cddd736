//! Delivery span helpers.
//!
//! Every delivery task runs inside one of these spans, so failures logged
//! from a task carry the endpoint and task id with them.

use tracing::Span;

/// Start a span for a single delivery attempt.
///
/// The `delivery.status` field is declared empty and is filled by
/// [`record_status`] or [`record_failure`].
pub fn start_delivery_span(endpoint: &str, task_id: u64) -> Span {
    tracing::info_span!(
        "robodash.deliver",
        "delivery.endpoint" = endpoint,
        "delivery.task_id" = task_id,
        "delivery.status" = tracing::field::Empty,
    )
}

/// Record the HTTP status the collector answered with.
pub fn record_status(span: &Span, status: u16) {
    span.record("delivery.status", status);
}

/// Record that the attempt never produced a usable response.
pub fn record_failure(span: &Span) {
    span.record("delivery.status", "failed");
}
