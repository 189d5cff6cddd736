//! Shared test helpers: a fake collector and a recording diagnostic sink.

#![allow(dead_code)]

use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::routing::post;
use axum::{Json, Router};
use robodash::DiagnosticSink;
use serde_json::Value;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::net::TcpListener;

/// One request as the fake collector saw it.
#[derive(Debug, Clone)]
pub struct Received {
    pub file: String,
    pub authorization: Option<String>,
    pub content_type: Option<String>,
    pub body: Value,
}

#[derive(Clone)]
struct CollectorState {
    received: Arc<Mutex<Vec<Received>>>,
    delay: Duration,
    status: StatusCode,
}

/// Handle to a running fake collector.
pub struct Collector {
    pub url: String,
    received: Arc<Mutex<Vec<Received>>>,
}

impl Collector {
    pub fn received(&self) -> Vec<Received> {
        self.received.lock().unwrap().clone()
    }
}

async fn record(
    State(state): State<CollectorState>,
    Path(file): Path<String>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> StatusCode {
    tokio::time::sleep(state.delay).await;

    let header = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
    };
    state.received.lock().unwrap().push(Received {
        file,
        authorization: header("authorization"),
        content_type: header("content-type"),
        body,
    });
    state.status
}

/// Start a collector that answers every request with `status` after `delay`.
pub async fn start_collector_with(delay: Duration, status: StatusCode) -> Collector {
    let received = Arc::new(Mutex::new(Vec::new()));
    let state = CollectorState {
        received: Arc::clone(&received),
        delay,
        status,
    };
    let router = Router::new()
        .route("/api/{file}", post(record))
        .with_state(state);

    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind random port");
    let addr = listener.local_addr().expect("Failed to get local addr");

    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });

    Collector {
        url: format!("http://{addr}"),
        received,
    }
}

pub async fn start_collector() -> Collector {
    start_collector_with(Duration::ZERO, StatusCode::CREATED).await
}

/// Base URL of a local port nothing listens on.
pub async fn closed_port_url() -> String {
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind random port");
    let addr = listener.local_addr().expect("Failed to get local addr");
    drop(listener);
    format!("http://{addr}")
}

/// Sink that keeps every diagnostic it receives.
#[derive(Default)]
pub struct RecordingSink {
    messages: Mutex<Vec<String>>,
}

impl RecordingSink {
    pub fn messages(&self) -> Vec<String> {
        self.messages.lock().unwrap().clone()
    }
}

impl DiagnosticSink for RecordingSink {
    fn warn(&self, message: &str) {
        self.messages.lock().unwrap().push(message.to_string());
    }
}
