// Copyright (c) 2026 Amunchain
// Licensed under the Apache License, Version 2.0
#![forbid(unsafe_code)]

//! `/metrics` exposition over the teacher's (previously unwired) `axum`
//! dependency.

use std::sync::Arc;

use axum::{extract::State, routing::get, Router};
use prometheus::{Encoder, TextEncoder};

use crate::monitoring::metrics::Metrics;

async fn metrics_handler(State(metrics): State<Arc<Metrics>>) -> String {
    let families = metrics.registry.gather();
    let encoder = TextEncoder::new();
    let mut buf = Vec::new();
    if encoder.encode(&families, &mut buf).is_err() {
        return String::new();
    }
    String::from_utf8(buf).unwrap_or_default()
}

/// Build the router exposing `GET /metrics` in Prometheus text format.
pub fn router(metrics: Arc<Metrics>) -> Router {
    Router::new()
        .route("/metrics", get(metrics_handler))
        .with_state(metrics)
}
