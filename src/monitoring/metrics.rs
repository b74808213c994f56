// Copyright (c) 2026 Amunchain
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//     http://www.apache.org/licenses/LICENSE-2.0
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
#![forbid(unsafe_code)]
#![warn(missing_docs)]

//! Observable counters (spec §6): nodes-connected gauge; broadcast messages
//! received per block; deduped-drops total; forward-failures total;
//! handled-successfully total.

use prometheus::{IntCounter, IntGauge, Registry};
use thiserror::Error;

/// Metrics errors.
#[derive(Debug, Error)]
pub enum MetricsError {
    #[error("prometheus")]
    Prom,
}

/// Metrics container.
#[derive(Clone)]
pub struct Metrics {
    /// Registry.
    pub registry: Registry,

    /// Connected peers gauge.
    pub nodes_connected: IntGauge,
    /// Broadcast messages received (first-seen) total.
    pub broadcast_messages_received_total: IntCounter,
    /// Redundant-path drops caught by the dedup cache.
    pub dedup_dropped_total: IntCounter,
    /// `Transport::Write` failures (unreachable/timeout), counted not retried.
    pub forward_failures_total: IntCounter,
    /// Envelopes successfully handed to the event sink.
    pub handled_successfully_total: IntCounter,
    /// Envelopes dropped for malformed decode.
    pub malformed_dropped_total: IntCounter,
}

impl Metrics {
    /// Create and register metrics.
    pub fn new() -> Result<Self, MetricsError> {
        let registry = Registry::new();

        let nodes_connected = IntGauge::new("raintree_nodes_connected", "Connected peers")
            .map_err(|_| MetricsError::Prom)?;
        let broadcast_messages_received_total = IntCounter::new(
            "raintree_broadcast_messages_received_total",
            "Broadcast messages received (first-seen)",
        )
        .map_err(|_| MetricsError::Prom)?;
        let dedup_dropped_total = IntCounter::new(
            "raintree_dedup_dropped_total",
            "Redundant-path drops caught by the dedup cache",
        )
        .map_err(|_| MetricsError::Prom)?;
        let forward_failures_total = IntCounter::new(
            "raintree_forward_failures_total",
            "Transport write failures while forwarding",
        )
        .map_err(|_| MetricsError::Prom)?;
        let handled_successfully_total = IntCounter::new(
            "raintree_handled_successfully_total",
            "Envelopes handed to the event sink",
        )
        .map_err(|_| MetricsError::Prom)?;
        let malformed_dropped_total = IntCounter::new(
            "raintree_malformed_dropped_total",
            "Envelopes dropped for malformed decode",
        )
        .map_err(|_| MetricsError::Prom)?;

        registry
            .register(Box::new(nodes_connected.clone()))
            .map_err(|_| MetricsError::Prom)?;
        registry
            .register(Box::new(broadcast_messages_received_total.clone()))
            .map_err(|_| MetricsError::Prom)?;
        registry
            .register(Box::new(dedup_dropped_total.clone()))
            .map_err(|_| MetricsError::Prom)?;
        registry
            .register(Box::new(forward_failures_total.clone()))
            .map_err(|_| MetricsError::Prom)?;
        registry
            .register(Box::new(handled_successfully_total.clone()))
            .map_err(|_| MetricsError::Prom)?;
        registry
            .register(Box::new(malformed_dropped_total.clone()))
            .map_err(|_| MetricsError::Prom)?;

        Ok(Self {
            registry,
            nodes_connected,
            broadcast_messages_received_total,
            dedup_dropped_total,
            forward_failures_total,
            handled_successfully_total,
            malformed_dropped_total,
        })
    }
}

/// Reframes the teacher's central "bus" (spec §9) as an explicit,
/// injected collaborator: the dispatcher reports to a `TelemetrySink`
/// instead of reaching into a shared registry it also owns.
pub trait TelemetrySink: Send + Sync {
    /// A first-seen broadcast envelope was received.
    fn on_broadcast_received(&self) {}
    /// A redundant-path envelope was dropped by the dedup cache.
    fn on_dedup_dropped(&self) {}
    /// A `Transport::Write` call failed (unreachable or timed out).
    fn on_forward_failure(&self) {}
    /// A payload was handed to the event sink.
    fn on_handled_successfully(&self) {}
    /// An envelope failed to decode and was dropped.
    fn on_malformed_dropped(&self) {}
    /// The connected-peer gauge changed by `delta`.
    fn on_peers_delta(&self, _delta: i64) {}
}

/// Production [`TelemetrySink`] backed by [`Metrics`].
pub struct PrometheusTelemetry {
    metrics: Metrics,
}

impl PrometheusTelemetry {
    /// Wrap an existing `Metrics` instance.
    pub fn new(metrics: Metrics) -> Self {
        Self { metrics }
    }

    /// Access the underlying registry (for the `/metrics` HTTP exposition).
    pub fn metrics(&self) -> &Metrics {
        &self.metrics
    }
}

impl TelemetrySink for PrometheusTelemetry {
    fn on_broadcast_received(&self) {
        self.metrics.broadcast_messages_received_total.inc();
    }
    fn on_dedup_dropped(&self) {
        self.metrics.dedup_dropped_total.inc();
    }
    fn on_forward_failure(&self) {
        self.metrics.forward_failures_total.inc();
    }
    fn on_handled_successfully(&self) {
        self.metrics.handled_successfully_total.inc();
    }
    fn on_malformed_dropped(&self) {
        self.metrics.malformed_dropped_total.inc();
    }
    fn on_peers_delta(&self, delta: i64) {
        self.metrics.nodes_connected.add(delta);
    }
}

/// No-op sink for tests that don't care about counters.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoopSink;

impl TelemetrySink for NoopSink {}
