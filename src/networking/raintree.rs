// Copyright (c) 2026 Amunchain
// Licensed under the Apache License, Version 2.0
#![forbid(unsafe_code)]

//! RainTree redundant-tree broadcast (spec §2, §4). This is the heart of
//! the overlay: a deterministic, self-demoting fan-out over the ordered
//! address book that delivers every payload to every validator at most
//! once, using at most two outbound writes per forwarding step.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use ring::rand::{SecureRandom, SystemRandom};
use thiserror::Error;
use tracing::{trace, warn};

use crate::core::address_book::{AddressBook, Address};
use crate::core::envelope::Envelope;
use crate::monitoring::metrics::TelemetrySink;
use crate::networking::sink::EventSink;
use crate::networking::transport::{Transport, TransportError};

/// Errors a broadcast or forward step can surface.
#[derive(Debug, Error)]
pub enum BroadcastError {
    /// Drawing a fresh nonce failed (system RNG exhausted).
    #[error("failed to draw a nonce")]
    NonceUnavailable,
}

/// Strategy the [`crate::networking::overlay::Overlay`] delegates to,
/// selected by configuration (spec §4.6): the redundant-tree fan-out, or
/// plain flood-to-everyone.
#[async_trait]
pub trait BroadcastStrategy: Send + Sync {
    /// Originate a new broadcast of `payload`.
    async fn broadcast(&self, payload: Vec<u8>) -> Result<(), BroadcastError>;

    /// Handle an envelope that arrived over the wire, already decoded.
    async fn on_receive(&self, envelope: Envelope);
}

/// The tree height `D = ceil(log3(N))`.
pub fn tree_height(n: usize) -> u32 {
    if n <= 1 {
        return 0;
    }
    let mut height = 0u32;
    let mut threshold: u128 = 1;
    while threshold < n as u128 {
        threshold *= 3;
        height += 1;
    }
    height
}

/// The effective list size `k(d) = floor(N * (2/3)^(D-d))`, hard-bounded
/// to `N` once `d >= D` and to `1` at `d = 0` — both ends are exact
/// boundaries of the tree, not numerical coincidences, so both are
/// hard-cased rather than derived from the decayed formula. `d = 0` is
/// always the leaf: depending on `N`, the decayed value can still be
/// `> 1` there (e.g. `N = 9` decays to 4, `N = 3` decays to 2), which
/// previously let the self-demotion loop in `forward` run one spurious
/// extra round at the true leaf, re-sending to targets already covered
/// one depth up. Computed with integer arithmetic (`N * 2^e / 3^e`) so
/// every validator derives the identical value regardless of
/// floating-point environment.
pub fn effective_k(n: usize, depth: u32, height: u32) -> usize {
    if depth >= height {
        return n;
    }
    if depth == 0 {
        return 1;
    }
    let e = height - depth;
    let numerator = (n as u128) * 2u128.pow(e);
    let denominator = 3u128.pow(e);
    ((numerator / denominator) as usize).max(1)
}

/// The (left, right) ordinal targets at `depth`, relative to `self_index`,
/// or `None` where the offset collapses onto the local node and is
/// suppressed (spec §4.2's self-demotion / leaf edge cases).
fn targets_at(n: usize, self_index: usize, depth: u32, height: u32) -> (Option<usize>, Option<usize>) {
    let k = effective_k(n, depth, height);
    if k <= 1 {
        return (None, None);
    }
    let left = (self_index + k / 3) % n;
    let right = (self_index + (2 * k) / 3) % n;
    let left = if left == self_index { None } else { Some(left) };
    let right = if right == self_index { None } else { Some(right) };
    (left, right)
}

/// Dispatches broadcasts and forwards using the RainTree algorithm.
pub struct RainTreeDispatcher {
    address_book: Arc<AddressBook>,
    dedup: Arc<crate::networking::dedup::DedupCache>,
    transport: Arc<dyn Transport>,
    sink: Arc<dyn EventSink>,
    telemetry: Arc<dyn TelemetrySink>,
    rng: SystemRandom,
    write_timeout: Duration,
    topic: String,
}

impl RainTreeDispatcher {
    /// Assemble a dispatcher over its collaborators.
    pub fn new(
        address_book: Arc<AddressBook>,
        dedup: Arc<crate::networking::dedup::DedupCache>,
        transport: Arc<dyn Transport>,
        sink: Arc<dyn EventSink>,
        telemetry: Arc<dyn TelemetrySink>,
        write_timeout: Duration,
        topic: impl Into<String>,
    ) -> Self {
        Self {
            address_book,
            dedup,
            transport,
            sink,
            telemetry,
            rng: SystemRandom::new(),
            write_timeout,
            topic: topic.into(),
        }
    }

    fn draw_nonce(&self) -> Result<u64, BroadcastError> {
        let mut buf = [0u8; 8];
        self.rng
            .fill(&mut buf)
            .map_err(|_| BroadcastError::NonceUnavailable)?;
        Ok(u64::from_le_bytes(buf))
    }

    /// Maximum permissible envelope depth: `D + 1` (spec §3's declared
    /// field bound). Anything beyond this is malformed, not merely stale.
    fn max_depth(&self) -> u32 {
        tree_height(self.address_book.size()) + 1
    }

    async fn write_with_timeout(&self, addr: Address, bytes: &[u8]) {
        match tokio::time::timeout(self.write_timeout, self.transport.write(addr, bytes)).await {
            Ok(Ok(())) => {}
            Ok(Err(TransportError::Closed)) => {
                trace!(%addr, "forward skipped: transport closed");
            }
            Ok(Err(err)) => {
                warn!(%addr, error = %err, "forward write failed");
                self.telemetry.on_forward_failure();
            }
            Err(_) => {
                warn!(%addr, "forward write timed out");
                self.telemetry.on_forward_failure();
            }
        }
    }

    /// Local continuation from `envelope.depth` down to the leaves,
    /// re-evaluating (left, right) at each level and self-demoting
    /// (spec §4.2) until either depth reaches 0 or the effective list
    /// collapses to 1.
    async fn forward(&self, envelope: &Envelope) {
        let n = self.address_book.size();
        if n <= 1 {
            return;
        }
        let height = tree_height(n);
        let self_index = self.address_book.self_index();
        let mut depth = envelope.depth;

        loop {
            let k = effective_k(n, depth, height);
            let (left, right) = targets_at(n, self_index, depth, height);

            let child = Envelope {
                nonce: envelope.nonce,
                depth: depth.saturating_sub(1),
                payload: envelope.payload.clone(),
                origin: envelope.origin,
            };
            let bytes = child.encode();

            let mut sent = HashSet::with_capacity(2);
            for target in [left, right].into_iter().flatten() {
                if sent.insert(target) {
                    let addr = self.address_book.get(target).address;
                    self.write_with_timeout(addr, &bytes).await;
                }
            }

            if depth == 0 || k <= 1 {
                break;
            }
            depth -= 1;
        }
    }
}

#[async_trait]
impl BroadcastStrategy for RainTreeDispatcher {
    async fn broadcast(&self, payload: Vec<u8>) -> Result<(), BroadcastError> {
        let nonce = self.draw_nonce()?;
        // Record first so a redundant copy racing back to us is a no-op.
        self.dedup.seen_or_record(nonce);

        self.telemetry.on_handled_successfully();
        self.sink.deliver(&self.topic, payload.clone()).await;

        let envelope = Envelope {
            nonce,
            depth: tree_height(self.address_book.size()),
            payload,
            origin: self.address_book.self_address(),
        };
        self.forward(&envelope).await;
        Ok(())
    }

    async fn on_receive(&self, envelope: Envelope) {
        if envelope.depth > self.max_depth() {
            self.telemetry.on_malformed_dropped();
            return;
        }

        if self.dedup.seen_or_record(envelope.nonce) {
            self.telemetry.on_dedup_dropped();
            return;
        }

        self.telemetry.on_broadcast_received();
        self.sink.deliver(&self.topic, envelope.payload.clone()).await;
        self.telemetry.on_handled_successfully();

        if envelope.depth > 0 {
            self.forward(&envelope).await;
        }
    }
}
