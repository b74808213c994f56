// Copyright (c) 2026 Amunchain
// Licensed under the Apache License, Version 2.0
#![forbid(unsafe_code)]

//! The overlay façade (spec §5): owns the transport and the chosen
//! broadcast strategy, runs the receive loop, and exposes `Broadcast`,
//! `Send`, `Start`, `Stop` to the application.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use ring::rand::{SecureRandom, SystemRandom};
use thiserror::Error;
use tokio::sync::Mutex as AsyncMutex;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::core::address_book::{Address, AddressBook};
use crate::core::envelope::Envelope;
use crate::monitoring::metrics::TelemetrySink;
use crate::networking::transport::{Transport, TransportError};
use crate::networking::BroadcastStrategy;

/// Errors the overlay façade can return to its caller.
#[derive(Debug, Error)]
pub enum OverlayError {
    /// The overlay has been stopped; no further sends are accepted.
    #[error("overlay is closed")]
    Closed,
    /// Broadcasting failed (e.g. nonce generation).
    #[error(transparent)]
    Broadcast(#[from] crate::networking::raintree::BroadcastError),
    /// The direct unicast failed at the transport layer.
    #[error(transparent)]
    Transport(#[from] TransportError),
}

/// Owns the receive loop and dispatches decoded envelopes to the active
/// [`BroadcastStrategy`]. One instance per running node.
pub struct Overlay {
    address_book: Arc<AddressBook>,
    transport: Arc<dyn Transport>,
    strategy: Arc<dyn BroadcastStrategy>,
    telemetry: Arc<dyn TelemetrySink>,
    max_envelope_bytes: usize,
    stopped: AtomicBool,
    receive_task: AsyncMutex<Option<JoinHandle<()>>>,
    rng: SystemRandom,
}

impl Overlay {
    /// Assemble the façade. Does not begin receiving until [`Overlay::start`].
    pub fn new(
        address_book: Arc<AddressBook>,
        transport: Arc<dyn Transport>,
        strategy: Arc<dyn BroadcastStrategy>,
        telemetry: Arc<dyn TelemetrySink>,
        max_envelope_bytes: usize,
    ) -> Arc<Self> {
        Arc::new(Self {
            address_book,
            transport,
            strategy,
            telemetry,
            max_envelope_bytes,
            stopped: AtomicBool::new(false),
            receive_task: AsyncMutex::new(None),
            rng: SystemRandom::new(),
        })
    }

    /// Spawn the receive loop. Idempotent: calling twice is a no-op.
    pub async fn start(self: &Arc<Self>) {
        let mut slot = self.receive_task.lock().await;
        if slot.is_some() {
            return;
        }
        let this = Arc::clone(self);
        *slot = Some(tokio::spawn(async move { this.receive_loop().await }));
    }

    async fn receive_loop(self: Arc<Self>) {
        loop {
            let frame = match self.transport.read().await {
                Ok(frame) => frame,
                Err(TransportError::Closed) => {
                    debug!("overlay receive loop stopping: transport closed");
                    break;
                }
                Err(err) => {
                    warn!(error = %err, "transport read error");
                    continue;
                }
            };

            let envelope = match Envelope::decode(&frame, self.max_envelope_bytes) {
                Ok(envelope) => envelope,
                Err(err) => {
                    debug!(error = %err, "dropping malformed envelope");
                    self.telemetry.on_malformed_dropped();
                    continue;
                }
            };

            // Per-envelope fan-out task: dedup + deliver + forward happen
            // off the receive loop so one slow forward can't stall intake.
            let strategy = Arc::clone(&self.strategy);
            tokio::spawn(async move {
                strategy.on_receive(envelope).await;
            });
        }
    }

    /// Close the transport and wait for the receive loop to exit.
    /// Subsequent `broadcast`/`send` calls return [`OverlayError::Closed`].
    pub async fn stop(&self) -> Result<(), OverlayError> {
        self.stopped.store(true, Ordering::SeqCst);
        let _ = self.transport.close().await;
        if let Some(handle) = self.receive_task.lock().await.take() {
            let _ = handle.await;
        }
        Ok(())
    }

    /// Originate a broadcast via the configured strategy.
    pub async fn broadcast(&self, payload: Vec<u8>) -> Result<(), OverlayError> {
        if self.stopped.load(Ordering::SeqCst) {
            return Err(OverlayError::Closed);
        }
        self.strategy.broadcast(payload).await?;
        Ok(())
    }

    /// Direct unicast to one peer, bypassing the tree entirely. The
    /// recipient's receive loop decodes and hands this to its own
    /// strategy at depth 0, so it is delivered but never forwarded.
    pub async fn send(&self, addr: Address, payload: Vec<u8>) -> Result<(), OverlayError> {
        if self.stopped.load(Ordering::SeqCst) {
            return Err(OverlayError::Closed);
        }
        let mut nonce_bytes = [0u8; 8];
        self.rng
            .fill(&mut nonce_bytes)
            .map_err(|_| crate::networking::raintree::BroadcastError::NonceUnavailable)?;
        let envelope = Envelope {
            nonce: u64::from_le_bytes(nonce_bytes),
            depth: 0,
            payload,
            origin: self.address_book.self_address(),
        };
        let bytes = envelope.encode();
        self.transport.write(addr, &bytes).await?;
        Ok(())
    }
}
