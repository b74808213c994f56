// Copyright (c) 2026 Amunchain
// Licensed under the Apache License, Version 2.0
#![forbid(unsafe_code)]

//! Plain flood broadcast (spec §4.6): write to every peer but self, and
//! never forward on receive. The dedup cache still guards the event sink
//! against the redundant copies this strategy produces whenever more than
//! one peer happens to write to the same node.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use ring::rand::{SecureRandom, SystemRandom};
use tracing::warn;

use crate::core::address_book::AddressBook;
use crate::core::envelope::Envelope;
use crate::monitoring::metrics::TelemetrySink;
use crate::networking::dedup::DedupCache;
use crate::networking::raintree::BroadcastError;
use crate::networking::sink::EventSink;
use crate::networking::transport::{Transport, TransportError};
use crate::networking::BroadcastStrategy;

/// Flood-to-everyone alternative to [`crate::networking::raintree::RainTreeDispatcher`].
pub struct StdBroadcast {
    address_book: Arc<AddressBook>,
    dedup: Arc<DedupCache>,
    transport: Arc<dyn Transport>,
    sink: Arc<dyn EventSink>,
    telemetry: Arc<dyn TelemetrySink>,
    rng: SystemRandom,
    write_timeout: Duration,
    topic: String,
}

impl StdBroadcast {
    /// Assemble a flood broadcaster over its collaborators.
    pub fn new(
        address_book: Arc<AddressBook>,
        dedup: Arc<DedupCache>,
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
}

#[async_trait]
impl BroadcastStrategy for StdBroadcast {
    async fn broadcast(&self, payload: Vec<u8>) -> Result<(), BroadcastError> {
        let nonce = self.draw_nonce()?;
        self.dedup.seen_or_record(nonce);

        self.telemetry.on_handled_successfully();
        self.sink.deliver(&self.topic, payload.clone()).await;

        let envelope = Envelope {
            nonce,
            depth: 0,
            payload,
            origin: self.address_book.self_address(),
        };
        let bytes = envelope.encode();
        let self_index = self.address_book.self_index();

        for (i, peer) in self.address_book.iter().enumerate() {
            if i == self_index {
                continue;
            }
            let addr = peer.address;
            match tokio::time::timeout(self.write_timeout, self.transport.write(addr, &bytes)).await {
                Ok(Ok(())) => {}
                Ok(Err(TransportError::Closed)) => {}
                Ok(Err(err)) => {
                    warn!(%addr, error = %err, "flood write failed");
                    self.telemetry.on_forward_failure();
                }
                Err(_) => {
                    warn!(%addr, "flood write timed out");
                    self.telemetry.on_forward_failure();
                }
            }
        }
        Ok(())
    }

    async fn on_receive(&self, envelope: Envelope) {
        if self.dedup.seen_or_record(envelope.nonce) {
            self.telemetry.on_dedup_dropped();
            return;
        }
        self.telemetry.on_broadcast_received();
        self.sink.deliver(&self.topic, envelope.payload).await;
        self.telemetry.on_handled_successfully();
        // No forwarding: std broadcast surfaces-and-drops.
    }
}
