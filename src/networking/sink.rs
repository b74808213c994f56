// Copyright (c) 2026 Amunchain
// Licensed under the Apache License, Version 2.0
#![forbid(unsafe_code)]

//! Payload hand-off to the application layer (spec §6): opaque byte
//! strings plus a topic tag, decoupled from the overlay's own plumbing the
//! same way [`crate::core::config::AddressBookProvider`] decouples the
//! dispatcher from validator-set sourcing.

use async_trait::async_trait;
use tokio::sync::mpsc;

/// Receives payloads the overlay has accepted (first-seen, well-formed).
#[async_trait]
pub trait EventSink: Send + Sync {
    /// Hand off one payload under `topic`.
    async fn deliver(&self, topic: &str, payload: Vec<u8>);
}

/// Forwards every delivery onto an `mpsc` channel; the application reads
/// from the paired receiver at its own pace.
pub struct ChannelEventSink {
    tx: mpsc::Sender<(String, Vec<u8>)>,
}

impl ChannelEventSink {
    /// Build a sink paired with a freshly created receiver of capacity `buffer`.
    pub fn new(buffer: usize) -> (Self, mpsc::Receiver<(String, Vec<u8>)>) {
        let (tx, rx) = mpsc::channel(buffer);
        (Self { tx }, rx)
    }
}

#[async_trait]
impl EventSink for ChannelEventSink {
    async fn deliver(&self, topic: &str, payload: Vec<u8>) {
        // The receiver may have been dropped (application shut down); a
        // full or closed channel is not the overlay's problem to solve.
        let _ = self.tx.send((topic.to_string(), payload)).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn delivered_payload_is_received() {
        let (sink, mut rx) = ChannelEventSink::new(8);
        sink.deliver("raintree", b"hello".to_vec()).await;
        let (topic, payload) = rx.recv().await.unwrap();
        assert_eq!(topic, "raintree");
        assert_eq!(payload, b"hello");
    }

    #[tokio::test]
    async fn dropped_receiver_does_not_panic() {
        let (sink, rx) = ChannelEventSink::new(1);
        drop(rx);
        sink.deliver("raintree", b"x".to_vec()).await;
    }
}
