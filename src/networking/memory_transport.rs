// Copyright (c) 2026 Amunchain
// Licensed under the Apache License, Version 2.0
#![forbid(unsafe_code)]

//! In-memory channel mesh implementing [`Transport`], used by the test
//! harness (spec §8) in place of real sockets.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::{mpsc, Mutex as AsyncMutex, Notify};

use crate::core::address_book::Address;
use crate::networking::transport::{Transport, TransportError};

const MAILBOX_CAPACITY: usize = 1024;

/// Shared registry of per-address mailboxes. One `MemoryMesh` represents a
/// single closed network; every [`MemoryTransport`] handed out by the same
/// mesh can reach every other.
pub struct MemoryMesh {
    senders: Mutex<HashMap<Address, mpsc::Sender<Vec<u8>>>>,
}

impl MemoryMesh {
    /// Create an empty mesh.
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            senders: Mutex::new(HashMap::new()),
        })
    }

    /// Mint a transport for `addr`, registering its inbound mailbox.
    pub fn transport_for(self: &Arc<Self>, addr: Address) -> Arc<MemoryTransport> {
        let (tx, rx) = mpsc::channel(MAILBOX_CAPACITY);
        self.senders.lock().unwrap().insert(addr, tx);
        Arc::new(MemoryTransport {
            mesh: Arc::clone(self),
            addr,
            inbound: AsyncMutex::new(rx),
            closed: AtomicBool::new(false),
            notify: Notify::new(),
            read_count: AtomicUsize::new(0),
            write_count: AtomicUsize::new(0),
        })
    }
}

/// One node's view of a [`MemoryMesh`]. Tracks how many frames it has
/// actually read off its mailbox and written onto the mesh, so test
/// scenarios (`tests/raintree_scenarios.rs`) can assert per-node
/// (reads, writes) bounds rather than only sink-delivery counts.
pub struct MemoryTransport {
    mesh: Arc<MemoryMesh>,
    addr: Address,
    inbound: AsyncMutex<mpsc::Receiver<Vec<u8>>>,
    closed: AtomicBool,
    notify: Notify,
    read_count: AtomicUsize,
    write_count: AtomicUsize,
}

impl MemoryTransport {
    /// Number of frames this node has pulled off its inbound mailbox.
    pub fn read_count(&self) -> usize {
        self.read_count.load(Ordering::SeqCst)
    }

    /// Number of frames this node has written onto the mesh.
    pub fn write_count(&self) -> usize {
        self.write_count.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Transport for MemoryTransport {
    async fn read(&self) -> Result<Vec<u8>, TransportError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(TransportError::Closed);
        }
        let mut rx = self.inbound.lock().await;
        let result = tokio::select! {
            biased;
            _ = self.notify.notified() => Err(TransportError::Closed),
            maybe = rx.recv() => maybe.ok_or(TransportError::Closed),
        };
        if result.is_ok() {
            self.read_count.fetch_add(1, Ordering::SeqCst);
        }
        result
    }

    async fn write(&self, addr: Address, bytes: &[u8]) -> Result<(), TransportError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(TransportError::Closed);
        }
        let sender = {
            let senders = self.mesh.senders.lock().unwrap();
            senders.get(&addr).cloned()
        };
        match sender {
            Some(tx) => {
                tx.send(bytes.to_vec())
                    .await
                    .map_err(|_| TransportError::Unreachable)?;
                self.write_count.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
            None => Err(TransportError::Unreachable),
        }
    }

    async fn close(&self) -> Result<(), TransportError> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        self.mesh.senders.lock().unwrap().remove(&self.addr);
        self.notify.notify_waiters();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(byte: u8) -> Address {
        Address::from_bytes([byte; 32])
    }

    #[tokio::test]
    async fn write_then_read_roundtrips() {
        let mesh = MemoryMesh::new();
        let a = mesh.transport_for(addr(1));
        let b = mesh.transport_for(addr(2));

        a.write(addr(2), b"hello").await.unwrap();
        let got = b.read().await.unwrap();
        assert_eq!(got, b"hello");
    }

    #[tokio::test]
    async fn write_to_unknown_address_is_unreachable() {
        let mesh = MemoryMesh::new();
        let a = mesh.transport_for(addr(1));
        let err = a.write(addr(99), b"x").await.unwrap_err();
        assert_eq!(err, TransportError::Unreachable);
    }

    #[tokio::test]
    async fn close_unblocks_pending_read() {
        let mesh = MemoryMesh::new();
        let a = mesh.transport_for(addr(1));
        let a2 = Arc::clone(&a);
        let handle = tokio::spawn(async move { a2.read().await });
        tokio::task::yield_now().await;
        a.close().await.unwrap();
        let result = handle.await.unwrap();
        assert_eq!(result.unwrap_err(), TransportError::Closed);
    }

    #[tokio::test]
    async fn write_after_close_is_closed_error() {
        let mesh = MemoryMesh::new();
        let a = mesh.transport_for(addr(1));
        a.close().await.unwrap();
        let err = a.write(addr(2), b"x").await.unwrap_err();
        assert_eq!(err, TransportError::Closed);
    }
}
