// Copyright (c) 2026 Amunchain
// Licensed under the Apache License, Version 2.0
#![forbid(unsafe_code)]

//! The `Transport` capability (spec §4.3): `Read`, `Write`, `Close`.
//!
//! A single capability type with two implementations — a real TCP dialer
//! pool ([`crate::networking::tcp_transport::TcpTransport`]) and an
//! in-memory channel mesh for tests
//! ([`crate::networking::memory_transport::MemoryTransport`]) — no
//! inheritance hierarchy needed.

use async_trait::async_trait;
use thiserror::Error;

use crate::core::address_book::Address;

/// Transport-level errors (spec §7).
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum TransportError {
    /// The transport was closed (via `Close`, or never opened a route to `addr`).
    #[error("transport closed")]
    Closed,
    /// No route to the given peer.
    #[error("peer unreachable")]
    Unreachable,
    /// The write did not complete within the configured timeout.
    #[error("write timed out")]
    Timeout,
}

/// Capability surface the dispatcher consumes. Implementations must be
/// safe to call `write` on from many concurrent tasks (spec §5).
#[async_trait]
pub trait Transport: Send + Sync {
    /// Block until a full framed datagram is available, or the transport closes.
    async fn read(&self) -> Result<Vec<u8>, TransportError>;

    /// Best-effort send to `addr`. No acknowledgement is exposed.
    async fn write(&self, addr: Address, bytes: &[u8]) -> Result<(), TransportError>;

    /// Idempotent. Subsequent `read` calls (including one already blocked) return `Closed`.
    async fn close(&self) -> Result<(), TransportError>;
}
