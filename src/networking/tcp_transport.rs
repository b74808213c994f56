// Copyright (c) 2026 Amunchain
// Licensed under the Apache License, Version 2.0
#![forbid(unsafe_code)]

//! Real TCP dialer pool implementing [`Transport`]. Framing follows the
//! `tokio-util` length-delimited convention rather than a bespoke header,
//! since the wire envelope already carries its own declared length.

use std::collections::HashMap;
use std::io;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use futures::{SinkExt, StreamExt};
use tokio::net::tcp::OwnedWriteHalf;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, Mutex as AsyncMutex, Notify};
use tokio::task::JoinHandle;
use tokio_util::codec::{FramedRead, FramedWrite, LengthDelimitedCodec};
use tracing::{debug, warn};

use crate::core::address_book::Address;
use crate::monitoring::metrics::TelemetrySink;
use crate::networking::transport::{Transport, TransportError};

const INBOUND_CAPACITY: usize = 4096;

fn codec() -> LengthDelimitedCodec {
    LengthDelimitedCodec::builder().max_frame_length(64 * 1024 * 1024).new_codec()
}

/// TCP-backed [`Transport`]. Dials peers lazily and keeps the connection
/// open for reuse; accepts inbound connections on `listen_addr` and feeds
/// every frame received on any of them into a single inbound queue.
pub struct TcpTransport {
    peer_addrs: HashMap<Address, SocketAddr>,
    writers: AsyncMutex<HashMap<Address, FramedWrite<OwnedWriteHalf, LengthDelimitedCodec>>>,
    inbound_tx: mpsc::Sender<Vec<u8>>,
    inbound_rx: AsyncMutex<mpsc::Receiver<Vec<u8>>>,
    write_timeout: Duration,
    closed: AtomicBool,
    notify: Notify,
    accept_task: std::sync::Mutex<Option<JoinHandle<()>>>,
    reader_tasks: std::sync::Mutex<Vec<JoinHandle<()>>>,
    telemetry: Arc<dyn TelemetrySink>,
}

impl TcpTransport {
    /// Bind `listen_addr` and begin accepting inbound connections.
    /// `peer_addrs` maps every other validator's address to its dial target.
    /// Every successful accept or dial reports one connected peer to
    /// `telemetry`, so `nodes_connected` (spec §6) tracks the transport's
    /// actual connection count rather than sitting permanently at zero.
    pub async fn bind(
        listen_addr: SocketAddr,
        peer_addrs: HashMap<Address, SocketAddr>,
        write_timeout: Duration,
        telemetry: Arc<dyn TelemetrySink>,
    ) -> io::Result<Arc<Self>> {
        let listener = TcpListener::bind(listen_addr).await?;
        let (inbound_tx, inbound_rx) = mpsc::channel(INBOUND_CAPACITY);

        let transport = Arc::new(Self {
            peer_addrs,
            writers: AsyncMutex::new(HashMap::new()),
            inbound_tx: inbound_tx.clone(),
            inbound_rx: AsyncMutex::new(inbound_rx),
            write_timeout,
            closed: AtomicBool::new(false),
            notify: Notify::new(),
            accept_task: std::sync::Mutex::new(None),
            reader_tasks: std::sync::Mutex::new(Vec::new()),
            telemetry,
        });

        let accept_transport = Arc::clone(&transport);
        let accept_task = tokio::spawn(async move {
            loop {
                match listener.accept().await {
                    Ok((stream, peer)) => {
                        accept_transport.spawn_reader(stream, peer);
                        accept_transport.telemetry.on_peers_delta(1);
                    }
                    Err(err) => {
                        warn!(error = %err, "tcp accept failed");
                        break;
                    }
                }
            }
        });
        *transport.accept_task.lock().unwrap() = Some(accept_task);

        Ok(transport)
    }

    fn spawn_reader(self: &Arc<Self>, stream: TcpStream, peer: SocketAddr) {
        let (read_half, _write_half) = stream.into_split();
        let mut framed = FramedRead::new(read_half, codec());
        let tx = self.inbound_tx.clone();
        let handle = tokio::spawn(async move {
            while let Some(frame) = framed.next().await {
                match frame {
                    Ok(bytes) => {
                        if tx.send(bytes.to_vec()).await.is_err() {
                            break;
                        }
                    }
                    Err(err) => {
                        debug!(error = %err, %peer, "tcp read error");
                        break;
                    }
                }
            }
        });
        self.reader_tasks.lock().unwrap().push(handle);
    }

    async fn dial(&self, addr: Address) -> Result<(), TransportError> {
        {
            let writers = self.writers.lock().await;
            if writers.contains_key(&addr) {
                return Ok(());
            }
        }
        let socket_addr = *self
            .peer_addrs
            .get(&addr)
            .ok_or(TransportError::Unreachable)?;
        let stream = TcpStream::connect(socket_addr)
            .await
            .map_err(|_| TransportError::Unreachable)?;
        let (_read_half, write_half) = stream.into_split();
        let framed = FramedWrite::new(write_half, codec());
        self.writers.lock().await.insert(addr, framed);
        self.telemetry.on_peers_delta(1);
        Ok(())
    }
}

#[async_trait]
impl Transport for TcpTransport {
    async fn read(&self) -> Result<Vec<u8>, TransportError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(TransportError::Closed);
        }
        let mut rx = self.inbound_rx.lock().await;
        tokio::select! {
            biased;
            _ = self.notify.notified() => Err(TransportError::Closed),
            maybe = rx.recv() => maybe.ok_or(TransportError::Closed),
        }
    }

    async fn write(&self, addr: Address, bytes: &[u8]) -> Result<(), TransportError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(TransportError::Closed);
        }
        self.dial(addr).await?;
        let mut writers = self.writers.lock().await;
        let framed = writers.get_mut(&addr).ok_or(TransportError::Unreachable)?;
        let payload = Bytes::copy_from_slice(bytes);
        match tokio::time::timeout(self.write_timeout, framed.send(payload)).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(_)) => {
                writers.remove(&addr);
                Err(TransportError::Unreachable)
            }
            Err(_) => Err(TransportError::Timeout),
        }
    }

    async fn close(&self) -> Result<(), TransportError> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        if let Some(handle) = self.accept_task.lock().unwrap().take() {
            handle.abort();
        }
        for handle in self.reader_tasks.lock().unwrap().drain(..) {
            handle.abort();
        }
        let mut writers = self.writers.lock().await;
        let dropped = writers.len() as i64;
        writers.clear();
        drop(writers);
        if dropped > 0 {
            self.telemetry.on_peers_delta(-dropped);
        }
        self.notify.notify_waiters();
        Ok(())
    }
}
