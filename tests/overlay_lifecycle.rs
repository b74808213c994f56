// Copyright (c) 2026 Amunchain
// Licensed under the Apache License, Version 2.0

//! Start/Stop semantics (spec §5): after `stop`, further `broadcast`/`send`
//! calls return promptly with `Closed` rather than hanging or panicking.

use std::sync::Arc;
use std::time::Duration;

use raintree_overlay::core::address_book::{Address, AddressBook, ValidatorEntry};
use raintree_overlay::monitoring::metrics::NoopSink;
use raintree_overlay::networking::dedup::DedupCache;
use raintree_overlay::networking::memory_transport::MemoryMesh;
use raintree_overlay::networking::overlay::{Overlay, OverlayError};
use raintree_overlay::networking::raintree::RainTreeDispatcher;
use raintree_overlay::networking::sink::ChannelEventSink;
use raintree_overlay::networking::BroadcastStrategy;

fn addr(i: u8) -> Address {
    let mut bytes = [0u8; 32];
    bytes[31] = i;
    Address::from_bytes(bytes)
}

fn build_overlay(mesh: &Arc<MemoryMesh>, validators: &[ValidatorEntry], self_addr: Address) -> Arc<Overlay> {
    let book = Arc::new(AddressBook::build(validators.to_vec(), self_addr).unwrap());
    let dedup = Arc::new(DedupCache::new(1024, Duration::from_secs(60)));
    let transport = mesh.transport_for(self_addr);
    let (sink, _rx) = ChannelEventSink::new(64);
    let telemetry = Arc::new(NoopSink);

    let dispatcher = Arc::new(RainTreeDispatcher::new(
        Arc::clone(&book),
        dedup,
        transport.clone(),
        Arc::new(sink),
        telemetry.clone(),
        Duration::from_millis(200),
        "test",
    ));
    let strategy: Arc<dyn BroadcastStrategy> = dispatcher;

    Overlay::new(book, transport, strategy, telemetry, 1 << 20)
}

#[tokio::test]
async fn stop_rejects_subsequent_broadcast() {
    let mesh = MemoryMesh::new();
    let validators = vec![
        ValidatorEntry { address: addr(1), service_url: "mem://1".into() },
        ValidatorEntry { address: addr(2), service_url: "mem://2".into() },
    ];
    let overlay = build_overlay(&mesh, &validators, addr(1));
    overlay.start().await;

    overlay.stop().await.unwrap();

    let err = overlay.broadcast(b"late".to_vec()).await.unwrap_err();
    assert!(matches!(err, OverlayError::Closed));
}

#[tokio::test]
async fn stop_rejects_subsequent_send() {
    let mesh = MemoryMesh::new();
    let validators = vec![
        ValidatorEntry { address: addr(1), service_url: "mem://1".into() },
        ValidatorEntry { address: addr(2), service_url: "mem://2".into() },
    ];
    let overlay = build_overlay(&mesh, &validators, addr(1));
    overlay.start().await;

    overlay.stop().await.unwrap();

    let err = overlay.send(addr(2), b"late".to_vec()).await.unwrap_err();
    assert!(matches!(err, OverlayError::Closed));
}

#[tokio::test]
async fn stop_is_idempotent() {
    let mesh = MemoryMesh::new();
    let validators = vec![
        ValidatorEntry { address: addr(1), service_url: "mem://1".into() },
        ValidatorEntry { address: addr(2), service_url: "mem://2".into() },
    ];
    let overlay = build_overlay(&mesh, &validators, addr(1));
    overlay.start().await;

    overlay.stop().await.unwrap();
    overlay.stop().await.unwrap();
}

#[tokio::test]
async fn direct_send_delivers_without_forwarding() {
    let mesh = MemoryMesh::new();
    let validators = vec![
        ValidatorEntry { address: addr(1), service_url: "mem://1".into() },
        ValidatorEntry { address: addr(2), service_url: "mem://2".into() },
        ValidatorEntry { address: addr(3), service_url: "mem://3".into() },
    ];

    let book2 = Arc::new(AddressBook::build(validators.clone(), addr(2)).unwrap());
    let dedup2 = Arc::new(DedupCache::new(1024, Duration::from_secs(60)));
    let transport2 = mesh.transport_for(addr(2));
    let (sink2, mut rx2) = ChannelEventSink::new(64);
    let telemetry2 = Arc::new(NoopSink);
    let dispatcher2 = Arc::new(RainTreeDispatcher::new(
        Arc::clone(&book2),
        dedup2,
        transport2.clone(),
        Arc::new(sink2),
        telemetry2.clone(),
        Duration::from_millis(200),
        "test",
    ));
    let strategy2: Arc<dyn BroadcastStrategy> = dispatcher2;
    let overlay2 = Overlay::new(book2, transport2, strategy2, telemetry2, 1 << 20);
    overlay2.start().await;

    let overlay1 = build_overlay(&mesh, &validators, addr(1));
    overlay1.start().await;

    overlay1.send(addr(2), b"direct".to_vec()).await.unwrap();

    let (topic, payload) = tokio::time::timeout(Duration::from_millis(200), rx2.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(topic, "test");
    assert_eq!(payload, b"direct");

    overlay1.stop().await.unwrap();
    overlay2.stop().await.unwrap();
}
