// Copyright (c) 2026 Amunchain
// Licensed under the Apache License, Version 2.0

//! Gossip overlay: transport capability, dedup cache, RainTree dispatcher,
//! the flood-broadcast alternative, and the façade that ties them together.

pub mod dedup;
pub mod memory_transport;
pub mod overlay;
pub mod raintree;
pub mod sink;
pub mod std_broadcast;
pub mod tcp_transport;
pub mod transport;

pub use raintree::BroadcastStrategy;
