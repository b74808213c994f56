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

//! RainTree gossip overlay for validator-set broadcast.
//!
//! This crate provides:
//! - A deterministic address book and canonical wire envelope
//! - The RainTree redundant-tree dispatcher, and a plain flood alternative
//! - A transport capability with real TCP and in-memory implementations
//! - Monitoring via Prometheus metrics and a `/metrics` HTTP endpoint

/// Address book, wire envelope, and configuration.
pub mod core;
/// Observability (Prometheus metrics, `/metrics` exposition).
pub mod monitoring;
/// The gossip overlay: transport, dedup cache, dispatcher, façade.
pub mod networking;
