// Copyright (c) 2026 Amunchain
// Licensed under the Apache License, Version 2.0
#![forbid(unsafe_code)]

//! Overlay configuration and the `address_book_source` collaborator
//! interface.
//!
//! Genesis parsing, validator staking lookups, and every other way a real
//! deployment might actually produce a validator list are external
//! collaborators (spec §1) the core never touches directly — it only
//! consumes whatever [`AddressBookProvider`] hands it. [`StaticAddressBookProvider`]
//! is the minimal concrete implementation: a flat list baked into the
//! config file, good enough for a standalone node or a test harness.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::core::address_book::{Address, AddressBook, AddressBookError, ValidatorEntry};

/// Configuration load/parse errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Could not read the config file from disk.
    #[error("failed to read config file")]
    Read,
    /// Config file is not valid TOML or doesn't match the schema.
    #[error("failed to parse config file")]
    Parse,
    /// A validator's `address_hex` entry is not 32 bytes of hex.
    #[error("invalid validator address hex")]
    InvalidAddressHex,
    /// The address book itself could not be built from the parsed validators.
    #[error(transparent)]
    AddressBook(#[from] AddressBookError),
}

/// One validator entry as written in the config file.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ValidatorConfigEntry {
    /// Validator address, hex-encoded (32 bytes).
    pub address_hex: String,
    /// Dial target for the real transport.
    pub service_url: String,
}

/// Root overlay configuration (spec §6 "Configuration").
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct OverlayConfig {
    /// Selects RainTree (`true`) vs. [`crate::networking::std_broadcast::StdBroadcast`] (`false`).
    #[serde(default = "default_true")]
    pub use_structured_overlay: bool,
    /// Local address, hex-encoded (32 bytes); must appear in `validators`.
    pub self_address_hex: String,
    /// Validator set, standing in for `address_book_source`.
    pub validators: Vec<ValidatorConfigEntry>,
    /// Listen address for the real TCP transport, e.g. "0.0.0.0:9000".
    pub listen_addr: String,
    /// Bounded dedup cache capacity (default 32768).
    #[serde(default = "default_dedup_cache_size")]
    pub dedup_cache_size: usize,
    /// Dedup cache time-based backup expiry, in seconds (default 60).
    #[serde(default = "default_dedup_cache_ttl_seconds")]
    pub dedup_cache_ttl_seconds: u64,
    /// Per-`Write` timeout, in milliseconds (default 500).
    #[serde(default = "default_write_timeout_ms")]
    pub write_timeout_ms: u64,
    /// Decode rejects anything larger than this (default 4 MiB).
    #[serde(default = "default_max_envelope_bytes")]
    pub max_envelope_bytes: usize,
}

fn default_true() -> bool {
    true
}
fn default_dedup_cache_size() -> usize {
    32_768
}
fn default_dedup_cache_ttl_seconds() -> u64 {
    60
}
fn default_write_timeout_ms() -> u64 {
    500
}
fn default_max_envelope_bytes() -> usize {
    4 * 1024 * 1024
}

fn parse_address_hex(s: &str) -> Result<Address, ConfigError> {
    let bytes = hex::decode(s.trim()).map_err(|_| ConfigError::InvalidAddressHex)?;
    if bytes.len() != 32 {
        return Err(ConfigError::InvalidAddressHex);
    }
    let mut out = [0u8; 32];
    out.copy_from_slice(&bytes);
    Ok(Address::from_bytes(out))
}

impl OverlayConfig {
    /// Load and parse an `OverlayConfig` from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let raw = fs::read_to_string(path).map_err(|_| ConfigError::Read)?;
        toml::from_str(&raw).map_err(|_| ConfigError::Parse)
    }

    fn validator_entries(&self) -> Result<Vec<ValidatorEntry>, ConfigError> {
        self.validators
            .iter()
            .map(|v| {
                Ok(ValidatorEntry {
                    address: parse_address_hex(&v.address_hex)?,
                    service_url: v.service_url.clone(),
                })
            })
            .collect()
    }

    /// Build the deterministic [`AddressBook`] this config describes.
    pub fn build_address_book(&self) -> Result<AddressBook, ConfigError> {
        let self_addr = parse_address_hex(&self.self_address_hex)?;
        let entries = self.validator_entries()?;
        Ok(AddressBook::build(entries, self_addr)?)
    }
}

/// Decouples the dispatcher from however a deployment actually produces
/// its validator list (genesis file, staking module, static config, ...).
pub trait AddressBookProvider: Send + Sync {
    /// Error type surfaced on construction failure.
    type Error: std::error::Error;

    /// Produce the (immutable, for this process's lifetime) address book.
    fn address_book(&self) -> Result<AddressBook, Self::Error>;
}

/// The minimal concrete provider: reads the validator list straight out of
/// the parsed config file.
#[derive(Clone, Debug)]
pub struct StaticAddressBookProvider {
    config: OverlayConfig,
}

impl StaticAddressBookProvider {
    /// Wrap a parsed config.
    pub fn new(config: OverlayConfig) -> Self {
        Self { config }
    }
}

impl AddressBookProvider for StaticAddressBookProvider {
    type Error = ConfigError;

    fn address_book(&self) -> Result<AddressBook, Self::Error> {
        self.config.build_address_book()
    }
}
