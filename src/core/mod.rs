// Copyright (c) 2026 Amunchain
// Licensed under the Apache License, Version 2.0

//! Deterministic core types: the address book, the wire envelope, and
//! configuration loading.

pub mod address_book;
pub mod config;
pub mod envelope;
