// Copyright (c) 2026 Amunchain
// Licensed under the Apache License, Version 2.0

//! Observability: Prometheus metrics and the HTTP exposition endpoint.

pub mod http;
pub mod metrics;
