// Copyright (c) 2026 Amunchain
// Licensed under the Apache License, Version 2.0
#![forbid(unsafe_code)]

//! Bounded, at-most-once nonce cache (spec §4.4). Eviction is LRU by
//! insertion time; a time-based expiry is a lower-priority back-up so the
//! cache never grows unbounded even under a pathologically low write rate.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::{Duration, Instant};

const DEFAULT_CAPACITY: usize = 32_768;
const DEFAULT_TTL_SECS: u64 = 60;

struct Inner {
    order: VecDeque<u64>,
    seen: HashMap<u64, Instant>,
}

/// First-seen-wins nonce cache. `seen_or_record` is the sole entry point:
/// the check and the insert happen under one lock, so two concurrent
/// callers racing on the same nonce can never both observe "unseen".
pub struct DedupCache {
    inner: Mutex<Inner>,
    capacity: usize,
    ttl: Duration,
}

impl DedupCache {
    /// Build a cache bounded to `capacity` entries, with `ttl` as the
    /// minimum guaranteed retention window.
    pub fn new(capacity: usize, ttl: Duration) -> Self {
        Self {
            inner: Mutex::new(Inner {
                order: VecDeque::with_capacity(capacity.min(1024)),
                seen: HashMap::with_capacity(capacity.min(1024)),
            }),
            capacity: capacity.max(1),
            ttl,
        }
    }

    /// Returns `true` if `nonce` was already present (the envelope should be
    /// dropped), `false` if this call recorded it for the first time.
    pub fn seen_or_record(&self, nonce: u64) -> bool {
        let mut inner = self.inner.lock().unwrap();

        if inner.seen.contains_key(&nonce) {
            return true;
        }

        let now = Instant::now();
        inner.seen.insert(nonce, now);
        inner.order.push_back(nonce);

        while inner.order.len() > self.capacity {
            if let Some(oldest) = inner.order.pop_front() {
                inner.seen.remove(&oldest);
            } else {
                break;
            }
        }

        while let Some(&front) = inner.order.front() {
            let age = inner.seen.get(&front).map(|t| now.duration_since(*t));
            match age {
                Some(age) if age > self.ttl && inner.order.len() > 1 => {
                    inner.order.pop_front();
                    inner.seen.remove(&front);
                }
                _ => break,
            }
        }

        false
    }

    /// Current number of tracked nonces.
    pub fn len(&self) -> usize {
        self.inner.lock().unwrap().seen.len()
    }

    /// Whether the cache currently tracks no nonces.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for DedupCache {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY, Duration::from_secs(DEFAULT_TTL_SECS))
    }
}
