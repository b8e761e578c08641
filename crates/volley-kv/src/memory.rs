// SPDX-FileCopyrightText: 2026 Volley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! In-process implementation of the shared counter store.
//!
//! Backed by a `DashMap` with per-entry expiry instants. Every mutating
//! operation runs inside the map's per-key critical section, which is
//! what makes `incr`, `incr_bounded`, `set_nx` and `compare_and_delete`
//! atomic with respect to concurrent workers in the same process.
//!
//! Expiry is lazy on access plus an explicit [`MemoryKv::purge_expired`]
//! sweep driven by housekeeping. Time comes from `tokio::time::Instant`
//! so expiry behavior is testable under a paused runtime.

use std::time::Duration;

use async_trait::async_trait;
use dashmap::mapref::entry::Entry as MapEntry;
use dashmap::DashMap;
use tokio::time::Instant;

use volley_core::{BoundedIncr, KvStore, VolleyError};

#[derive(Debug, Clone)]
struct Entry {
    value: String,
    expires_at: Option<Instant>,
}

impl Entry {
    fn new(value: String, ttl: Option<Duration>, now: Instant) -> Self {
        Self {
            value,
            expires_at: ttl.map(|t| now + t),
        }
    }

    fn expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|at| at <= now)
    }
}

/// In-process shared store with per-key expiry.
#[derive(Debug, Default)]
pub struct MemoryKv {
    entries: DashMap<String, Entry>,
}

impl MemoryKv {
    pub fn new() -> Self {
        Self::default()
    }

    /// Remove every expired entry. Returns how many were dropped.
    ///
    /// Expiry is otherwise lazy, so long-idle keys linger until this
    /// sweep runs; housekeeping calls it periodically.
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let before = self.entries.len();
        self.entries.retain(|_, entry| !entry.expired(now));
        before - self.entries.len()
    }

    /// Number of live entries (expired-but-unswept entries excluded).
    pub fn len(&self) -> usize {
        let now = Instant::now();
        self.entries
            .iter()
            .filter(|entry| !entry.expired(now))
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop an entry if it has expired, so subsequent reads see it absent.
    fn evict_if_expired(&self, key: &str, now: Instant) {
        self.entries.remove_if(key, |_, entry| entry.expired(now));
    }

    fn parse_counter(value: &str, key: &str) -> Result<i64, VolleyError> {
        value.parse::<i64>().map_err(|_| VolleyError::Store {
            source: format!("key `{key}` holds non-numeric value `{value}`").into(),
        })
    }
}

#[async_trait]
impl KvStore for MemoryKv {
    async fn get(&self, key: &str) -> Result<Option<String>, VolleyError> {
        let now = Instant::now();
        self.evict_if_expired(key, now);
        Ok(self.entries.get(key).map(|entry| entry.value.clone()))
    }

    async fn set(
        &self,
        key: &str,
        value: &str,
        ttl: Option<Duration>,
    ) -> Result<(), VolleyError> {
        let now = Instant::now();
        self.entries
            .insert(key.to_string(), Entry::new(value.to_string(), ttl, now));
        Ok(())
    }

    async fn set_nx(
        &self,
        key: &str,
        value: &str,
        ttl: Option<Duration>,
    ) -> Result<bool, VolleyError> {
        let now = Instant::now();
        match self.entries.entry(key.to_string()) {
            MapEntry::Occupied(mut occupied) => {
                if occupied.get().expired(now) {
                    occupied.insert(Entry::new(value.to_string(), ttl, now));
                    Ok(true)
                } else {
                    Ok(false)
                }
            }
            MapEntry::Vacant(vacant) => {
                vacant.insert(Entry::new(value.to_string(), ttl, now));
                Ok(true)
            }
        }
    }

    async fn delete(&self, key: &str) -> Result<bool, VolleyError> {
        let now = Instant::now();
        match self.entries.remove(key) {
            Some((_, entry)) => Ok(!entry.expired(now)),
            None => Ok(false),
        }
    }

    async fn compare_and_delete(
        &self,
        key: &str,
        expected: &str,
    ) -> Result<bool, VolleyError> {
        let now = Instant::now();
        let removed = self
            .entries
            .remove_if(key, |_, entry| !entry.expired(now) && entry.value == expected);
        Ok(removed.is_some())
    }

    async fn incr(
        &self,
        key: &str,
        by: i64,
        ttl: Option<Duration>,
    ) -> Result<i64, VolleyError> {
        let now = Instant::now();
        match self.entries.entry(key.to_string()) {
            MapEntry::Occupied(mut occupied) => {
                let current = if occupied.get().expired(now) {
                    0
                } else {
                    Self::parse_counter(&occupied.get().value, key)?
                };
                let next = current + by;
                occupied.insert(Entry::new(next.to_string(), ttl, now));
                Ok(next)
            }
            MapEntry::Vacant(vacant) => {
                vacant.insert(Entry::new(by.to_string(), ttl, now));
                Ok(by)
            }
        }
    }

    async fn incr_bounded(
        &self,
        key: &str,
        ceiling: i64,
        ttl: Option<Duration>,
    ) -> Result<BoundedIncr, VolleyError> {
        let now = Instant::now();
        match self.entries.entry(key.to_string()) {
            MapEntry::Occupied(mut occupied) => {
                let current = if occupied.get().expired(now) {
                    0
                } else {
                    Self::parse_counter(&occupied.get().value, key)?
                };
                if current + 1 > ceiling {
                    return Ok(BoundedIncr {
                        admitted: false,
                        count: current,
                    });
                }
                let next = current + 1;
                occupied.insert(Entry::new(next.to_string(), ttl, now));
                Ok(BoundedIncr {
                    admitted: true,
                    count: next,
                })
            }
            MapEntry::Vacant(vacant) => {
                if ceiling < 1 {
                    return Ok(BoundedIncr {
                        admitted: false,
                        count: 0,
                    });
                }
                vacant.insert(Entry::new("1".to_string(), ttl, now));
                Ok(BoundedIncr {
                    admitted: true,
                    count: 1,
                })
            }
        }
    }

    async fn ttl_remaining(&self, key: &str) -> Result<Option<Duration>, VolleyError> {
        let now = Instant::now();
        self.evict_if_expired(key, now);
        Ok(self
            .entries
            .get(key)
            .and_then(|entry| entry.expires_at)
            .map(|at| at.saturating_duration_since(now)))
    }

    async fn scan_prefix(&self, prefix: &str) -> Result<Vec<String>, VolleyError> {
        let now = Instant::now();
        let mut keys: Vec<String> = self
            .entries
            .iter()
            .filter(|entry| entry.key().starts_with(prefix) && !entry.expired(now))
            .map(|entry| entry.key().clone())
            .collect();
        keys.sort();
        Ok(keys)
    }
}
