// SPDX-FileCopyrightText: 2026 Volley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Shared counter store trait — the key-value primitives every
//! control-plane component (quota, locks, rate limiter, cache) builds on.

use std::time::Duration;

use async_trait::async_trait;

use crate::error::VolleyError;
use crate::types::BoundedIncr;

/// A shared key-value store with per-key expiry and the small set of
/// atomic operations the dispatch safety subsystem requires.
///
/// Every method that mutates a counter must be a single atomic step on
/// the backend: `incr` pairs the increment with the expiry refresh,
/// `incr_bounded` pairs the increment with the ceiling comparison, and
/// `compare_and_delete` pairs the ownership check with the delete. The
/// in-tree backend is `volley_kv::MemoryKv`.
#[async_trait]
pub trait KvStore: Send + Sync + 'static {
    /// Read a key. Expired keys read as absent.
    async fn get(&self, key: &str) -> Result<Option<String>, VolleyError>;

    /// Write a key, replacing any existing value. `ttl = None` means no expiry.
    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>)
        -> Result<(), VolleyError>;

    /// Conditional set-if-absent. Returns `true` when the key was created.
    async fn set_nx(
        &self,
        key: &str,
        value: &str,
        ttl: Option<Duration>,
    ) -> Result<bool, VolleyError>;

    /// Delete a key. Returns `true` when a live key was removed.
    async fn delete(&self, key: &str) -> Result<bool, VolleyError>;

    /// Delete a key only if its current value equals `expected`, in one
    /// atomic step. Returns `true` when the delete happened.
    async fn compare_and_delete(&self, key: &str, expected: &str)
        -> Result<bool, VolleyError>;

    /// Atomically increment a numeric key by `by` and refresh its expiry.
    /// A missing or expired key starts from zero. Returns the new value.
    async fn incr(&self, key: &str, by: i64, ttl: Option<Duration>)
        -> Result<i64, VolleyError>;

    /// Atomically increment a numeric key by one unless doing so would
    /// exceed `ceiling`. When rejected the counter is left unchanged.
    async fn incr_bounded(
        &self,
        key: &str,
        ceiling: i64,
        ttl: Option<Duration>,
    ) -> Result<BoundedIncr, VolleyError>;

    /// Remaining time to live for a key, `None` when the key is absent,
    /// expired, or has no expiry.
    async fn ttl_remaining(&self, key: &str) -> Result<Option<Duration>, VolleyError>;

    /// All live keys under a prefix. Used by cache invalidation and the
    /// housekeeping sweep; callers stay within their own reserved prefix.
    async fn scan_prefix(&self, prefix: &str) -> Result<Vec<String>, VolleyError>;
}
