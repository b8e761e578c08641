// SPDX-FileCopyrightText: 2026 Volley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Read-through cache layer for read-heavy aggregate queries.
//!
//! All entries live under the reserved `cache:` prefix, namespace-
//! isolated from the control-plane keys (quota counters, locks, rate
//! windows). Writes that would land under a control-plane prefix are
//! rejected outright — a generic invalidation sweep must never be able
//! to corrupt dispatch safety state.
//!
//! Store unavailability degrades every operation to a miss or no-op;
//! callers always keep a correct non-cached fallback path.

use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, warn};

use volley_core::{KvStore, VolleyError};
use volley_kv::keys::{cache_key, CACHE_PREFIX, CONTROL_PLANE_PREFIXES};

/// In-process cache effectiveness counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheMetrics {
    pub hits: u64,
    pub misses: u64,
}

impl CacheMetrics {
    pub fn samples(&self) -> u64 {
        self.hits + self.misses
    }

    pub fn hit_rate(&self) -> f64 {
        let samples = self.samples();
        if samples == 0 {
            0.0
        } else {
            self.hits as f64 / samples as f64
        }
    }
}

/// Cache-aside layer over the shared store.
pub struct CacheLayer {
    store: Arc<dyn KvStore>,
    default_ttl: Duration,
    min_sample: u64,
    hit_rate_warn: f64,
    hits: AtomicU64,
    misses: AtomicU64,
    warned: AtomicBool,
}

impl CacheLayer {
    pub fn new(
        store: Arc<dyn KvStore>,
        default_ttl: Duration,
        min_sample: u64,
        hit_rate_warn: f64,
    ) -> Self {
        Self {
            store,
            default_ttl,
            min_sample,
            hit_rate_warn,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            warned: AtomicBool::new(false),
        }
    }

    /// Read a cached value. Absent, expired, unparsable, or unreachable
    /// all count as a miss.
    pub async fn get<T: DeserializeOwned>(&self, namespace: &str, key: &str) -> Option<T> {
        if Self::reserved_violation(namespace, key).is_some() {
            self.record_miss();
            return None;
        }
        let full_key = cache_key(namespace, key);
        match self.store.get(&full_key).await {
            Ok(Some(raw)) => match serde_json::from_str(&raw) {
                Ok(value) => {
                    self.record_hit();
                    Some(value)
                }
                Err(e) => {
                    debug!(key = %full_key, error = %e, "cache entry unparsable, treating as miss");
                    self.record_miss();
                    None
                }
            },
            Ok(None) => {
                self.record_miss();
                None
            }
            Err(e) => {
                debug!(key = %full_key, error = %e, "cache store unavailable, treating as miss");
                self.record_miss();
                None
            }
        }
    }

    /// Write a value under `cache:{namespace}:{key}`.
    ///
    /// Rejects with a validation error any namespace or key that would
    /// place the fully-qualified key under a control-plane prefix,
    /// regardless of the forced `cache:` root. Store failures degrade to
    /// a logged no-op.
    pub async fn set<T: Serialize>(
        &self,
        namespace: &str,
        key: &str,
        value: &T,
        ttl: Option<Duration>,
    ) -> Result<(), VolleyError> {
        if let Some(prefix) = Self::reserved_violation(namespace, key) {
            return Err(VolleyError::Validation(format!(
                "cache write to `{namespace}:{key}` falls under protected prefix `{prefix}`"
            )));
        }
        let full_key = cache_key(namespace, key);
        let raw = serde_json::to_string(value)
            .map_err(|e| VolleyError::Internal(format!("cache value serialization: {e}")))?;
        let ttl = ttl.unwrap_or(self.default_ttl);
        if let Err(e) = self.store.set(&full_key, &raw, Some(ttl)).await {
            debug!(key = %full_key, error = %e, "cache store unavailable, write dropped");
        }
        Ok(())
    }

    /// Delete one cached entry. Returns whether a live entry was removed.
    pub async fn delete(&self, namespace: &str, key: &str) -> bool {
        if Self::reserved_violation(namespace, key).is_some() {
            return false;
        }
        let full_key = cache_key(namespace, key);
        match self.store.delete(&full_key).await {
            Ok(removed) => removed,
            Err(e) => {
                debug!(key = %full_key, error = %e, "cache store unavailable, delete dropped");
                false
            }
        }
    }

    /// Cache-aside read: on a miss, run `fallback`, cache its result,
    /// and return it. Fallback errors propagate uncached.
    pub async fn get_or_set<T, F, Fut>(
        &self,
        namespace: &str,
        key: &str,
        ttl: Option<Duration>,
        fallback: F,
    ) -> Result<T, VolleyError>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, VolleyError>>,
    {
        if let Some(cached) = self.get(namespace, key).await {
            return Ok(cached);
        }
        let value = fallback().await?;
        self.set(namespace, key, &value, ttl).await?;
        Ok(value)
    }

    /// Drop every entry in one namespace. Returns how many were removed.
    pub async fn invalidate_namespace(&self, namespace: &str) -> usize {
        self.invalidate_pattern(&format!("{namespace}:*")).await
    }

    /// Drop entries whose `namespace:key` matches a `*`-glob. The scan is
    /// confined to the cache's own prefix; control-plane keys are out of
    /// reach by construction.
    pub async fn invalidate_pattern(&self, glob: &str) -> usize {
        let regex = match glob_to_regex(glob) {
            Ok(regex) => regex,
            Err(e) => {
                warn!(glob = %glob, error = %e, "invalid cache invalidation pattern");
                return 0;
            }
        };
        let keys = match self.store.scan_prefix(CACHE_PREFIX).await {
            Ok(keys) => keys,
            Err(e) => {
                debug!(error = %e, "cache store unavailable, invalidation skipped");
                return 0;
            }
        };

        let mut removed = 0;
        for full_key in keys {
            let suffix = &full_key[CACHE_PREFIX.len()..];
            if regex.is_match(suffix) && self.store.delete(&full_key).await.unwrap_or(false) {
                removed += 1;
            }
        }
        removed
    }

    /// Current hit/miss counters.
    pub fn metrics(&self) -> CacheMetrics {
        CacheMetrics {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
        }
    }

    /// Whether the hit rate sits below the warning threshold with enough
    /// samples to mean something. A signal, not an error.
    pub fn hit_rate_low(&self) -> bool {
        let metrics = self.metrics();
        metrics.samples() >= self.min_sample && metrics.hit_rate() < self.hit_rate_warn
    }

    fn record_hit(&self) {
        self.hits.fetch_add(1, Ordering::Relaxed);
        metrics::counter!("volley_cache_hits_total").increment(1);
    }

    fn record_miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
        metrics::counter!("volley_cache_misses_total").increment(1);
        if self.hit_rate_low() && !self.warned.swap(true, Ordering::Relaxed) {
            let metrics = self.metrics();
            warn!(
                hits = metrics.hits,
                misses = metrics.misses,
                hit_rate = metrics.hit_rate(),
                "cache hit rate below warning threshold"
            );
        }
    }

    /// The control-plane prefix a namespace/key pair would violate, if any.
    ///
    /// Checked against the key alone and the joined `namespace:key` form,
    /// so no argument combination can address protected state even on a
    /// backend that does not force the `cache:` root.
    fn reserved_violation(namespace: &str, key: &str) -> Option<&'static str> {
        let joined = format!("{namespace}:{key}");
        CONTROL_PLANE_PREFIXES
            .iter()
            .copied()
            .find(|prefix| key.starts_with(prefix) || joined.starts_with(prefix))
    }
}

/// Convert a `*`-glob into an anchored regex.
fn glob_to_regex(glob: &str) -> Result<regex::Regex, regex::Error> {
    let mut pattern = String::with_capacity(glob.len() + 8);
    pattern.push('^');
    for part in glob.split('*') {
        pattern.push_str(&regex::escape(part));
        pattern.push_str(".*");
    }
    // split() yields one trailing part; drop the final ".*" it appended
    // unless the glob itself ended with '*'.
    if !glob.ends_with('*') {
        pattern.truncate(pattern.len() - 2);
    }
    pattern.push('$');
    regex::Regex::new(&pattern)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use volley_kv::MemoryKv;
    use volley_test_utils::DeadKv;

    #[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
    struct Totals {
        sent: u64,
        failed: u64,
    }

    fn cache() -> (CacheLayer, Arc<MemoryKv>) {
        let kv = Arc::new(MemoryKv::new());
        let cache = CacheLayer::new(kv.clone(), Duration::from_secs(300), 100, 0.5);
        (cache, kv)
    }

    #[tokio::test]
    async fn set_then_get_round_trips() {
        let (cache, _) = cache();
        let totals = Totals { sent: 9, failed: 1 };
        cache.set("dashboard", "totals", &totals, None).await.unwrap();

        let cached: Totals = cache.get("dashboard", "totals").await.unwrap();
        assert_eq!(cached, totals);
    }

    #[tokio::test]
    async fn writes_under_protected_prefixes_are_rejected() {
        let (cache, kv) = cache();
        for namespace in ["quota:2026-03-01", "lock:campaign", "rl:123", "quota"] {
            let result = cache.set(namespace, "x", &1u32, None).await;
            assert!(
                matches!(result, Err(VolleyError::Validation(_))),
                "namespace `{namespace}` must be rejected"
            );
        }
        // A protected key argument is rejected too.
        let result = cache.set("safe", "lock:campaign:c-1", &1u32, None).await;
        assert!(matches!(result, Err(VolleyError::Validation(_))));

        // Nothing leaked into the store.
        assert!(kv.scan_prefix("").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn entries_live_under_the_cache_prefix() {
        let (cache, kv) = cache();
        cache.set("ns", "k", &42u32, None).await.unwrap();
        let keys = kv.scan_prefix("").await.unwrap();
        assert_eq!(keys, vec!["cache:ns:k".to_string()]);
    }

    #[tokio::test]
    async fn get_or_set_calls_fallback_once() {
        let (cache, _) = cache();
        let calls = std::sync::atomic::AtomicU32::new(0);

        let first: Totals = cache
            .get_or_set("agg", "campaign-1", None, || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok(Totals { sent: 5, failed: 0 })
            })
            .await
            .unwrap();
        assert_eq!(first.sent, 5);

        let second: Totals = cache
            .get_or_set("agg", "campaign-1", None, || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok(Totals { sent: 99, failed: 9 })
            })
            .await
            .unwrap();
        // Served from cache; the second fallback never ran.
        assert_eq!(second.sent, 5);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn fallback_errors_propagate_uncached() {
        let (cache, _) = cache();

        let result: Result<Totals, _> = cache
            .get_or_set("agg", "broken", None, || async {
                Err(VolleyError::Internal("query failed".into()))
            })
            .await;
        assert!(result.is_err());

        // The failure was not cached: the next call runs the fallback.
        let recovered: Totals = cache
            .get_or_set("agg", "broken", None, || async {
                Ok(Totals { sent: 1, failed: 0 })
            })
            .await
            .unwrap();
        assert_eq!(recovered.sent, 1);
    }

    #[tokio::test]
    async fn invalidate_pattern_stays_inside_the_cache() {
        let (cache, kv) = cache();
        cache.set("agg", "campaign-1", &1u32, None).await.unwrap();
        cache.set("agg", "campaign-2", &2u32, None).await.unwrap();
        cache.set("other", "campaign-1", &3u32, None).await.unwrap();
        // A control-plane key sitting in the same store.
        kv.set("quota:2026-03-01:primary", "500", None).await.unwrap();

        let removed = cache.invalidate_pattern("agg:*").await;
        assert_eq!(removed, 2);

        let remaining: Option<u32> = cache.get("other", "campaign-1").await;
        assert_eq!(remaining, Some(3));
        // The sweep never touched the quota counter.
        assert_eq!(
            kv.get("quota:2026-03-01:primary").await.unwrap().as_deref(),
            Some("500")
        );

        // Even a wildcard-everything pattern is confined to cache keys.
        let removed = cache.invalidate_pattern("*").await;
        assert_eq!(removed, 1);
        assert_eq!(
            kv.get("quota:2026-03-01:primary").await.unwrap().as_deref(),
            Some("500")
        );
    }

    #[tokio::test]
    async fn invalidate_namespace_is_a_scoped_sweep() {
        let (cache, _) = cache();
        cache.set("agg", "a", &1u32, None).await.unwrap();
        cache.set("agg", "b", &2u32, None).await.unwrap();
        cache.set("dash", "a", &3u32, None).await.unwrap();

        assert_eq!(cache.invalidate_namespace("agg").await, 2);
        let kept: Option<u32> = cache.get("dash", "a").await;
        assert_eq!(kept, Some(3));
    }

    #[tokio::test]
    async fn metrics_track_hits_and_misses() {
        let (cache, _) = cache();
        cache.set("m", "present", &1u32, None).await.unwrap();

        let _: Option<u32> = cache.get("m", "present").await;
        let _: Option<u32> = cache.get("m", "present").await;
        let _: Option<u32> = cache.get("m", "absent").await;

        let metrics = cache.metrics();
        assert_eq!(metrics.hits, 2);
        assert_eq!(metrics.misses, 1);
        assert!((metrics.hit_rate() - 2.0 / 3.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn low_hit_rate_needs_a_minimum_sample() {
        let kv = Arc::new(MemoryKv::new());
        let cache = CacheLayer::new(kv, Duration::from_secs(300), 10, 0.5);

        // Nine misses: below the sample floor, no signal yet.
        for i in 0..9 {
            let _: Option<u32> = cache.get("m", &format!("absent-{i}")).await;
        }
        assert!(!cache.hit_rate_low());

        let _: Option<u32> = cache.get("m", "absent-9").await;
        assert!(cache.hit_rate_low());
    }

    #[tokio::test]
    async fn dead_store_degrades_to_miss_and_noop() {
        let cache = CacheLayer::new(Arc::new(DeadKv), Duration::from_secs(300), 100, 0.5);

        // Writes are dropped, not errors.
        cache.set("ns", "k", &1u32, None).await.unwrap();
        let missed: Option<u32> = cache.get("ns", "k").await;
        assert_eq!(missed, None);
        assert!(!cache.delete("ns", "k").await);
        assert_eq!(cache.invalidate_pattern("*").await, 0);

        // get_or_set still serves the fallback value.
        let value: u32 = cache
            .get_or_set("ns", "k", None, || async { Ok(7u32) })
            .await
            .unwrap();
        assert_eq!(value, 7);
    }

    #[test]
    fn glob_translation() {
        let regex = glob_to_regex("agg:campaign-*").unwrap();
        assert!(regex.is_match("agg:campaign-1"));
        assert!(!regex.is_match("agg:contact-1"));
        assert!(!regex.is_match("xagg:campaign-1"));

        let exact = glob_to_regex("agg:totals").unwrap();
        assert!(exact.is_match("agg:totals"));
        assert!(!exact.is_match("agg:totals-2"));
    }
}
