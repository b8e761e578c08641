// SPDX-FileCopyrightText: 2026 Volley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Reserved key prefixes and key builders for the shared store.
//!
//! All control-plane keys (counters, locks, rate windows) and all cache
//! keys live under disjoint prefixes. The cache layer enforces that no
//! cache write can land under a control-plane prefix; keeping every
//! builder here makes the non-overlap auditable in one place.

use volley_core::CounterKind;

/// Daily quota counters: `quota:{date}:{kind}`.
pub const QUOTA_PREFIX: &str = "quota:";

/// Campaign and idempotency locks: `lock:campaign:{id}`, `lock:op:{kind}:{id}`.
pub const LOCK_PREFIX: &str = "lock:";

/// Rate limiter windows: `rl:{bucket}`.
pub const RATE_PREFIX: &str = "rl:";

/// Generic cache entries: `cache:{namespace}:{key}`.
pub const CACHE_PREFIX: &str = "cache:";

/// The prefixes cache writes must never touch.
pub const CONTROL_PLANE_PREFIXES: [&str; 3] = [QUOTA_PREFIX, LOCK_PREFIX, RATE_PREFIX];

/// Key for one of a logical day's quota counters.
pub fn quota_counter_key(date: &str, kind: CounterKind) -> String {
    format!("{QUOTA_PREFIX}{date}:{}", kind.key_fragment())
}

/// Key for a campaign's mutual-exclusion lock.
pub fn campaign_lock_key(campaign_id: &str) -> String {
    format!("{LOCK_PREFIX}campaign:{campaign_id}")
}

/// Key for an idempotency lock over `(operation_kind, message_id)`.
pub fn operation_lock_key(operation_kind: &str, message_id: &str) -> String {
    format!("{LOCK_PREFIX}op:{operation_kind}:{message_id}")
}

/// Key for a rate limiter window bucket.
pub fn rate_bucket_key(bucket: &str) -> String {
    format!("{RATE_PREFIX}{bucket}")
}

/// Fully-qualified cache key.
pub fn cache_key(namespace: &str, key: &str) -> String {
    format!("{CACHE_PREFIX}{namespace}:{key}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prefixes_are_disjoint() {
        let all = [QUOTA_PREFIX, LOCK_PREFIX, RATE_PREFIX, CACHE_PREFIX];
        for (i, a) in all.iter().enumerate() {
            for (j, b) in all.iter().enumerate() {
                if i != j {
                    assert!(!a.starts_with(b), "{a} overlaps {b}");
                }
            }
        }
    }

    #[test]
    fn builders_stay_under_their_prefix() {
        assert!(quota_counter_key("2026-03-01", CounterKind::Primary)
            .starts_with(QUOTA_PREFIX));
        assert!(campaign_lock_key("c-1").starts_with(LOCK_PREFIX));
        assert!(operation_lock_key("send", "m-1").starts_with(LOCK_PREFIX));
        assert!(rate_bucket_key("28711234").starts_with(RATE_PREFIX));
        assert!(cache_key("dashboard", "totals").starts_with(CACHE_PREFIX));
    }

    #[test]
    fn quota_key_encodes_date_and_kind() {
        assert_eq!(
            quota_counter_key("2026-03-01", CounterKind::Error),
            "quota:2026-03-01:error"
        );
    }
}
