// SPDX-FileCopyrightText: 2026 Volley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Fixed-window rate limiter enforcing the per-minute send ceiling.
//!
//! Admission is one atomic bounded increment on the current window's
//! counter: the increment and the ceiling comparison happen in a single
//! store-side step, and a rejected attempt leaves the counter untouched.
//! Store failures fail open with a warning, consistent with the quota
//! gate's availability bias.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tracing::warn;

use volley_core::KvStore;
use volley_kv::keys::rate_bucket_key;

/// Fixed-window send rate limiter.
pub struct SendRateLimiter {
    store: Arc<dyn KvStore>,
    ceiling: i64,
    window: Duration,
}

impl SendRateLimiter {
    /// Limiter with the standard one-minute window.
    pub fn per_minute(store: Arc<dyn KvStore>, ceiling: i64) -> Self {
        Self::new(store, ceiling, Duration::from_secs(60))
    }

    pub fn new(store: Arc<dyn KvStore>, ceiling: i64, window: Duration) -> Self {
        Self {
            store,
            ceiling,
            window,
        }
    }

    pub fn ceiling(&self) -> i64 {
        self.ceiling
    }

    /// Try to admit one send in the current window.
    pub async fn try_acquire(&self) -> bool {
        self.try_acquire_at(Utc::now().timestamp()).await
    }

    /// Sends still admissible in the current window.
    pub async fn remaining(&self) -> i64 {
        self.remaining_at(Utc::now().timestamp()).await
    }

    /// Time until the next window opens — the backpressure hint for
    /// callers that got rejected.
    pub fn wait_time(&self) -> Duration {
        self.wait_time_at(Utc::now().timestamp())
    }

    async fn try_acquire_at(&self, unix_secs: i64) -> bool {
        let key = self.bucket_key(unix_secs);
        // The window key outlives the window itself by one period so a
        // straggling read never resurrects a fresh counter at zero.
        match self
            .store
            .incr_bounded(&key, self.ceiling, Some(self.window * 2))
            .await
        {
            Ok(result) => {
                if !result.admitted {
                    metrics::counter!("volley_rate_limited_total").increment(1);
                }
                result.admitted
            }
            Err(e) => {
                warn!(key = %key, error = %e, "rate limiter store error, failing open");
                true
            }
        }
    }

    async fn remaining_at(&self, unix_secs: i64) -> i64 {
        let key = self.bucket_key(unix_secs);
        match self.store.get(&key).await {
            Ok(value) => {
                let count = value.and_then(|v| v.parse::<i64>().ok()).unwrap_or(0);
                (self.ceiling - count).max(0)
            }
            Err(e) => {
                warn!(key = %key, error = %e, "rate limiter read error, reporting full window");
                self.ceiling
            }
        }
    }

    fn wait_time_at(&self, unix_secs: i64) -> Duration {
        let window_secs = self.window.as_secs() as i64;
        let elapsed = unix_secs.rem_euclid(window_secs);
        Duration::from_secs((window_secs - elapsed) as u64)
    }

    fn bucket_key(&self, unix_secs: i64) -> String {
        let window_secs = self.window.as_secs() as i64;
        rate_bucket_key(&(unix_secs / window_secs).to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use volley_kv::MemoryKv;

    fn limiter(ceiling: i64) -> SendRateLimiter {
        SendRateLimiter::per_minute(Arc::new(MemoryKv::new()), ceiling)
    }

    #[tokio::test]
    async fn admits_exactly_the_ceiling_in_one_window() {
        let limiter = limiter(25);
        let ts = 1_772_000_000;

        let mut admitted = 0;
        let mut rejected = 0;
        for _ in 0..50 {
            if limiter.try_acquire_at(ts).await {
                admitted += 1;
            } else {
                rejected += 1;
            }
        }
        assert_eq!(admitted, 25);
        assert_eq!(rejected, 25);
        assert_eq!(admitted + rejected, 50);
    }

    #[tokio::test]
    async fn fresh_window_resets_the_count() {
        let limiter = limiter(2);
        let ts = 1_772_000_000;

        assert!(limiter.try_acquire_at(ts).await);
        assert!(limiter.try_acquire_at(ts).await);
        assert!(!limiter.try_acquire_at(ts).await);

        // Next minute bucket: counter starts over.
        assert!(limiter.try_acquire_at(ts + 60).await);
    }

    #[tokio::test]
    async fn remaining_tracks_admissions() {
        let limiter = limiter(5);
        let ts = 1_772_000_000;

        assert_eq!(limiter.remaining_at(ts).await, 5);
        limiter.try_acquire_at(ts).await;
        limiter.try_acquire_at(ts).await;
        assert_eq!(limiter.remaining_at(ts).await, 3);

        for _ in 0..10 {
            limiter.try_acquire_at(ts).await;
        }
        assert_eq!(limiter.remaining_at(ts).await, 0);
    }

    #[tokio::test]
    async fn wait_time_counts_down_to_the_window_edge() {
        let limiter = limiter(25);
        // 1_771_999_980 is divisible by 60, so it opens a minute window.
        let window_start = 1_771_999_980;
        assert_eq!(
            limiter.wait_time_at(window_start),
            Duration::from_secs(60)
        );
        // 12 seconds into the window, 48 remain.
        assert_eq!(
            limiter.wait_time_at(window_start + 12),
            Duration::from_secs(48)
        );
        assert_eq!(
            limiter.wait_time_at(window_start + 59),
            Duration::from_secs(1)
        );
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_callers_cannot_exceed_the_ceiling() {
        let limiter = Arc::new(limiter(25));
        let ts = 1_772_000_000;

        let mut handles = Vec::new();
        for _ in 0..50 {
            let limiter = limiter.clone();
            handles.push(tokio::spawn(
                async move { limiter.try_acquire_at(ts).await },
            ));
        }

        let mut admitted = 0;
        for handle in handles {
            if handle.await.unwrap() {
                admitted += 1;
            }
        }
        assert_eq!(admitted, 25);
    }
}
