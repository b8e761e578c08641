// SPDX-FileCopyrightText: 2026 Volley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Daily quota tracking with graduated alerting.
//!
//! Counters live in the shared store under date-scoped keys with a 48 h
//! safety window so a missed reset never silently zeroes a live day. The
//! durable stats store mirrors them hourly and on reset, and re-seeds
//! them at startup, so a process restart or a counter-store flush does
//! not lose the day's progress.
//!
//! Quota reads fail OPEN: if the store cannot be read, sending stays
//! allowed and a warning is logged. Availability is deliberately favored
//! over strict enforcement here.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use tracing::{debug, warn};

use volley_core::{CounterKind, DailyCounters, KvStore, StatsStore, VolleyError};
use volley_kv::keys::quota_counter_key;

/// Share of today's sends above which the error rate becomes a warning.
const ERROR_RATE_WARNING_THRESHOLD: f64 = 0.10;

/// Coarse classification of proximity to the daily send ceiling.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum AlertLevel {
    Ok,
    Attention,
    Danger,
    Blocked,
}

/// Outcome of a pre-send quota gate check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuotaDecision {
    pub allowed: bool,
    /// Human-readable reason when denied; includes the limit value.
    pub reason: Option<String>,
}

/// Outcome of a pre-flight capacity reservation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Reservation {
    pub granted: bool,
    pub remaining: i64,
}

/// Classify a cumulative send count against the daily limit.
///
/// Ok up to 75 % of the limit, Attention to 90 %, Danger to 100 %,
/// Blocked above it. Integer cross-multiplication keeps the boundaries
/// exact.
pub fn alert_level(total_sent: i64, limit: i64) -> AlertLevel {
    if limit <= 0 || total_sent > limit {
        AlertLevel::Blocked
    } else if total_sent * 10 > limit * 9 {
        AlertLevel::Danger
    } else if total_sent * 4 > limit * 3 {
        AlertLevel::Attention
    } else {
        AlertLevel::Ok
    }
}

/// Estimate how many more primary sends fit under the limit, accounting
/// for the follow-up each primary may later generate:
/// `max(0, floor((limit - total) / (1 + interaction_rate)))`.
pub fn remaining_capacity(limit: i64, total_sent: i64, interaction_rate: f64) -> i64 {
    if total_sent >= limit {
        return 0;
    }
    let remaining = (limit - total_sent) as f64 / (1.0 + interaction_rate);
    remaining.floor().max(0.0) as i64
}

/// Follow-ups per primary send so far; 0 when nothing primary went out.
pub fn interaction_rate(counters: &DailyCounters) -> f64 {
    if counters.primary_count == 0 {
        0.0
    } else {
        counters.followup_count as f64 / counters.primary_count as f64
    }
}

/// Whether today's error share exceeds the 10 % warning threshold.
pub fn error_rate_warning(counters: &DailyCounters) -> bool {
    let total = counters.total_sent();
    if total == 0 {
        return false;
    }
    counters.error_count as f64 / total as f64 > ERROR_RATE_WARNING_THRESHOLD
}

/// Combined read-only view served to status queries.
#[derive(Debug, Clone, Serialize)]
pub struct QuotaStatus {
    pub counters: DailyCounters,
    pub daily_limit: i64,
    pub alert_level: AlertLevel,
    pub remaining_capacity: i64,
    pub interaction_rate: f64,
    pub error_rate_warning: bool,
}

/// Daily send/error counters with alert classification and durable
/// crash recovery.
pub struct DailyQuota {
    store: Arc<dyn KvStore>,
    stats: Arc<dyn StatsStore>,
    daily_limit: i64,
    counter_window: Duration,
}

impl DailyQuota {
    pub fn new(
        store: Arc<dyn KvStore>,
        stats: Arc<dyn StatsStore>,
        daily_limit: i64,
        counter_window: Duration,
    ) -> Self {
        Self {
            store,
            stats,
            daily_limit,
            counter_window,
        }
    }

    pub fn daily_limit(&self) -> i64 {
        self.daily_limit
    }

    /// Today's logical day, `%Y-%m-%d` UTC.
    pub fn today() -> String {
        Utc::now().format("%Y-%m-%d").to_string()
    }

    /// Atomically increment today's counter for `kind`, refreshing the
    /// 48 h expiry in the same step.
    ///
    /// Store failures are logged and swallowed: a sent message must never
    /// fail because counting did.
    pub async fn increment(&self, kind: CounterKind) {
        let key = quota_counter_key(&Self::today(), kind);
        match self
            .store
            .incr(&key, 1, Some(self.counter_window))
            .await
        {
            Ok(count) => {
                metrics::counter!("volley_counter_increments_total", "kind" => kind.key_fragment())
                    .increment(1);
                debug!(key = %key, count, "quota counter incremented");
            }
            Err(e) => {
                warn!(key = %key, error = %e, "quota counter increment failed");
            }
        }
    }

    /// Strict snapshot of today's counters; errors propagate.
    pub async fn snapshot_checked(&self) -> Result<DailyCounters, VolleyError> {
        let date = Self::today();
        let mut counters = DailyCounters {
            date: date.clone(),
            ..DailyCounters::default()
        };
        for kind in [CounterKind::Primary, CounterKind::Followup, CounterKind::Error] {
            let value = self
                .store
                .get(&quota_counter_key(&date, kind))
                .await?
                .map(|v| v.parse::<i64>().unwrap_or(0))
                .unwrap_or(0);
            match kind {
                CounterKind::Primary => counters.primary_count = value,
                CounterKind::Followup => counters.followup_count = value,
                CounterKind::Error => counters.error_count = value,
            }
        }
        Ok(counters)
    }

    /// Snapshot of today's counters, degrading to zeroes on store failure.
    pub async fn snapshot(&self) -> DailyCounters {
        match self.snapshot_checked().await {
            Ok(counters) => counters,
            Err(e) => {
                warn!(error = %e, "quota snapshot failed, returning zeroed counters");
                DailyCounters {
                    date: Self::today(),
                    ..DailyCounters::default()
                }
            }
        }
    }

    /// The pre-send quota gate. Denies once today's total reaches the
    /// daily limit; fails OPEN with a warning when the store is unreadable.
    pub async fn can_send(&self) -> QuotaDecision {
        match self.snapshot_checked().await {
            Ok(counters) => {
                let total = counters.total_sent();
                if total >= self.daily_limit {
                    QuotaDecision {
                        allowed: false,
                        reason: Some(format!(
                            "daily limit {} reached ({} sent today)",
                            self.daily_limit, total
                        )),
                    }
                } else {
                    QuotaDecision {
                        allowed: true,
                        reason: None,
                    }
                }
            }
            Err(e) => {
                warn!(error = %e, "quota read failed, failing open");
                QuotaDecision {
                    allowed: true,
                    reason: None,
                }
            }
        }
    }

    /// Pre-flight check that `n` more sends fit under the limit.
    ///
    /// This is a check, not a reservation: it is NOT atomic with the
    /// later increments, so two concurrent callers can both pass and
    /// jointly exceed the limit. The reference behavior has the same
    /// window and the gap is kept deliberately — the hard stop is
    /// `can_send`, re-checked before every individual send.
    pub async fn reserve(&self, n: i64) -> Reservation {
        let counters = self.snapshot().await;
        let total = counters.total_sent();
        let remaining = (self.daily_limit - total).max(0);
        Reservation {
            granted: total + n <= self.daily_limit,
            remaining,
        }
    }

    /// Full status view for read-only consumers.
    pub async fn status(&self) -> QuotaStatus {
        let counters = self.snapshot().await;
        let total = counters.total_sent();
        let rate = interaction_rate(&counters);
        QuotaStatus {
            daily_limit: self.daily_limit,
            alert_level: alert_level(total, self.daily_limit),
            remaining_capacity: remaining_capacity(self.daily_limit, total, rate),
            interaction_rate: rate,
            error_rate_warning: error_rate_warning(&counters),
            counters,
        }
    }

    /// Push today's counters to the durable stats store. Run hourly by
    /// housekeeping and before every reset.
    pub async fn sync_to_durable(&self) -> Result<(), VolleyError> {
        let counters = self.snapshot_checked().await?;
        self.stats.upsert(&counters).await?;
        debug!(date = %counters.date, total = counters.total_sent(), "quota synced to durable store");
        Ok(())
    }

    /// Re-seed live counters from the durable store at startup.
    ///
    /// Only ever raises a live counter — a durable value lower than the
    /// live one means the live counter is already ahead.
    pub async fn restore_from_durable(&self) -> Result<(), VolleyError> {
        let date = Self::today();
        let Some(persisted) = self.stats.get(&date).await? else {
            debug!(date = %date, "no durable counters for today, nothing to restore");
            return Ok(());
        };

        for (kind, persisted_value) in [
            (CounterKind::Primary, persisted.primary_count),
            (CounterKind::Followup, persisted.followup_count),
            (CounterKind::Error, persisted.error_count),
        ] {
            let key = quota_counter_key(&date, kind);
            let live = self
                .store
                .get(&key)
                .await?
                .map(|v| v.parse::<i64>().unwrap_or(0))
                .unwrap_or(0);
            if persisted_value > live {
                self.store
                    .set(&key, &persisted_value.to_string(), Some(self.counter_window))
                    .await?;
            }
        }
        debug!(date = %date, "quota counters restored from durable store");
        Ok(())
    }

    /// Persist and clear the counters for a finished logical day.
    pub async fn reset_for(&self, date: &str) -> Result<(), VolleyError> {
        let mut counters = DailyCounters {
            date: date.to_string(),
            ..DailyCounters::default()
        };
        for kind in [CounterKind::Primary, CounterKind::Followup, CounterKind::Error] {
            let value = self
                .store
                .get(&quota_counter_key(date, kind))
                .await?
                .map(|v| v.parse::<i64>().unwrap_or(0))
                .unwrap_or(0);
            match kind {
                CounterKind::Primary => counters.primary_count = value,
                CounterKind::Followup => counters.followup_count = value,
                CounterKind::Error => counters.error_count = value,
            }
        }
        self.stats.upsert(&counters).await?;
        for kind in [CounterKind::Primary, CounterKind::Followup, CounterKind::Error] {
            self.store.delete(&quota_counter_key(date, kind)).await?;
        }
        tracing::info!(date = %date, total = counters.total_sent(), "daily counters persisted and reset");
        Ok(())
    }

    /// Housekeeping entry point at the start of a logical day: persist
    /// and clear yesterday's keys. Today's keys are fresh by construction
    /// since counter keys are date-scoped.
    pub async fn reset_daily(&self) -> Result<(), VolleyError> {
        let yesterday = (Utc::now() - chrono::Duration::days(1))
            .format("%Y-%m-%d")
            .to_string();
        self.reset_for(&yesterday).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use proptest::prelude::*;
    use std::sync::Mutex;
    use volley_kv::MemoryKv;
    use volley_test_utils::DeadKv;

    /// StatsStore backed by a mutex-guarded map for tests.
    #[derive(Default)]
    struct MemStats {
        rows: Mutex<std::collections::HashMap<String, DailyCounters>>,
    }

    #[async_trait]
    impl StatsStore for MemStats {
        async fn upsert(&self, counters: &DailyCounters) -> Result<(), VolleyError> {
            self.rows
                .lock()
                .unwrap()
                .insert(counters.date.clone(), counters.clone());
            Ok(())
        }

        async fn get(&self, date: &str) -> Result<Option<DailyCounters>, VolleyError> {
            Ok(self.rows.lock().unwrap().get(date).cloned())
        }
    }

    fn quota_with(limit: i64) -> (DailyQuota, Arc<MemoryKv>, Arc<MemStats>) {
        let kv = Arc::new(MemoryKv::new());
        let stats = Arc::new(MemStats::default());
        let quota = DailyQuota::new(
            kv.clone(),
            stats.clone(),
            limit,
            Duration::from_secs(48 * 3600),
        );
        (quota, kv, stats)
    }

    async fn seed_sends(quota: &DailyQuota, primary: i64, followup: i64, errors: i64) {
        for _ in 0..primary {
            quota.increment(CounterKind::Primary).await;
        }
        for _ in 0..followup {
            quota.increment(CounterKind::Followup).await;
        }
        for _ in 0..errors {
            quota.increment(CounterKind::Error).await;
        }
    }

    #[test]
    fn alert_level_boundaries_are_exact() {
        assert_eq!(alert_level(0, 1000), AlertLevel::Ok);
        assert_eq!(alert_level(750, 1000), AlertLevel::Ok);
        assert_eq!(alert_level(751, 1000), AlertLevel::Attention);
        assert_eq!(alert_level(900, 1000), AlertLevel::Attention);
        assert_eq!(alert_level(901, 1000), AlertLevel::Danger);
        assert_eq!(alert_level(1000, 1000), AlertLevel::Danger);
        assert_eq!(alert_level(1001, 1000), AlertLevel::Blocked);
    }

    #[test]
    fn remaining_capacity_accounts_for_followups() {
        // No follow-ups yet: full headroom.
        assert_eq!(remaining_capacity(1000, 0, 0.0), 1000);
        // Every primary generates a follow-up: headroom halves.
        assert_eq!(remaining_capacity(1000, 0, 1.0), 500);
        assert_eq!(remaining_capacity(1000, 400, 0.5), 400);
        // At or past the limit: zero, never negative.
        assert_eq!(remaining_capacity(1000, 1000, 0.0), 0);
        assert_eq!(remaining_capacity(1000, 2000, 3.0), 0);
    }

    #[test]
    fn interaction_rate_handles_zero_primaries() {
        let counters = DailyCounters {
            date: "2026-03-01".into(),
            primary_count: 0,
            followup_count: 5,
            error_count: 0,
        };
        assert_eq!(interaction_rate(&counters), 0.0);

        let counters = DailyCounters {
            primary_count: 40,
            followup_count: 10,
            ..counters
        };
        assert!((interaction_rate(&counters) - 0.25).abs() < f64::EPSILON);
    }

    #[test]
    fn error_rate_warning_threshold() {
        let mut counters = DailyCounters {
            date: "2026-03-01".into(),
            primary_count: 100,
            followup_count: 0,
            error_count: 10,
        };
        // Exactly 10 % is not yet a warning.
        assert!(!error_rate_warning(&counters));
        counters.error_count = 11;
        assert!(error_rate_warning(&counters));
        // Zero total never warns.
        counters.primary_count = 0;
        counters.error_count = 5;
        assert!(!error_rate_warning(&counters));
    }

    proptest! {
        #[test]
        fn remaining_capacity_is_never_negative(
            limit in 1i64..100_000,
            total in 0i64..200_000,
            rate in 0.0f64..10.0,
        ) {
            let capacity = remaining_capacity(limit, total, rate);
            prop_assert!(capacity >= 0);
            if total >= limit {
                prop_assert_eq!(capacity, 0);
            }
        }

        #[test]
        fn alert_level_blocked_iff_over_limit(
            limit in 1i64..100_000,
            total in 0i64..200_000,
        ) {
            let level = alert_level(total, limit);
            if total > limit {
                prop_assert_eq!(level, AlertLevel::Blocked);
            } else {
                prop_assert_ne!(level, AlertLevel::Blocked);
            }
            if total * 4 <= limit * 3 {
                prop_assert_eq!(level, AlertLevel::Ok);
            }
        }
    }

    #[tokio::test]
    async fn increments_accumulate_into_snapshot() {
        let (quota, _, _) = quota_with(1000);
        seed_sends(&quota, 3, 2, 1).await;

        let counters = quota.snapshot().await;
        assert_eq!(counters.primary_count, 3);
        assert_eq!(counters.followup_count, 2);
        assert_eq!(counters.error_count, 1);
        assert_eq!(counters.total_sent(), 5);
    }

    #[tokio::test]
    async fn can_send_allows_at_999_of_1000() {
        let (quota, _, _) = quota_with(1000);
        let kv_key = quota_counter_key(&DailyQuota::today(), CounterKind::Primary);
        quota.store.set(&kv_key, "999", None).await.unwrap();

        let decision = quota.can_send().await;
        assert!(decision.allowed);
        assert!(decision.reason.is_none());
    }

    #[tokio::test]
    async fn can_send_denies_at_limit_with_reason() {
        let (quota, _, _) = quota_with(1000);
        let kv_key = quota_counter_key(&DailyQuota::today(), CounterKind::Primary);
        quota.store.set(&kv_key, "1000", None).await.unwrap();

        let decision = quota.can_send().await;
        assert!(!decision.allowed);
        let reason = decision.reason.unwrap();
        assert!(reason.contains("1000"), "reason should name the limit: {reason}");
    }

    #[tokio::test]
    async fn can_send_fails_open_when_store_is_down() {
        let quota = DailyQuota::new(
            Arc::new(DeadKv),
            Arc::new(MemStats::default()),
            1000,
            Duration::from_secs(60),
        );
        let decision = quota.can_send().await;
        assert!(decision.allowed, "quota gate must fail open on store errors");
    }

    #[tokio::test]
    async fn reserve_reports_remaining_but_does_not_hold() {
        let (quota, _, _) = quota_with(100);
        seed_sends(&quota, 90, 0, 0).await;

        let reservation = quota.reserve(5).await;
        assert!(reservation.granted);
        assert_eq!(reservation.remaining, 10);

        // A second overlapping reservation also passes: the documented gap.
        let again = quota.reserve(10).await;
        assert!(again.granted);

        let too_many = quota.reserve(11).await;
        assert!(!too_many.granted);
    }

    #[tokio::test]
    async fn sync_and_restore_round_trip() {
        let (quota, kv, stats) = quota_with(1000);
        seed_sends(&quota, 7, 2, 1).await;
        quota.sync_to_durable().await.unwrap();

        // Simulate a counter-store flush.
        kv.purge_expired();
        let date = DailyQuota::today();
        for kind in [CounterKind::Primary, CounterKind::Followup, CounterKind::Error] {
            kv.delete(&quota_counter_key(&date, kind)).await.unwrap();
        }
        assert_eq!(quota.snapshot().await.total_sent(), 0);

        let restored = DailyQuota::new(
            kv.clone(),
            stats.clone(),
            1000,
            Duration::from_secs(3600),
        );
        restored.restore_from_durable().await.unwrap();
        let counters = restored.snapshot().await;
        assert_eq!(counters.primary_count, 7);
        assert_eq!(counters.followup_count, 2);
        assert_eq!(counters.error_count, 1);
    }

    #[tokio::test]
    async fn restore_never_lowers_a_live_counter() {
        let (quota, kv, stats) = quota_with(1000);
        stats
            .upsert(&DailyCounters {
                date: DailyQuota::today(),
                primary_count: 3,
                followup_count: 0,
                error_count: 0,
            })
            .await
            .unwrap();

        // Live counter already ahead of the durable mirror.
        let key = quota_counter_key(&DailyQuota::today(), CounterKind::Primary);
        kv.set(&key, "10", None).await.unwrap();

        quota.restore_from_durable().await.unwrap();
        assert_eq!(quota.snapshot().await.primary_count, 10);
    }

    #[tokio::test]
    async fn reset_persists_then_clears() {
        let (quota, kv, stats) = quota_with(1000);
        let date = "2026-03-01";
        for (kind, value) in [
            (CounterKind::Primary, 12),
            (CounterKind::Followup, 4),
            (CounterKind::Error, 2),
        ] {
            kv.set(&quota_counter_key(date, kind), &value.to_string(), None)
                .await
                .unwrap();
        }

        quota.reset_for(date).await.unwrap();

        let persisted = stats.get(date).await.unwrap().unwrap();
        assert_eq!(persisted.primary_count, 12);
        assert_eq!(persisted.followup_count, 4);
        assert_eq!(persisted.error_count, 2);
        for kind in [CounterKind::Primary, CounterKind::Followup, CounterKind::Error] {
            assert_eq!(kv.get(&quota_counter_key(date, kind)).await.unwrap(), None);
        }
    }

    #[tokio::test]
    async fn status_combines_the_derived_metrics() {
        let (quota, _, _) = quota_with(100);
        seed_sends(&quota, 60, 20, 10).await;

        let status = quota.status().await;
        assert_eq!(status.counters.total_sent(), 80);
        assert_eq!(status.alert_level, AlertLevel::Attention);
        assert!((status.interaction_rate - (20.0 / 60.0)).abs() < 1e-9);
        assert!(status.error_rate_warning);
        // 20 remaining under the limit, shrunk by the interaction rate.
        assert_eq!(
            status.remaining_capacity,
            remaining_capacity(100, 80, 20.0 / 60.0)
        );
    }
}
