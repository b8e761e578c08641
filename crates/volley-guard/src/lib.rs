// SPDX-FileCopyrightText: 2026 Volley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Dispatch safety guards for the Volley engine: the daily quota and
//! alert engine, the distributed lock manager, and the fixed-window send
//! rate limiter. All three live on the shared counter store and are the
//! gates every send passes through.

pub mod limiter;
pub mod locks;
pub mod quota;

pub use limiter::SendRateLimiter;
pub use locks::LockManager;
pub use quota::{
    alert_level, error_rate_warning, interaction_rate, remaining_capacity, AlertLevel,
    DailyQuota, QuotaDecision, QuotaStatus, Reservation,
};
