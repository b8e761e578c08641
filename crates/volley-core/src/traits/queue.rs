// SPDX-FileCopyrightText: 2026 Volley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Job queue trait — generic scheduling seam so any queue/worker runtime
//! can carry dispatch jobs.

use std::time::Duration;

use async_trait::async_trait;

use crate::error::VolleyError;
use crate::types::Job;

/// Shared work queue for dispatch jobs.
///
/// The production implementation is the crash-safe SQLite queue in
/// `volley-storage`; tests use a recording mock. Retry scheduling is
/// expressed through this trait so the dispatcher never depends on a
/// particular queue runtime's retry semantics.
#[async_trait]
pub trait JobQueue: Send + Sync + 'static {
    /// Enqueue a job for immediate execution.
    async fn enqueue(&self, job: &Job) -> Result<(), VolleyError>;

    /// Enqueue a job that becomes available after `delay`.
    async fn schedule_after(&self, delay: Duration, job: &Job) -> Result<(), VolleyError>;

    /// Re-queue a job after a backoff delay. Equivalent to
    /// `schedule_after` by default; implementations may track retry
    /// metadata separately.
    async fn retry(&self, job: &Job, delay: Duration) -> Result<(), VolleyError> {
        self.schedule_after(delay, job).await
    }
}
