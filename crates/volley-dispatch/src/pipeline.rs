// SPDX-FileCopyrightText: 2026 Volley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The per-message send pipeline.
//!
//! State machine per message:
//! `pending -> validate -> idempotency lock -> pacing delay -> send ->
//! {sent | retry-scheduled | emergency-paused | failed | skipped}`.
//!
//! The pacing delay is awaited inside the task: the worker slot stays
//! occupied for the full computed delay before the provider call, so
//! pacing is observed per message rather than amortized over a batch.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use volley_config::model::DispatchConfig;
use volley_core::{
    ContactRecord, CounterKind, Job, JobQueue, MessageProvider, MessageRecord, MessageStatus,
    MessageStore, VolleyError,
};
use volley_guard::{DailyQuota, LockManager, SendRateLimiter};
use volley_pace::{ErrorTable, PacingPlanner, RecoveryAction};

use crate::retry::backoff_delay;

/// Idempotency lock namespace for single-message sends.
const SEND_OPERATION: &str = "send";

/// Why a message was skipped without an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// The message id resolves to nothing; the job is stale.
    NotFound,
    /// Status says this message already went out (or terminally failed).
    AlreadyAttempted,
    /// Another worker holds the send lock for this message right now.
    DuplicateInFlight,
    /// The daily quota gate is closed; the message stays pending.
    QuotaExhausted,
}

/// Terminal result of one pipeline pass over a message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SendOutcome {
    Sent,
    Skipped(SkipReason),
    /// A transient failure was recorded and the retry queued.
    RetryScheduled { attempt: u32, delay: Duration },
    /// A ban-risk response triggered the emergency pause; the message was
    /// re-queued without consuming a retry slot.
    EmergencyPaused { pause: Duration },
    /// Permanently failed; the reason is stored on the message row.
    Failed { reason: String },
}

/// The retryable dispatcher for single messages.
pub struct SendPipeline {
    provider: Arc<dyn MessageProvider>,
    messages: Arc<dyn MessageStore>,
    queue: Arc<dyn JobQueue>,
    quota: Arc<DailyQuota>,
    limiter: Arc<SendRateLimiter>,
    locks: Arc<LockManager>,
    planner: Arc<PacingPlanner>,
    errors: Arc<ErrorTable>,
    config: DispatchConfig,
}

impl SendPipeline {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        provider: Arc<dyn MessageProvider>,
        messages: Arc<dyn MessageStore>,
        queue: Arc<dyn JobQueue>,
        quota: Arc<DailyQuota>,
        limiter: Arc<SendRateLimiter>,
        locks: Arc<LockManager>,
        planner: Arc<PacingPlanner>,
        errors: Arc<ErrorTable>,
        config: DispatchConfig,
    ) -> Self {
        Self {
            provider,
            messages,
            queue,
            quota,
            limiter,
            locks,
            planner,
            errors,
            config,
        }
    }

    /// Run the full pipeline for one message.
    ///
    /// Gate failures (quota, duplicate, already attempted) are skips, not
    /// errors; only infrastructure failures surface as `Err`.
    pub async fn send_message(&self, message_id: &str) -> Result<SendOutcome, VolleyError> {
        let Some(message) = self.messages.get_message(message_id).await? else {
            warn!(message_id, "send job for unknown message, skipping");
            return Ok(SendOutcome::Skipped(SkipReason::NotFound));
        };

        // Status is the sole source of truth for "already attempted": a
        // resumed campaign or duplicated job never re-sends.
        if message.status != MessageStatus::Pending {
            debug!(message_id, status = %message.status, "message not pending, skipping");
            return Ok(SendOutcome::Skipped(SkipReason::AlreadyAttempted));
        }

        let contact = self.messages.get_contact(&message.contact_id).await?;
        let contact = match validate(&message, contact.as_ref()) {
            Ok(contact) => contact,
            Err(reason) => {
                info!(message_id, %reason, "validation failed, marking failed");
                self.messages.mark_failed(message_id, &reason).await?;
                return Ok(SendOutcome::Failed { reason });
            }
        };

        let decision = self.quota.can_send().await;
        if !decision.allowed {
            info!(
                message_id,
                reason = decision.reason.as_deref().unwrap_or(""),
                "quota exhausted, message stays pending"
            );
            return Ok(SendOutcome::Skipped(SkipReason::QuotaExhausted));
        }

        // Idempotency: someone else holding the lock means this exact
        // send is in flight elsewhere -- silently step aside.
        let idempotency_ttl = Duration::from_secs(self.config.idempotency_ttl_secs);
        if !self
            .locks
            .acquire_operation(SEND_OPERATION, message_id, idempotency_ttl)
            .await
        {
            debug!(message_id, "duplicate send in flight, skipping");
            return Ok(SendOutcome::Skipped(SkipReason::DuplicateInFlight));
        }

        let outcome = self.paced_send(&message, &contact).await;

        self.locks
            .release_operation(SEND_OPERATION, message_id)
            .await;

        outcome
    }

    /// Pacing delay, rate gate, provider call, and failure handling.
    /// Runs with the idempotency lock held.
    async fn paced_send(
        &self,
        message: &MessageRecord,
        contact: &ContactRecord,
    ) -> Result<SendOutcome, VolleyError> {
        // Re-check under the lock: a concurrent worker may have finished
        // this exact send and released the lock between our first status
        // read and the acquisition above.
        let current = self.messages.get_message(&message.id).await?;
        match current {
            Some(current) if current.status == MessageStatus::Pending => {}
            _ => {
                debug!(message_id = %message.id, "message no longer pending under lock, skipping");
                return Ok(SendOutcome::Skipped(SkipReason::AlreadyAttempted));
            }
        }

        let sent_today = self.quota.snapshot().await.total_sent().max(0) as u64;
        let plan = self.planner.plan(sent_today, message.content.len());
        debug!(
            message_id = %message.id,
            sent_today,
            delay_secs = plan.total().as_secs(),
            "pacing delay computed"
        );
        metrics::histogram!("volley_pacing_delay_seconds").record(plan.total().as_secs_f64());
        tokio::time::sleep(plan.total()).await;

        while !self.limiter.try_acquire().await {
            let wait = self.limiter.wait_time();
            debug!(
                message_id = %message.id,
                wait_secs = wait.as_secs(),
                "rate ceiling reached, waiting for the next window"
            );
            tokio::time::sleep(wait).await;
        }

        match self
            .provider
            .send(&contact.destination, &message.content)
            .await
        {
            Ok(provider_id) => {
                self.messages.mark_sent(&message.id, &provider_id.0).await?;
                self.quota.increment(message.kind.into()).await;
                metrics::counter!("volley_messages_sent_total", "kind" => message.kind.to_string())
                    .increment(1);
                info!(message_id = %message.id, provider_id = %provider_id.0, "message sent");
                Ok(SendOutcome::Sent)
            }
            Err(failure) => self.handle_failure(message, failure).await,
        }
    }

    async fn handle_failure(
        &self,
        message: &MessageRecord,
        failure: volley_core::SendFailure,
    ) -> Result<SendOutcome, VolleyError> {
        self.quota.increment(CounterKind::Error).await;
        let assessment = self.errors.classify(failure.code, &failure.text);

        match assessment.action {
            RecoveryAction::EmergencyPause => {
                let pause = assessment
                    .pause
                    .unwrap_or_else(|| self.planner.emergency_pause());
                warn!(
                    message_id = %message.id,
                    code = failure.code,
                    text = %failure.text,
                    pause_secs = pause.as_secs(),
                    "ban-risk response, emergency pause"
                );
                metrics::counter!("volley_emergency_pauses_total").increment(1);
                // Re-queue the same message after the pause; retry_count
                // is deliberately untouched.
                self.queue
                    .schedule_after(
                        pause,
                        &Job::SendMessage {
                            message_id: message.id.clone(),
                        },
                    )
                    .await?;
                Ok(SendOutcome::EmergencyPaused { pause })
            }
            RecoveryAction::Fail => {
                let reason = failure.to_string();
                info!(message_id = %message.id, %reason, "fatal provider error, marking failed");
                self.messages.mark_failed(&message.id, &reason).await?;
                Ok(SendOutcome::Failed { reason })
            }
            RecoveryAction::Retry => {
                let attempt = self.messages.increment_retry(&message.id).await?;
                if attempt >= self.config.max_attempts {
                    let reason = format!(
                        "{failure} (gave up after {attempt} attempts)"
                    );
                    info!(message_id = %message.id, attempt, "retry ceiling reached, marking failed");
                    self.messages.mark_failed(&message.id, &reason).await?;
                    return Ok(SendOutcome::Failed { reason });
                }
                let delay =
                    backoff_delay(attempt, Duration::from_secs(self.config.retry_base_secs));
                debug!(
                    message_id = %message.id,
                    attempt,
                    delay_secs = delay.as_secs(),
                    "transient provider error, retry scheduled"
                );
                self.queue
                    .retry(
                        &Job::SendMessage {
                            message_id: message.id.clone(),
                        },
                        delay,
                    )
                    .await?;
                Ok(SendOutcome::RetryScheduled { attempt, delay })
            }
        }
    }
}

/// Structural validation: required fields present, non-empty content, a
/// resolvable contact with a destination. Failure is fatal — no retry.
fn validate<'a>(
    message: &MessageRecord,
    contact: Option<&'a ContactRecord>,
) -> Result<&'a ContactRecord, String> {
    if message.content.trim().is_empty() {
        return Err("message content is empty".to_string());
    }
    let Some(contact) = contact else {
        return Err(format!("contact `{}` not found", message.contact_id));
    };
    if contact.destination.trim().is_empty() {
        return Err(format!("contact `{}` has no destination", contact.id));
    }
    Ok(contact)
}
