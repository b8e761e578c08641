// SPDX-FileCopyrightText: 2026 Volley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Campaign-level dispatch.
//!
//! A run takes the campaign lock, snapshots the pending list once in
//! fixed id order, and sends strictly sequentially so pacing delays
//! compose predictably. Before every send it re-checks that the campaign
//! is still sendable, the quota gate is open, and the lock is still
//! held. Any failing check aborts the remainder without erroring the
//! batch: untouched messages stay pending for an explicit operator
//! action or a later resume.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tracing::{info, warn};

use volley_core::{CampaignStore, MessageStore, VolleyError};
use volley_guard::{DailyQuota, LockManager};

use crate::pipeline::{SendOutcome, SendPipeline};

/// Aggregate outcome of one campaign dispatch invocation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CampaignReport {
    pub sent: usize,
    pub failed: usize,
    pub skipped: usize,
    /// Retry-scheduled and emergency-paused messages: not final, will be
    /// attempted again by their queued jobs.
    pub deferred: usize,
    /// Why the batch stopped early, if it did.
    pub aborted: Option<String>,
}

impl CampaignReport {
    fn aborted(reason: impl Into<String>) -> Self {
        Self {
            aborted: Some(reason.into()),
            ..Self::default()
        }
    }
}

/// Sequential campaign dispatcher.
pub struct CampaignRunner {
    campaigns: Arc<dyn CampaignStore>,
    messages: Arc<dyn MessageStore>,
    locks: Arc<LockManager>,
    quota: Arc<DailyQuota>,
    pipeline: Arc<SendPipeline>,
    lock_ttl: Duration,
}

impl CampaignRunner {
    pub fn new(
        campaigns: Arc<dyn CampaignStore>,
        messages: Arc<dyn MessageStore>,
        locks: Arc<LockManager>,
        quota: Arc<DailyQuota>,
        pipeline: Arc<SendPipeline>,
        lock_ttl: Duration,
    ) -> Self {
        Self {
            campaigns,
            messages,
            locks,
            quota,
            pipeline,
            lock_ttl,
        }
    }

    /// Dispatch a campaign's pending messages as `runner_id`.
    pub async fn run(
        &self,
        campaign_id: &str,
        runner_id: &str,
    ) -> Result<CampaignReport, VolleyError> {
        let Some(campaign) = self.campaigns.get_campaign(campaign_id).await? else {
            warn!(campaign_id, "dispatch job for unknown campaign");
            return Ok(CampaignReport::aborted("campaign not found"));
        };
        if !campaign.status.is_sendable() {
            info!(campaign_id, status = %campaign.status, "campaign not sendable");
            return Ok(CampaignReport::aborted(format!(
                "campaign is {}",
                campaign.status
            )));
        }

        // Lock contention means another runner is already on it: skip,
        // never error.
        if !self
            .locks
            .acquire_campaign(campaign_id, runner_id, self.lock_ttl)
            .await
        {
            info!(campaign_id, runner_id, "campaign locked by another runner, skipping");
            return Ok(CampaignReport::aborted("campaign locked by another runner"));
        }

        let report = self.run_locked(campaign_id, runner_id).await;

        self.locks.release_campaign(campaign_id, runner_id).await;

        let report = report?;
        info!(
            campaign_id,
            sent = report.sent,
            failed = report.failed,
            skipped = report.skipped,
            deferred = report.deferred,
            aborted = report.aborted.as_deref().unwrap_or(""),
            "campaign dispatch finished"
        );
        Ok(report)
    }

    /// Reset a campaign's permanently failed messages and dispatch them
    /// again. The one sanctioned path back from `failed`.
    pub async fn retry_failed(
        &self,
        campaign_id: &str,
        runner_id: &str,
    ) -> Result<CampaignReport, VolleyError> {
        let failed = self.messages.list_failed(campaign_id).await?;
        if failed.is_empty() {
            info!(campaign_id, "no failed messages to retry");
            return Ok(CampaignReport::default());
        }
        for message in &failed {
            self.messages.reset_for_retry(&message.id).await?;
        }
        info!(campaign_id, count = failed.len(), "failed messages reset for retry");
        self.run(campaign_id, runner_id).await
    }

    /// The sequential batch loop, run with the campaign lock held.
    async fn run_locked(
        &self,
        campaign_id: &str,
        runner_id: &str,
    ) -> Result<CampaignReport, VolleyError> {
        // One snapshot, fixed id order; rows that change state after this
        // point are skipped by the pipeline's own status check.
        let batch = self.messages.list_pending(campaign_id).await?;
        let mut report = CampaignReport::default();

        for message in &batch {
            if let Some(reason) = self.abort_reason(campaign_id, runner_id).await? {
                info!(campaign_id, %reason, "aborting remaining batch");
                report.aborted = Some(reason);
                break;
            }

            match self.pipeline.send_message(&message.id).await? {
                SendOutcome::Sent => report.sent += 1,
                SendOutcome::Failed { .. } => report.failed += 1,
                SendOutcome::Skipped(_) => report.skipped += 1,
                SendOutcome::RetryScheduled { .. } => report.deferred += 1,
                SendOutcome::EmergencyPaused { pause } => {
                    report.deferred += 1;
                    // A ban-risk response stops the batch; the recovery
                    // job resumes the campaign after the pause.
                    report.aborted = Some(format!(
                        "emergency pause ({}s) after ban-risk response",
                        pause.as_secs()
                    ));
                    break;
                }
            }
        }

        Ok(report)
    }

    /// The per-iteration live checks. `Some(reason)` aborts the batch.
    async fn abort_reason(
        &self,
        campaign_id: &str,
        runner_id: &str,
    ) -> Result<Option<String>, VolleyError> {
        let campaign = self.campaigns.get_campaign(campaign_id).await?;
        match campaign {
            None => return Ok(Some("campaign deleted mid-run".to_string())),
            Some(campaign) if !campaign.status.is_sendable() => {
                return Ok(Some(format!("campaign is {}", campaign.status)));
            }
            Some(_) => {}
        }

        let decision = self.quota.can_send().await;
        if !decision.allowed {
            return Ok(Some(
                decision
                    .reason
                    .unwrap_or_else(|| "daily quota exhausted".to_string()),
            ));
        }

        match self.locks.campaign_lock_info(campaign_id).await {
            Some(info) if info.holder == runner_id => Ok(None),
            Some(info) => Ok(Some(format!(
                "campaign lock taken over by {}",
                info.holder
            ))),
            None => Ok(Some("campaign lock expired".to_string())),
        }
    }
}
