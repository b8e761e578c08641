// SPDX-FileCopyrightText: 2026 Volley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Job execution: the bridge between queue payloads and the dispatch
//! services.

use std::sync::Arc;

use tracing::info;

use volley_core::{CampaignStore, Job, JobQueue, MessageStore, VolleyError};
use volley_guard::{DailyQuota, LockManager};

use crate::campaign::CampaignRunner;
use crate::housekeeping;
use crate::pipeline::SendPipeline;

/// Executes dequeued jobs against the dispatch services.
///
/// One `JobRunner` per worker loop; its `runner_id` is the lock-holder
/// identity for campaign runs claimed by this worker.
pub struct JobRunner {
    runner_id: String,
    pipeline: Arc<SendPipeline>,
    campaign_runner: Arc<CampaignRunner>,
    quota: Arc<DailyQuota>,
    locks: Arc<LockManager>,
    messages: Arc<dyn MessageStore>,
    campaigns: Arc<dyn CampaignStore>,
    queue: Arc<dyn JobQueue>,
}

impl JobRunner {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        runner_id: String,
        pipeline: Arc<SendPipeline>,
        campaign_runner: Arc<CampaignRunner>,
        quota: Arc<DailyQuota>,
        locks: Arc<LockManager>,
        messages: Arc<dyn MessageStore>,
        campaigns: Arc<dyn CampaignStore>,
        queue: Arc<dyn JobQueue>,
    ) -> Self {
        Self {
            runner_id,
            pipeline,
            campaign_runner,
            quota,
            locks,
            messages,
            campaigns,
            queue,
        }
    }

    pub fn runner_id(&self) -> &str {
        &self.runner_id
    }

    /// Execute one job to completion.
    pub async fn run(&self, job: &Job) -> Result<(), VolleyError> {
        match job {
            Job::SendMessage { message_id } => {
                let outcome = self.pipeline.send_message(message_id).await?;
                info!(message_id = %message_id, outcome = ?outcome, "send job finished");
                Ok(())
            }
            Job::SendCampaign { campaign_id } => {
                self.campaign_runner
                    .run(campaign_id, &self.runner_id)
                    .await?;
                Ok(())
            }
            Job::RetryCampaignFailed { campaign_id } => {
                self.campaign_runner
                    .retry_failed(campaign_id, &self.runner_id)
                    .await?;
                Ok(())
            }
            Job::ResetDailyCounters => self.quota.reset_daily().await,
            Job::SyncQuotaStats => self.quota.sync_to_durable().await,
            Job::RecoverInterruptedCampaigns => {
                let recovered = housekeeping::recover_interrupted_campaigns(
                    &self.campaigns,
                    &self.locks,
                    &self.queue,
                )
                .await?;
                info!(recovered, "interrupted-campaign recovery finished");
                Ok(())
            }
            Job::CheckExpiredInteractions => {
                let report = housekeeping::check_expired_interactions(
                    &self.messages,
                    &self.campaigns,
                    &self.queue,
                )
                .await?;
                info!(
                    followups = report.followups_created,
                    expired = report.expired,
                    "follow-up window evaluation finished"
                );
                Ok(())
            }
        }
    }
}
