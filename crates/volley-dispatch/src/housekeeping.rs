// SPDX-FileCopyrightText: 2026 Volley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Periodic housekeeping: daily counter reset, hourly stats sync,
//! expired-key sweep, interrupted-campaign recovery, and follow-up
//! window evaluation.
//!
//! The scheduler loop only evaluates cron expressions and enqueues jobs;
//! the work itself runs on the shared queue like every other dispatch
//! task and survives worker restarts the same way.

use std::str::FromStr;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use croner::Cron;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use volley_config::model::HousekeepingConfig;
use volley_core::{
    CampaignStatus, ContactRecord, Job, JobQueue, MessageKind, MessageRecord, MessageStatus,
    VolleyError,
};
use volley_core::{CampaignStore, MessageStore};
use volley_guard::LockManager;
use volley_kv::MemoryKv;

/// One cron-scheduled job slot.
struct Schedule {
    cron: Cron,
    job: Job,
}

/// The housekeeping scheduler loop.
pub struct Housekeeper {
    schedules: Vec<Schedule>,
    tick: std::time::Duration,
    queue: Arc<dyn JobQueue>,
    store: Arc<MemoryKv>,
    sweep: Cron,
}

impl Housekeeper {
    pub fn new(
        config: &HousekeepingConfig,
        queue: Arc<dyn JobQueue>,
        store: Arc<MemoryKv>,
    ) -> Result<Self, VolleyError> {
        let parse = |expr: &str| -> Result<Cron, VolleyError> {
            Cron::from_str(expr)
                .map_err(|e| VolleyError::Config(format!("invalid cron `{expr}`: {e}")))
        };

        Ok(Self {
            schedules: vec![
                Schedule {
                    cron: parse(&config.daily_reset_cron)?,
                    job: Job::ResetDailyCounters,
                },
                Schedule {
                    cron: parse(&config.stats_sync_cron)?,
                    job: Job::SyncQuotaStats,
                },
                Schedule {
                    cron: parse(&config.recovery_cron)?,
                    job: Job::RecoverInterruptedCampaigns,
                },
                Schedule {
                    cron: parse(&config.followup_cron)?,
                    job: Job::CheckExpiredInteractions,
                },
            ],
            tick: std::time::Duration::from_secs(config.tick_secs),
            queue,
            store,
            sweep: parse(&config.sweep_cron)?,
        })
    }

    /// Run until cancelled, enqueueing each job whenever its cron
    /// schedule fires between two ticks.
    pub async fn run(&self, cancel: CancellationToken) {
        info!(tick_secs = self.tick.as_secs(), "housekeeping scheduler started");
        let mut last_check = Utc::now();
        let mut interval = tokio::time::interval(self.tick);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    info!("housekeeping scheduler stopping");
                    return;
                }
                _ = interval.tick() => {}
            }

            let now = Utc::now();
            for schedule in &self.schedules {
                if due(&schedule.cron, last_check, now) {
                    debug!(job = ?schedule.job, "housekeeping job due");
                    if let Err(e) = self.queue.enqueue(&schedule.job).await {
                        warn!(job = ?schedule.job, error = %e, "failed to enqueue housekeeping job");
                    }
                }
            }
            if due(&self.sweep, last_check, now) {
                // The sweep is in-process state, not queue work.
                let purged = self.store.purge_expired();
                debug!(purged, "expired store entries swept");
            }
            last_check = now;
        }
    }
}

/// Whether a cron schedule has an occurrence in `(last, now]`.
fn due(cron: &Cron, last: DateTime<Utc>, now: DateTime<Utc>) -> bool {
    match cron.find_next_occurrence(&last, false) {
        Ok(next) => next <= now,
        Err(e) => {
            warn!(error = %e, "cron evaluation failed");
            false
        }
    }
}

/// Recover campaigns left `running` by a crashed or interrupted worker.
///
/// A running campaign with no live lock has no active runner: if pending
/// messages remain the campaign is re-queued for dispatch, otherwise it
/// is marked completed.
pub async fn recover_interrupted_campaigns(
    campaigns: &Arc<dyn CampaignStore>,
    locks: &LockManager,
    queue: &Arc<dyn JobQueue>,
) -> Result<usize, VolleyError> {
    let running = campaigns
        .list_campaigns_by_status(CampaignStatus::Running)
        .await?;
    let mut recovered = 0;

    for campaign in running {
        if locks.campaign_lock_info(&campaign.id).await.is_some() {
            continue; // an active runner owns it
        }
        if campaigns.has_pending_messages(&campaign.id).await? {
            info!(campaign_id = %campaign.id, "re-queueing interrupted campaign");
            queue
                .enqueue(&Job::SendCampaign {
                    campaign_id: campaign.id.clone(),
                })
                .await?;
            recovered += 1;
        } else {
            info!(campaign_id = %campaign.id, "campaign drained, marking completed");
            campaigns
                .update_campaign_status(&campaign.id, CampaignStatus::Completed)
                .await?;
        }
    }

    Ok(recovered)
}

/// Outcome counts for one follow-up evaluation pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FollowupReport {
    pub followups_created: usize,
    pub expired: usize,
}

/// Evaluate the follow-up windows.
///
/// Primaries whose window elapsed with no interaction are marked
/// `no_interaction`; primaries read inside the window get a follow-up
/// message created from the campaign template and queued for dispatch.
pub async fn check_expired_interactions(
    messages: &Arc<dyn MessageStore>,
    campaigns: &Arc<dyn CampaignStore>,
    queue: &Arc<dyn JobQueue>,
) -> Result<FollowupReport, VolleyError> {
    let mut report = FollowupReport::default();

    for stale in messages.list_interaction_expired().await? {
        messages
            .update_status(&stale.id, MessageStatus::NoInteraction)
            .await?;
        report.expired += 1;
    }

    for primary in messages.list_followup_candidates().await? {
        let Some(campaign) = campaigns.get_campaign(&primary.campaign_id).await? else {
            continue;
        };
        let Some(template) = campaign.followup_template.as_deref() else {
            continue;
        };
        let contact = messages.get_contact(&primary.contact_id).await?;

        let followup = MessageRecord {
            id: uuid::Uuid::new_v4().to_string(),
            campaign_id: primary.campaign_id.clone(),
            contact_id: primary.contact_id.clone(),
            kind: MessageKind::Followup,
            content: render_template(template, contact.as_ref()),
            status: MessageStatus::Pending,
            retry_count: 0,
            error: None,
            provider_message_id: None,
            created_at: Utc::now().format("%Y-%m-%dT%H:%M:%S%.3fZ").to_string(),
            sent_at: None,
            delivered_at: None,
            read_at: None,
        };
        messages.insert_message(&followup).await?;
        queue
            .enqueue(&Job::SendMessage {
                message_id: followup.id.clone(),
            })
            .await?;
        info!(
            primary_id = %primary.id,
            followup_id = %followup.id,
            "follow-up created and queued"
        );
        report.followups_created += 1;
    }

    Ok(report)
}

/// Fill the `{name}` placeholder from the contact, falling back to the
/// destination when no display name is known.
fn render_template(template: &str, contact: Option<&ContactRecord>) -> String {
    let name = contact
        .and_then(|c| c.display_name.as_deref())
        .or(contact.map(|c| c.destination.as_str()))
        .unwrap_or("");
    template.replace("{name}", name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn due_detects_a_crossing() {
        let cron = Cron::from_str("0 * * * *").unwrap();
        let last = Utc.with_ymd_and_hms(2026, 3, 1, 9, 59, 0).unwrap();
        let crossed = Utc.with_ymd_and_hms(2026, 3, 1, 10, 0, 30).unwrap();
        let not_yet = Utc.with_ymd_and_hms(2026, 3, 1, 9, 59, 45).unwrap();

        assert!(due(&cron, last, crossed));
        assert!(!due(&cron, last, not_yet));
    }

    #[test]
    fn due_daily_reset_fires_once_at_midnight() {
        let cron = Cron::from_str("0 0 * * *").unwrap();
        let last = Utc.with_ymd_and_hms(2026, 3, 1, 23, 59, 30).unwrap();
        let after_midnight = Utc.with_ymd_and_hms(2026, 3, 2, 0, 0, 15).unwrap();
        assert!(due(&cron, last, after_midnight));

        // The next tick window no longer matches.
        assert!(!due(&cron, after_midnight, after_midnight + chrono::Duration::seconds(30)));
    }

    #[test]
    fn template_rendering_prefers_display_name() {
        let contact = ContactRecord {
            id: "ct-1".into(),
            destination: "+15550001111".into(),
            display_name: Some("Ada".into()),
        };
        assert_eq!(
            render_template("Hi {name}, still interested?", Some(&contact)),
            "Hi Ada, still interested?"
        );

        let anonymous = ContactRecord {
            display_name: None,
            ..contact
        };
        assert_eq!(
            render_template("Hi {name}!", Some(&anonymous)),
            "Hi +15550001111!"
        );
        assert_eq!(render_template("Hi {name}!", None), "Hi !");
    }
}
