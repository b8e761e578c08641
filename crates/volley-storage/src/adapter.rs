// SPDX-FileCopyrightText: 2026 Volley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SQLite implementations of the persistence and queue trait seams.
//!
//! `SqliteStore` delegates all query operations to the typed query
//! modules; `SqliteJobQueue` layers the `JobQueue` seam and the worker
//! claim/ack/fail cycle over the shared queue table.

use async_trait::async_trait;
use tracing::warn;

use volley_core::{
    CampaignRecord, CampaignStatus, ContactRecord, DailyCounters, Job, JobQueue, MessageRecord,
    MessageStatus, StatsStore, VolleyError,
};
use volley_core::{CampaignStore, MessageStore};

use crate::database::Database;
use crate::queries;

/// Name of the shared dispatch queue.
pub const DISPATCH_QUEUE: &str = "dispatch";

/// SQLite-backed store for messages, campaigns, contacts, and stats.
#[derive(Clone)]
pub struct SqliteStore {
    db: Database,
}

impl SqliteStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    /// Insert a contact row. The CRUD surface proper lives outside the
    /// dispatch core; this exists for seeding and operational tooling.
    pub async fn insert_contact(&self, contact: &ContactRecord) -> Result<(), VolleyError> {
        let c = contact.clone();
        self.db
            .connection()
            .call(move |conn| {
                conn.execute(
                    "INSERT INTO contacts (id, destination, display_name) VALUES (?1, ?2, ?3)",
                    rusqlite::params![c.id, c.destination, c.display_name],
                )?;
                Ok(())
            })
            .await
            .map_err(crate::database::map_tr_err)
    }

    /// Insert a campaign row. See [`SqliteStore::insert_contact`].
    pub async fn insert_campaign(&self, campaign: &CampaignRecord) -> Result<(), VolleyError> {
        queries::campaigns::insert_campaign(&self.db, campaign).await
    }
}

#[async_trait]
impl MessageStore for SqliteStore {
    async fn get_message(&self, id: &str) -> Result<Option<MessageRecord>, VolleyError> {
        queries::messages::get_message(&self.db, id).await
    }

    async fn get_contact(&self, id: &str) -> Result<Option<ContactRecord>, VolleyError> {
        queries::messages::get_contact(&self.db, id).await
    }

    async fn insert_message(&self, message: &MessageRecord) -> Result<(), VolleyError> {
        queries::messages::insert_message(&self.db, message).await
    }

    async fn list_pending(&self, campaign_id: &str) -> Result<Vec<MessageRecord>, VolleyError> {
        queries::messages::list_pending(&self.db, campaign_id).await
    }

    async fn list_failed(&self, campaign_id: &str) -> Result<Vec<MessageRecord>, VolleyError> {
        queries::messages::list_failed(&self.db, campaign_id).await
    }

    async fn mark_sent(&self, id: &str, provider_message_id: &str) -> Result<(), VolleyError> {
        queries::messages::mark_sent(&self.db, id, provider_message_id).await
    }

    async fn mark_failed(&self, id: &str, reason: &str) -> Result<(), VolleyError> {
        queries::messages::mark_failed(&self.db, id, reason).await
    }

    async fn update_status(&self, id: &str, status: MessageStatus) -> Result<(), VolleyError> {
        queries::messages::update_status(&self.db, id, status).await
    }

    async fn increment_retry(&self, id: &str) -> Result<u32, VolleyError> {
        queries::messages::increment_retry(&self.db, id).await
    }

    async fn reset_for_retry(&self, id: &str) -> Result<(), VolleyError> {
        queries::messages::reset_for_retry(&self.db, id).await
    }

    async fn list_followup_candidates(&self) -> Result<Vec<MessageRecord>, VolleyError> {
        queries::messages::list_followup_candidates(&self.db).await
    }

    async fn list_interaction_expired(&self) -> Result<Vec<MessageRecord>, VolleyError> {
        queries::messages::list_interaction_expired(&self.db).await
    }
}

#[async_trait]
impl CampaignStore for SqliteStore {
    async fn get_campaign(&self, id: &str) -> Result<Option<CampaignRecord>, VolleyError> {
        queries::campaigns::get_campaign(&self.db, id).await
    }

    async fn update_campaign_status(
        &self,
        id: &str,
        status: CampaignStatus,
    ) -> Result<(), VolleyError> {
        queries::campaigns::update_campaign_status(&self.db, id, status).await
    }

    async fn list_campaigns_by_status(
        &self,
        status: CampaignStatus,
    ) -> Result<Vec<CampaignRecord>, VolleyError> {
        queries::campaigns::list_campaigns_by_status(&self.db, status).await
    }

    async fn has_pending_messages(&self, id: &str) -> Result<bool, VolleyError> {
        queries::campaigns::has_pending_messages(&self.db, id).await
    }
}

#[async_trait]
impl StatsStore for SqliteStore {
    async fn upsert(&self, counters: &DailyCounters) -> Result<(), VolleyError> {
        queries::stats::upsert(&self.db, counters).await
    }

    async fn get(&self, date: &str) -> Result<Option<DailyCounters>, VolleyError> {
        queries::stats::get(&self.db, date).await
    }
}

/// A job claimed by a worker, with the queue row to ack or fail.
#[derive(Debug, Clone)]
pub struct ClaimedJob {
    pub queue_id: i64,
    pub job: Job,
}

/// Crash-safe job queue over the shared SQLite queue table.
#[derive(Clone)]
pub struct SqliteJobQueue {
    db: Database,
}

impl SqliteJobQueue {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Claim the next available job, skipping (and failing) rows whose
    /// payload no longer parses.
    pub async fn dequeue_job(&self) -> Result<Option<ClaimedJob>, VolleyError> {
        loop {
            let Some(entry) = queries::queue::dequeue(&self.db, DISPATCH_QUEUE).await? else {
                return Ok(None);
            };
            match serde_json::from_str::<Job>(&entry.payload) {
                Ok(job) => {
                    return Ok(Some(ClaimedJob {
                        queue_id: entry.id,
                        job,
                    }));
                }
                Err(e) => {
                    warn!(queue_id = entry.id, error = %e, "unparsable job payload, failing entry");
                    queries::queue::fail(&self.db, entry.id).await?;
                }
            }
        }
    }

    /// Acknowledge a completed job.
    pub async fn ack_job(&self, queue_id: i64) -> Result<(), VolleyError> {
        queries::queue::ack(&self.db, queue_id).await
    }

    /// Record a failed job run; the queue retries it up to its attempt
    /// ceiling.
    pub async fn fail_job(&self, queue_id: i64) -> Result<(), VolleyError> {
        queries::queue::fail(&self.db, queue_id).await
    }

    async fn push(&self, job: &Job, delay_secs: u64) -> Result<(), VolleyError> {
        let payload = serde_json::to_string(job)
            .map_err(|e| VolleyError::Internal(format!("job serialization: {e}")))?;
        queries::queue::enqueue(&self.db, DISPATCH_QUEUE, &payload, delay_secs).await?;
        Ok(())
    }
}

#[async_trait]
impl JobQueue for SqliteJobQueue {
    async fn enqueue(&self, job: &Job) -> Result<(), VolleyError> {
        self.push(job, 0).await
    }

    async fn schedule_after(
        &self,
        delay: std::time::Duration,
        job: &Job,
    ) -> Result<(), VolleyError> {
        self.push(job, delay.as_secs()).await
    }
}
