// SPDX-FileCopyrightText: 2026 Volley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Persistence traits — the narrow slice of the CRUD store the dispatch
//! core consumes: read-by-id, status updates, pending listings, and the
//! durable daily stats used for counter crash recovery.

use async_trait::async_trait;

use crate::error::VolleyError;
use crate::types::{
    CampaignRecord, CampaignStatus, ContactRecord, DailyCounters, MessageRecord, MessageStatus,
};

/// Message rows as the dispatcher needs them.
#[async_trait]
pub trait MessageStore: Send + Sync + 'static {
    async fn get_message(&self, id: &str) -> Result<Option<MessageRecord>, VolleyError>;

    async fn get_contact(&self, id: &str) -> Result<Option<ContactRecord>, VolleyError>;

    async fn insert_message(&self, message: &MessageRecord) -> Result<(), VolleyError>;

    /// Pending messages for a campaign in fixed id order — the iteration
    /// order a dispatch run snapshots once at batch start.
    async fn list_pending(&self, campaign_id: &str) -> Result<Vec<MessageRecord>, VolleyError>;

    /// Permanently failed messages for a campaign, for the retry-failed job.
    async fn list_failed(&self, campaign_id: &str) -> Result<Vec<MessageRecord>, VolleyError>;

    /// Mark a message sent, recording the provider id and timestamp.
    async fn mark_sent(&self, id: &str, provider_message_id: &str) -> Result<(), VolleyError>;

    /// Mark a message permanently failed with the captured reason.
    async fn mark_failed(&self, id: &str, reason: &str) -> Result<(), VolleyError>;

    /// Advance a message along the status DAG. Rejects backward moves.
    async fn update_status(&self, id: &str, status: MessageStatus) -> Result<(), VolleyError>;

    /// Increment the retry counter, returning the new count.
    async fn increment_retry(&self, id: &str) -> Result<u32, VolleyError>;

    /// Operator-initiated reset of a failed message back to pending,
    /// clearing retry_count and the stored error. The one sanctioned
    /// exception to the forward-only DAG.
    async fn reset_for_retry(&self, id: &str) -> Result<(), VolleyError>;

    /// Primary messages in running campaigns whose contact interacted
    /// (read receipt) inside the follow-up window and which have no
    /// follow-up row yet.
    async fn list_followup_candidates(&self) -> Result<Vec<MessageRecord>, VolleyError>;

    /// Primary messages whose follow-up window elapsed without any
    /// interaction; to be marked `no_interaction`.
    async fn list_interaction_expired(&self) -> Result<Vec<MessageRecord>, VolleyError>;
}

/// Campaign rows as the dispatcher needs them.
#[async_trait]
pub trait CampaignStore: Send + Sync + 'static {
    async fn get_campaign(&self, id: &str) -> Result<Option<CampaignRecord>, VolleyError>;

    async fn update_campaign_status(
        &self,
        id: &str,
        status: CampaignStatus,
    ) -> Result<(), VolleyError>;

    /// Campaigns currently in the given status, for interrupted-run recovery.
    async fn list_campaigns_by_status(
        &self,
        status: CampaignStatus,
    ) -> Result<Vec<CampaignRecord>, VolleyError>;

    /// Whether a campaign has any pending messages left.
    async fn has_pending_messages(&self, id: &str) -> Result<bool, VolleyError>;
}

/// Durable daily stats — the crash-recovery mirror of the live counters.
#[async_trait]
pub trait StatsStore: Send + Sync + 'static {
    /// Insert or replace the counters for a date.
    async fn upsert(&self, counters: &DailyCounters) -> Result<(), VolleyError>;

    /// Read the counters persisted for a date, if any.
    async fn get(&self, date: &str) -> Result<Option<DailyCounters>, VolleyError>;
}
