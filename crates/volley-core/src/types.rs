// SPDX-FileCopyrightText: 2026 Volley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Common types used across the Volley workspace.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Provider-assigned identifier for a successfully accepted message.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ProviderMessageId(pub String);

/// A failed provider send, carrying the provider's error code and text.
///
/// Not a `VolleyError`: the dispatcher needs the raw code and text to run
/// the ban-risk classifier before deciding how the failure is handled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SendFailure {
    pub code: i64,
    pub text: String,
}

impl std::fmt::Display for SendFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "provider error {}: {}", self.code, self.text)
    }
}

impl std::error::Error for SendFailure {}

/// The kind of a campaign message.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum MessageKind {
    /// First template message sent to a contact in a campaign.
    Primary,
    /// Automated second message triggered by a contact interaction.
    Followup,
}

/// Lifecycle status of a message.
///
/// Transitions are monotonic forward along a DAG; see [`MessageStatus::may_advance_to`].
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum MessageStatus {
    Pending,
    Sent,
    Delivered,
    Read,
    Failed,
    NoInteraction,
}

impl MessageStatus {
    /// Whether a transition from `self` to `next` moves forward along the
    /// status DAG. `failed`, `read` and `no_interaction` are terminal.
    pub fn may_advance_to(self, next: MessageStatus) -> bool {
        use MessageStatus::*;
        matches!(
            (self, next),
            (Pending, Sent)
                | (Pending, Failed)
                | (Sent, Delivered)
                | (Sent, Read)
                | (Sent, NoInteraction)
                | (Delivered, Read)
                | (Delivered, NoInteraction)
        )
    }

    /// Whether this message has already gone out to the provider.
    ///
    /// Status is the sole source of truth for "already attempted": a
    /// resumed campaign must never re-send anything in one of these states.
    pub fn is_attempted(self) -> bool {
        use MessageStatus::*;
        matches!(self, Sent | Delivered | Read | NoInteraction)
    }
}

/// Lifecycle status of a campaign. Only `running` is sendable.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum CampaignStatus {
    Draft,
    Running,
    Paused,
    Stopped,
    Completed,
    Failed,
}

impl CampaignStatus {
    pub fn is_sendable(self) -> bool {
        matches!(self, CampaignStatus::Running)
    }
}

/// The daily counter a send or failure increments.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CounterKind {
    Primary,
    Followup,
    Error,
}

impl CounterKind {
    /// Fragment used in the counter's store key.
    pub fn key_fragment(self) -> &'static str {
        match self {
            CounterKind::Primary => "primary",
            CounterKind::Followup => "followup",
            CounterKind::Error => "error",
        }
    }
}

impl From<MessageKind> for CounterKind {
    fn from(kind: MessageKind) -> Self {
        match kind {
            MessageKind::Primary => CounterKind::Primary,
            MessageKind::Followup => CounterKind::Followup,
        }
    }
}

/// Immutable snapshot of one logical day's send counters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailyCounters {
    /// Logical day, `%Y-%m-%d` UTC.
    pub date: String,
    pub primary_count: i64,
    pub followup_count: i64,
    pub error_count: i64,
}

impl DailyCounters {
    /// Total messages sent today. Errors do not count as sends.
    pub fn total_sent(&self) -> i64 {
        self.primary_count + self.followup_count
    }
}

/// A message row as the dispatcher sees it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageRecord {
    pub id: String,
    pub campaign_id: String,
    pub contact_id: String,
    pub kind: MessageKind,
    pub content: String,
    pub status: MessageStatus,
    pub retry_count: u32,
    /// Last failure reason, retained for later inspection.
    pub error: Option<String>,
    pub provider_message_id: Option<String>,
    pub created_at: String,
    pub sent_at: Option<String>,
    pub delivered_at: Option<String>,
    pub read_at: Option<String>,
}

/// A campaign row. Templates are materialized into message content when
/// rows are created; the follow-up template is rendered at trigger time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CampaignRecord {
    pub id: String,
    pub name: String,
    pub status: CampaignStatus,
    pub primary_template: String,
    pub followup_template: Option<String>,
    /// Hours a contact has to interact with the primary message before
    /// it is marked `no_interaction`.
    pub followup_window_hours: i64,
    pub created_at: String,
    pub updated_at: String,
}

/// A contact as resolved during validation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContactRecord {
    pub id: String,
    /// Provider destination address (phone number in E.164 form).
    pub destination: String,
    pub display_name: Option<String>,
}

/// Result of an atomic bounded increment against a ceiling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BoundedIncr {
    /// Whether the increment was admitted (count stayed within the ceiling).
    pub admitted: bool,
    /// The counter value after the operation. Unchanged when rejected.
    pub count: i64,
}

/// Information about a held lock.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LockInfo {
    pub holder: String,
    pub acquired_at: String,
    pub remaining_ttl: Duration,
}

/// A unit of work on the shared dispatch queue.
///
/// Serialized as JSON into the queue payload so any worker runtime can
/// execute it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "job", rename_all = "snake_case")]
pub enum Job {
    SendMessage { message_id: String },
    SendCampaign { campaign_id: String },
    RetryCampaignFailed { campaign_id: String },
    ResetDailyCounters,
    CheckExpiredInteractions,
    RecoverInterruptedCampaigns,
    SyncQuotaStats,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_dag_moves_forward_only() {
        use MessageStatus::*;
        assert!(Pending.may_advance_to(Sent));
        assert!(Pending.may_advance_to(Failed));
        assert!(Sent.may_advance_to(Delivered));
        assert!(Delivered.may_advance_to(Read));
        assert!(Sent.may_advance_to(NoInteraction));

        // No backward or lateral edges.
        assert!(!Sent.may_advance_to(Pending));
        assert!(!Delivered.may_advance_to(Sent));
        assert!(!Failed.may_advance_to(Pending));
        assert!(!Read.may_advance_to(NoInteraction));
        assert!(!NoInteraction.may_advance_to(Read));
    }

    #[test]
    fn attempted_states() {
        use MessageStatus::*;
        assert!(Sent.is_attempted());
        assert!(Delivered.is_attempted());
        assert!(Read.is_attempted());
        assert!(NoInteraction.is_attempted());
        assert!(!Pending.is_attempted());
        assert!(!Failed.is_attempted());
    }

    #[test]
    fn message_status_round_trips_as_snake_case() {
        use std::str::FromStr;
        assert_eq!(MessageStatus::NoInteraction.to_string(), "no_interaction");
        assert_eq!(
            MessageStatus::from_str("no_interaction").unwrap(),
            MessageStatus::NoInteraction
        );
        assert_eq!(MessageKind::Followup.to_string(), "followup");
    }

    #[test]
    fn job_serializes_with_tag() {
        let job = Job::SendMessage {
            message_id: "m-1".into(),
        };
        let json = serde_json::to_string(&job).unwrap();
        assert!(json.contains(r#""job":"send_message""#));
        let parsed: Job = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, job);
    }

    #[test]
    fn counters_total_excludes_errors() {
        let counters = DailyCounters {
            date: "2026-03-01".into(),
            primary_count: 40,
            followup_count: 10,
            error_count: 7,
        };
        assert_eq!(counters.total_sent(), 50);
    }

    #[test]
    fn counter_kind_from_message_kind() {
        assert_eq!(CounterKind::from(MessageKind::Primary).key_fragment(), "primary");
        assert_eq!(
            CounterKind::from(MessageKind::Followup).key_fragment(),
            "followup"
        );
    }
}
