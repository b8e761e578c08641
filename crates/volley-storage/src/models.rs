// SPDX-FileCopyrightText: 2026 Volley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Row types and row-mapping helpers for the query modules.

use std::str::FromStr;

use rusqlite::types::Type;
use rusqlite::Row;

use volley_core::{
    CampaignRecord, CampaignStatus, ContactRecord, MessageKind, MessageRecord, MessageStatus,
};

/// A row of the crash-safe dispatch queue.
#[derive(Debug, Clone)]
pub struct QueueEntry {
    pub id: i64,
    pub queue_name: String,
    pub payload: String,
    pub status: String,
    pub attempts: i32,
    pub max_attempts: i32,
    pub available_at: String,
    pub created_at: String,
    pub updated_at: String,
    pub locked_until: Option<String>,
}

/// Parse a TEXT column into an enum, mapping parse failures onto the
/// rusqlite conversion error so they surface as query errors.
fn parse_column<T: FromStr>(idx: usize, raw: String) -> rusqlite::Result<T>
where
    T::Err: std::error::Error + Send + Sync + 'static,
{
    raw.parse::<T>()
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

/// Map a `messages` row (column order as in the SELECT lists of
/// `queries::messages`).
pub fn message_from_row(row: &Row<'_>) -> rusqlite::Result<MessageRecord> {
    let kind: String = row.get(3)?;
    let status: String = row.get(5)?;
    Ok(MessageRecord {
        id: row.get(0)?,
        campaign_id: row.get(1)?,
        contact_id: row.get(2)?,
        kind: parse_column::<MessageKind>(3, kind)?,
        content: row.get(4)?,
        status: parse_column::<MessageStatus>(5, status)?,
        retry_count: row.get(6)?,
        error: row.get(7)?,
        provider_message_id: row.get(8)?,
        created_at: row.get(9)?,
        sent_at: row.get(10)?,
        delivered_at: row.get(11)?,
        read_at: row.get(12)?,
    })
}

/// The SELECT list matching [`message_from_row`].
pub const MESSAGE_COLUMNS: &str = "id, campaign_id, contact_id, kind, content, status, \
     retry_count, error, provider_message_id, created_at, sent_at, delivered_at, read_at";

/// Map a `campaigns` row.
pub fn campaign_from_row(row: &Row<'_>) -> rusqlite::Result<CampaignRecord> {
    let status: String = row.get(2)?;
    Ok(CampaignRecord {
        id: row.get(0)?,
        name: row.get(1)?,
        status: parse_column::<CampaignStatus>(2, status)?,
        primary_template: row.get(3)?,
        followup_template: row.get(4)?,
        followup_window_hours: row.get(5)?,
        created_at: row.get(6)?,
        updated_at: row.get(7)?,
    })
}

/// The SELECT list matching [`campaign_from_row`].
pub const CAMPAIGN_COLUMNS: &str = "id, name, status, primary_template, followup_template, \
     followup_window_hours, created_at, updated_at";

/// Map a `contacts` row.
pub fn contact_from_row(row: &Row<'_>) -> rusqlite::Result<ContactRecord> {
    Ok(ContactRecord {
        id: row.get(0)?,
        destination: row.get(1)?,
        display_name: row.get(2)?,
    })
}

pub const CONTACT_COLUMNS: &str = "id, destination, display_name";
