// SPDX-FileCopyrightText: 2026 Volley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Message and contact queries.
//!
//! Status writes enforce the forward-only DAG: an update that does not
//! advance along it is rejected, so a resumed or retried run can never
//! regress a message that already went out.

use rusqlite::params;

use volley_core::{ContactRecord, MessageRecord, MessageStatus, VolleyError};

use crate::database::{map_tr_err, Database};
use crate::models::{contact_from_row, message_from_row, CONTACT_COLUMNS, MESSAGE_COLUMNS};

pub async fn get_message(db: &Database, id: &str) -> Result<Option<MessageRecord>, VolleyError> {
    let id = id.to_string();
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {MESSAGE_COLUMNS} FROM messages WHERE id = ?1"
            ))?;
            match stmt.query_row(params![id], message_from_row) {
                Ok(message) => Ok(Some(message)),
                Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                Err(e) => Err(e),
            }
        })
        .await
        .map_err(map_tr_err)
}

pub async fn get_contact(db: &Database, id: &str) -> Result<Option<ContactRecord>, VolleyError> {
    let id = id.to_string();
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {CONTACT_COLUMNS} FROM contacts WHERE id = ?1"
            ))?;
            match stmt.query_row(params![id], contact_from_row) {
                Ok(contact) => Ok(Some(contact)),
                Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                Err(e) => Err(e),
            }
        })
        .await
        .map_err(map_tr_err)
}

pub async fn insert_message(db: &Database, message: &MessageRecord) -> Result<(), VolleyError> {
    let m = message.clone();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO messages (id, campaign_id, contact_id, kind, content, status, \
                 retry_count, error, provider_message_id, created_at, sent_at, delivered_at, read_at) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
                params![
                    m.id,
                    m.campaign_id,
                    m.contact_id,
                    m.kind.to_string(),
                    m.content,
                    m.status.to_string(),
                    m.retry_count,
                    m.error,
                    m.provider_message_id,
                    m.created_at,
                    m.sent_at,
                    m.delivered_at,
                    m.read_at,
                ],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

/// Pending messages in fixed id order — the snapshot a dispatch run
/// iterates.
pub async fn list_pending(
    db: &Database,
    campaign_id: &str,
) -> Result<Vec<MessageRecord>, VolleyError> {
    list_by_status(db, campaign_id, MessageStatus::Pending).await
}

/// Permanently failed messages, for the operator retry path.
pub async fn list_failed(
    db: &Database,
    campaign_id: &str,
) -> Result<Vec<MessageRecord>, VolleyError> {
    list_by_status(db, campaign_id, MessageStatus::Failed).await
}

async fn list_by_status(
    db: &Database,
    campaign_id: &str,
    status: MessageStatus,
) -> Result<Vec<MessageRecord>, VolleyError> {
    let campaign_id = campaign_id.to_string();
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {MESSAGE_COLUMNS} FROM messages \
                 WHERE campaign_id = ?1 AND status = ?2 ORDER BY id ASC"
            ))?;
            let rows = stmt.query_map(params![campaign_id, status.to_string()], message_from_row)?;
            rows.collect::<Result<Vec<_>, _>>()
        })
        .await
        .map_err(map_tr_err)
}

/// Mark a pending message sent. A no-op when the message already left
/// `pending` — status is the sole source of truth for "attempted".
pub async fn mark_sent(
    db: &Database,
    id: &str,
    provider_message_id: &str,
) -> Result<(), VolleyError> {
    let id = id.to_string();
    let provider_message_id = provider_message_id.to_string();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "UPDATE messages SET status = 'sent', provider_message_id = ?2, \
                 sent_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now'), error = NULL \
                 WHERE id = ?1 AND status = 'pending'",
                params![id, provider_message_id],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

/// Mark a message permanently failed with the captured reason.
pub async fn mark_failed(db: &Database, id: &str, reason: &str) -> Result<(), VolleyError> {
    let id = id.to_string();
    let reason = reason.to_string();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "UPDATE messages SET status = 'failed', error = ?2 \
                 WHERE id = ?1 AND status = 'pending'",
                params![id, reason],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

/// Advance a message along the status DAG, stamping delivery/read
/// timestamps as appropriate. Rejects non-forward transitions.
pub async fn update_status(
    db: &Database,
    id: &str,
    status: MessageStatus,
) -> Result<(), VolleyError> {
    let id_owned = id.to_string();
    let current = get_message(db, id).await?.ok_or_else(|| {
        VolleyError::Validation(format!("message `{id_owned}` not found"))
    })?;

    if !current.status.may_advance_to(status) {
        return Err(VolleyError::Validation(format!(
            "message `{}` cannot move {} -> {}",
            current.id, current.status, status
        )));
    }

    let id = id.to_string();
    db.connection()
        .call(move |conn| {
            let timestamp_column = match status {
                MessageStatus::Delivered => "delivered_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now'), ",
                MessageStatus::Read => "read_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now'), ",
                _ => "",
            };
            conn.execute(
                &format!(
                    "UPDATE messages SET {timestamp_column}status = ?2 WHERE id = ?1"
                ),
                params![id, status.to_string()],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

/// Increment the retry counter, returning the new count.
pub async fn increment_retry(db: &Database, id: &str) -> Result<u32, VolleyError> {
    let id = id.to_string();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "UPDATE messages SET retry_count = retry_count + 1 WHERE id = ?1",
                params![id.clone()],
            )?;
            conn.query_row(
                "SELECT retry_count FROM messages WHERE id = ?1",
                params![id],
                |row| row.get(0),
            )
        })
        .await
        .map_err(map_tr_err)
}

/// Operator-initiated failed -> pending reset, clearing the retry
/// counter and the stored error.
pub async fn reset_for_retry(db: &Database, id: &str) -> Result<(), VolleyError> {
    let id = id.to_string();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "UPDATE messages SET status = 'pending', retry_count = 0, error = NULL \
                 WHERE id = ?1 AND status = 'failed'",
                params![id],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

/// Primary messages in running campaigns whose contact interacted inside
/// the follow-up window and which have no follow-up row yet.
pub async fn list_followup_candidates(db: &Database) -> Result<Vec<MessageRecord>, VolleyError> {
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {} FROM messages m \
                 JOIN campaigns c ON c.id = m.campaign_id \
                 WHERE m.kind = 'primary' AND m.status = 'read' \
                   AND c.status = 'running' AND c.followup_template IS NOT NULL \
                   AND m.read_at >= strftime('%Y-%m-%dT%H:%M:%fZ', 'now', \
                       '-' || c.followup_window_hours || ' hours') \
                   AND NOT EXISTS ( \
                       SELECT 1 FROM messages f \
                       WHERE f.campaign_id = m.campaign_id \
                         AND f.contact_id = m.contact_id AND f.kind = 'followup') \
                 ORDER BY m.id ASC",
                qualified_message_columns("m")
            ))?;
            let rows = stmt.query_map([], message_from_row)?;
            rows.collect::<Result<Vec<_>, _>>()
        })
        .await
        .map_err(map_tr_err)
}

/// Primary messages whose follow-up window elapsed with no interaction.
pub async fn list_interaction_expired(db: &Database) -> Result<Vec<MessageRecord>, VolleyError> {
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {} FROM messages m \
                 JOIN campaigns c ON c.id = m.campaign_id \
                 WHERE m.kind = 'primary' AND m.status IN ('sent', 'delivered') \
                   AND m.sent_at IS NOT NULL \
                   AND m.sent_at < strftime('%Y-%m-%dT%H:%M:%fZ', 'now', \
                       '-' || c.followup_window_hours || ' hours') \
                 ORDER BY m.id ASC",
                qualified_message_columns("m")
            ))?;
            let rows = stmt.query_map([], message_from_row)?;
            rows.collect::<Result<Vec<_>, _>>()
        })
        .await
        .map_err(map_tr_err)
}

/// The message SELECT list qualified with a table alias, for joins.
fn qualified_message_columns(alias: &str) -> String {
    MESSAGE_COLUMNS
        .split(", ")
        .map(|col| format!("{alias}.{col}"))
        .collect::<Vec<_>>()
        .join(", ")
}
