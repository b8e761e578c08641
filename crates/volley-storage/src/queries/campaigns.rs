// SPDX-FileCopyrightText: 2026 Volley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Campaign queries.

use rusqlite::params;

use volley_core::{CampaignRecord, CampaignStatus, VolleyError};

use crate::database::{map_tr_err, Database};
use crate::models::{campaign_from_row, CAMPAIGN_COLUMNS};

pub async fn get_campaign(
    db: &Database,
    id: &str,
) -> Result<Option<CampaignRecord>, VolleyError> {
    let id = id.to_string();
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {CAMPAIGN_COLUMNS} FROM campaigns WHERE id = ?1"
            ))?;
            match stmt.query_row(params![id], campaign_from_row) {
                Ok(campaign) => Ok(Some(campaign)),
                Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                Err(e) => Err(e),
            }
        })
        .await
        .map_err(map_tr_err)
}

pub async fn insert_campaign(db: &Database, campaign: &CampaignRecord) -> Result<(), VolleyError> {
    let c = campaign.clone();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO campaigns (id, name, status, primary_template, followup_template, \
                 followup_window_hours, created_at, updated_at) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                params![
                    c.id,
                    c.name,
                    c.status.to_string(),
                    c.primary_template,
                    c.followup_template,
                    c.followup_window_hours,
                    c.created_at,
                    c.updated_at,
                ],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

pub async fn update_campaign_status(
    db: &Database,
    id: &str,
    status: CampaignStatus,
) -> Result<(), VolleyError> {
    let id = id.to_string();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "UPDATE campaigns SET status = ?2, \
                 updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now') WHERE id = ?1",
                params![id, status.to_string()],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

pub async fn list_campaigns_by_status(
    db: &Database,
    status: CampaignStatus,
) -> Result<Vec<CampaignRecord>, VolleyError> {
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {CAMPAIGN_COLUMNS} FROM campaigns WHERE status = ?1 ORDER BY id ASC"
            ))?;
            let rows = stmt.query_map(params![status.to_string()], campaign_from_row)?;
            rows.collect::<Result<Vec<_>, _>>()
        })
        .await
        .map_err(map_tr_err)
}

pub async fn has_pending_messages(db: &Database, id: &str) -> Result<bool, VolleyError> {
    let id = id.to_string();
    db.connection()
        .call(move |conn| {
            conn.query_row(
                "SELECT EXISTS(SELECT 1 FROM messages WHERE campaign_id = ?1 AND status = 'pending')",
                params![id],
                |row| row.get(0),
            )
        })
        .await
        .map_err(map_tr_err)
}
