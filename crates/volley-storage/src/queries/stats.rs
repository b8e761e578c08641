// SPDX-FileCopyrightText: 2026 Volley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Durable daily stats queries — the crash-recovery mirror of the live
//! quota counters.

use rusqlite::params;

use volley_core::{DailyCounters, VolleyError};

use crate::database::{map_tr_err, Database};

pub async fn upsert(db: &Database, counters: &DailyCounters) -> Result<(), VolleyError> {
    let c = counters.clone();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO daily_stats (date, primary_count, followup_count, error_count, updated_at) \
                 VALUES (?1, ?2, ?3, ?4, strftime('%Y-%m-%dT%H:%M:%fZ', 'now')) \
                 ON CONFLICT(date) DO UPDATE SET \
                     primary_count = excluded.primary_count, \
                     followup_count = excluded.followup_count, \
                     error_count = excluded.error_count, \
                     updated_at = excluded.updated_at",
                params![c.date, c.primary_count, c.followup_count, c.error_count],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

pub async fn get(db: &Database, date: &str) -> Result<Option<DailyCounters>, VolleyError> {
    let date = date.to_string();
    db.connection()
        .call(move |conn| {
            let result = conn.query_row(
                "SELECT date, primary_count, followup_count, error_count \
                 FROM daily_stats WHERE date = ?1",
                params![date],
                |row| {
                    Ok(DailyCounters {
                        date: row.get(0)?,
                        primary_count: row.get(1)?,
                        followup_count: row.get(2)?,
                        error_count: row.get(3)?,
                    })
                },
            );
            match result {
                Ok(counters) => Ok(Some(counters)),
                Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                Err(e) => Err(e),
            }
        })
        .await
        .map_err(map_tr_err)
}
