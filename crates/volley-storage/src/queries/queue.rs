// SPDX-FileCopyrightText: 2026 Volley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Queue operations for crash-safe job processing.
//!
//! Jobs carry an `available_at` timestamp so retries and emergency-pause
//! re-queues are persisted delays, not in-memory timers: a worker restart
//! never loses a scheduled attempt. A `processing` row whose lock timed
//! out is reclaimed by the next dequeue.

use rusqlite::params;

use volley_core::VolleyError;

use crate::database::{map_tr_err, Database};
use crate::models::QueueEntry;

/// Enqueue a new item, optionally delayed by `delay_secs`. Returns the
/// auto-generated queue entry ID.
pub async fn enqueue(
    db: &Database,
    queue_name: &str,
    payload: &str,
    delay_secs: u64,
) -> Result<i64, VolleyError> {
    let queue_name = queue_name.to_string();
    let payload = payload.to_string();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO queue (queue_name, payload, available_at) VALUES (?1, ?2, \
                 strftime('%Y-%m-%dT%H:%M:%fZ', 'now', '+' || ?3 || ' seconds'))",
                params![queue_name, payload, delay_secs],
            )?;
            Ok(conn.last_insert_rowid())
        })
        .await
        .map_err(map_tr_err)
}

/// Dequeue the next available entry from the named queue.
///
/// Atomically selects the oldest entry that is either pending and past
/// its `available_at`, or processing with an expired lock (a crashed
/// worker), and marks it `processing` with a 5-minute lock timeout.
/// Returns `None` when nothing is ready.
pub async fn dequeue(db: &Database, queue_name: &str) -> Result<Option<QueueEntry>, VolleyError> {
    let queue_name = queue_name.to_string();
    db.connection()
        .call(move |conn| {
            // A transaction makes the find + claim a single step against
            // concurrent workers on the shared writer.
            let tx = conn.transaction()?;

            let result = {
                let mut stmt = tx.prepare(
                    "SELECT id, queue_name, payload, status, attempts, max_attempts, \
                            available_at, created_at, updated_at, locked_until \
                     FROM queue \
                     WHERE queue_name = ?1 \
                       AND ((status = 'pending' \
                             AND available_at <= strftime('%Y-%m-%dT%H:%M:%fZ', 'now')) \
                        OR (status = 'processing' \
                             AND locked_until < strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))) \
                     ORDER BY id ASC \
                     LIMIT 1",
                )?;
                stmt.query_row(params![queue_name], |row| {
                    Ok(QueueEntry {
                        id: row.get(0)?,
                        queue_name: row.get(1)?,
                        payload: row.get(2)?,
                        status: row.get(3)?,
                        attempts: row.get(4)?,
                        max_attempts: row.get(5)?,
                        available_at: row.get(6)?,
                        created_at: row.get(7)?,
                        updated_at: row.get(8)?,
                        locked_until: row.get(9)?,
                    })
                })
            };

            match result {
                Ok(entry) => {
                    tx.execute(
                        "UPDATE queue SET status = 'processing', \
                         locked_until = strftime('%Y-%m-%dT%H:%M:%fZ', 'now', '+5 minutes'), \
                         updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now') \
                         WHERE id = ?1",
                        params![entry.id],
                    )?;
                    tx.commit()?;

                    Ok(Some(QueueEntry {
                        status: "processing".to_string(),
                        ..entry
                    }))
                }
                Err(rusqlite::Error::QueryReturnedNoRows) => {
                    tx.commit()?;
                    Ok(None)
                }
                Err(e) => Err(e),
            }
        })
        .await
        .map_err(map_tr_err)
}

/// Acknowledge successful processing of a queue entry.
pub async fn ack(db: &Database, id: i64) -> Result<(), VolleyError> {
    db.connection()
        .call(move |conn| {
            conn.execute(
                "UPDATE queue SET status = 'completed', locked_until = NULL, \
                 updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now') \
                 WHERE id = ?1",
                params![id],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

/// Mark a queue entry as failed.
///
/// Increments attempts. At max_attempts the entry goes to "failed";
/// otherwise back to "pending" for another run, lock cleared.
pub async fn fail(db: &Database, id: i64) -> Result<(), VolleyError> {
    db.connection()
        .call(move |conn| {
            let (attempts, max_attempts): (i32, i32) = conn.query_row(
                "SELECT attempts, max_attempts FROM queue WHERE id = ?1",
                params![id],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )?;

            let new_attempts = attempts + 1;
            let status = if new_attempts >= max_attempts {
                "failed"
            } else {
                "pending"
            };
            conn.execute(
                "UPDATE queue SET status = ?1, attempts = ?2, locked_until = NULL, \
                 updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now') \
                 WHERE id = ?3",
                params![status, new_attempts, id],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    async fn setup_db() -> (Database, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("test.db");
        let db = Database::open(db_path.to_str().unwrap()).await.unwrap();
        (db, dir)
    }

    #[tokio::test]
    async fn enqueue_and_dequeue_lifecycle() {
        let (db, _dir) = setup_db().await;

        let id = enqueue(&db, "dispatch", r#"{"job":"reset_daily_counters"}"#, 0)
            .await
            .unwrap();
        assert!(id > 0);

        let entry = dequeue(&db, "dispatch").await.unwrap().unwrap();
        assert_eq!(entry.id, id);
        assert_eq!(entry.status, "processing");
        assert_eq!(entry.payload, r#"{"job":"reset_daily_counters"}"#);

        // Nothing else ready: the claimed entry is locked.
        assert!(dequeue(&db, "dispatch").await.unwrap().is_none());

        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn delayed_entries_are_not_ready_early() {
        let (db, _dir) = setup_db().await;

        enqueue(&db, "dispatch", "{}", 3600).await.unwrap();
        assert!(
            dequeue(&db, "dispatch").await.unwrap().is_none(),
            "an hour-delayed entry must not dequeue now"
        );

        // An immediate entry behind it is still served.
        let id = enqueue(&db, "dispatch", r#"{"now":true}"#, 0).await.unwrap();
        let entry = dequeue(&db, "dispatch").await.unwrap().unwrap();
        assert_eq!(entry.id, id);

        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn ack_marks_completed() {
        let (db, _dir) = setup_db().await;

        let id = enqueue(&db, "dispatch", "{}", 0).await.unwrap();
        dequeue(&db, "dispatch").await.unwrap().unwrap();
        ack(&db, id).await.unwrap();

        let status: String = db
            .connection()
            .call(move |conn| -> Result<String, rusqlite::Error> {
                conn.query_row(
                    "SELECT status FROM queue WHERE id = ?1",
                    params![id],
                    |row| row.get(0),
                )
            })
            .await
            .unwrap();
        assert_eq!(status, "completed");

        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn fail_retries_until_max_attempts() {
        let (db, _dir) = setup_db().await;

        let id = enqueue(&db, "dispatch", "{}", 0).await.unwrap();

        // Default max_attempts is 3: two failures keep it pending.
        for expected_attempts in 1..=2 {
            dequeue(&db, "dispatch").await.unwrap().unwrap();
            fail(&db, id).await.unwrap();
            let (status, attempts): (String, i32) = db
                .connection()
                .call(move |conn| -> Result<(String, i32), rusqlite::Error> {
                    conn.query_row(
                        "SELECT status, attempts FROM queue WHERE id = ?1",
                        params![id],
                        |row| Ok((row.get(0)?, row.get(1)?)),
                    )
                })
                .await
                .unwrap();
            assert_eq!(status, "pending");
            assert_eq!(attempts, expected_attempts);
        }

        dequeue(&db, "dispatch").await.unwrap().unwrap();
        fail(&db, id).await.unwrap();
        let status: String = db
            .connection()
            .call(move |conn| -> Result<String, rusqlite::Error> {
                conn.query_row(
                    "SELECT status FROM queue WHERE id = ?1",
                    params![id],
                    |row| row.get(0),
                )
            })
            .await
            .unwrap();
        assert_eq!(status, "failed");

        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn expired_processing_lock_is_reclaimed() {
        let (db, _dir) = setup_db().await;

        let id = enqueue(&db, "dispatch", "{}", 0).await.unwrap();
        dequeue(&db, "dispatch").await.unwrap().unwrap();

        // Backdate the lock as if the claiming worker died 10 minutes ago.
        db.connection()
            .call(move |conn| -> Result<(), rusqlite::Error> {
                conn.execute(
                    "UPDATE queue SET locked_until = \
                     strftime('%Y-%m-%dT%H:%M:%fZ', 'now', '-10 minutes') WHERE id = ?1",
                    params![id],
                )?;
                Ok(())
            })
            .await
            .unwrap();

        let reclaimed = dequeue(&db, "dispatch").await.unwrap().unwrap();
        assert_eq!(reclaimed.id, id);

        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn concurrent_writers_no_sqlite_busy() {
        let (db, _dir) = setup_db().await;

        let mut handles = Vec::new();
        for i in 0..10 {
            let conn = db.connection().clone();
            handles.push(tokio::spawn(async move {
                conn.call(move |conn| -> Result<(), rusqlite::Error> {
                    conn.execute(
                        "INSERT INTO queue (queue_name, payload) VALUES (?1, ?2)",
                        params![format!("q-{i}"), format!(r#"{{"n":{i}}}"#)],
                    )?;
                    Ok(())
                })
                .await
            }));
        }
        for handle in handles {
            assert!(handle.await.unwrap().is_ok());
        }

        let count: i64 = db
            .connection()
            .call(|conn| -> Result<i64, rusqlite::Error> {
                conn.query_row("SELECT COUNT(*) FROM queue", [], |row| row.get(0))
            })
            .await
            .unwrap();
        assert_eq!(count, 10);

        db.close().await.unwrap();
    }
}
