// SPDX-FileCopyrightText: 2026 Volley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Embedded database migrations using refinery.
//!
//! SQL migration files are compiled into the binary at build time via
//! `embed_migrations!`. Migrations run automatically on database open.

use volley_core::VolleyError;

mod embedded {
    use refinery::embed_migrations;
    embed_migrations!("migrations");
}

/// Run all pending migrations against the given connection.
///
/// Refinery tracks applied migrations in its own `refinery_schema_history`
/// table.
pub async fn run_migrations(conn: &tokio_rusqlite::Connection) -> Result<(), VolleyError> {
    conn.call(|conn| {
        embedded::migrations::runner().run(conn).map(|_| ())
    })
    .await
    .map_err(|e| VolleyError::Persistence {
        source: Box::new(e),
    })
}
