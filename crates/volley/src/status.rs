// SPDX-FileCopyrightText: 2026 Volley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `volley status` command implementation: print today's quota picture
//! from the durable stats store.

use chrono::Utc;

use volley_config::VolleyConfig;
use volley_core::{StatsStore, VolleyError};
use volley_guard::{alert_level, error_rate_warning, interaction_rate, remaining_capacity};
use volley_storage::{Database, SqliteStore};

/// Runs the `volley status` command.
pub async fn run_status(config: VolleyConfig) -> Result<(), VolleyError> {
    let db = Database::open_with(&config.storage.database_path, config.storage.wal_mode).await?;
    let store = SqliteStore::new(db);

    let today = Utc::now().format("%Y-%m-%d").to_string();
    let counters = store.get(&today).await?.unwrap_or_default();
    let total = counters.total_sent();
    let limit = config.dispatch.daily_limit;
    let rate = interaction_rate(&counters);

    println!("volley status for {today}");
    println!("  primary sent:       {}", counters.primary_count);
    println!("  follow-ups sent:    {}", counters.followup_count);
    println!("  errors:             {}", counters.error_count);
    println!("  total sent:         {total} / {limit}");
    println!("  alert level:        {}", alert_level(total, limit));
    println!(
        "  remaining capacity: {}",
        remaining_capacity(limit, total, rate)
    );
    if error_rate_warning(&counters) {
        println!("  warning: error rate above 10%");
    }

    Ok(())
}
