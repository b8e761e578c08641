// SPDX-FileCopyrightText: 2026 Volley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SQLite persistence layer for the Volley dispatch engine.
//!
//! Provides WAL-mode SQLite storage with embedded migrations, a
//! single-writer concurrency model via `tokio-rusqlite`, typed query
//! modules for messages, campaigns, and daily stats, and the crash-safe
//! job queue workers pull from.

pub mod adapter;
pub mod database;
pub mod migrations;
pub mod models;
pub mod queries;

pub use adapter::{ClaimedJob, SqliteJobQueue, SqliteStore, DISPATCH_QUEUE};
pub use database::Database;
pub use models::QueueEntry;
