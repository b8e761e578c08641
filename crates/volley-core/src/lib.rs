// SPDX-FileCopyrightText: 2026 Volley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core library for the Volley dispatch engine.
//!
//! This crate provides the foundational trait definitions, error types,
//! and common types used throughout the Volley workspace. The dispatch
//! safety subsystem consumes its collaborators (counter store, message
//! provider, persistent store, job queue) only through the traits
//! defined here.

pub mod error;
pub mod traits;
pub mod types;

// Re-export key items at crate root for ergonomic imports.
pub use error::VolleyError;
pub use types::{
    BoundedIncr, CampaignRecord, CampaignStatus, ContactRecord, CounterKind, DailyCounters, Job,
    LockInfo, MessageKind, MessageRecord, MessageStatus, ProviderMessageId, SendFailure,
};

// Re-export the trait seams at crate root.
pub use traits::{CampaignStore, JobQueue, KvStore, MessageProvider, MessageStore, StatsStore};
