// SPDX-FileCopyrightText: 2026 Volley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The Volley dispatch core: the retryable per-message send pipeline,
//! sequential campaign runner, job execution, and housekeeping.
//!
//! Everything here consumes its collaborators (provider, stores, queue,
//! guards) as `Arc`s constructed once at process start — no hidden
//! module-level state.

pub mod campaign;
pub mod housekeeping;
pub mod jobs;
pub mod pipeline;
pub mod retry;

pub use campaign::{CampaignReport, CampaignRunner};
pub use housekeeping::{FollowupReport, Housekeeper};
pub use jobs::JobRunner;
pub use pipeline::{SendOutcome, SendPipeline, SkipReason};
pub use retry::backoff_delay;
