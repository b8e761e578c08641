// SPDX-FileCopyrightText: 2026 Volley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Anti-ban pacing for the Volley dispatch engine.
//!
//! The pacing planner computes a human-like delay before every send from
//! cumulative daily volume, content size, and randomized variance. The
//! error table classifies provider failures into transient, ban-risk,
//! and fatal, driving the dispatcher's recovery choice.

pub mod ban;
pub mod delay;

pub use ban::{ErrorAssessment, ErrorClass, ErrorTable, RecoveryAction};
pub use delay::{PacingPlan, PacingPlanner};
