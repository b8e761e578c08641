// SPDX-FileCopyrightText: 2026 Volley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Table-driven provider error classification.
//!
//! A fixed set of provider error codes and response substrings is
//! correlated with account suspension risk. Those classify as ban-risk
//! and demand an emergency pause instead of a normal retry — and they do
//! not consume a retry attempt. The remaining errors split into fatal
//! (no point retrying) and transient (exponential backoff).

use std::time::Duration;

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Broad classification of a provider error.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ErrorClass {
    /// Network blips, timeouts, generic 5xx — retry with backoff.
    Transient,
    /// Correlated with account suspension — emergency pause, re-attempt
    /// without consuming a retry slot.
    BanRisk,
    /// Deterministic rejection — fail immediately, no retry.
    Fatal,
}

/// What the dispatcher should do about a classified error.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum RecoveryAction {
    Retry,
    EmergencyPause,
    Fail,
}

/// A classified provider error with its prescribed handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ErrorAssessment {
    pub class: ErrorClass,
    pub action: RecoveryAction,
    /// Pause to observe before the next attempt; set for ban-risk only.
    pub pause: Option<Duration>,
}

impl ErrorAssessment {
    pub fn is_ban_risk(&self) -> bool {
        self.class == ErrorClass::BanRisk
    }
}

/// One row of the classification table.
#[derive(Debug, Clone)]
struct TableEntry {
    codes: &'static [i64],
    substrings: &'static [&'static str],
    class: ErrorClass,
}

/// Provider error codes correlated with suspension risk. The numeric
/// space follows the provider's platform error registry.
const BAN_RISK_CODES: &[i64] = &[368, 130_429, 131_048, 131_056];

const BAN_RISK_SUBSTRINGS: &[&str] = &[
    "spam",
    "temporarily blocked",
    "account has been restricted",
    "too many messages",
    "rate limit hit",
];

/// Deterministic rejections: malformed parameters, unreachable
/// recipients, template mismatches.
const FATAL_CODES: &[i64] = &[100, 131_026, 132_000, 132_012];

const FATAL_SUBSTRINGS: &[&str] = &[
    "invalid parameter",
    "recipient is not a valid",
    "unsupported message type",
];

/// Table-driven classifier for provider errors.
pub struct ErrorTable {
    entries: Vec<TableEntry>,
    emergency_pause: Duration,
}

impl ErrorTable {
    /// The built-in table with the configured emergency pause duration.
    pub fn new(emergency_pause: Duration) -> Self {
        Self {
            entries: vec![
                TableEntry {
                    codes: BAN_RISK_CODES,
                    substrings: BAN_RISK_SUBSTRINGS,
                    class: ErrorClass::BanRisk,
                },
                TableEntry {
                    codes: FATAL_CODES,
                    substrings: FATAL_SUBSTRINGS,
                    class: ErrorClass::Fatal,
                },
            ],
            emergency_pause,
        }
    }

    /// Classify a provider error by code first, then by response text.
    /// Unknown errors default to transient: an unrecognized failure gets
    /// the benefit of backoff rather than a permanent mark.
    pub fn classify(&self, code: i64, text: &str) -> ErrorAssessment {
        let lowered = text.to_lowercase();
        let class = self
            .entries
            .iter()
            .find(|entry| {
                entry.codes.contains(&code)
                    || entry.substrings.iter().any(|s| lowered.contains(s))
            })
            .map(|entry| entry.class)
            .unwrap_or(ErrorClass::Transient);

        match class {
            ErrorClass::BanRisk => ErrorAssessment {
                class,
                action: RecoveryAction::EmergencyPause,
                pause: Some(self.emergency_pause),
            },
            ErrorClass::Fatal => ErrorAssessment {
                class,
                action: RecoveryAction::Fail,
                pause: None,
            },
            ErrorClass::Transient => ErrorAssessment {
                class,
                action: RecoveryAction::Retry,
                pause: None,
            },
        }
    }
}
