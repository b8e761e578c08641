// SPDX-FileCopyrightText: 2026 Volley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types for the Volley dispatch engine.

use thiserror::Error;

/// The primary error type used across all Volley traits and core operations.
#[derive(Debug, Error)]
pub enum VolleyError {
    /// Configuration errors (invalid TOML, missing required fields, type mismatches).
    #[error("configuration error: {0}")]
    Config(String),

    /// Shared counter store errors (connection, timeout, serialization).
    ///
    /// Components that consume the counter store catch this variant at
    /// their boundary and degrade: quota reads fail open, cache reads
    /// become misses, cache writes become no-ops.
    #[error("store error: {source}")]
    Store {
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Persistent storage errors (database connection, query failure).
    #[error("persistence error: {source}")]
    Persistence {
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Message provider errors carrying the provider's code and text.
    #[error("provider error {code}: {text}")]
    Provider { code: i64, text: String },

    /// Structural validation failure. Fatal for the message: no retry.
    #[error("validation error: {0}")]
    Validation(String),

    /// Internal or unexpected errors.
    #[error("internal error: {0}")]
    Internal(String),
}
