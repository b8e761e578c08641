// SPDX-FileCopyrightText: 2026 Volley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Shared counter store for the Volley dispatch engine.
//!
//! Provides the in-process [`MemoryKv`] backend for the `KvStore` trait
//! and the reserved key prefixes that partition the store between the
//! control plane (quota counters, locks, rate windows) and the generic
//! cache.

pub mod keys;
pub mod memory;

pub use memory::MemoryKv;
