// SPDX-FileCopyrightText: 2026 Volley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test utilities for the Volley workspace: mock implementations of the
//! core trait seams with scripted outcomes and captured calls.

pub mod dead_kv;
pub mod mock_provider;
pub mod mock_queue;

pub use dead_kv::DeadKv;
pub use mock_provider::{MockProvider, RecordedSend};
pub use mock_queue::{MockJobQueue, ScheduledJob};
