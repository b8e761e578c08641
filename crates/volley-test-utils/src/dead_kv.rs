// SPDX-FileCopyrightText: 2026 Volley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! A `KvStore` whose every operation fails, for degradation-path tests.

use std::time::Duration;

use async_trait::async_trait;

use volley_core::{BoundedIncr, KvStore, VolleyError};

/// Simulates a counter store that is down. Every operation returns a
/// store error; consumers are expected to degrade, not propagate.
pub struct DeadKv;

fn down() -> VolleyError {
    VolleyError::Store {
        source: "store unavailable".into(),
    }
}

#[async_trait]
impl KvStore for DeadKv {
    async fn get(&self, _key: &str) -> Result<Option<String>, VolleyError> {
        Err(down())
    }

    async fn set(
        &self,
        _key: &str,
        _value: &str,
        _ttl: Option<Duration>,
    ) -> Result<(), VolleyError> {
        Err(down())
    }

    async fn set_nx(
        &self,
        _key: &str,
        _value: &str,
        _ttl: Option<Duration>,
    ) -> Result<bool, VolleyError> {
        Err(down())
    }

    async fn delete(&self, _key: &str) -> Result<bool, VolleyError> {
        Err(down())
    }

    async fn compare_and_delete(
        &self,
        _key: &str,
        _expected: &str,
    ) -> Result<bool, VolleyError> {
        Err(down())
    }

    async fn incr(
        &self,
        _key: &str,
        _by: i64,
        _ttl: Option<Duration>,
    ) -> Result<i64, VolleyError> {
        Err(down())
    }

    async fn incr_bounded(
        &self,
        _key: &str,
        _ceiling: i64,
        _ttl: Option<Duration>,
    ) -> Result<BoundedIncr, VolleyError> {
        Err(down())
    }

    async fn ttl_remaining(&self, _key: &str) -> Result<Option<Duration>, VolleyError> {
        Err(down())
    }

    async fn scan_prefix(&self, _prefix: &str) -> Result<Vec<String>, VolleyError> {
        Err(down())
    }
}
