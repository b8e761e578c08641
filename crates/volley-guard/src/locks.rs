// SPDX-FileCopyrightText: 2026 Volley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Distributed lock manager.
//!
//! Campaign locks give one runner exclusive access to a campaign's batch;
//! idempotency locks suppress duplicate concurrent sends of the same
//! message. Both are conditional set-if-absent entries with expiry — the
//! ttl is the crash-safety net for holders that die without releasing.
//!
//! Locks are advisory but load-bearing: "not acquired" means "operation
//! already in progress", never an error. Release is a single atomic
//! compare-and-delete on the exact observed lock value, so a lock that
//! changed hands between read and release is left alone.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use volley_core::{KvStore, LockInfo};
use volley_kv::keys::{campaign_lock_key, operation_lock_key};

/// Serialized lock value: holder identity plus acquisition timestamp.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct LockValue {
    holder: String,
    acquired_at: String,
}

/// Campaign and idempotency locks over the shared store.
pub struct LockManager {
    store: Arc<dyn KvStore>,
}

impl LockManager {
    pub fn new(store: Arc<dyn KvStore>) -> Self {
        Self { store }
    }

    /// Try to take the campaign lock. Returns `false` when another holder
    /// has it, or when the store is unreachable (degrading to "assume
    /// someone else is running" keeps mutual exclusion conservative).
    pub async fn acquire_campaign(
        &self,
        campaign_id: &str,
        holder: &str,
        ttl: Duration,
    ) -> bool {
        self.acquire(&campaign_lock_key(campaign_id), holder, ttl).await
    }

    /// Release the campaign lock if and only if `holder` still owns it.
    pub async fn release_campaign(&self, campaign_id: &str, holder: &str) -> bool {
        self.release(&campaign_lock_key(campaign_id), holder).await
    }

    /// Current holder and remaining ttl for a campaign lock, if held.
    pub async fn campaign_lock_info(&self, campaign_id: &str) -> Option<LockInfo> {
        self.info(&campaign_lock_key(campaign_id)).await
    }

    /// Try to take the idempotency lock for `(operation_kind, message_id)`.
    pub async fn acquire_operation(
        &self,
        operation_kind: &str,
        message_id: &str,
        ttl: Duration,
    ) -> bool {
        self.acquire(
            &operation_lock_key(operation_kind, message_id),
            message_id,
            ttl,
        )
        .await
    }

    /// Release an idempotency lock.
    pub async fn release_operation(&self, operation_kind: &str, message_id: &str) -> bool {
        self.release(&operation_lock_key(operation_kind, message_id), message_id)
            .await
    }

    async fn acquire(&self, key: &str, holder: &str, ttl: Duration) -> bool {
        let value = LockValue {
            holder: holder.to_string(),
            acquired_at: Utc::now().format("%Y-%m-%dT%H:%M:%S%.3fZ").to_string(),
        };
        let serialized = match serde_json::to_string(&value) {
            Ok(s) => s,
            Err(e) => {
                warn!(key = %key, error = %e, "lock value serialization failed");
                return false;
            }
        };
        match self.store.set_nx(key, &serialized, Some(ttl)).await {
            Ok(acquired) => {
                if acquired {
                    debug!(key = %key, holder = %holder, "lock acquired");
                } else {
                    debug!(key = %key, holder = %holder, "lock already held");
                }
                acquired
            }
            Err(e) => {
                warn!(key = %key, error = %e, "lock acquire failed, treating as held");
                false
            }
        }
    }

    /// Atomic holder-checked release: read the current value, verify the
    /// holder, then compare-and-delete against the exact bytes observed.
    /// If the lock expired and was re-acquired in between, the CAS fails
    /// and the new holder's lock survives.
    async fn release(&self, key: &str, holder: &str) -> bool {
        let observed = match self.store.get(key).await {
            Ok(Some(value)) => value,
            Ok(None) => return false,
            Err(e) => {
                warn!(key = %key, error = %e, "lock release read failed");
                return false;
            }
        };

        let parsed: LockValue = match serde_json::from_str(&observed) {
            Ok(v) => v,
            Err(e) => {
                warn!(key = %key, error = %e, "lock value unparsable, leaving in place");
                return false;
            }
        };
        if parsed.holder != holder {
            debug!(key = %key, holder = %holder, current = %parsed.holder, "refusing to release foreign lock");
            return false;
        }

        match self.store.compare_and_delete(key, &observed).await {
            Ok(released) => {
                if released {
                    debug!(key = %key, holder = %holder, "lock released");
                }
                released
            }
            Err(e) => {
                warn!(key = %key, error = %e, "lock release failed");
                false
            }
        }
    }

    async fn info(&self, key: &str) -> Option<LockInfo> {
        let value = self.store.get(key).await.ok().flatten()?;
        let parsed: LockValue = serde_json::from_str(&value).ok()?;
        let remaining_ttl = self
            .store
            .ttl_remaining(key)
            .await
            .ok()
            .flatten()
            .unwrap_or(Duration::ZERO);
        Some(LockInfo {
            holder: parsed.holder,
            acquired_at: parsed.acquired_at,
            remaining_ttl,
        })
    }
}
