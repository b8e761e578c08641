// SPDX-FileCopyrightText: 2026 Volley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Message provider trait — the narrow contract with the third-party
//! messaging channel.

use async_trait::async_trait;

use crate::types::{ProviderMessageId, SendFailure};

/// Outbound message provider.
///
/// The dispatcher is the only consumer. Failures carry the provider's
/// raw error code and text so the ban-risk classifier can decide between
/// transient retry, emergency pause, and permanent failure.
#[async_trait]
pub trait MessageProvider: Send + Sync + 'static {
    /// Human-readable provider name, used in logs.
    fn name(&self) -> &str;

    /// Deliver `content` to `destination`. Returns the provider-assigned
    /// message id on acceptance.
    async fn send(
        &self,
        destination: &str,
        content: &str,
    ) -> Result<ProviderMessageId, SendFailure>;
}
