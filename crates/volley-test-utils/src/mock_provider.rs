// SPDX-FileCopyrightText: 2026 Volley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Mock message provider for deterministic testing.
//!
//! `MockProvider` implements `MessageProvider` with scripted outcomes and
//! captured calls for assertion in tests.

use std::collections::VecDeque;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;

use volley_core::{MessageProvider, ProviderMessageId, SendFailure};

/// A recorded provider call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedSend {
    pub destination: String,
    pub content: String,
}

/// A mock provider with a script of outcomes.
///
/// Outcomes pushed via `push_success`/`push_failure` are consumed in
/// order; once the script is exhausted every further call succeeds with
/// a generated message id.
pub struct MockProvider {
    script: Arc<Mutex<VecDeque<Result<ProviderMessageId, SendFailure>>>>,
    calls: Arc<Mutex<Vec<RecordedSend>>>,
}

impl MockProvider {
    pub fn new() -> Self {
        Self {
            script: Arc::new(Mutex::new(VecDeque::new())),
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Script the next call to succeed with a specific provider id.
    pub async fn push_success(&self, provider_id: &str) {
        self.script
            .lock()
            .await
            .push_back(Ok(ProviderMessageId(provider_id.to_string())));
    }

    /// Script the next call to fail with the given code and text.
    pub async fn push_failure(&self, code: i64, text: &str) {
        self.script.lock().await.push_back(Err(SendFailure {
            code,
            text: text.to_string(),
        }));
    }

    /// All calls made so far, in order.
    pub async fn calls(&self) -> Vec<RecordedSend> {
        self.calls.lock().await.clone()
    }

    /// Number of provider calls made so far.
    pub async fn call_count(&self) -> usize {
        self.calls.lock().await.len()
    }
}

impl Default for MockProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MessageProvider for MockProvider {
    fn name(&self) -> &str {
        "mock-provider"
    }

    async fn send(
        &self,
        destination: &str,
        content: &str,
    ) -> Result<ProviderMessageId, SendFailure> {
        self.calls.lock().await.push(RecordedSend {
            destination: destination.to_string(),
            content: content.to_string(),
        });
        match self.script.lock().await.pop_front() {
            Some(outcome) => outcome,
            None => Ok(ProviderMessageId(format!(
                "mock-{}",
                uuid::Uuid::new_v4()
            ))),
        }
    }
}
