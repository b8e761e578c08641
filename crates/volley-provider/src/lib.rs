// SPDX-FileCopyrightText: 2026 Volley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP message provider.
//!
//! Posts JSON to the provider's messages endpoint and maps both
//! transport failures and API error payloads into `SendFailure` values
//! the ban-risk classifier understands. Transport-level failures carry
//! code 0 and classify as transient.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use volley_config::model::ProviderConfig;
use volley_core::{MessageProvider, ProviderMessageId, SendFailure, VolleyError};

/// Outbound request body for the messages endpoint.
#[derive(Debug, Serialize)]
struct SendRequest<'a> {
    to: &'a str,
    #[serde(rename = "type")]
    message_type: &'static str,
    text: TextBody<'a>,
}

#[derive(Debug, Serialize)]
struct TextBody<'a> {
    body: &'a str,
}

/// Success payload: the accepted message ids.
#[derive(Debug, Deserialize)]
struct SendResponse {
    messages: Vec<AcceptedMessage>,
}

#[derive(Debug, Deserialize)]
struct AcceptedMessage {
    id: String,
}

/// Error payload wrapper.
#[derive(Debug, Deserialize)]
struct ErrorResponse {
    error: ApiError,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    code: i64,
    message: String,
}

/// Reqwest-backed provider client.
pub struct HttpProvider {
    client: reqwest::Client,
    endpoint: String,
    api_key: Option<String>,
}

impl HttpProvider {
    pub fn new(config: &ProviderConfig) -> Result<Self, VolleyError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| VolleyError::Internal(format!("provider client build: {e}")))?;
        Ok(Self {
            client,
            endpoint: config.endpoint.clone(),
            api_key: config.api_key.clone(),
        })
    }
}

#[async_trait]
impl MessageProvider for HttpProvider {
    fn name(&self) -> &str {
        "http"
    }

    async fn send(
        &self,
        destination: &str,
        content: &str,
    ) -> Result<ProviderMessageId, SendFailure> {
        let body = SendRequest {
            to: destination,
            message_type: "text",
            text: TextBody { body: content },
        };

        let mut request = self.client.post(&self.endpoint).json(&body);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().await.map_err(|e| SendFailure {
            code: 0,
            text: format!("transport error: {e}"),
        })?;

        let status = response.status();
        let raw = response.text().await.map_err(|e| SendFailure {
            code: 0,
            text: format!("transport error reading body: {e}"),
        })?;

        if status.is_success() {
            let parsed: SendResponse = serde_json::from_str(&raw).map_err(|e| SendFailure {
                code: 0,
                text: format!("unparsable provider response: {e}"),
            })?;
            let id = parsed.messages.into_iter().next().ok_or(SendFailure {
                code: 0,
                text: "provider accepted the send but returned no message id".to_string(),
            })?;
            debug!(provider_id = %id.id, "provider accepted message");
            return Ok(ProviderMessageId(id.id));
        }

        // Prefer the structured API error; fall back to the HTTP status.
        match serde_json::from_str::<ErrorResponse>(&raw) {
            Ok(parsed) => Err(SendFailure {
                code: parsed.error.code,
                text: parsed.error.message,
            }),
            Err(_) => Err(SendFailure {
                code: status.as_u16() as i64,
                text: if raw.is_empty() {
                    status.to_string()
                } else {
                    raw
                },
            }),
        }
    }
}
