//! Forward payment webhooks to an external function.
//!
//! The request is wrapped in an API-Gateway-style event and POSTed to the
//! function URL; the function's `{statusCode, headers, body}` reply is
//! replayed to the caller.

use std::collections::HashMap;
use std::time::Duration;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, instrument};

const USER_AGENT: &str = "EcommerceApp-WebhookProxy/1.0";
/// Upper bound on one forwarded call.
pub const PROXY_TIMEOUT: Duration = Duration::from_secs(30);

/// Errors forwarding to the function.
#[derive(Debug, Error)]
pub enum ProxyError {
    #[error("Failed to contact Lambda function: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("Invalid Lambda response format: {0}")]
    InvalidResponse(#[from] serde_json::Error),
}

/// Event sent to the function.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LambdaEvent {
    pub http_method: String,
    pub path: String,
    pub query_string_parameters: HashMap<String, String>,
    pub headers: HashMap<String, String>,
    pub body: String,
    pub is_base64_encoded: bool,
}

impl LambdaEvent {
    /// Build an event from request parts. Non-UTF-8 bodies are base64 encoded.
    #[must_use]
    pub fn new(
        method: &str,
        path: &str,
        query: HashMap<String, String>,
        headers: HashMap<String, String>,
        body: &[u8],
    ) -> Self {
        let (body, is_base64_encoded) = match std::str::from_utf8(body) {
            Ok(text) => (text.to_owned(), false),
            Err(_) => (STANDARD.encode(body), true),
        };
        Self {
            http_method: method.to_owned(),
            path: path.to_owned(),
            query_string_parameters: query,
            headers,
            body,
            is_base64_encoded,
        }
    }
}

/// Reply returned by the function.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LambdaResponse {
    pub status_code: u16,
    #[serde(default)]
    pub headers: HashMap<String, String>,
    #[serde(default)]
    pub body: String,
}

/// POST `event` to `url` and decode the function's reply.
///
/// # Errors
///
/// Returns `ProxyError::Transport` when the call fails and
/// `ProxyError::InvalidResponse` when the reply is not a `LambdaResponse`.
#[instrument(skip(client, event), fields(path = %event.path))]
pub async fn forward(
    client: &reqwest::Client,
    url: &str,
    event: &LambdaEvent,
) -> Result<LambdaResponse, ProxyError> {
    let response = client
        .post(url)
        .header(reqwest::header::USER_AGENT, USER_AGENT)
        .timeout(PROXY_TIMEOUT)
        .json(event)
        .send()
        .await?;

    let bytes = response.bytes().await?;
    let reply: LambdaResponse = serde_json::from_slice(&bytes)?;
    debug!(status = reply.status_code, "Lambda replied");
    Ok(reply)
}
