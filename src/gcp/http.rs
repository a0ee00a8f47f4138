//! HTTP utilities for GCP REST API calls

use anyhow::{Context, Result};
use reqwest::{Client, RequestBuilder};
use serde_json::Value;
use std::time::Duration;

/// Maximum length of response body to log (to avoid logging sensitive data)
const MAX_LOG_BODY_LENGTH: usize = 200;

/// Per-request timeout; a hung API call would otherwise stall a crawler worker forever
const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// Sanitize response body for logging
/// Truncates long responses and strips non-printable characters
fn sanitize_for_log(body: &str) -> String {
    let truncated = if body.len() > MAX_LOG_BODY_LENGTH {
        let cut = (0..=MAX_LOG_BODY_LENGTH)
            .rev()
            .find(|i| body.is_char_boundary(*i))
            .unwrap_or(0);
        format!("{}... [truncated, {} bytes total]", &body[..cut], body.len())
    } else {
        body.to_string()
    };

    truncated.replace(|c: char| !c.is_ascii_graphic() && c != ' ', "")
}

/// HTTP client wrapper for GCP API calls
#[derive(Clone)]
pub struct GcpHttpClient {
    client: Client,
}

impl GcpHttpClient {
    /// Create a new HTTP client
    pub fn new() -> Result<Self> {
        let client = Client::builder()
            .user_agent(concat!("gcp-inventory/", env!("CARGO_PKG_VERSION")))
            .timeout(REQUEST_TIMEOUT)
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self { client })
    }

    /// Make a GET request to a GCP API
    pub async fn get(&self, url: &str, token: &str) -> Result<Value> {
        tracing::debug!("GET {}", url);
        send(self.client.get(url).bearer_auth(token)).await
    }

    /// Make a POST request to a GCP API
    ///
    /// `getIamPolicy` style calls are POSTs even though they only read.
    pub async fn post(&self, url: &str, token: &str, body: Option<&Value>) -> Result<Value> {
        tracing::debug!("POST {}", url);

        let mut request = self.client.post(url).bearer_auth(token);
        if let Some(body) = body {
            request = request.json(body);
        }

        send(request).await
    }
}

/// Send a request and decode the JSON body, mapping non-2xx statuses to errors
async fn send(request: RequestBuilder) -> Result<Value> {
    let response = request.send().await.context("Failed to send request")?;

    let status = response.status();
    let body = response
        .text()
        .await
        .context("Failed to read response body")?;

    if !status.is_success() {
        // Security: Only log sanitized/truncated error body to avoid leaking sensitive data
        tracing::error!("API error: {} - {}", status, sanitize_for_log(&body));
        return Err(anyhow::anyhow!("API request failed: {}", status));
    }

    if body.is_empty() {
        return Ok(Value::Null);
    }

    serde_json::from_str(&body).context("Failed to parse response JSON")
}

/// HTTP status carried by an `API request failed: <status>` error
fn failed_status(error: &anyhow::Error) -> Option<u16> {
    error
        .root_cause()
        .to_string()
        .strip_prefix("API request failed: ")?
        .split_whitespace()
        .next()?
        .parse()
        .ok()
}

/// Format a GCP API error for display
/// Security: Sanitizes error messages to avoid leaking sensitive API details
pub fn format_gcp_error(error: &anyhow::Error) -> String {
    // Only the root cause carries the status; contexts carry resource ids
    let message = match failed_status(error) {
        Some(403) => "Permission denied. Check the crawler's IAM permissions on the root resource.",
        Some(401) => "Authentication failed. Run 'gcloud auth application-default login'.",
        Some(404) => "Resource not found.",
        Some(429) => "Rate limit exceeded. Please try again later.",
        Some(400) => "Invalid request. Check the root resource id.",
        Some(500 | 503) => "GCP service temporarily unavailable. Please try again.",
        Some(_) => "Request failed. Check your network connection and try again.",
        None => return sanitize_chain(error),
    };
    message.to_string()
}

fn sanitize_chain(error: &anyhow::Error) -> String {
    let error_str = format!("{:#}", error);
    let sanitized = error_str
        .chars()
        .filter(|c| c.is_ascii_graphic() || *c == ' ')
        .take(120)
        .collect::<String>();

    if sanitized.len() < error_str.len() {
        format!("{}...", sanitized)
    } else {
        sanitized
    }
}
