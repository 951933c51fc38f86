//! Outbound webhook transport.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use reqwest::header::{CONTENT_TYPE, HeaderMap, HeaderValue};
use tracing::{debug, warn};

use crate::utils::http_client::build_client;
use crate::{Error, Result};

/// Value of the `X-Webhook-Source` header.
pub const WEBHOOK_SOURCE: &str = "task-management-api";

/// Longest response body excerpt carried into an error.
const MAX_ERROR_BODY_CHARS: usize = 500;

/// One signed delivery attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WebhookRequest {
    /// Canonical JSON body; `signature` covers exactly these bytes.
    pub body: String,
    pub signature: String,
    /// 1-based outer attempt number.
    pub attempt: u32,
}

/// Sends a signed webhook. Non-2xx responses are errors.
#[async_trait]
pub trait WebhookTransport: Send + Sync {
    async fn send(&self, request: &WebhookRequest) -> Result<()>;
}

/// Settings of the HTTP transport.
#[derive(Debug, Clone)]
pub struct HttpTransportConfig {
    pub url: String,
    /// Per-call timeout.
    pub timeout: Duration,
    /// Extra tries after a connection-level failure.
    pub connect_retries: u32,
    pub connect_retry_delay: Duration,
}

impl HttpTransportConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            timeout: Duration::from_secs(30),
            connect_retries: 1,
            connect_retry_delay: Duration::from_millis(500),
        }
    }
}

/// reqwest-backed [`WebhookTransport`].
///
/// Only failures to connect are retried here. An HTTP error response is
/// returned at once so the breaker and the outer retry see it.
pub struct HttpTransport {
    config: HttpTransportConfig,
    client: Client,
}

impl HttpTransport {
    pub fn new(config: HttpTransportConfig) -> Self {
        let client = build_client(config.timeout);
        Self { config, client }
    }

    fn build_headers(request: &WebhookRequest) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(
            "x-signature",
            HeaderValue::from_str(&request.signature)
                .map_err(|e| Error::Other(format!("invalid signature header value: {e}")))?,
        );
        headers.insert("x-webhook-source", HeaderValue::from_static(WEBHOOK_SOURCE));
        headers.insert("x-attempt", HeaderValue::from(request.attempt));
        Ok(headers)
    }
}

#[async_trait]
impl WebhookTransport for HttpTransport {
    async fn send(&self, request: &WebhookRequest) -> Result<()> {
        let headers = Self::build_headers(request)?;
        let mut tries = 0u32;

        loop {
            tries += 1;
            let sent = self
                .client
                .post(&self.config.url)
                .headers(headers.clone())
                .body(request.body.clone())
                .send()
                .await;

            match sent {
                Ok(response) if response.status().is_success() => {
                    debug!(
                        status = response.status().as_u16(),
                        attempt = request.attempt,
                        "Webhook accepted"
                    );
                    return Ok(());
                }
                Ok(response) => {
                    let status = response.status();
                    let body = response.text().await.unwrap_or_default();
                    let excerpt: String = body.chars().take(MAX_ERROR_BODY_CHARS).collect();
                    return Err(Error::downstream(Some(status.as_u16()), excerpt));
                }
                Err(e) if e.is_connect() && tries <= self.config.connect_retries => {
                    warn!(
                        error = %e,
                        url = %self.config.url,
                        "Webhook connection failed, retrying"
                    );
                    tokio::time::sleep(self.config.connect_retry_delay).await;
                }
                Err(e) => {
                    return Err(Error::downstream(
                        e.status().map(|s| s.as_u16()),
                        format!("request failed after {tries} tries: {e}"),
                    ));
                }
            }
        }
    }
}
