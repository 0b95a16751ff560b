use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use reqwest::{Client, StatusCode, Url};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::retry::{AttemptError, RetryPolicy};
use super::retry_after_header;
use crate::config::WebhookUrl;
use crate::error::DeliveryError;
use crate::models::DeliveryOutcome;

/// Client for Discord-style incoming webhooks
pub struct WebhookClient {
    client: Client,
    retry: RetryPolicy,
}

#[derive(Debug, Serialize)]
struct WebhookPayload<'a> {
    content: &'a str,
}

/// Body of a Discord 429 response
#[derive(Debug, Deserialize)]
struct RateLimitBody {
    retry_after: f64,
}

impl WebhookClient {
    /// Create a new webhook client
    pub fn new(timeout: Duration) -> Self {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|_| Client::new());

        Self {
            client,
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Post `message` to the webhook.
    ///
    /// Delivery is at-least-once: a retry after a lost response can post the
    /// message twice.
    pub async fn deliver(&self, message: &str, endpoint: &WebhookUrl) -> DeliveryOutcome {
        match self.send(message, endpoint).await {
            Ok(attempts) => {
                info!("Alert delivered (attempts: {})", attempts);
                DeliveryOutcome::Sent
            }
            Err(e) => {
                warn!("Alert delivery failed: {}", e);
                DeliveryOutcome::Failed(e.to_string())
            }
        }
    }

    async fn send(&self, message: &str, endpoint: &WebhookUrl) -> Result<u32, DeliveryError> {
        let url = parse_endpoint(endpoint)?;
        let payload = WebhookPayload { content: message };
        let attempts = AtomicU32::new(0);

        self.retry
            .run("webhook delivery", || {
                attempts.fetch_add(1, Ordering::Relaxed);
                self.try_send(&url, &payload)
            })
            .await
            .map_err(|failure| {
                if failure.exhausted {
                    DeliveryError::Exhausted {
                        attempts: failure.attempts,
                        last: failure.error.to_string(),
                    }
                } else {
                    failure.error
                }
            })?;

        Ok(attempts.load(Ordering::Relaxed))
    }

    async fn try_send(
        &self,
        url: &Url,
        payload: &WebhookPayload<'_>,
    ) -> Result<(), AttemptError<DeliveryError>> {
        let response = self
            .client
            .post(url.clone())
            .json(payload)
            .send()
            .await
            // The URL carries the credential; keep it out of error text
            .map_err(|e| {
                AttemptError::transient(DeliveryError::Transient(e.without_url().to_string()))
            })?;

        let status = response.status();

        if status.is_success() {
            return Ok(());
        }

        if status == StatusCode::TOO_MANY_REQUESTS {
            let header_delay = retry_after_header(response.headers());
            let body_delay = response
                .json::<RateLimitBody>()
                .await
                .ok()
                .filter(|body| body.retry_after.is_finite() && body.retry_after >= 0.0)
                .map(|body| Duration::from_secs_f64(body.retry_after));

            return Err(AttemptError::Transient {
                error: DeliveryError::Transient("HTTP 429 rate limited".to_string()),
                retry_after: header_delay.or(body_delay),
            });
        }

        if status.is_server_error() {
            return Err(AttemptError::transient(DeliveryError::Transient(format!(
                "HTTP {}",
                status.as_u16()
            ))));
        }

        let body = response.text().await.unwrap_or_default();
        Err(AttemptError::Permanent(DeliveryError::Rejected {
            status: status.as_u16(),
            body: body.chars().take(120).collect(),
        }))
    }
}

/// Validate the endpoint without echoing it back
fn parse_endpoint(endpoint: &WebhookUrl) -> Result<Url, DeliveryError> {
    let url = Url::parse(endpoint.expose())
        .map_err(|e| DeliveryError::InvalidEndpoint(e.to_string()))?;

    if !matches!(url.scheme(), "https" | "http") || url.host().is_none() {
        return Err(DeliveryError::InvalidEndpoint(format!(
            "unsupported scheme {:?} or missing host",
            url.scheme()
        )));
    }

    Ok(url)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_endpoint_rejects_garbage() {
        let err = parse_endpoint(&WebhookUrl::new("not a url")).unwrap_err();
        assert!(matches!(err, DeliveryError::InvalidEndpoint(_)));

        let err = parse_endpoint(&WebhookUrl::new("ftp://discord.test/hook")).unwrap_err();
        assert!(matches!(err, DeliveryError::InvalidEndpoint(_)));
    }

    #[test]
    fn test_parse_endpoint_error_does_not_leak_secret() {
        let err = parse_endpoint(&WebhookUrl::new("ftp://discord.test/api/webhooks/1/secret-token"))
            .unwrap_err();
        assert!(!err.to_string().contains("secret-token"));
    }

    #[test]
    fn test_payload_shape() {
        let payload = WebhookPayload { content: "No candidates found" };
        let json = serde_json::to_value(&payload).unwrap();
        assert_eq!(json, serde_json::json!({"content": "No candidates found"}));
    }
}
