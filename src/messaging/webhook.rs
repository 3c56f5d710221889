use crate::error::{AppError, AppResult};
use crate::http_config::HttpConfig;
use crate::models::PushNotification;
use crate::ports::MessagingProducer;
use crate::utils::retry::{retry_with_exponential_backoff, RetryConfig};
use async_trait::async_trait;
use log::{debug, warn};
use reqwest::Client;
use url::Url;

/// Validates a push gateway URL. HTTPS is required except for loopback
/// hosts, which are accepted for local gateways.
pub fn validate_webhook_url(webhook_url: &str) -> AppResult<Url> {
    if webhook_url.trim().is_empty() {
        return Err(AppError::config("Webhook URL cannot be empty"));
    }

    let parsed_url =
        Url::parse(webhook_url).map_err(|e| AppError::config(format!("Invalid webhook URL format: {}", e)))?;

    let host = parsed_url
        .host_str()
        .filter(|host| !host.is_empty())
        .ok_or_else(|| AppError::config(format!("Webhook URL '{}' has no host", webhook_url)))?;
    let loopback = host == "localhost" || host == "127.0.0.1" || host == "[::1]";

    match parsed_url.scheme() {
        "https" => {}
        "http" if loopback => {
            warn!("Webhook URL uses plain HTTP on a loopback host: {}", webhook_url);
        }
        scheme => {
            return Err(AppError::config(format!(
                "Webhook URL must use HTTPS, got '{}://'",
                scheme
            )));
        }
    }

    Ok(parsed_url)
}

/// Posts each notification as JSON to a push gateway, retrying transient
/// failures with exponential backoff.
pub struct WebhookProducer {
    client: Client,
    endpoint: Url,
    retry: RetryConfig,
}

impl WebhookProducer {
    pub fn new(webhook_url: &str, http: &HttpConfig) -> AppResult<Self> {
        Ok(Self {
            client: http.build_client()?,
            endpoint: validate_webhook_url(webhook_url)?,
            retry: http.to_retry_config(),
        })
    }
}

#[async_trait]
impl MessagingProducer for WebhookProducer {
    async fn publish_push_notification(&self, message: PushNotification) -> AppResult<()> {
        retry_with_exponential_backoff(&self.retry, || {
            let request = self.client.post(self.endpoint.clone()).json(&message);
            async move {
                let response = request.send().await?;
                let status = response.status();
                if status.is_success() {
                    Ok(())
                } else {
                    Err(AppError::publish(format!("Push gateway returned {}", status.as_u16())))
                }
            }
        })
        .await?;

        debug!("Delivered reminder for {} to push gateway", message.instance_id);
        Ok(())
    }
}
