// Push notification producers
// The sweep hands every reminder to one of these.

use crate::config::EngineConfig;
use crate::error::AppResult;
use crate::http_config::HttpConfig;
use crate::models::PushNotification;
use crate::ports::MessagingProducer;
use async_trait::async_trait;
use log::info;
use std::sync::Arc;

pub mod channel;
pub mod webhook;

pub use channel::ChannelProducer;
pub use webhook::WebhookProducer;

/// Writes notifications to the log. Used when no gateway is configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogProducer;

#[async_trait]
impl MessagingProducer for LogProducer {
    async fn publish_push_notification(&self, message: PushNotification) -> AppResult<()> {
        let payload = serde_json::to_string(&message)?;
        info!("[Push] {}", payload);
        Ok(())
    }
}

/// Webhook producer when a URL is configured, log producer otherwise.
pub fn producer_from_config(config: &EngineConfig) -> AppResult<Arc<dyn MessagingProducer>> {
    match &config.webhook_url {
        Some(url) => {
            info!("Publishing push notifications to {}", url);
            Ok(Arc::new(WebhookProducer::new(url, &HttpConfig::push_gateway())?))
        }
        None => {
            info!("No webhook configured; push notifications will be logged");
            Ok(Arc::new(LogProducer))
        }
    }
}
