use crate::error::{AppError, AppResult};
use crate::models::PushNotification;
use crate::ports::MessagingProducer;
use async_trait::async_trait;
use tokio::sync::mpsc::{self, Receiver, Sender};

/// In-process producer: notifications go to a bounded tokio channel that
/// another task (or a test) drains.
#[derive(Clone)]
pub struct ChannelProducer {
    sender: Sender<PushNotification>,
}

impl ChannelProducer {
    pub fn new(capacity: usize) -> (Self, Receiver<PushNotification>) {
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        (Self { sender }, receiver)
    }
}

#[async_trait]
impl MessagingProducer for ChannelProducer {
    async fn publish_push_notification(&self, message: PushNotification) -> AppResult<()> {
        self.sender
            .send(message)
            .await
            .map_err(|e| AppError::publish(format!("Notification receiver dropped: {}", e.0.instance_id)))
    }
}
