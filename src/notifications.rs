use anyhow::Result;
use async_trait::async_trait;
use uuid::Uuid;

/// Message fanned out by an admin broadcast, after it has been stored for
/// every recipient.
#[derive(Debug, Clone)]
pub struct Broadcast {
    pub title: String,
    pub message: String,
    pub recipients: Vec<Uuid>,
    pub sent_by: Uuid,
}

#[async_trait]
pub trait NotificationBroadcaster: Send + Sync + 'static {
    async fn broadcast(&self, broadcast: &Broadcast) -> Result<()>;
}

/// Delivery stub: records the broadcast in the log and nothing else.
#[derive(Debug, Default)]
pub struct LogBroadcaster;

#[async_trait]
impl NotificationBroadcaster for LogBroadcaster {
    async fn broadcast(&self, broadcast: &Broadcast) -> Result<()> {
        tracing::info!(
            component = "notifications",
            title = %broadcast.title,
            recipients = broadcast.recipients.len(),
            sent_by = %broadcast.sent_by,
            "broadcast notification"
        );
        Ok(())
    }
}
