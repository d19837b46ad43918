use tokio::sync::mpsc;

use crate::models::Notification;

#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    #[error("notification receiver has been dropped")]
    Closed,
}

/// Accepts user-facing notifications. Preference filtering (quiet hours,
/// opt-outs, batching) belongs to whoever consumes them.
pub trait NotificationSink {
    fn deliver(&self, notification: Notification) -> Result<(), NotifyError>;
}

#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: mpsc::UnboundedSender<Notification>,
}

impl ChannelSink {
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<Notification>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl NotificationSink for ChannelSink {
    fn deliver(&self, notification: Notification) -> Result<(), NotifyError> {
        self.tx.send(notification).map_err(|_| NotifyError::Closed)
    }
}
