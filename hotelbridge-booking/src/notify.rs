use hotelbridge_core::notification::{notification_for, Notifier};
use hotelbridge_core::Transaction;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;
use tracing::{debug, warn};

/// Fire-and-forget delivery of guest notifications.
#[derive(Clone)]
pub struct NotificationDispatcher {
    notifier: Arc<dyn Notifier>,
    timeout: Duration,
}

impl NotificationDispatcher {
    pub fn new(notifier: Arc<dyn Notifier>, timeout: Duration) -> Self {
        Self { notifier, timeout }
    }

    /// Spawns delivery for `txn` if its status calls for a message.
    /// Failures are logged and never reach the caller.
    pub fn dispatch(&self, txn: &Transaction) {
        let Some(notification) = notification_for(txn) else {
            return;
        };

        let notifier = self.notifier.clone();
        let limit = self.timeout;
        tokio::spawn(async move {
            match timeout(limit, notifier.notify(&notification)).await {
                Ok(Ok(())) => debug!(transaction_id = %notification.transaction_id, "Notification delivered"),
                Ok(Err(e)) => warn!(
                    transaction_id = %notification.transaction_id,
                    "Notification failed, ignoring: {}", e
                ),
                Err(_) => warn!(
                    transaction_id = %notification.transaction_id,
                    "Notification timed out after {:?}, ignoring", limit
                ),
            }
        });
    }
}
