use async_trait::async_trait;
use tracing::info;

use crate::events::Event;

#[derive(Debug, thiserror::Error)]
pub enum NotificationError {
    #[error("Notification delivery failed: {0}")]
    Delivery(String),
}

/// Delivers committed domain events to whoever needs to hear about them
/// (dealer e-mail, internal chat, webhooks).
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait NotificationDispatcher: Send + Sync {
    async fn dispatch(&self, event: &Event) -> Result<(), NotificationError>;
}

/// Dispatcher that records each event in the log.
#[derive(Debug, Default, Clone)]
pub struct LogDispatcher;

#[async_trait]
impl NotificationDispatcher for LogDispatcher {
    async fn dispatch(&self, event: &Event) -> Result<(), NotificationError> {
        match event {
            Event::OrderStatusChanged {
                order_id,
                old_status,
                new_status,
                actor_id,
                ..
            } => info!(
                order_id = %order_id,
                from = %old_status,
                to = %new_status,
                actor_id = %actor_id,
                "Order status changed"
            ),
            Event::StockPosted {
                ledger,
                stock_id,
                kind,
                delta,
                quantity_after,
                ..
            } => info!(
                ledger = %ledger,
                stock_id = %stock_id,
                kind = %kind,
                delta,
                quantity_after,
                "Stock posted"
            ),
            other => info!(event = other.name(), "Notification"),
        }
        Ok(())
    }
}
