use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::entities::order::OrderStatus;
use crate::entities::order_media::DocumentKind;
use crate::entities::stock_txn_kind::TxnKind;
use crate::services::notifications::NotificationDispatcher;

/// Domain events emitted after a change has committed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Event {
    OrderCreated {
        order_id: Uuid,
        dealer_id: Uuid,
        order_number: String,
    },
    OrderStatusChanged {
        order_id: Uuid,
        old_status: OrderStatus,
        new_status: OrderStatus,
        actor_id: Uuid,
        comment: String,
        changed_at: DateTime<Utc>,
    },
    DocumentAttached {
        order_id: Uuid,
        document_id: Uuid,
        doc_type: DocumentKind,
    },
    StockPosted {
        ledger: String,
        stock_id: Uuid,
        kind: TxnKind,
        delta: i32,
        quantity_after: i32,
        linked_order_id: Option<Uuid>,
    },
}

impl Event {
    pub fn name(&self) -> &'static str {
        match self {
            Event::OrderCreated { .. } => "order_created",
            Event::OrderStatusChanged { .. } => "order_status_changed",
            Event::DocumentAttached { .. } => "document_attached",
            Event::StockPosted { .. } => "stock_posted",
        }
    }
}

#[derive(Debug, Clone)]
pub struct EventSender {
    sender: mpsc::Sender<Event>,
}

impl EventSender {
    /// Creates a new EventSender
    pub fn new(sender: mpsc::Sender<Event>) -> Self {
        Self { sender }
    }

    /// Hands an event to the dispatcher without waiting.
    ///
    /// A full or closed channel drops the event with a warning; the caller's
    /// committed change is unaffected.
    pub fn notify(&self, event: Event) {
        let name = event.name();
        if let Err(e) = self.sender.try_send(event) {
            metrics::counter!("order_desk.events.dropped", 1);
            warn!(event = name, error = %e, "Dropped event notification");
        }
    }
}

/// Drains the event channel into `dispatcher` until every sender is gone.
pub async fn process_events(
    mut rx: mpsc::Receiver<Event>,
    dispatcher: Arc<dyn NotificationDispatcher>,
) {
    info!("Starting event processing loop");

    while let Some(event) = rx.recv().await {
        debug!(event = event.name(), "Received event");
        if let Err(e) = dispatcher.dispatch(&event).await {
            metrics::counter!("order_desk.events.dispatch_failed", 1);
            error!(event = event.name(), error = %e, "Failed to dispatch notification");
        }
    }

    warn!("Event processing loop has ended");
}
