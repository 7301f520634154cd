//! Order lifecycle events.
//!
//! Services push typed events into an in-process channel; a background
//! dispatcher forwards each one to the fan-out sinks (live subscriber
//! feed and external webhook). Both sinks are best-effort: a fan-out
//! failure is logged and swallowed, it never alters the outcome of the
//! operation that produced the event.
//!
//! The channel is deliberately the only coupling between the services
//! and the sinks, so a durable outbox can replace the in-memory queue
//! without touching the core logic.

use crate::entities::{address, order};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{info, warn};
use uuid::Uuid;

pub mod fanout;

pub use fanout::{LiveFeed, OrderFanout, WebhookSink};

/// Extra context attached to return-class transitions: downstream
/// observers handling a return need the customer and the pickup
/// address, not just the order row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReturnContext {
    pub user_id: Uuid,
    pub address: Option<address::Model>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Event {
    OrderCreated {
        order: order::Model,
    },
    OrderStatusChanged {
        order: order::Model,
        old_status: String,
        new_status: String,
        return_context: Option<ReturnContext>,
    },
}

impl Event {
    pub fn order(&self) -> &order::Model {
        match self {
            Event::OrderCreated { order } => order,
            Event::OrderStatusChanged { order, .. } => order,
        }
    }

    /// Event tag carried to the webhook for return-class transitions.
    pub fn tag(&self) -> Option<&str> {
        match self {
            Event::OrderStatusChanged { new_status, .. }
                if new_status.starts_with("return_") =>
            {
                Some(new_status)
            }
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct EventSender {
    sender: mpsc::Sender<Event>,
}

impl EventSender {
    pub fn new(sender: mpsc::Sender<Event>) -> Self {
        Self { sender }
    }

    /// Sends an event to the dispatcher. The error is a plain string:
    /// callers log it and move on, a full channel must never fail the
    /// triggering operation.
    pub async fn send(&self, event: Event) -> Result<(), String> {
        self.sender
            .send(event)
            .await
            .map_err(|e| format!("failed to enqueue event: {}", e))
    }
}

/// Builds the event channel with the configured capacity.
pub fn channel(capacity: usize) -> (EventSender, mpsc::Receiver<Event>) {
    let (tx, rx) = mpsc::channel(capacity);
    (EventSender::new(tx), rx)
}

/// Dispatcher loop: drains the channel and hands every event to the
/// fan-out sinks. Runs until all senders are dropped.
pub async fn process_events(mut rx: mpsc::Receiver<Event>, fanout: OrderFanout) {
    info!("starting order event dispatcher");

    while let Some(event) = rx.recv().await {
        fanout.publish(&event);
    }

    warn!("order event dispatcher stopped: all senders dropped");
}
