//! Best-effort dual dispatch of order events.
//!
//! Two sinks, both optional and both fire-and-forget:
//! - a process-local broadcast feed watched by live subscribers (the
//!   operations dashboard);
//! - an external admin webhook, posted from a detached task with a
//!   short timeout.
//!
//! No retries, no queue, no ordering guarantee between the sinks or
//! across orders in flight. `publish` never returns an error.

use super::Event;
use serde_json::json;
use std::time::Duration;
use tokio::sync::broadcast;
use tracing::{debug, warn};

const LIVE_FEED_CAPACITY: usize = 256;

/// Process-local registry of live subscribers. Broadcast-only: slow
/// receivers lag and drop messages rather than applying backpressure.
#[derive(Debug, Clone)]
pub struct LiveFeed {
    tx: broadcast::Sender<Event>,
}

impl LiveFeed {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(LIVE_FEED_CAPACITY);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.tx.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    fn broadcast(&self, event: &Event) {
        // Err means no subscribers are currently listening; that is a
        // no-op, not a failure.
        if self.tx.send(event.clone()).is_err() {
            debug!("no live subscribers for order event");
        }
    }
}

impl Default for LiveFeed {
    fn default() -> Self {
        Self::new()
    }
}

/// Outbound webhook sink for an external admin system.
#[derive(Debug, Clone)]
pub struct WebhookSink {
    url: String,
    client: reqwest::Client,
}

impl WebhookSink {
    pub fn new(url: String, timeout: Duration) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_default();
        Self { url, client }
    }

    /// Posts `{ order, event?, return_context? }`. Detached: the caller
    /// never waits on the request and never sees its outcome.
    fn dispatch(&self, event: &Event) {
        let mut body = json!({ "order": event.order() });
        if let Some(tag) = event.tag() {
            body["event"] = json!(tag);
        }
        if let Event::OrderStatusChanged {
            return_context: Some(ctx),
            ..
        } = event
        {
            body["user_id"] = json!(ctx.user_id);
            body["address"] = json!(ctx.address);
        }

        let url = self.url.clone();
        let client = self.client.clone();
        let order_id = event.order().id;

        tokio::spawn(async move {
            match client.post(&url).json(&body).send().await {
                Ok(resp) if resp.status().is_success() => {
                    debug!(order_id = %order_id, "order webhook delivered");
                }
                Ok(resp) => {
                    warn!(
                        order_id = %order_id,
                        status = %resp.status(),
                        "order webhook rejected"
                    );
                }
                Err(e) => {
                    warn!(order_id = %order_id, error = %e, "order webhook failed");
                }
            }
        });
    }
}

/// The fan-out itself: forwards one event to every configured sink.
#[derive(Debug, Clone, Default)]
pub struct OrderFanout {
    live: Option<LiveFeed>,
    webhook: Option<WebhookSink>,
}

impl OrderFanout {
    pub fn new(live: Option<LiveFeed>, webhook: Option<WebhookSink>) -> Self {
        Self { live, webhook }
    }

    /// Dispatches to all sinks. Infallible by contract: sink failures
    /// are logged inside the sinks and never reach the caller.
    pub fn publish(&self, event: &Event) {
        if let Some(live) = &self.live {
            live.broadcast(event);
        }
        if let Some(webhook) = &self.webhook {
            webhook.dispatch(event);
        }
    }
}
