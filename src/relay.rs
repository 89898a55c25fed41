//! Resource change relay
//!
//! Services publish a `ResourceEvent` after every successful mutation and the
//! SSE endpoint fans them out to connected browsers. Delivery is best effort:
//! with no subscribers the event is dropped, and a lagging subscriber skips
//! whatever it missed.

use chrono::{DateTime, Utc};
use futures::stream::{BoxStream, StreamExt};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::future::Future;
use std::str::FromStr;
use std::sync::Arc;
use tokio::sync::{broadcast, watch};
use tokio_stream::wrappers::BroadcastStream;

/// Channel capacity
pub const RELAY_CAPACITY: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Resource {
    Blog,
    Team,
    Executive,
    Testimonial,
}

impl Resource {
    pub fn as_str(&self) -> &'static str {
        match self {
            Resource::Blog => "blog",
            Resource::Team => "team",
            Resource::Executive => "executive",
            Resource::Testimonial => "testimonial",
        }
    }
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Resource {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "blog" => Ok(Resource::Blog),
            "team" => Ok(Resource::Team),
            "executive" | "executives" => Ok(Resource::Executive),
            "testimonial" | "testimonials" => Ok(Resource::Testimonial),
            _ => Err(anyhow::anyhow!("Unknown resource: {}", s)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    Created,
    Updated,
    Deleted,
}

impl Action {
    pub fn as_str(&self) -> &'static str {
        match self {
            Action::Created => "created",
            Action::Updated => "updated",
            Action::Deleted => "deleted",
        }
    }
}

/// Payload pushed to subscribers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceEvent {
    /// `"<resource>:<action>"`, e.g. `blog:created`
    pub event: String,
    pub resource: Resource,
    pub action: Action,
    pub id: i64,
    pub timestamp: DateTime<Utc>,
}

impl ResourceEvent {
    pub fn new(resource: Resource, action: Action, id: i64) -> Self {
        Self {
            event: format!("{}:{}", resource, action.as_str()),
            resource,
            action,
            id,
            timestamp: Utc::now(),
        }
    }
}

#[derive(Clone)]
pub struct EventRelay {
    sender: broadcast::Sender<ResourceEvent>,
    /// Flipped once when the server starts shutting down
    closing: Arc<watch::Sender<bool>>,
}

impl EventRelay {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(RELAY_CAPACITY);
        let (closing, _) = watch::channel(false);
        Self {
            sender,
            closing: Arc::new(closing),
        }
    }

    /// Ask every open subscription stream to finish
    pub fn close(&self) {
        self.closing.send_replace(true);
        tracing::info!(subscribers = self.subscriber_count(), "Relay closing");
    }

    pub fn is_closed(&self) -> bool {
        *self.closing.borrow()
    }

    /// Resolves once [`EventRelay::close`] has been called, immediately if it
    /// already was
    pub fn closed(&self) -> impl Future<Output = ()> + Send + 'static {
        let mut rx = self.closing.subscribe();
        async move {
            loop {
                let closing = *rx.borrow_and_update();
                // An error means the sender is gone, which only happens at teardown
                if closing || rx.changed().await.is_err() {
                    return;
                }
            }
        }
    }

    /// Fire and forget
    pub fn publish(&self, event: ResourceEvent) {
        match self.sender.send(event) {
            Ok(receivers) => {
                tracing::debug!(receivers, "Relayed resource event");
            }
            Err(broadcast::error::SendError(event)) => {
                tracing::trace!(event = %event.event, "No relay subscribers");
            }
        }
    }

    pub fn emit(&self, resource: Resource, action: Action, id: i64) {
        self.publish(ResourceEvent::new(resource, action, id));
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ResourceEvent> {
        self.sender.subscribe()
    }

    /// Subscription as a stream, skipping lagged positions
    pub fn stream(&self) -> BoxStream<'static, ResourceEvent> {
        BroadcastStream::new(self.sender.subscribe())
            .filter_map(|evt| async move {
                match evt {
                    Ok(event) => Some(event),
                    Err(e) => {
                        tracing::debug!("Relay subscriber lagged: {}", e);
                        None
                    }
                }
            })
            .boxed()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventRelay {
    fn default() -> Self {
        Self::new()
    }
}

/// Parse a `topics=blog,team` filter. Unknown names are ignored; an empty
/// result means every resource.
pub fn parse_topics(raw: Option<&str>) -> Vec<Resource> {
    let mut topics: Vec<Resource> = raw
        .unwrap_or_default()
        .split(',')
        .filter_map(|t| t.parse().ok())
        .collect();
    topics.dedup();
    topics
}
