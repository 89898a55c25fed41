//! Server-sent events relay
//!
//! - GET /api/v1/events?topics=blog,team
//!
//! Emits a `ready` event on connect, then one unnamed message per matching
//! resource change whose data is the JSON `ResourceEvent`. Without `topics`
//! every resource is forwarded. Streams end when the relay is closed at
//! shutdown.

use axum::{
    extract::State,
    response::sse::{Event, KeepAlive, Sse},
    routing::get,
    Router,
};
use futures::stream::{self, Stream, StreamExt};
use serde::Deserialize;
use std::convert::Infallible;
use std::time::Duration;

use crate::api::middleware::{AppQuery, AppState};
use crate::relay::{parse_topics, EventRelay, Resource, ResourceEvent};

const KEEP_ALIVE_INTERVAL: Duration = Duration::from_secs(25);

#[derive(Debug, Default, Deserialize)]
pub struct EventsQuery {
    pub topics: Option<String>,
}

pub fn router() -> Router<AppState> {
    Router::new().route("/", get(subscribe))
}

async fn subscribe(
    State(state): State<AppState>,
    AppQuery(query): AppQuery<EventsQuery>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let topics = parse_topics(query.topics.as_deref());
    tracing::debug!(
        topics = ?topics,
        subscribers = state.relay.subscriber_count() + 1,
        "Relay client connected"
    );

    let initial = stream::iter(vec![Ok(Event::default().event("ready").data("{}"))]);
    let updates = matching_events(&state.relay, topics).filter_map(|ev| async move {
        match serde_json::to_string(&ev) {
            Ok(payload) => Some(Ok(Event::default().data(payload))),
            Err(e) => {
                tracing::warn!("Failed to encode relay event: {}", e);
                None
            }
        }
    });

    let keepalive = KeepAlive::new()
        .interval(KEEP_ALIVE_INTERVAL)
        .text("keep-alive");
    Sse::new(initial.chain(updates)).keep_alive(keepalive)
}

/// Relay events for the requested topics, ending when the relay closes
pub(crate) fn matching_events(
    relay: &EventRelay,
    topics: Vec<Resource>,
) -> impl Stream<Item = ResourceEvent> + Send + 'static {
    relay
        .stream()
        .take_until(relay.closed())
        .filter(move |ev| {
            let wanted = topics.is_empty() || topics.contains(&ev.resource);
            async move { wanted }
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::relay::Action;

    #[tokio::test]
    async fn test_topic_filter() {
        let relay = EventRelay::new();
        let stream = matching_events(&relay, vec![Resource::Team]);

        relay.emit(Resource::Blog, Action::Created, 1);
        relay.emit(Resource::Team, Action::Updated, 2);
        relay.emit(Resource::Executive, Action::Deleted, 3);
        relay.emit(Resource::Team, Action::Deleted, 2);

        let events: Vec<String> = stream.take(2).map(|ev| ev.event).collect().await;
        assert_eq!(events, vec!["team:updated", "team:deleted"]);
    }

    #[tokio::test]
    async fn test_no_topics_forwards_everything() {
        let relay = EventRelay::new();
        let stream = matching_events(&relay, Vec::new());

        relay.emit(Resource::Blog, Action::Created, 1);
        relay.emit(Resource::Testimonial, Action::Created, 4);

        let events: Vec<Resource> = stream.take(2).map(|ev| ev.resource).collect().await;
        assert_eq!(events, vec![Resource::Blog, Resource::Testimonial]);
    }

    #[tokio::test]
    async fn test_stream_ends_when_relay_closes() {
        let relay = EventRelay::new();
        let stream = matching_events(&relay, Vec::new());
        relay.close();

        let remaining = tokio::time::timeout(Duration::from_secs(1), stream.count())
            .await
            .expect("stream should end after close");
        assert_eq!(remaining, 0);
    }
}
