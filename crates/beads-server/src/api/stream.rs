//! Server-sent-events stream of live bead events
//!
//! Each connection registers a hub subscriber, replays retained history when
//! the client sends `Last-Event-ID`, then forwards live events interleaved
//! with keepalive comments until the client goes away.

use std::collections::VecDeque;
use std::convert::Infallible;

use axum::body::Body;
use axum::extract::{Query, State};
use axum::http::header::{CACHE_CONTROL, CONNECTION, CONTENT_TYPE};
use axum::http::{HeaderMap, StatusCode};
use axum::response::Response;
use axum::Extension;
use beads_protocol::frame::encode_event;
use beads_protocol::{StreamFrame, TopicFilter};
use serde::Deserialize;
use tokio::time::{interval_at, Instant, Interval, MissedTickBehavior};
use tracing::{debug, info, trace, warn};

use crate::api::error::ApiError;
use crate::auth::AuthContext;
use crate::config::Settings;
use crate::event_bus::{Hub, HubEvent, Subscription};
use crate::Broadcaster;

pub const LAST_EVENT_ID: &str = "last-event-id";

/// Stream subscription parameters
#[derive(Debug, Deserialize)]
pub struct StreamParams {
    /// Topic patterns (comma-separated, supports `*` and `>`), absent means everything
    pub topics: Option<String>,

    /// Optional token for clients that cannot set headers (EventSource)
    pub token: Option<String>,
}

/// Sequence the client says it has already seen, if it sent a usable one
fn last_event_id(headers: &HeaderMap) -> Option<u64> {
    headers
        .get(LAST_EVENT_ID)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse().ok())
}

/// Retained events after `last_id` that pass `filter`, plus the highest
/// sequence the snapshot covered.
///
/// The mark comes only from the snapshot, never from `last_id`: a client id
/// from before a restart says nothing about this process's sequences.
fn replay_snapshot(hub: &Hub, filter: &TopicFilter, last_id: u64) -> (VecDeque<HubEvent>, u64) {
    let history = hub.events_since(last_id);
    let replayed_through = history.last().map_or(0, |e| e.sequence);
    let replay = history
        .into_iter()
        .filter(|e| filter.matches(&e.topic))
        .collect();
    (replay, replayed_through)
}

/// GET /api/events/stream
/// Subscribe to live events as `text/event-stream`
///
/// Query Parameters:
/// - topics: Comma-separated topic patterns (e.g., "beads.bead.*,beads.comment.>")
/// - token: Bearer token fallback for browser clients
///
/// Example:
/// ```text
/// curl -N -H 'Last-Event-ID: 41' 'http://localhost:8080/api/events/stream?topics=beads.bead.*'
/// ```
pub async fn stream_events(
    Extension(auth): Extension<AuthContext>,
    State(hub): State<Broadcaster>,
    State(settings): State<Settings>,
    Query(params): Query<StreamParams>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    let query_authenticated = params
        .token
        .as_deref()
        .is_some_and(|t| settings.token_matches(t));
    if !auth.is_authenticated() && !query_authenticated {
        warn!("Unauthorized event stream connection");
        return Err(ApiError::unauthorized());
    }

    let filter = params
        .topics
        .as_deref()
        .map(TopicFilter::parse)
        .unwrap_or_default();
    let subscription = hub.subscribe(filter);

    // Replay is taken after subscribing so nothing falls between the two.
    let (replay, replayed_through) = match last_event_id(&headers) {
        Some(last_id) => {
            let (replay, replayed_through) = replay_snapshot(&hub, subscription.filter(), last_id);
            debug!(
                subscriber_id = %subscription.id(),
                last_event_id = last_id,
                replayed = replay.len(),
                "Replaying retained events"
            );
            (replay, replayed_through)
        }
        None => (VecDeque::new(), 0),
    };

    info!(
        subscriber_id = %subscription.id(),
        topics = ?subscription.filter().patterns(),
        "Event stream connection established"
    );

    let period = settings.stream.keepalive_interval();
    let mut keepalive = interval_at(Instant::now() + period, period);
    keepalive.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let connection = StreamConnection {
        subscription,
        replay,
        replayed_through,
        keepalive,
    };

    let frames = futures_util::stream::unfold(connection, |mut connection| async move {
        let frame = connection.next_frame().await?;
        Some((Ok::<_, Infallible>(frame), connection))
    });

    Response::builder()
        .status(StatusCode::OK)
        .header(CONTENT_TYPE, "text/event-stream")
        .header(CACHE_CONTROL, "no-cache")
        .header(CONNECTION, "keep-alive")
        .header("x-accel-buffering", "no")
        .body(Body::from_stream(frames))
        .map_err(|e| ApiError::internal(e.to_string()))
}

/// Per-connection stream state; dropping it unsubscribes from the hub
struct StreamConnection {
    subscription: Subscription,
    replay: VecDeque<HubEvent>,
    /// Live events at or below this sequence were covered by replay
    replayed_through: u64,
    keepalive: Interval,
}

impl StreamConnection {
    async fn next_frame(&mut self) -> Option<String> {
        if let Some(event) = self.replay.pop_front() {
            return Some(encode_event(event.sequence, &event.topic, &event.data));
        }

        loop {
            tokio::select! {
                event = self.subscription.recv() => {
                    let event = event?;
                    if event.sequence <= self.replayed_through {
                        trace!(sequence = event.sequence, "Skipping event already replayed");
                        continue;
                    }
                    return Some(encode_event(event.sequence, &event.topic, &event.data));
                }
                _ = self.keepalive.tick() => {
                    return Some(StreamFrame::Keepalive.encode());
                }
            }
        }
    }
}

impl Drop for StreamConnection {
    fn drop(&mut self) {
        info!(subscriber_id = %self.subscription.id(), "Event stream connection closed");
    }
}
