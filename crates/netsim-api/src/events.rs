//! Server-sent events endpoint
//!
//! `GET /api/events` rebroadcasts engine events to the client. Each SSE
//! message carries the event kind as its `event:` name and the payload as
//! JSON `data:`. An optional `topic` query parameter restricts the stream to
//! a comma-separated list of kinds.

use std::collections::HashSet;
use std::convert::Infallible;

use axum::extract::{Query, State};
use axum::response::sse::{Event, KeepAlive, Sse};
use futures::{Stream, StreamExt};
use serde::Deserialize;
use tracing::{debug, warn};

use netsim_core::{EngineEvent, EventKind};

use crate::response::{ApiError, ApiResult};
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct EventsQuery {
    pub topic: Option<String>,
}

/// Parse a `topic` list such as `packet-flow,topology-changed`.
///
/// An absent or blank list selects every kind.
pub fn parse_topics(topic: Option<&str>) -> ApiResult<HashSet<EventKind>> {
    let Some(topic) = topic.map(str::trim).filter(|t| !t.is_empty()) else {
        return Ok(EventKind::ALL.into_iter().collect());
    };
    topic
        .split(',')
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(|t| t.parse::<EventKind>().map_err(|_| ApiError::validation(format!("unknown topic: {t}"))))
        .collect()
}

/// Render an engine event as an SSE message
pub fn to_sse_event(event: &EngineEvent) -> Result<Event, axum::Error> {
    let sse = Event::default().event(event.kind().as_str());
    match event {
        EngineEvent::TopologyChanged(payload) => sse.json_data(payload),
        EngineEvent::DeviceStatusChanged(payload) => sse.json_data(payload),
        EngineEvent::PacketFlow(payload) => sse.json_data(payload),
        EngineEvent::SimulationStateChanged(payload) => sse.json_data(payload),
    }
}

/// Handler for `GET /api/events`
pub async fn event_stream(
    State(state): State<AppState>,
    Query(query): Query<EventsQuery>,
) -> ApiResult<Sse<impl Stream<Item = Result<Event, Infallible>>>> {
    let topics = parse_topics(query.topic.as_deref())?;
    debug!(topics = topics.len(), "Event stream opened");

    let stream = state
        .engine
        .event_stream()
        .filter(move |event| futures::future::ready(topics.contains(&event.kind())))
        .filter_map(|event| async move {
            match to_sse_event(&event) {
                Ok(sse) => Some(Ok(sse)),
                Err(e) => {
                    warn!(event_kind = %event.kind(), error = %e, "Dropping unserializable event");
                    None
                }
            }
        });

    Ok(Sse::new(stream).keep_alive(KeepAlive::default()))
}
