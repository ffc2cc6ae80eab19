use axum::extract::{Query, State};
use axum::{Extension, Json};
use beads_protocol::TopicFilter;
use serde::{Deserialize, Serialize};

use crate::api::error::ApiError;
use crate::auth::AuthContext;
use crate::event_bus::{HubStats, LedgerRecord};
use crate::{Broadcaster, Ledger};

const DEFAULT_LIMIT: usize = 100;
const MAX_LIMIT: usize = 1000;

// ============================================================================
// Query Parameters
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct EventQueryParams {
    /// Starting cursor (returns records with id > this value)
    #[serde(default)]
    pub after: i64,

    /// Topic patterns to filter (comma-separated, e.g. "beads.bead.*,beads.comment.added")
    pub topics: Option<String>,

    /// Max records to return (default: 100, max: 1000)
    pub limit: Option<usize>,
}

impl EventQueryParams {
    fn limit(&self) -> usize {
        self.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT)
    }
}

#[derive(Debug, Serialize)]
pub struct EventQueryResponse {
    pub events: Vec<LedgerRecord>,
    pub next_cursor: i64,
}

// ============================================================================
// HTTP Handlers
// ============================================================================

/// GET /api/events
/// Page through the durable ledger with cursor-based pagination
pub async fn query_events(
    Extension(auth): Extension<AuthContext>,
    State(ledger): State<Ledger>,
    Query(params): Query<EventQueryParams>,
) -> Result<Json<EventQueryResponse>, ApiError> {
    auth.require_auth().map_err(|_| ApiError::unauthorized())?;

    let topics = params
        .topics
        .as_deref()
        .map(TopicFilter::parse)
        .unwrap_or_default();

    let events = ledger
        .query(params.after, &topics, params.limit())
        .await
        .map_err(|e| ApiError::internal(e.to_string()))?;

    let next_cursor = events.last().map(|e| e.id).unwrap_or(params.after);

    Ok(Json(EventQueryResponse { events, next_cursor }))
}

/// GET /api/events/stats
/// Live hub diagnostics (process-local)
pub async fn hub_stats(
    Extension(auth): Extension<AuthContext>,
    State(hub): State<Broadcaster>,
) -> Result<Json<HubStats>, ApiError> {
    auth.require_auth().map_err(|_| ApiError::unauthorized())?;

    Ok(Json(hub.stats()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(limit: Option<usize>) -> EventQueryParams {
        EventQueryParams {
            after: 0,
            topics: None,
            limit,
        }
    }

    #[test]
    fn test_limit_defaults_and_clamps() {
        assert_eq!(params(None).limit(), 100);
        assert_eq!(params(Some(5)).limit(), 5);
        assert_eq!(params(Some(0)).limit(), 1);
        assert_eq!(params(Some(50_000)).limit(), 1000);
    }
}
