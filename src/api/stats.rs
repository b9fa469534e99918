use crate::api::errors::ApiError;
use crate::event::VisitEvent;
use crate::ingest::handler::AppState;
use crate::query::aggregate::{self, AggregateStats, Filters};
use crate::query::window::DateRange;
use axum::extract::{Query, State};
use axum::Json;
use chrono::{FixedOffset, Local, Utc};
use serde::Deserialize;
use std::sync::Arc;

/// Largest accepted distance from UTC, in minutes (UTC+14:00).
const MAX_UTC_OFFSET_MINUTES: i32 = 14 * 60;

/// Query parameters for `GET /api/admin/stats`.
#[derive(Debug, Deserialize)]
pub struct StatsParams {
    #[serde(default)]
    pub range: DateRange,
    pub page: Option<String>,
    /// Viewer's offset from UTC. Server local time when absent.
    pub utc_offset_minutes: Option<i32>,
}

impl StatsParams {
    /// Resolve the viewer's time zone offset.
    pub fn offset(&self) -> Result<Option<FixedOffset>, ApiError> {
        let Some(minutes) = self.utc_offset_minutes else {
            return Ok(None);
        };
        if minutes.abs() > MAX_UTC_OFFSET_MINUTES {
            return Err(ApiError::BadRequest(format!(
                "utc_offset_minutes must be within ±{MAX_UTC_OFFSET_MINUTES}"
            )));
        }
        FixedOffset::east_opt(minutes * 60)
            .map(Some)
            .ok_or_else(|| ApiError::BadRequest("Invalid utc_offset_minutes".to_string()))
    }
}

/// Full event set, served from the snapshot cache when fresh.
async fn load_events(state: &Arc<AppState>) -> Result<Arc<Vec<VisitEvent>>, ApiError> {
    if let Some(cached) = state.snapshot.get() {
        return Ok(cached);
    }

    let generation = state.snapshot.generation();
    let state2 = Arc::clone(state);
    let events = tokio::task::spawn_blocking(move || state2.log.load_all())
        .await
        .map_err(|e| ApiError::Internal(format!("Load task panicked: {e}")))??;

    let events = Arc::new(events);
    if state.snapshot.insert_if_current(Arc::clone(&events), generation) {
        tracing::debug!(count = events.len(), "Loaded visit log snapshot");
    } else {
        tracing::debug!("Visit log changed during load, snapshot not cached");
    }
    Ok(events)
}

/// GET /api/admin/stats: Dashboard aggregates for a range and optional page.
pub async fn get_stats(
    State(state): State<Arc<AppState>>,
    Query(params): Query<StatsParams>,
) -> Result<Json<AggregateStats>, ApiError> {
    let offset = params.offset()?;
    let filters = Filters::new(params.range, params.page.as_deref());
    let events = load_events(&state).await?;

    let stats = match offset {
        Some(offset) => aggregate::aggregate(&events, &filters, &Utc::now().with_timezone(&offset)),
        None => aggregate::aggregate(&events, &filters, &Local::now()),
    };
    Ok(Json(stats))
}

/// GET /api/admin/pages: Distinct pages present in the log.
pub async fn get_pages(State(state): State<Arc<AppState>>) -> Result<Json<Vec<String>>, ApiError> {
    let events = load_events(&state).await?;
    Ok(Json(aggregate::available_pages(&events)))
}

/// GET /api/admin/logs: Every stored visit event, in storage order.
pub async fn get_logs(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<VisitEvent>>, ApiError> {
    let events = load_events(&state).await?;
    Ok(Json(events.as_ref().clone()))
}
