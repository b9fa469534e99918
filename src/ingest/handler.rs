use crate::api::auth::AdminKey;
use crate::api::errors::ApiError;
use crate::event::{View, VisitEvent};
use crate::query::cache::SnapshotCache;
use crate::storage::visit_log::VisitLog;
use crate::tracker::click::MAX_LABEL_CHARS;
use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

const MAX_SESSION_ID_LEN: usize = 64;
const MAX_CLICKS: usize = 256;
/// Longest visit accepted, one day.
pub const MAX_DURATION_SECS: u64 = 86_400;
/// How far ahead of the server clock a timestamp may be.
const MAX_CLOCK_SKEW_MILLIS: i64 = 86_400_000;

/// Inbound visit record from a browser tracker.
///
/// Same field names as the stored record; `duration` and `timestamp` are
/// required here even though stored records may lack them.
#[derive(Debug, Deserialize)]
pub struct VisitPayload {
    pub page: String,
    pub duration: u64,
    pub timestamp: i64,
    #[serde(rename = "sessionId")]
    pub session_id: Option<String>,
    pub clicks: Option<Vec<String>>,
}

/// Shared application state.
pub struct AppState {
    pub log: VisitLog,
    pub snapshot: SnapshotCache,
    pub admin: AdminKey,
    pub dashboard_origin: Option<String>,
    pub events_ingested_total: AtomicU64,
    pub ingest_failures_total: AtomicU64,
}

impl AppState {
    pub fn new(
        log: VisitLog,
        snapshot: SnapshotCache,
        admin: AdminKey,
        dashboard_origin: Option<String>,
    ) -> Self {
        Self {
            log,
            snapshot,
            admin,
            dashboard_origin,
            events_ingested_total: AtomicU64::new(0),
            ingest_failures_total: AtomicU64::new(0),
        }
    }
}

/// POST /api/logs: Append one visit event to the log.
pub async fn ingest_visit(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<VisitPayload>,
) -> Result<(StatusCode, Json<serde_json::Value>), ApiError> {
    let event = validate_payload(payload, chrono::Utc::now().timestamp_millis())?;

    let state2 = Arc::clone(&state);
    let appended = tokio::task::spawn_blocking(move || state2.log.append(&event))
        .await
        .map_err(|e| ApiError::Internal(format!("Append task panicked: {e}")))?;

    match appended {
        Ok(key) => {
            state.snapshot.invalidate();
            state.events_ingested_total.fetch_add(1, Ordering::Relaxed);
            Ok((StatusCode::ACCEPTED, Json(serde_json::json!({ "key": key }))))
        }
        Err(e) => {
            state.ingest_failures_total.fetch_add(1, Ordering::Relaxed);
            Err(ApiError::Store(e))
        }
    }
}

fn validate_payload(payload: VisitPayload, now_millis: i64) -> Result<VisitEvent, ApiError> {
    let view: View = payload
        .page
        .parse()
        .map_err(|e: crate::event::UnknownView| ApiError::BadRequest(e.to_string()))?;

    if payload.timestamp <= 0 {
        return Err(ApiError::BadRequest(
            "timestamp must be epoch milliseconds".to_string(),
        ));
    }

    if payload.timestamp > now_millis.saturating_add(MAX_CLOCK_SKEW_MILLIS) {
        return Err(ApiError::BadRequest(
            "timestamp is too far in the future".to_string(),
        ));
    }

    if payload.duration > MAX_DURATION_SECS {
        return Err(ApiError::BadRequest(format!(
            "duration must be at most {MAX_DURATION_SECS} seconds"
        )));
    }

    if payload
        .session_id
        .as_ref()
        .is_some_and(|s| s.len() > MAX_SESSION_ID_LEN)
    {
        return Err(ApiError::BadRequest(format!(
            "sessionId must be at most {MAX_SESSION_ID_LEN} characters"
        )));
    }

    if payload.clicks.as_ref().is_some_and(|c| c.len() > MAX_CLICKS) {
        return Err(ApiError::BadRequest(format!(
            "at most {MAX_CLICKS} clicks per visit"
        )));
    }

    let clicks: Vec<String> = payload
        .clicks
        .unwrap_or_default()
        .iter()
        .map(|label| sanitize_string(label, MAX_LABEL_CHARS))
        .filter(|label| !label.is_empty())
        .collect();

    Ok(VisitEvent {
        page: view.as_str().to_string(),
        duration_secs: payload.duration,
        timestamp_millis: payload.timestamp,
        session_id: payload
            .session_id
            .map(|s| sanitize_string(&s, MAX_SESSION_ID_LEN))
            .filter(|s| !s.is_empty()),
        clicks: (!clicks.is_empty()).then_some(clicks),
    })
}

/// Drop control characters, trim, then cut to `max_len` characters.
fn sanitize_string(input: &str, max_len: usize) -> String {
    let cleaned: String = input.chars().filter(|c| !c.is_control()).collect();
    cleaned.trim().chars().take(max_len).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Server clock in these tests, shortly after the payload timestamp.
    const NOW: i64 = 1_705_312_900_000;

    fn payload(page: &str) -> VisitPayload {
        VisitPayload {
            page: page.to_string(),
            duration: 12,
            timestamp: 1_705_312_800_000,
            session_id: Some("k3j2h1g0f9e8d7c6b5a4z3y2x1".to_string()),
            clicks: Some(vec!["Get Started".to_string()]),
        }
    }

    #[test]
    fn test_valid_payload() {
        let event = validate_payload(payload("core-banking"), NOW).unwrap();
        assert_eq!(event.page, "core-banking");
        assert_eq!(event.duration_secs, 12);
        assert_eq!(event.clicks, Some(vec!["Get Started".to_string()]));
    }

    #[test]
    fn test_unknown_page_rejected() {
        assert!(matches!(
            validate_payload(payload("pricing"), NOW),
            Err(ApiError::BadRequest(_))
        ));
    }

    #[test]
    fn test_non_positive_timestamp_rejected() {
        let mut p = payload("home");
        p.timestamp = 0;
        assert!(validate_payload(p, NOW).is_err());
    }

    #[test]
    fn test_long_session_rejected() {
        let mut p = payload("home");
        p.session_id = Some("x".repeat(65));
        assert!(validate_payload(p, NOW).is_err());
    }

    #[test]
    fn test_too_many_clicks_rejected() {
        let mut p = payload("home");
        p.clicks = Some(vec!["a".to_string(); 257]);
        assert!(validate_payload(p, NOW).is_err());
    }

    #[test]
    fn test_click_labels_sanitized() {
        let mut p = payload("home");
        p.clicks = Some(vec![
            "Request\u{0}a quote for core banking systems".to_string(),
            "\u{7}".to_string(),
        ]);
        let event = validate_payload(p, NOW).unwrap();
        let clicks = event.clicks.unwrap();
        assert_eq!(clicks.len(), 1);
        assert_eq!(clicks[0], "Requesta quote for core bankin");
    }

    #[test]
    fn test_empty_clicks_become_null() {
        let mut p = payload("home");
        p.clicks = Some(Vec::new());
        assert!(validate_payload(p, NOW).unwrap().clicks.is_none());
    }

    #[test]
    fn test_empty_session_dropped() {
        let mut p = payload("home");
        p.session_id = Some(String::new());
        assert!(validate_payload(p, NOW).unwrap().session_id.is_none());
    }

    #[test]
    fn test_max_duration_accepted() {
        let mut p = payload("home");
        p.duration = MAX_DURATION_SECS;
        assert_eq!(validate_payload(p, NOW).unwrap().duration_secs, MAX_DURATION_SECS);
    }

    #[test]
    fn test_huge_duration_rejected() {
        let mut p = payload("home");
        p.duration = u64::MAX;
        assert!(matches!(
            validate_payload(p, NOW),
            Err(ApiError::BadRequest(_))
        ));

        let mut p = payload("home");
        p.duration = MAX_DURATION_SECS + 1;
        assert!(validate_payload(p, NOW).is_err());
    }

    #[test]
    fn test_far_future_timestamp_rejected() {
        let mut p = payload("home");
        p.timestamp = i64::MAX;
        assert!(validate_payload(p, NOW).is_err());

        let mut p = payload("home");
        p.timestamp = NOW + MAX_CLOCK_SKEW_MILLIS + 1;
        assert!(validate_payload(p, NOW).is_err());
    }

    #[test]
    fn test_small_clock_skew_accepted() {
        let mut p = payload("home");
        p.timestamp = NOW + 60_000;
        assert!(validate_payload(p, NOW).is_ok());
    }

    #[test]
    fn test_leading_whitespace_keeps_full_label() {
        let mut p = payload("home");
        p.clicks = Some(vec![format!("    {}", "x".repeat(40))]);
        let clicks = validate_payload(p, NOW).unwrap().clicks.unwrap();
        assert_eq!(clicks[0], "x".repeat(MAX_LABEL_CHARS));
    }

    #[test]
    fn test_sanitize_string_truncate() {
        let long = "a".repeat(500);
        assert_eq!(sanitize_string(&long, 30).len(), 30);
    }

    #[test]
    fn test_sanitize_string_control_chars() {
        assert_eq!(sanitize_string("hello\x00world\x01test", 256), "helloworldtest");
    }
}
