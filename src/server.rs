use crate::api::{auth, stats};
use crate::ingest::handler::{ingest_visit, AppState};
use axum::extract::DefaultBodyLimit;
use axum::extract::State;
use axum::http::{header, HeaderValue, Method};
use axum::middleware;
use axum::response::Response;
use axum::routing::{get, post};
use axum::Router;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

/// Build the Axum router with all routes.
pub fn build_router(state: Arc<AppState>) -> Router {
    // Permissive CORS for ingestion (tracker runs on the public site)
    let ingestion_cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::POST])
        .allow_headers([header::CONTENT_TYPE]);

    let dashboard_cors = build_dashboard_cors(state.dashboard_origin.as_deref());

    let admin_routes = Router::new()
        .route("/logs", get(stats::get_logs))
        .route("/stats", get(stats::get_stats))
        .route("/pages", get(stats::get_pages))
        .route("/key", post(auth::change_admin_key))
        .layer(middleware::from_fn_with_state(
            Arc::clone(&state),
            auth::require_admin,
        ))
        .layer(dashboard_cors);

    // 64 KB is far above the largest valid visit record
    let ingestion_routes = Router::new()
        .route("/logs", post(ingest_visit))
        .layer(DefaultBodyLimit::max(65_536))
        .layer(ingestion_cors);

    let api_routes = Router::new()
        .merge(ingestion_routes)
        .nest("/admin", admin_routes);

    Router::new()
        .route("/health", get(health_check))
        .route("/health/detailed", get(detailed_health_check))
        .route("/metrics", get(prometheus_metrics))
        .nest("/api", api_routes)
        .layer(axum::middleware::map_response(add_security_headers))
        .layer(TimeoutLayer::with_status_code(
            axum::http::StatusCode::REQUEST_TIMEOUT,
            std::time::Duration::from_secs(30),
        ))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn add_security_headers(mut response: Response) -> Response {
    let headers = response.headers_mut();
    headers.insert(
        header::X_CONTENT_TYPE_OPTIONS,
        HeaderValue::from_static("nosniff"),
    );
    headers.insert(header::X_FRAME_OPTIONS, HeaderValue::from_static("DENY"));
    headers.insert(
        "referrer-policy",
        HeaderValue::from_static("strict-origin-when-cross-origin"),
    );
    response
}

/// Build CORS layer for admin routes based on configured origin.
fn build_dashboard_cors(dashboard_origin: Option<&str>) -> CorsLayer {
    dashboard_origin.map_or_else(
        || {
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any)
        },
        |origin| {
            let allowed_origin = origin
                .parse::<HeaderValue>()
                .unwrap_or_else(|_| HeaderValue::from_static("*"));
            CorsLayer::new()
                .allow_origin(allowed_origin)
                .allow_methods([Method::GET, Method::POST])
                .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
        },
    )
}

/// GET /health
async fn health_check() -> &'static str {
    "ok"
}

/// GET /health/detailed: Health plus a few state gauges.
async fn detailed_health_check(
    State(state): State<Arc<AppState>>,
) -> axum::Json<serde_json::Value> {
    use std::sync::atomic::Ordering;

    axum::Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "admin_key_configured": state.admin.is_configured(),
        "snapshot_events": state.snapshot.len(),
        "snapshot_empty": state.snapshot.is_empty(),
        "events_ingested": state.events_ingested_total.load(Ordering::Relaxed),
        "ingest_failures": state.ingest_failures_total.load(Ordering::Relaxed),
    }))
}

/// GET /metrics: Prometheus text exposition.
async fn prometheus_metrics(
    State(state): State<Arc<AppState>>,
) -> ([(header::HeaderName, &'static str); 1], String) {
    use std::fmt::Write;
    use std::sync::atomic::Ordering;

    let snapshot_events = state.snapshot.len();
    let snapshot_loaded = u8::from(!state.snapshot.is_empty());
    let admin_configured = u8::from(state.admin.is_configured());
    let ingested = state.events_ingested_total.load(Ordering::Relaxed);
    let failures = state.ingest_failures_total.load(Ordering::Relaxed);

    let mut out = String::with_capacity(1024);
    let _ = writeln!(
        out,
        "# HELP lenda_events_ingested_total Visit events appended since startup"
    );
    let _ = writeln!(out, "# TYPE lenda_events_ingested_total counter");
    let _ = writeln!(out, "lenda_events_ingested_total {ingested}");
    let _ = writeln!(
        out,
        "# HELP lenda_ingest_failures_total Visit events the store failed to append"
    );
    let _ = writeln!(out, "# TYPE lenda_ingest_failures_total counter");
    let _ = writeln!(out, "lenda_ingest_failures_total {failures}");
    let _ = writeln!(
        out,
        "# HELP lenda_snapshot_events Events held in the stats snapshot"
    );
    let _ = writeln!(out, "# TYPE lenda_snapshot_events gauge");
    let _ = writeln!(out, "lenda_snapshot_events {snapshot_events}");
    let _ = writeln!(
        out,
        "# HELP lenda_snapshot_loaded Whether a stats snapshot is held"
    );
    let _ = writeln!(out, "# TYPE lenda_snapshot_loaded gauge");
    let _ = writeln!(out, "lenda_snapshot_loaded {snapshot_loaded}");
    let _ = writeln!(
        out,
        "# HELP lenda_admin_key_configured Whether an admin key is set"
    );
    let _ = writeln!(out, "# TYPE lenda_admin_key_configured gauge");
    let _ = writeln!(out, "lenda_admin_key_configured {admin_configured}");

    ([(header::CONTENT_TYPE, "text/plain; version=0.0.4")], out)
}
