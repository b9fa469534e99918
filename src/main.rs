use lenda_analytics::api::auth::AdminKey;
use lenda_analytics::config::{Config, LogFormat};
use lenda_analytics::ingest::handler::AppState;
use lenda_analytics::query::cache::SnapshotCache;
use lenda_analytics::server;
use lenda_analytics::storage::store::DuckDbStore;
use lenda_analytics::storage::visit_log::VisitLog;
use std::future::IntoFuture;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;

#[tokio::main]
async fn main() -> ExitCode {
    let config_path = std::env::args().nth(1);
    let config = Config::load(config_path.as_deref().map(std::path::Path::new));

    init_tracing(config.log_format);

    match run(config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "Fatal error");
            ExitCode::FAILURE
        }
    }
}

fn init_tracing(format: LogFormat) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "lenda_analytics=info,tower_http=info".into());
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    match format {
        LogFormat::Json => builder.json().init(),
        LogFormat::Pretty => builder.init(),
    }
}

async fn run(config: Config) -> Result<(), Box<dyn std::error::Error>> {
    tracing::info!(
        host = %config.host,
        port = config.port,
        data_dir = %config.data_dir.display(),
        "Starting Lenda analytics"
    );

    std::fs::create_dir_all(&config.data_dir)?;
    let store = DuckDbStore::open(&config.database_path())?;
    let log = VisitLog::new(Arc::new(store));

    let admin = match config.admin_key.as_deref() {
        Some(key) => AdminKey::with_key(key)?,
        None => {
            tracing::warn!(
                "No admin key configured; stats and admin routes are open. Set LENDA_ADMIN_KEY to protect them."
            );
            AdminKey::open()
        }
    };

    let state = Arc::new(AppState::new(
        log,
        SnapshotCache::new(config.cache_ttl_secs),
        admin,
        config.dashboard_origin.clone(),
    ));

    let app = server::build_router(state);
    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(addr = %addr, "Listening");

    let shutdown = Arc::new(Notify::new());
    let signalled = Arc::clone(&shutdown);
    let serve = axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            shutdown_signal().await;
            tracing::info!("Shutdown signal received, draining connections");
            signalled.notify_one();
        })
        .into_future();

    let drain_timeout = Duration::from_secs(config.shutdown_timeout_secs);
    let deadline = async {
        shutdown.notified().await;
        tokio::time::sleep(drain_timeout).await;
    };

    tokio::select! {
        result = serve => result?,
        () = deadline => {
            tracing::warn!(
                timeout_secs = config.shutdown_timeout_secs,
                "Graceful shutdown timed out, dropping open connections"
            );
        }
    }

    tracing::info!("Shutdown complete");
    Ok(())
}

/// Wait for Ctrl+C, or SIGTERM on Unix.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }
}
