use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Application configuration loaded from a TOML file and environment variables.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
    /// Dashboard origin for CORS restrictions on admin routes.
    /// If not set, admin routes allow any origin.
    #[serde(default)]
    pub dashboard_origin: Option<String>,
    /// How long a loaded visit-log snapshot serves stats requests.
    /// 0 re-reads the store on every request.
    #[serde(default = "default_cache_ttl_secs")]
    pub cache_ttl_secs: u64,
    /// Graceful shutdown timeout in seconds (default: 30).
    #[serde(default = "default_shutdown_timeout_secs")]
    pub shutdown_timeout_secs: u64,
    /// Initial admin access key. Without one the admin routes are open.
    #[serde(default)]
    pub admin_key: Option<String>,
    #[serde(default)]
    pub log_format: LogFormat,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

const fn default_port() -> u16 {
    8080
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("data")
}

const fn default_cache_ttl_secs() -> u64 {
    30
}

const fn default_shutdown_timeout_secs() -> u64 {
    30
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            data_dir: default_data_dir(),
            dashboard_origin: None,
            cache_ttl_secs: default_cache_ttl_secs(),
            shutdown_timeout_secs: default_shutdown_timeout_secs(),
            admin_key: None,
            log_format: LogFormat::default(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file, falling back to defaults.
    ///
    /// Environment variables override file values:
    /// - `LENDA_HOST` → host
    /// - `LENDA_PORT` → port
    /// - `LENDA_DATA_DIR` → data_dir
    /// - `LENDA_DASHBOARD_ORIGIN` → dashboard_origin
    /// - `LENDA_CACHE_TTL` → cache_ttl_secs
    /// - `LENDA_SHUTDOWN_TIMEOUT` → shutdown_timeout_secs
    /// - `LENDA_ADMIN_KEY` → admin_key
    /// - `LENDA_LOG_FORMAT` → log_format (`pretty` or `json`)
    pub fn load(config_path: Option<&Path>) -> Self {
        let mut config =
            config_path.map_or_else(Self::default, |path| match std::fs::read_to_string(path) {
                Ok(contents) => toml::from_str(&contents).unwrap_or_else(|e| {
                    tracing::warn!("Failed to parse config file: {e}, using defaults");
                    Self::default()
                }),
                Err(e) => {
                    tracing::warn!("Failed to read config file: {e}, using defaults");
                    Self::default()
                }
            });

        if let Ok(host) = std::env::var("LENDA_HOST") {
            config.host = host;
        }
        if let Ok(port) = std::env::var("LENDA_PORT") {
            if let Ok(p) = port.parse() {
                config.port = p;
            }
        }
        if let Ok(dir) = std::env::var("LENDA_DATA_DIR") {
            config.data_dir = PathBuf::from(dir);
        }
        if let Ok(origin) = std::env::var("LENDA_DASHBOARD_ORIGIN") {
            config.dashboard_origin = Some(origin);
        }
        if let Ok(val) = std::env::var("LENDA_CACHE_TTL") {
            if let Ok(t) = val.parse() {
                config.cache_ttl_secs = t;
            }
        }
        if let Ok(val) = std::env::var("LENDA_SHUTDOWN_TIMEOUT") {
            if let Ok(t) = val.parse() {
                config.shutdown_timeout_secs = t;
            }
        }
        if let Ok(key) = std::env::var("LENDA_ADMIN_KEY") {
            config.admin_key = Some(key);
        }
        if let Ok(val) = std::env::var("LENDA_LOG_FORMAT") {
            match val.to_ascii_lowercase().as_str() {
                "json" => config.log_format = LogFormat::Json,
                "pretty" => config.log_format = LogFormat::Pretty,
                other => tracing::warn!(value = other, "Unknown LENDA_LOG_FORMAT, ignoring"),
            }
        }

        config
    }

    /// Path of the DuckDB database file holding the record log.
    pub fn database_path(&self) -> PathBuf {
        self.data_dir.join("lenda.duckdb")
    }
}
