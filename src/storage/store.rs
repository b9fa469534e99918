use duckdb::Connection;
use parking_lot::Mutex;
use serde_json::Value;
use std::path::Path;
use std::sync::Arc;

/// An append-only store of JSON records addressed by path.
///
/// Writers push a child record under a path and receive the generated key;
/// readers fetch every child under a path in insertion order. There is no
/// update or delete.
pub trait LogStore: Send + Sync {
    /// Append `value` as a new child of `path`, returning its generated key.
    fn push(&self, path: &str, value: &Value) -> Result<String, StoreError>;

    /// Read all `(key, value)` children of `path`, oldest first.
    fn get(&self, path: &str) -> Result<Vec<(String, Value)>, StoreError>;
}

fn generate_key() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// DuckDB-backed log store.
#[derive(Clone)]
pub struct DuckDbStore {
    conn: Arc<Mutex<Connection>>,
}

impl DuckDbStore {
    /// Open (or create) a database file and bring its schema up to date.
    pub fn open(db_path: &Path) -> Result<Self, StoreError> {
        let conn = Connection::open(db_path).map_err(StoreError::Open)?;
        Self::from_connection(conn)
    }

    /// In-memory database, mostly for tests.
    pub fn open_in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory().map_err(StoreError::Open)?;
        Self::from_connection(conn)
    }

    fn from_connection(conn: Connection) -> Result<Self, StoreError> {
        crate::storage::migrations::run_migrations(&conn).map_err(StoreError::Migrate)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }
}

impl LogStore for DuckDbStore {
    fn push(&self, path: &str, value: &Value) -> Result<String, StoreError> {
        let key = generate_key();
        let encoded = serde_json::to_string(value).map_err(StoreError::Encode)?;
        self.conn
            .lock()
            .execute(
                "INSERT INTO records (path, key, value) VALUES (?, ?, ?)",
                duckdb::params![path, key, encoded],
            )
            .map_err(StoreError::Write)?;
        Ok(key)
    }

    fn get(&self, path: &str) -> Result<Vec<(String, Value)>, StoreError> {
        let conn = self.conn.lock();
        let mut stmt = conn
            .prepare("SELECT key, value FROM records WHERE path = ? ORDER BY seq")
            .map_err(StoreError::Read)?;
        let rows: Vec<(String, String)> = stmt
            .query_map(duckdb::params![path], |row| Ok((row.get(0)?, row.get(1)?)))
            .map_err(StoreError::Read)?
            .collect::<Result<_, _>>()
            .map_err(StoreError::Read)?;
        drop(stmt);
        drop(conn);

        let mut records = Vec::with_capacity(rows.len());
        for (key, raw) in rows {
            match serde_json::from_str(&raw) {
                Ok(value) => records.push((key, value)),
                Err(e) => tracing::warn!(key = %key, error = %e, "Skipping undecodable record"),
            }
        }
        Ok(records)
    }
}

/// Process-local log store. Records vanish with the process.
#[derive(Clone, Default)]
pub struct MemoryStore {
    records: Arc<Mutex<Vec<(String, String, Value)>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Total number of records across all paths.
    pub fn len(&self) -> usize {
        self.records.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.lock().is_empty()
    }
}

impl LogStore for MemoryStore {
    fn push(&self, path: &str, value: &Value) -> Result<String, StoreError> {
        let key = generate_key();
        self.records
            .lock()
            .push((path.to_string(), key.clone(), value.clone()));
        Ok(key)
    }

    fn get(&self, path: &str) -> Result<Vec<(String, Value)>, StoreError> {
        Ok(self
            .records
            .lock()
            .iter()
            .filter(|(p, _, _)| p == path)
            .map(|(_, key, value)| (key.clone(), value.clone()))
            .collect())
    }
}

#[derive(Debug)]
pub enum StoreError {
    Open(duckdb::Error),
    Migrate(duckdb::Error),
    Write(duckdb::Error),
    Read(duckdb::Error),
    Encode(serde_json::Error),
}

impl std::fmt::Display for StoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Open(e) => write!(f, "Open error: {e}"),
            Self::Migrate(e) => write!(f, "Migration error: {e}"),
            Self::Write(e) => write!(f, "Write error: {e}"),
            Self::Read(e) => write!(f, "Read error: {e}"),
            Self::Encode(e) => write!(f, "Encode error: {e}"),
        }
    }
}

impl std::error::Error for StoreError {}
