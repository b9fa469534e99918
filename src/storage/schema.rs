use duckdb::Connection;

/// SQL statements creating the path-addressed record log.
///
/// `seq` preserves insertion order across paths; `key` is the generated
/// child key handed back to writers. Rows are never updated or deleted.
pub const CREATE_RECORDS_TABLE: &str = r"
CREATE SEQUENCE IF NOT EXISTS records_seq START 1;
CREATE TABLE IF NOT EXISTS records (
    seq         BIGINT PRIMARY KEY DEFAULT nextval('records_seq'),
    path        VARCHAR NOT NULL,
    key         VARCHAR NOT NULL,
    value       VARCHAR NOT NULL,
    created_at  TIMESTAMP DEFAULT CURRENT_TIMESTAMP
);
CREATE INDEX IF NOT EXISTS records_path_idx ON records (path);
";

/// Initialize the database schema.
pub fn init_schema(conn: &Connection) -> Result<(), duckdb::Error> {
    conn.execute_batch(CREATE_RECORDS_TABLE)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_schema() {
        let conn = Connection::open_in_memory().unwrap();
        init_schema(&conn).unwrap();

        let mut stmt = conn.prepare("SELECT COUNT(*) FROM records").unwrap();
        let count: i64 = stmt.query_row([], |row| row.get(0)).unwrap();
        assert_eq!(count, 0);
    }

    #[test]
    fn test_init_schema_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        init_schema(&conn).unwrap();
        init_schema(&conn).unwrap();
    }

    #[test]
    fn test_sequence_orders_inserts() {
        let conn = Connection::open_in_memory().unwrap();
        init_schema(&conn).unwrap();

        for key in ["b", "a", "c"] {
            conn.execute(
                "INSERT INTO records (path, key, value) VALUES ('analytics/logs', ?, '{}')",
                duckdb::params![key],
            )
            .unwrap();
        }

        let mut stmt = conn
            .prepare("SELECT key FROM records ORDER BY seq")
            .unwrap();
        let keys: Vec<String> = stmt
            .query_map([], |row| row.get(0))
            .unwrap()
            .filter_map(Result::ok)
            .collect();
        assert_eq!(keys, vec!["b", "a", "c"]);
    }
}
