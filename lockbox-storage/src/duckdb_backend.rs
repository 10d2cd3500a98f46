//! DuckDB backend: the durable store that survives across sessions.

use crate::error::{StorageError, StorageResult};
use crate::KvBackend;
use duckdb::{params, Connection};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

/// Key-value table in a DuckDB database.
#[derive(Clone)]
pub struct DuckDbBackend {
    conn: Arc<Mutex<Connection>>,
}

impl DuckDbBackend {
    /// Opens or creates a durable store at the given path.
    pub fn open(path: &Path, memory_limit: &str, threads: u32) -> StorageResult<Self> {
        let conn = crate::open_duckdb_with_wal_recovery(path, memory_limit, threads)?;
        initialize_kv_schema(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Opens an in-memory store (for testing).
    pub fn open_in_memory() -> StorageResult<Self> {
        let conn = Connection::open_in_memory()?;
        initialize_kv_schema(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    fn conn(&self) -> StorageResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| StorageError::Unavailable(e.to_string()))
    }
}

impl KvBackend for DuckDbBackend {
    fn get_raw(&self, key: &str) -> StorageResult<Option<Vec<u8>>> {
        let conn = self.conn()?;
        let result = conn.query_row(
            "SELECT value FROM kv WHERE key = ?",
            params![key],
            |row| row.get::<_, Vec<u8>>(0),
        );

        match result {
            Ok(value) => Ok(Some(value)),
            Err(duckdb::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn set_raw(&self, key: &str, value: &[u8]) -> StorageResult<()> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT OR REPLACE INTO kv (key, value) VALUES (?, ?)",
            params![key, value.to_vec()],
        )?;
        Ok(())
    }

    fn delete_raw(&self, key: &str) -> StorageResult<()> {
        let conn = self.conn()?;
        conn.execute("DELETE FROM kv WHERE key = ?", params![key])?;
        Ok(())
    }

    fn list_keys(&self, prefix: &str) -> StorageResult<Vec<String>> {
        let conn = self.conn()?;
        let mut stmt =
            conn.prepare("SELECT key FROM kv WHERE starts_with(key, ?) ORDER BY key")?;

        let keys = stmt
            .query_map(params![prefix], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(keys)
    }

    fn clear_all(&self) -> StorageResult<()> {
        let conn = self.conn()?;
        conn.execute_batch("DELETE FROM kv;")?;
        Ok(())
    }
}

fn initialize_kv_schema(conn: &Connection) -> StorageResult<()> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS kv (
            key VARCHAR PRIMARY KEY,
            value BLOB NOT NULL
        );
        "#,
    )?;
    Ok(())
}
