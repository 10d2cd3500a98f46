//! Key-value storage backends for Lockbox.
//!
//! Every backend speaks the same small byte-oriented contract
//! ([`KvBackend`]). The engine holds two instances at runtime:
//!
//! - an **ephemeral** backend ([`MemoryBackend`]), cleared at session
//!   boundaries,
//! - a **durable** backend ([`DuckDbBackend`]), a single `kv` table in a
//!   DuckDB file that survives across sessions.
//!
//! Backends never see plaintext for encrypted keys; they store opaque blobs.

mod duckdb_backend;
mod error;
mod memory;

pub use duckdb_backend::DuckDbBackend;
pub use error::{StorageError, StorageResult};
pub use memory::MemoryBackend;

use duckdb::Connection;
use std::path::{Path, PathBuf};
use tracing::warn;

/// Byte-level key-value contract consumed by the storage engine.
///
/// Implementations use interior mutability so handles can be shared as
/// `Arc<dyn KvBackend>`. Calls complete immediately or fail fast.
pub trait KvBackend: Send + Sync {
    /// Reads the raw value stored under `key`.
    fn get_raw(&self, key: &str) -> StorageResult<Option<Vec<u8>>>;

    /// Writes (upserts) `value` under `key`.
    fn set_raw(&self, key: &str, value: &[u8]) -> StorageResult<()>;

    /// Removes `key`. Removing a missing key is not an error.
    fn delete_raw(&self, key: &str) -> StorageResult<()>;

    /// Lists keys starting with `prefix`, sorted ascending.
    fn list_keys(&self, prefix: &str) -> StorageResult<Vec<String>>;

    /// Removes every key.
    fn clear_all(&self) -> StorageResult<()>;
}

/// Opens a DuckDB file for the durable backend and applies its limits.
///
/// An unclean shutdown can leave `<file>.wal` behind and make the open
/// fail. When that log exists it is removed and the open is retried once.
pub fn open_duckdb_with_wal_recovery(
    path: &Path,
    memory_limit: &str,
    threads: u32,
) -> StorageResult<Connection> {
    let conn = match Connection::open(path) {
        Ok(conn) => conn,
        Err(err) => {
            let wal = wal_path(path);
            if !wal.exists() {
                return Err(err.into());
            }
            warn!(
                "opening {} failed ({err}); removing stale WAL {}",
                path.display(),
                wal.display()
            );
            std::fs::remove_file(&wal).map_err(|_| StorageError::from(err))?;
            Connection::open(path)?
        }
    };
    apply_resource_limits(&conn, memory_limit, threads)?;
    Ok(conn)
}

/// DuckDB keeps its write-ahead log next to the database as `<file>.wal`.
fn wal_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".wal");
    PathBuf::from(name)
}

/// Caps memory and worker threads for one connection.
fn apply_resource_limits(conn: &Connection, memory_limit: &str, threads: u32) -> StorageResult<()> {
    conn.execute_batch(&format!(
        "SET memory_limit = '{}'; SET threads = {threads};",
        memory_limit.replace('\'', "''")
    ))?;
    Ok(())
}
