//! Shared test helpers for store and key hierarchy integration tests.

#![allow(dead_code)]

use lockbox_crypto::RandomSource;
use lockbox_storage::{KvBackend, MemoryBackend};
use lockbox_vault::{Backends, EntryContext, NamespacedStore, VaultConfig};
use rand::rngs::StdRng;
use rand::{RngCore, SeedableRng};
use std::io;
use std::sync::{Arc, Mutex};

/// Deterministic randomness for reproducible records.
pub struct SeededRandom(Mutex<StdRng>);

impl SeededRandom {
    pub fn new(seed: u64) -> Self {
        Self(Mutex::new(StdRng::seed_from_u64(seed)))
    }
}

impl RandomSource for SeededRandom {
    fn fill_bytes(&self, dest: &mut [u8]) {
        self.0.lock().unwrap().fill_bytes(dest);
    }
}

/// Concrete handles to both backends so tests can inspect raw records.
pub struct TestBackends {
    pub ephemeral: Arc<MemoryBackend>,
    pub durable: Arc<MemoryBackend>,
}

impl TestBackends {
    pub fn new() -> Self {
        Self {
            ephemeral: Arc::new(MemoryBackend::new()),
            durable: Arc::new(MemoryBackend::new()),
        }
    }

    pub fn backends(&self) -> Backends {
        Backends {
            ephemeral: self.ephemeral.clone(),
            durable: self.durable.clone(),
        }
    }

    /// Opens a store over these backends (a "page load" in the same session).
    pub fn open(&self, entry: EntryContext) -> NamespacedStore {
        NamespacedStore::open(VaultConfig::default(), self.backends(), entry).unwrap()
    }
}

/// Raw records under `prefix` in `backend`.
pub fn records(backend: &dyn KvBackend, prefix: &str) -> Vec<(String, Vec<u8>)> {
    backend
        .list_keys(prefix)
        .unwrap()
        .into_iter()
        .map(|k| {
            let v = backend.get_raw(&k).unwrap().unwrap();
            (k, v)
        })
        .collect()
}

/// Backend that fails every call.
pub struct UnavailableBackend;

impl KvBackend for UnavailableBackend {
    fn get_raw(&self, _key: &str) -> lockbox_storage::StorageResult<Option<Vec<u8>>> {
        Err(lockbox_storage::StorageError::Unavailable("offline".into()))
    }

    fn set_raw(&self, _key: &str, _value: &[u8]) -> lockbox_storage::StorageResult<()> {
        Err(lockbox_storage::StorageError::Unavailable("offline".into()))
    }

    fn delete_raw(&self, _key: &str) -> lockbox_storage::StorageResult<()> {
        Err(lockbox_storage::StorageError::Unavailable("offline".into()))
    }

    fn list_keys(&self, _prefix: &str) -> lockbox_storage::StorageResult<Vec<String>> {
        Err(lockbox_storage::StorageError::Unavailable("offline".into()))
    }

    fn clear_all(&self) -> lockbox_storage::StorageResult<()> {
        Err(lockbox_storage::StorageError::Unavailable("offline".into()))
    }
}

/// In-memory sink for formatted log lines.
#[derive(Clone, Default)]
struct CapturedLogs(Arc<Mutex<Vec<u8>>>);

impl io::Write for CapturedLogs {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Runs `f` with a thread-local subscriber and returns what it logged.
pub fn capture_logs<R>(f: impl FnOnce() -> R) -> (R, String) {
    let logs = CapturedLogs::default();
    let writer = logs.clone();
    let subscriber = tracing_subscriber::fmt()
        .with_writer(move || writer.clone())
        .with_ansi(false)
        .with_max_level(tracing::Level::DEBUG)
        .finish();

    let result = tracing::subscriber::with_default(subscriber, f);
    let text = String::from_utf8_lossy(&logs.0.lock().unwrap()).into_owned();
    (result, text)
}
