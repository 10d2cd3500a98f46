//! Namespaced, encrypted get/set/delete over a key-value backend.
//!
//! Every operation asks the [`StorageTypeResolver`] for the session's locked
//! class, picks the matching backend and scope, resolves the active namespace
//! through the [`KeyHierarchy`], and only then touches the backend.
//!
//! Encrypted values are stored as
//! `base64( salt[10] || nonce_seed[10] || XChaCha20-Poly1305(json) )`
//! under a key derived from the namespace master key and the record's own
//! salt. Policy-exempt keys are stored as plain JSON.

use crate::config::VaultConfig;
use crate::error::{VaultError, VaultResult};
use crate::keys::{KeyHierarchy, NamespaceHandle, Resolution};
use crate::layout::KeyLayout;
use crate::resolver::{
    durable_scope, EntryContext, StorageClass, StorageClassDecision, StorageTypeResolver,
};
use crate::value::{SharePayload, StoredValue};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use lockbox_crypto::{
    decrypt, derive_key, encrypt, expand_nonce, random_array, share, DerivedKey, OsRandom,
    RandomSource, NONCE_SEED_SIZE, SALT_SIZE, TAG_SIZE,
};
use lockbox_storage::{DuckDbBackend, KvBackend, MemoryBackend};
use std::sync::{Arc, PoisonError, RwLock};
use tracing::{debug, info, warn};

const VALUE_HEADER_SIZE: usize = SALT_SIZE + NONCE_SEED_SIZE;

/// The two backend instances available to a session.
#[derive(Clone)]
pub struct Backends {
    pub ephemeral: Arc<dyn KvBackend>,
    pub durable: Arc<dyn KvBackend>,
}

impl Backends {
    /// Both backends in memory (for testing).
    pub fn in_memory() -> Self {
        Self {
            ephemeral: Arc::new(MemoryBackend::new()),
            durable: Arc::new(MemoryBackend::new()),
        }
    }

    /// In-memory ephemeral backend plus the DuckDB durable backend from
    /// `config.durable_path` (in-memory DuckDB when unset).
    pub fn from_config(config: &VaultConfig) -> VaultResult<Self> {
        let durable = match &config.durable_path {
            Some(path) => {
                DuckDbBackend::open(path, &config.duckdb_memory_limit, config.duckdb_threads)?
            }
            None => DuckDbBackend::open_in_memory()?,
        };
        Ok(Self {
            ephemeral: Arc::new(MemoryBackend::new()),
            durable: Arc::new(durable),
        })
    }

    fn for_class(&self, class: StorageClass) -> &Arc<dyn KvBackend> {
        match class {
            StorageClass::Ephemeral => &self.ephemeral,
            StorageClass::Durable => &self.durable,
        }
    }
}

#[derive(Clone, Debug, Default)]
struct NamespaceContext {
    title: String,
    subtitle: String,
}

/// Value-level API over the active namespace.
pub struct NamespacedStore {
    config: VaultConfig,
    backends: Backends,
    resolver: StorageTypeResolver,
    keys: KeyHierarchy,
    random: Arc<dyn RandomSource>,
    entry: EntryContext,
    context: RwLock<NamespaceContext>,
}

impl NamespacedStore {
    /// Opens the store and locks the session's storage class.
    pub fn open(config: VaultConfig, backends: Backends, entry: EntryContext) -> VaultResult<Self> {
        Self::open_with_random(config, backends, entry, Arc::new(OsRandom))
    }

    /// Like [`NamespacedStore::open`] with an explicit randomness source.
    pub fn open_with_random(
        config: VaultConfig,
        backends: Backends,
        entry: EntryContext,
        random: Arc<dyn RandomSource>,
    ) -> VaultResult<Self> {
        let resolver = StorageTypeResolver::new(backends.ephemeral.clone(), &config);
        let decision = resolver.resolve(&entry)?;
        if let Some(blob) = entry.share_blob.as_deref() {
            if decision.class == StorageClass::Durable && decision.scope != durable_scope(blob) {
                warn!("entry share blob differs from the one this session was locked with");
            }
        }

        Ok(Self {
            config,
            backends,
            resolver,
            keys: KeyHierarchy::new(random.clone()),
            random,
            entry,
            context: RwLock::new(NamespaceContext::default()),
        })
    }

    /// The session's locked storage-class decision.
    ///
    /// Reads the lock; the class is only decided again after the session
    /// has ended.
    pub fn decision(&self) -> VaultResult<StorageClassDecision> {
        match self.resolver.current()? {
            Some(decision) => Ok(decision),
            None => self.resolver.resolve(&self.entry),
        }
    }

    pub fn storage_class(&self) -> VaultResult<StorageClass> {
        Ok(self.decision()?.class)
    }

    pub fn key_hierarchy(&self) -> &KeyHierarchy {
        &self.keys
    }

    /// Switches the active namespace. Takes effect on the next call.
    pub fn set_context(&self, title: &str, subtitle: &str) {
        let mut context = self.context.write().unwrap_or_else(PoisonError::into_inner);
        context.title = title.to_string();
        context.subtitle = subtitle.to_string();
    }

    /// The active `(title, subtitle)`.
    pub fn context(&self) -> (String, String) {
        let context = self.context.read().unwrap_or_else(PoisonError::into_inner);
        (context.title.clone(), context.subtitle.clone())
    }

    /// Backend and key layout for the locked class.
    fn active(&self) -> VaultResult<(Arc<dyn KvBackend>, KeyLayout)> {
        let decision = self.decision()?;
        let backend = self.backends.for_class(decision.class).clone();
        Ok((backend, KeyLayout::new(decision.scope)))
    }

    fn resolve_namespace(
        &self,
        backend: &dyn KvBackend,
        layout: &KeyLayout,
    ) -> VaultResult<Option<NamespaceHandle>> {
        let (title, subtitle) = self.context();
        Ok(self
            .keys
            .resolve_namespace(&title, &subtitle, backend, layout)?
            .into_option())
    }

    // ── Values ───────────────────────────────────────────────────

    /// Reads `logical_key` from the active namespace.
    ///
    /// `None` when the key is absent or the namespace does not resolve.
    pub fn get(&self, logical_key: &str) -> VaultResult<Option<StoredValue>> {
        let (backend, layout) = self.active()?;
        let Some(handle) = self.resolve_namespace(backend.as_ref(), &layout)? else {
            return Ok(None);
        };

        if self.config.is_plaintext_key(logical_key) {
            return match backend.get_raw(&layout.plain(&handle.random_id, logical_key))? {
                Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
                None => Ok(None),
            };
        }

        let Some(record) = backend.get_raw(&layout.value(&handle.random_id, logical_key))? else {
            return Ok(None);
        };
        let Resolution::Resolved {
            value: master_key, ..
        } = self
            .keys
            .resolve_master_key(&handle, backend.as_ref(), &layout)?
        else {
            return Ok(None);
        };

        decrypt_value(&master_key, &record).map(Some)
    }

    /// Writes `value` under `logical_key` in the active namespace, creating
    /// the namespace and its master key on first write.
    pub fn set(&self, logical_key: &str, value: &StoredValue) -> VaultResult<()> {
        let (backend, layout) = self.active()?;
        let (title, subtitle) = self.context();
        let handle =
            self.keys
                .resolve_or_create_namespace(&title, &subtitle, backend.as_ref(), &layout)?;
        let master_key =
            self.keys
                .resolve_or_create_master_key(&handle, backend.as_ref(), &layout)?;

        let plain_key = layout.plain(&handle.random_id, logical_key);
        let value_key = layout.value(&handle.random_id, logical_key);

        if self.config.is_plaintext_key(logical_key) {
            backend.set_raw(&plain_key, &serde_json::to_vec(value)?)?;
            backend.delete_raw(&value_key)?;
        } else {
            let record = encrypt_value(self.random.as_ref(), &master_key, value)?;
            backend.set_raw(&value_key, &record)?;
            backend.delete_raw(&plain_key)?;
        }

        debug!("set {logical_key} in namespace {}", handle.random_id);
        Ok(())
    }

    /// Removes `logical_key` from the active namespace. No tombstones.
    pub fn delete(&self, logical_key: &str) -> VaultResult<()> {
        let (backend, layout) = self.active()?;
        let Some(handle) = self.resolve_namespace(backend.as_ref(), &layout)? else {
            return Ok(());
        };
        backend.delete_raw(&layout.value(&handle.random_id, logical_key))?;
        backend.delete_raw(&layout.plain(&handle.random_id, logical_key))?;
        debug!("deleted {logical_key} from namespace {}", handle.random_id);
        Ok(())
    }

    /// Logical keys present in the active namespace, sorted.
    pub fn logical_keys(&self) -> VaultResult<Vec<String>> {
        let (backend, layout) = self.active()?;
        let Some(handle) = self.resolve_namespace(backend.as_ref(), &layout)? else {
            return Ok(Vec::new());
        };

        let mut keys = Vec::new();
        for prefix in [
            layout.value_prefix(&handle.random_id),
            layout.plain_prefix(&handle.random_id),
        ] {
            keys.extend(
                backend
                    .list_keys(&prefix)?
                    .iter()
                    .filter_map(|k| k.strip_prefix(&prefix))
                    .map(String::from),
            );
        }
        keys.sort();
        keys.dedup();
        Ok(keys)
    }

    // ── Session key ──────────────────────────────────────────────

    pub fn set_session_key(&self, secret: &str) {
        self.keys.set_session_key(secret);
    }

    pub fn clear_session_key(&self) {
        self.keys.clear_session_key();
    }

    /// Re-seals the active namespace's records with the preferred key.
    pub fn rewrap(&self) -> VaultResult<()> {
        let (backend, layout) = self.active()?;
        let (title, subtitle) = self.context();
        let handle = self
            .keys
            .require_namespace(&title, &subtitle, backend.as_ref(), &layout)?;
        self.keys
            .rewrap_namespace(&handle, backend.as_ref(), &layout)
    }

    // ── Sharing ──────────────────────────────────────────────────

    /// Encodes every value of the active namespace as a share blob.
    pub fn export_share(&self, password: &str) -> VaultResult<String> {
        let mut payload = SharePayload::default();
        for key in self.logical_keys()? {
            if let Some(value) = self.get(&key)? {
                payload.entries.insert(key, value);
            }
        }
        let blob = share::encode_with(self.random.as_ref(), &payload, password)?;
        info!("exported {} entries to share blob", payload.entries.len());
        Ok(blob)
    }

    /// Decodes a share blob and writes its entries into the active namespace.
    pub fn import_share(&self, blob: &str, password: &str) -> VaultResult<SharePayload> {
        let payload: SharePayload = share::decode(blob, password)?;
        self.write_entries(&payload)?;
        Ok(payload)
    }

    /// Bootstraps a durable session from its entry share blob.
    ///
    /// Decodes the blob, installs the derived bootstrap key so the
    /// namespace master key is reproducible from the same blob and
    /// password, then imports the entries.
    ///
    /// Fails with [`VaultError::StorageClassLocked`] when the session was
    /// locked with a different blob.
    pub fn unlock_share(&self, password: &str) -> VaultResult<SharePayload> {
        let decision = self.resolver.request_class(StorageClass::Durable)?;
        let blob = self
            .entry
            .share_blob
            .as_deref()
            .ok_or(VaultError::NoShareBlob)?;
        if durable_scope(blob) != decision.scope {
            return Err(VaultError::StorageClassLocked(format!(
                "durable scope {}",
                decision.scope
            )));
        }

        let opened = share::decode_with_master_key::<SharePayload>(blob, password)?;
        self.keys.install_bootstrap_key(opened.master_key);
        self.write_entries(&opened.payload)?;
        Ok(opened.payload)
    }

    fn write_entries(&self, payload: &SharePayload) -> VaultResult<()> {
        for (key, value) in &payload.entries {
            self.set(key, value)?;
        }
        info!("imported {} entries from share blob", payload.entries.len());
        Ok(())
    }

    /// Ends the session, clearing ephemeral storage and the class lock.
    pub fn end_session(&self) -> VaultResult<()> {
        self.keys.clear_session_key();
        self.resolver.end_session()
    }
}

fn encrypt_value(
    random: &dyn RandomSource,
    master_key: &DerivedKey,
    value: &StoredValue,
) -> VaultResult<Vec<u8>> {
    let salt: [u8; SALT_SIZE] = random_array(random);
    let seed: [u8; NONCE_SEED_SIZE] = random_array(random);

    let value_key = derive_key(master_key.as_bytes(), &salt);
    let plaintext = serde_json::to_vec(value)?;
    let ciphertext = encrypt(&value_key, &expand_nonce(&seed), &plaintext)?;

    let mut raw = Vec::with_capacity(VALUE_HEADER_SIZE + ciphertext.len());
    raw.extend_from_slice(&salt);
    raw.extend_from_slice(&seed);
    raw.extend_from_slice(&ciphertext);
    Ok(STANDARD.encode(raw).into_bytes())
}

fn decrypt_value(master_key: &DerivedKey, record: &[u8]) -> VaultResult<StoredValue> {
    let raw = STANDARD
        .decode(record)
        .map_err(|e| VaultError::MalformedBlob(format!("value record: {e}")))?;
    if raw.len() < VALUE_HEADER_SIZE + TAG_SIZE {
        return Err(VaultError::MalformedBlob(format!(
            "value record too short: {} bytes",
            raw.len()
        )));
    }

    let (header, ciphertext) = raw.split_at(VALUE_HEADER_SIZE);
    let mut seed = [0u8; NONCE_SEED_SIZE];
    seed.copy_from_slice(&header[SALT_SIZE..]);

    let value_key = derive_key(master_key.as_bytes(), &header[..SALT_SIZE]);
    let plaintext = decrypt(&value_key, &expand_nonce(&seed), ciphertext)?;
    Ok(serde_json::from_slice(&plaintext)?)
}
