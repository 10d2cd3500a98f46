//! Key hierarchy: session key → namespace hash → master key.
//!
//! Namespace and master-key records are sealed with the *preferred* key:
//! the session key when one is set, the namespace hash otherwise. Opening
//! walks an ordered candidate list (session key first, then namespace hash)
//! and reports which one succeeded via [`Resolution`].

use crate::error::{VaultError, VaultResult};
use crate::layout::KeyLayout;
use lockbox_crypto::{
    derive_key, hash, open, seal, wide_hash, CryptoError, DerivedKey, RandomSource, KEY_SIZE,
};
use lockbox_storage::KvBackend;
use std::sync::{Arc, PoisonError, RwLock};
use tracing::{debug, info};

/// Length of the random suffix shared by a namespace and its master key.
pub const NAMESPACE_ID_LEN: usize = 8;

/// Domain salt for stretching an operator-supplied session secret.
const SESSION_KEY_SALT: &[u8] = b"lockbox-session\0";

/// Domain tag mixed into per-namespace bootstrap keys.
const BOOTSTRAP_DOMAIN: &[u8] = b"lockbox-bootstrap-v1";

/// Which candidate key opened a record.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum KeySource {
    SessionKey,
    NamespaceHash,
}

/// Outcome of a resolution attempt.
#[derive(Debug)]
pub enum Resolution<T> {
    Resolved { value: T, via: KeySource },
    Unresolved,
}

impl<T> Resolution<T> {
    pub fn is_resolved(&self) -> bool {
        matches!(self, Self::Resolved { .. })
    }

    pub fn via(&self) -> Option<KeySource> {
        match self {
            Self::Resolved { via, .. } => Some(*via),
            Self::Unresolved => None,
        }
    }

    pub fn into_option(self) -> Option<T> {
        match self {
            Self::Resolved { value, .. } => Some(value),
            Self::Unresolved => None,
        }
    }
}

/// A resolved namespace: its random id and identity hash.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NamespaceHandle {
    pub random_id: String,
    pub namespace_hash: [u8; 32],
}

/// Computes `hash(title ++ subtitle)`.
pub fn namespace_hash(title: &str, subtitle: &str) -> [u8; 32] {
    let mut material = Vec::with_capacity(title.len() + subtitle.len());
    material.extend_from_slice(title.as_bytes());
    material.extend_from_slice(subtitle.as_bytes());
    hash(&material)
}

/// Resolves and creates namespace and master-key records.
pub struct KeyHierarchy {
    random: Arc<dyn RandomSource>,
    session_key: RwLock<Option<DerivedKey>>,
    bootstrap_key: RwLock<Option<DerivedKey>>,
}

impl KeyHierarchy {
    pub fn new(random: Arc<dyn RandomSource>) -> Self {
        Self {
            random,
            session_key: RwLock::new(None),
            bootstrap_key: RwLock::new(None),
        }
    }

    /// Sets the session key from an operator-supplied secret.
    ///
    /// Takes effect on the next resolution. Existing records are not
    /// re-encrypted; see [`KeyHierarchy::rewrap_namespace`].
    pub fn set_session_key(&self, secret: &str) {
        self.set_session_key_raw(derive_key(secret.as_bytes(), SESSION_KEY_SALT));
    }

    /// Sets an already-derived session key.
    pub fn set_session_key_raw(&self, key: DerivedKey) {
        *self
            .session_key
            .write()
            .unwrap_or_else(PoisonError::into_inner) = Some(key);
        debug!("session key set");
    }

    pub fn clear_session_key(&self) {
        *self
            .session_key
            .write()
            .unwrap_or_else(PoisonError::into_inner) = None;
        debug!("session key cleared");
    }

    pub fn has_session_key(&self) -> bool {
        self.session_key
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    /// Installs the key recovered from a share blob. New master keys are then
    /// derived from it instead of drawn at random, so reopening the same
    /// share with the same password rebuilds the same keys.
    pub fn install_bootstrap_key(&self, key: DerivedKey) {
        *self
            .bootstrap_key
            .write()
            .unwrap_or_else(PoisonError::into_inner) = Some(key);
    }

    /// Ordered candidate keys: session key (if set), then namespace hash.
    fn candidates(&self, namespace_hash: &[u8; 32]) -> Vec<(KeySource, DerivedKey)> {
        let mut out = Vec::with_capacity(2);
        if let Some(key) = self
            .session_key
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
        {
            out.push((KeySource::SessionKey, key.clone()));
        }
        out.push((
            KeySource::NamespaceHash,
            DerivedKey::from_bytes(*namespace_hash),
        ));
        out
    }

    /// The key new records are sealed with.
    fn preferred(&self, namespace_hash: &[u8; 32]) -> (KeySource, DerivedKey) {
        let mut candidates = self.candidates(namespace_hash);
        candidates.swap_remove(0)
    }

    /// Tries each candidate in order; `None` if none opens the record.
    fn try_open(
        &self,
        namespace_hash: &[u8; 32],
        sealed: &[u8],
    ) -> VaultResult<Option<(KeySource, Vec<u8>)>> {
        for (source, key) in self.candidates(namespace_hash) {
            match open(&key, sealed) {
                Ok(plaintext) => return Ok(Some((source, plaintext))),
                Err(CryptoError::Authentication | CryptoError::MalformedBlob(_)) => continue,
                Err(e) => return Err(e.into()),
            }
        }
        Ok(None)
    }

    /// Scans namespace records for one matching `title`/`subtitle`.
    ///
    /// A record that decrypts to anything other than the expected hash is
    /// "not this record"; scanning continues.
    pub fn resolve_namespace(
        &self,
        title: &str,
        subtitle: &str,
        backend: &dyn KvBackend,
        layout: &KeyLayout,
    ) -> VaultResult<Resolution<NamespaceHandle>> {
        let expected = namespace_hash(title, subtitle);
        let prefix = layout.namespace_prefix();

        for record_key in backend.list_keys(&prefix)? {
            let Some(random_id) = record_key.strip_prefix(&prefix) else {
                continue;
            };
            let Some(sealed) = backend.get_raw(&record_key)? else {
                continue;
            };
            match self.try_open(&expected, &sealed)? {
                Some((via, plaintext)) if plaintext == expected => {
                    return Ok(Resolution::Resolved {
                        value: NamespaceHandle {
                            random_id: random_id.to_string(),
                            namespace_hash: expected,
                        },
                        via,
                    });
                }
                Some(_) => debug!("namespace record {random_id} opened but does not match"),
                None => {}
            }
        }
        Ok(Resolution::Unresolved)
    }

    /// Like [`KeyHierarchy::resolve_namespace`], failing with
    /// [`VaultError::NamespaceNotFound`] instead of returning `Unresolved`.
    pub fn require_namespace(
        &self,
        title: &str,
        subtitle: &str,
        backend: &dyn KvBackend,
        layout: &KeyLayout,
    ) -> VaultResult<NamespaceHandle> {
        self.resolve_namespace(title, subtitle, backend, layout)?
            .into_option()
            .ok_or(VaultError::NamespaceNotFound)
    }

    /// Resolves the namespace, creating its record if none matches.
    pub fn resolve_or_create_namespace(
        &self,
        title: &str,
        subtitle: &str,
        backend: &dyn KvBackend,
        layout: &KeyLayout,
    ) -> VaultResult<NamespaceHandle> {
        if let Resolution::Resolved { value, .. } =
            self.resolve_namespace(title, subtitle, backend, layout)?
        {
            return Ok(value);
        }

        let namespace_hash = namespace_hash(title, subtitle);
        let random_id = loop {
            let candidate = self.random.random_id(NAMESPACE_ID_LEN);
            if backend.get_raw(&layout.namespace_record(&candidate))?.is_none() {
                break candidate;
            }
        };

        let (via, key) = self.preferred(&namespace_hash);
        let sealed = seal(self.random.as_ref(), &key, &namespace_hash)?;
        backend.set_raw(&layout.namespace_record(&random_id), &sealed)?;
        info!(
            "created namespace {random_id} in scope {} (sealed with {via:?})",
            layout.scope()
        );

        Ok(NamespaceHandle {
            random_id,
            namespace_hash,
        })
    }

    /// Opens the master key paired with `handle`, if one exists.
    ///
    /// A record that exists but opens under no candidate is an
    /// authentication failure, not an absence.
    pub fn resolve_master_key(
        &self,
        handle: &NamespaceHandle,
        backend: &dyn KvBackend,
        layout: &KeyLayout,
    ) -> VaultResult<Resolution<DerivedKey>> {
        let Some(sealed) = backend.get_raw(&layout.master_key_record(&handle.random_id))? else {
            return Ok(Resolution::Unresolved);
        };
        match self.try_open(&handle.namespace_hash, &sealed)? {
            Some((via, plaintext)) => Ok(Resolution::Resolved {
                value: DerivedKey::from_slice(&plaintext)?,
                via,
            }),
            None => Err(VaultError::Authentication),
        }
    }

    /// Opens the paired master key, generating and persisting one if absent.
    pub fn resolve_or_create_master_key(
        &self,
        handle: &NamespaceHandle,
        backend: &dyn KvBackend,
        layout: &KeyLayout,
    ) -> VaultResult<DerivedKey> {
        if let Resolution::Resolved { value, .. } =
            self.resolve_master_key(handle, backend, layout)?
        {
            return Ok(value);
        }

        let master_key = match self
            .bootstrap_key
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
        {
            Some(bootstrap) => bootstrap_master_key(bootstrap, &handle.namespace_hash),
            None => self.random.random_key(),
        };

        let (via, key) = self.preferred(&handle.namespace_hash);
        let sealed = seal(self.random.as_ref(), &key, master_key.as_bytes())?;
        backend.set_raw(&layout.master_key_record(&handle.random_id), &sealed)?;
        info!(
            "created master key for namespace {} (sealed with {via:?})",
            handle.random_id
        );

        Ok(master_key)
    }

    /// Re-seals a namespace and its master key with the preferred key.
    ///
    /// Use after setting a session key to move existing records under it.
    pub fn rewrap_namespace(
        &self,
        handle: &NamespaceHandle,
        backend: &dyn KvBackend,
        layout: &KeyLayout,
    ) -> VaultResult<()> {
        let master_key = self.resolve_master_key(handle, backend, layout)?.into_option();
        let (via, key) = self.preferred(&handle.namespace_hash);

        let sealed = seal(self.random.as_ref(), &key, &handle.namespace_hash)?;
        backend.set_raw(&layout.namespace_record(&handle.random_id), &sealed)?;

        if let Some(master_key) = master_key {
            let sealed = seal(self.random.as_ref(), &key, master_key.as_bytes())?;
            backend.set_raw(&layout.master_key_record(&handle.random_id), &sealed)?;
        }

        info!("rewrapped namespace {} with {via:?}", handle.random_id);
        Ok(())
    }
}

/// Derives a namespace's master key from a share bootstrap key.
fn bootstrap_master_key(bootstrap: &DerivedKey, namespace_hash: &[u8; 32]) -> DerivedKey {
    let mut material = Vec::with_capacity(KEY_SIZE + 32 + BOOTSTRAP_DOMAIN.len());
    material.extend_from_slice(bootstrap.as_bytes());
    material.extend_from_slice(namespace_hash);
    material.extend_from_slice(BOOTSTRAP_DOMAIN);

    let digest = wide_hash(&material);
    let mut out = [0u8; KEY_SIZE];
    out.copy_from_slice(&digest[..KEY_SIZE]);
    DerivedKey::from_bytes(out)
}
