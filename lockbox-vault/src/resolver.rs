//! Storage-class decision and session lock.
//!
//! The class is decided once per session from the entry context and written
//! to a marker record in the ephemeral backend. Every later access reads the
//! marker, so a navigation event that changes the entry context cannot
//! silently change durability mid-session.

use crate::config::VaultConfig;
use crate::error::{VaultError, VaultResult};
use chrono::{DateTime, Utc};
use lockbox_crypto::{hash, share};
use lockbox_storage::KvBackend;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tracing::{info, warn};

/// Number of hex characters of `hash(blob)` used as the durable scope.
const DURABLE_SCOPE_LEN: usize = 16;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StorageClass {
    /// Session-scoped; cleared at session boundaries.
    Ephemeral,
    /// Persists across sessions; entered through a share blob.
    Durable,
}

impl fmt::Display for StorageClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ephemeral => f.write_str("ephemeral"),
            Self::Durable => f.write_str("durable"),
        }
    }
}

/// The locked storage class for a session.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageClassDecision {
    pub class: StorageClass,
    pub locked_at: DateTime<Utc>,
    /// Prefix under which every record of this session lives.
    pub scope: String,
}

/// How the session was entered, as reported by the host.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct EntryContext {
    pub share_blob: Option<String>,
}

impl EntryContext {
    /// Entered directly, without a share blob.
    pub fn direct() -> Self {
        Self::default()
    }

    pub fn with_share_blob(blob: impl Into<String>) -> Self {
        Self {
            share_blob: Some(blob.into()),
        }
    }

    /// Builds the context from the URL the session was opened with.
    pub fn from_url(url: &str) -> Self {
        Self {
            share_blob: share::extract_blob(url).map(String::from),
        }
    }

    /// The class this entry context asks for.
    pub fn requested_class(&self) -> StorageClass {
        if self.share_blob.is_some() {
            StorageClass::Durable
        } else {
            StorageClass::Ephemeral
        }
    }
}

/// Scope identifier for the durable class, derived from the blob content.
pub fn durable_scope(blob: &str) -> String {
    let mut scope = hex::encode(hash(blob.trim().as_bytes()));
    scope.truncate(DURABLE_SCOPE_LEN);
    scope
}

/// Decides and locks the storage class for the current session.
pub struct StorageTypeResolver {
    ephemeral: Arc<dyn KvBackend>,
    marker_key: String,
    ephemeral_scope: String,
}

impl StorageTypeResolver {
    pub fn new(ephemeral: Arc<dyn KvBackend>, config: &VaultConfig) -> Self {
        Self {
            ephemeral,
            marker_key: config.marker_key.clone(),
            ephemeral_scope: config.ephemeral_scope.clone(),
        }
    }

    /// The locked decision, if this session already has one.
    ///
    /// An unreadable marker is removed and reported as undecided.
    pub fn current(&self) -> VaultResult<Option<StorageClassDecision>> {
        let Some(bytes) = self.ephemeral.get_raw(&self.marker_key)? else {
            return Ok(None);
        };
        match serde_json::from_slice(&bytes) {
            Ok(decision) => Ok(Some(decision)),
            Err(e) => {
                warn!("discarding unreadable storage class marker: {e}");
                self.ephemeral.delete_raw(&self.marker_key)?;
                Ok(None)
            }
        }
    }

    /// Returns the session's decision, deciding and locking it on first use.
    ///
    /// Once locked, `entry` is ignored.
    pub fn resolve(&self, entry: &EntryContext) -> VaultResult<StorageClassDecision> {
        if let Some(decision) = self.current()? {
            if entry.requested_class() != decision.class {
                warn!(
                    "entry context asks for {} storage but session is locked to {}; keeping lock",
                    entry.requested_class(),
                    decision.class
                );
            }
            return Ok(decision);
        }

        let decision = match entry.share_blob.as_deref() {
            Some(blob) => StorageClassDecision {
                class: StorageClass::Durable,
                locked_at: Utc::now(),
                scope: durable_scope(blob),
            },
            None => {
                self.purge_stale()?;
                StorageClassDecision {
                    class: StorageClass::Ephemeral,
                    locked_at: Utc::now(),
                    scope: self.ephemeral_scope.clone(),
                }
            }
        };

        self.ephemeral
            .set_raw(&self.marker_key, &serde_json::to_vec(&decision)?)?;
        info!(
            "storage class locked to {} (scope {})",
            decision.class, decision.scope
        );
        Ok(decision)
    }

    /// Confirms the session is locked to `class`.
    ///
    /// Fails with [`VaultError::StorageClassLocked`] when the session is
    /// already locked to the other class.
    pub fn request_class(&self, class: StorageClass) -> VaultResult<StorageClassDecision> {
        match self.current()? {
            Some(decision) if decision.class == class => Ok(decision),
            Some(decision) => Err(VaultError::StorageClassLocked(decision.class.to_string())),
            None => match class {
                StorageClass::Ephemeral => self.resolve(&EntryContext::direct()),
                StorageClass::Durable => Err(VaultError::NoShareBlob),
            },
        }
    }

    /// Ends the session: clears the ephemeral backend, lock included.
    pub fn end_session(&self) -> VaultResult<()> {
        self.ephemeral.clear_all()?;
        info!("session ended; ephemeral storage cleared");
        Ok(())
    }

    /// Clears records left in the ephemeral backend by an earlier session.
    fn purge_stale(&self) -> VaultResult<()> {
        let residual = self.ephemeral.list_keys("")?;
        if !residual.is_empty() {
            warn!(
                "purging {} stale records from ephemeral storage",
                residual.len()
            );
            self.ephemeral.clear_all()?;
        }
        Ok(())
    }
}
