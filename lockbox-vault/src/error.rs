//! Vault error types.

use lockbox_crypto::CryptoError;
use lockbox_storage::StorageError;
use thiserror::Error;

pub type VaultResult<T> = Result<T, VaultError>;

#[derive(Debug, Error)]
pub enum VaultError {
    /// Wrong key/password or corrupted record. Never carries partial plaintext.
    #[error("authentication failed (wrong key, password or tampered data)")]
    Authentication,

    #[error("no namespace resolves for the current title/subtitle")]
    NamespaceNotFound,

    #[error("backend unavailable: {0}")]
    BackendUnavailable(String),

    #[error("malformed blob: {0}")]
    MalformedBlob(String),

    #[error("storage class already locked to {0} for this session")]
    StorageClassLocked(String),

    #[error("no share blob in entry context")]
    NoShareBlob,

    #[error("crypto error: {0}")]
    Crypto(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("invalid configuration: {0}")]
    Config(String),
}

impl From<CryptoError> for VaultError {
    fn from(e: CryptoError) -> Self {
        match e {
            CryptoError::Authentication => VaultError::Authentication,
            CryptoError::MalformedBlob(msg) => VaultError::MalformedBlob(msg),
            CryptoError::Serialization(e) => VaultError::Serialization(e),
            other => VaultError::Crypto(other.to_string()),
        }
    }
}

impl From<StorageError> for VaultError {
    fn from(e: StorageError) -> Self {
        VaultError::BackendUnavailable(e.to_string())
    }
}
