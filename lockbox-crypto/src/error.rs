//! Crypto error types.

use thiserror::Error;

/// Result type for crypto operations.
pub type CryptoResult<T> = Result<T, CryptoError>;

/// Errors that can occur in hashing, derivation, encryption or share decoding.
#[derive(Debug, Error)]
pub enum CryptoError {
    /// Ciphertext/tag mismatch: wrong key or password, or corrupted data.
    #[error("authentication failed (wrong key or tampered data)")]
    Authentication,

    #[error("encryption failed: {0}")]
    Encryption(String),

    #[error("invalid key length: expected {expected}, got {actual}")]
    InvalidKeyLength { expected: usize, actual: usize },

    /// Input could not be split into salt / nonce seed / ciphertext segments.
    #[error("malformed blob: {0}")]
    MalformedBlob(String),

    #[error("compression error: {0}")]
    Compression(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
