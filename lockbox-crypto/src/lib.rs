//! Cryptographic primitives for Lockbox.
//!
//! Provides:
//! - SHA-256 hashing for namespace identity
//! - Iterative SHA-512 key stretching ([`derive_key`], 8192 rounds)
//! - XChaCha20-Poly1305 authenticated encryption with compact nonce seeds
//! - A swappable [`RandomSource`] over the OS-seeded CSPRNG
//! - Password-protected share blobs ([`share`])
//!
//! # Key hierarchy
//!
//! The storage engine builds a layered hierarchy on top of these pieces:
//!
//! 1. **Session key**: optional operator secret, held in memory only.
//! 2. **Namespace hash**: `hash(title ++ subtitle)`, the fallback key for
//!    namespace metadata when no session key is set.
//! 3. **Master key**: random per namespace, stored sealed under (1) or (2).
//! 4. **Value key**: `derive_key(master_key, salt)` with a fresh salt for
//!    every write.

mod cipher;
mod error;
mod key;
pub mod random;
pub mod share;

pub use cipher::{
    decrypt, encrypt, expand_nonce, open, seal, NONCE_SEED_SIZE, NONCE_SIZE, TAG_SIZE,
};
pub use error::{CryptoError, CryptoResult};
pub use key::{
    derive_key, generate_random_key, hash, wide_hash, DerivedKey, KDF_ROUNDS, KEY_SIZE,
    SALT_SIZE,
};
pub use random::{random_array, OsRandom, RandomSource};
pub use share::OpenedShare;
