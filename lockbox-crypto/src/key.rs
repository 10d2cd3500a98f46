//! Hashing and iterative key derivation.
//!
//! `derive_key` stretches a secret with [`KDF_ROUNDS`] rounds of SHA-512.
//! The full 512-bit state is carried between rounds and only truncated to
//! 256 bits once the last round is done.

use crate::random::{OsRandom, RandomSource};
use sha2::{Digest, Sha256, Sha512};
use std::fmt;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Size of a symmetric key in bytes (256 bits).
pub const KEY_SIZE: usize = 32;

/// Size of a derivation salt in bytes (80 bits).
pub const SALT_SIZE: usize = 10;

/// Number of SHA-512 rounds applied by [`derive_key`]. Protocol constant.
pub const KDF_ROUNDS: u32 = 8192;

/// A 256-bit symmetric key. Zeroized on drop, redacted in `Debug`.
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct DerivedKey([u8; KEY_SIZE]);

impl DerivedKey {
    pub fn from_bytes(bytes: [u8; KEY_SIZE]) -> Self {
        Self(bytes)
    }

    /// Builds a key from a slice, checking its length.
    pub fn from_slice(bytes: &[u8]) -> crate::CryptoResult<Self> {
        let arr: [u8; KEY_SIZE] =
            bytes
                .try_into()
                .map_err(|_| crate::CryptoError::InvalidKeyLength {
                    expected: KEY_SIZE,
                    actual: bytes.len(),
                })?;
        Ok(Self(arr))
    }

    pub fn as_bytes(&self) -> &[u8; KEY_SIZE] {
        &self.0
    }
}

impl fmt::Debug for DerivedKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("DerivedKey([REDACTED])")
    }
}

/// SHA-256 digest. Used for namespace identity and as key material.
pub fn hash(data: &[u8]) -> [u8; 32] {
    Sha256::digest(data).into()
}

/// SHA-512 digest, the wide hash used inside derivation and nonce expansion.
pub fn wide_hash(data: &[u8]) -> [u8; 64] {
    let mut out = [0u8; 64];
    out.copy_from_slice(&Sha512::digest(data));
    out
}

/// Stretches `secret` and `salt` into a 256-bit key.
///
/// Deterministic for identical inputs. CPU-bound; callers block until done.
pub fn derive_key(secret: &[u8], salt: &[u8]) -> DerivedKey {
    let mut state = [0u8; 64];
    state.copy_from_slice(&Sha512::new().chain_update(secret).chain_update(salt).finalize());

    for _ in 1..KDF_ROUNDS {
        let next = Sha512::new()
            .chain_update(state)
            .chain_update(secret)
            .chain_update(salt)
            .finalize();
        state.copy_from_slice(&next);
    }

    let mut out = [0u8; KEY_SIZE];
    out.copy_from_slice(&state[..KEY_SIZE]);
    state.zeroize();
    DerivedKey(out)
}

/// Generates a random 256-bit key.
pub fn generate_random_key() -> DerivedKey {
    OsRandom.random_key()
}
