//! Cryptographically secure randomness.
//!
//! Everything that needs fresh bytes (salts, nonce seeds, master keys,
//! namespace ids) goes through [`RandomSource`] so tests can swap in a
//! seeded generator.

use crate::key::{DerivedKey, KEY_SIZE};
use rand::RngCore;

const ALPHANUMERIC: &[u8; 62] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789";

/// Source of secure random bytes.
pub trait RandomSource: Send + Sync {
    /// Fills `dest` with random bytes.
    fn fill_bytes(&self, dest: &mut [u8]);

    /// Generates a random 256-bit key.
    fn random_key(&self) -> DerivedKey {
        DerivedKey::from_bytes(random_array::<KEY_SIZE>(self))
    }

    /// Generates an ASCII alphanumeric identifier of `len` characters.
    ///
    /// Bytes >= 248 are rejected so every character is equally likely.
    fn random_id(&self, len: usize) -> String {
        let mut id = String::with_capacity(len);
        let mut buf = [0u8; 16];
        while id.len() < len {
            self.fill_bytes(&mut buf);
            for b in buf {
                if b < 248 && id.len() < len {
                    id.push(ALPHANUMERIC[(b % 62) as usize] as char);
                }
            }
        }
        id
    }
}

/// Returns `N` random bytes from `rng`.
pub fn random_array<const N: usize>(rng: &(impl RandomSource + ?Sized)) -> [u8; N] {
    let mut out = [0u8; N];
    rng.fill_bytes(&mut out);
    out
}

/// Thread-local CSPRNG seeded from the operating system.
#[derive(Clone, Copy, Debug, Default)]
pub struct OsRandom;

impl RandomSource for OsRandom {
    fn fill_bytes(&self, dest: &mut [u8]) {
        rand::rng().fill_bytes(dest);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn random_id_is_alphanumeric_with_requested_length() {
        let id = OsRandom.random_id(8);
        assert_eq!(id.len(), 8);
        assert!(id.chars().all(|c| c.is_ascii_alphanumeric()));
    }

    #[test]
    fn random_keys_differ() {
        assert_ne!(OsRandom.random_key(), OsRandom.random_key());
    }

    #[test]
    fn random_array_fills_all_bytes() {
        let a: [u8; 64] = random_array(&OsRandom);
        let b: [u8; 64] = random_array(&OsRandom);
        assert_ne!(a, b);
    }

    #[test]
    fn works_through_trait_object() {
        let rng: &dyn RandomSource = &OsRandom;
        assert_eq!(rng.random_id(12).len(), 12);
        let _: [u8; 10] = random_array(rng);
    }
}
