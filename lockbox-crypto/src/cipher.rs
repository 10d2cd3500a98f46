//! XChaCha20-Poly1305 authenticated encryption.
//!
//! Stored records carry a compact 80-bit nonce seed. The 192-bit cipher
//! nonce is recovered from it with [`expand_nonce`].

use crate::error::{CryptoError, CryptoResult};
use crate::key::{wide_hash, DerivedKey};
use crate::random::{random_array, RandomSource};
use chacha20poly1305::aead::{Aead, KeyInit};
use chacha20poly1305::{Key, XChaCha20Poly1305, XNonce};

/// Size of the XChaCha20 nonce in bytes (192 bits).
pub const NONCE_SIZE: usize = 24;

/// Size of the stored nonce seed in bytes (80 bits).
pub const NONCE_SEED_SIZE: usize = 10;

/// Size of the Poly1305 tag in bytes.
pub const TAG_SIZE: usize = 16;

/// Expands a stored nonce seed to a full cipher nonce.
pub fn expand_nonce(seed: &[u8; NONCE_SEED_SIZE]) -> [u8; NONCE_SIZE] {
    let digest = wide_hash(seed);
    let mut nonce = [0u8; NONCE_SIZE];
    nonce.copy_from_slice(&digest[..NONCE_SIZE]);
    nonce
}

/// Encrypts `plaintext`, returning ciphertext with the tag appended.
pub fn encrypt(key: &DerivedKey, nonce: &[u8; NONCE_SIZE], plaintext: &[u8]) -> CryptoResult<Vec<u8>> {
    let cipher = XChaCha20Poly1305::new(Key::from_slice(key.as_bytes()));
    cipher
        .encrypt(XNonce::from_slice(nonce), plaintext)
        .map_err(|e| CryptoError::Encryption(e.to_string()))
}

/// Decrypts and authenticates `ciphertext`.
///
/// Any mismatch yields [`CryptoError::Authentication`]; no partial
/// plaintext is ever returned.
pub fn decrypt(key: &DerivedKey, nonce: &[u8; NONCE_SIZE], ciphertext: &[u8]) -> CryptoResult<Vec<u8>> {
    if ciphertext.len() < TAG_SIZE {
        return Err(CryptoError::Authentication);
    }
    let cipher = XChaCha20Poly1305::new(Key::from_slice(key.as_bytes()));
    cipher
        .decrypt(XNonce::from_slice(nonce), ciphertext)
        .map_err(|_| CryptoError::Authentication)
}

/// Encrypts under a fresh nonce seed, returning `[seed][ciphertext+tag]`.
pub fn seal(rng: &dyn RandomSource, key: &DerivedKey, plaintext: &[u8]) -> CryptoResult<Vec<u8>> {
    let seed: [u8; NONCE_SEED_SIZE] = random_array(rng);
    let ciphertext = encrypt(key, &expand_nonce(&seed), plaintext)?;

    let mut out = Vec::with_capacity(NONCE_SEED_SIZE + ciphertext.len());
    out.extend_from_slice(&seed);
    out.extend_from_slice(&ciphertext);
    Ok(out)
}

/// Opens a `[seed][ciphertext+tag]` record produced by [`seal`].
pub fn open(key: &DerivedKey, sealed: &[u8]) -> CryptoResult<Vec<u8>> {
    if sealed.len() < NONCE_SEED_SIZE + TAG_SIZE {
        return Err(CryptoError::MalformedBlob(format!(
            "sealed record too short: {} bytes",
            sealed.len()
        )));
    }
    let (seed, ciphertext) = sealed.split_at(NONCE_SEED_SIZE);
    let seed: &[u8; NONCE_SEED_SIZE] = seed
        .try_into()
        .map_err(|_| CryptoError::MalformedBlob("nonce seed".into()))?;
    decrypt(key, &expand_nonce(seed), ciphertext)
}
