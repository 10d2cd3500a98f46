//! Password-protected share blobs.
//!
//! A share blob carries a serialized payload that anyone holding the
//! password can open without access to any backend:
//!
//! ```text
//! base64url( salt[10] || nonce_seed[10] || XChaCha20-Poly1305(lz4(json)) )
//! ```
//!
//! The encryption key is `derive_key(password, salt)`. Opening a blob also
//! yields a bootstrap master key, `derive_key(password, salt || nonce_seed)`,
//! which is stable for a given blob and password.

use crate::cipher::{decrypt, encrypt, expand_nonce, NONCE_SEED_SIZE, TAG_SIZE};
use crate::error::{CryptoError, CryptoResult};
use crate::key::{derive_key, DerivedKey, SALT_SIZE};
use crate::random::{random_array, OsRandom, RandomSource};
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use serde::de::DeserializeOwned;
use serde::Serialize;

/// URL parameter carrying the blob in fragment or query.
pub const SHARE_PARAM: &str = "share";

const HEADER_SIZE: usize = SALT_SIZE + NONCE_SEED_SIZE;

/// A decoded share blob together with its bootstrap master key.
#[derive(Debug)]
pub struct OpenedShare<T> {
    pub payload: T,
    pub master_key: DerivedKey,
}

/// Encodes `payload` as a share blob protected by `password`.
pub fn encode<T: Serialize>(payload: &T, password: &str) -> CryptoResult<String> {
    encode_with(&OsRandom, payload, password)
}

/// Like [`encode`], drawing salt and nonce seed from `rng`.
pub fn encode_with<T: Serialize>(
    rng: &dyn RandomSource,
    payload: &T,
    password: &str,
) -> CryptoResult<String> {
    let salt: [u8; SALT_SIZE] = random_array(rng);
    let seed: [u8; NONCE_SEED_SIZE] = random_array(rng);

    let json = serde_json::to_vec(payload)?;
    let compressed = lz4_flex::compress_prepend_size(&json);

    let key = derive_key(password.as_bytes(), &salt);
    let ciphertext = encrypt(&key, &expand_nonce(&seed), &compressed)?;

    let mut raw = Vec::with_capacity(HEADER_SIZE + ciphertext.len());
    raw.extend_from_slice(&salt);
    raw.extend_from_slice(&seed);
    raw.extend_from_slice(&ciphertext);
    Ok(URL_SAFE_NO_PAD.encode(raw))
}

/// Decodes a share blob.
///
/// Returns [`CryptoError::MalformedBlob`] when the text is not a share blob
/// and [`CryptoError::Authentication`] when the password is wrong.
pub fn decode<T: DeserializeOwned>(blob: &str, password: &str) -> CryptoResult<T> {
    let (salt, seed, ciphertext) = split_blob(blob)?;
    let key = derive_key(password.as_bytes(), &salt);
    let compressed = decrypt(&key, &expand_nonce(&seed), &ciphertext)?;
    decompress_payload(&compressed)
}

/// Decodes a share blob and derives its bootstrap master key.
pub fn decode_with_master_key<T: DeserializeOwned>(
    blob: &str,
    password: &str,
) -> CryptoResult<OpenedShare<T>> {
    let (salt, seed, _) = split_blob(blob)?;
    let payload = decode(blob, password)?;

    let mut material = [0u8; HEADER_SIZE];
    material[..SALT_SIZE].copy_from_slice(&salt);
    material[SALT_SIZE..].copy_from_slice(&seed);
    let master_key = derive_key(password.as_bytes(), &material);

    Ok(OpenedShare { payload, master_key })
}

/// Embeds a blob in a URL fragment: `base#share=<blob>`.
pub fn to_url(base: &str, blob: &str) -> String {
    let base = base.split('#').next().unwrap_or(base);
    format!("{base}#{SHARE_PARAM}={blob}")
}

/// Extracts a blob from a share URL, or returns the input when it already
/// looks like a bare blob.
///
/// The fragment is searched first, then the query.
pub fn extract_blob(text: &str) -> Option<&str> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }
    if text.bytes().all(is_base64url) {
        return Some(text);
    }
    let (before_fragment, fragment) = match text.split_once('#') {
        Some((head, fragment)) => (head, Some(fragment)),
        None => (text, None),
    };
    let query = before_fragment.split_once('?').map(|(_, query)| query);
    [fragment, query].into_iter().flatten().find_map(share_param)
}

fn share_param(params: &str) -> Option<&str> {
    params
        .split('&')
        .filter_map(|pair| pair.split_once('='))
        .find(|(name, _)| *name == SHARE_PARAM)
        .map(|(_, value)| value)
        .filter(|value| !value.is_empty())
}

fn is_base64url(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'-' || b == b'_'
}

fn split_blob(blob: &str) -> CryptoResult<([u8; SALT_SIZE], [u8; NONCE_SEED_SIZE], Vec<u8>)> {
    let raw = URL_SAFE_NO_PAD
        .decode(blob.trim())
        .map_err(|e| CryptoError::MalformedBlob(format!("base64 decode: {e}")))?;

    if raw.len() < HEADER_SIZE + TAG_SIZE {
        return Err(CryptoError::MalformedBlob(format!(
            "expected at least {} bytes, got {}",
            HEADER_SIZE + TAG_SIZE,
            raw.len()
        )));
    }

    let mut salt = [0u8; SALT_SIZE];
    salt.copy_from_slice(&raw[..SALT_SIZE]);
    let mut seed = [0u8; NONCE_SEED_SIZE];
    seed.copy_from_slice(&raw[SALT_SIZE..HEADER_SIZE]);
    Ok((salt, seed, raw[HEADER_SIZE..].to_vec()))
}

fn decompress_payload<T: DeserializeOwned>(compressed: &[u8]) -> CryptoResult<T> {
    let json = lz4_flex::decompress_size_prepended(compressed)
        .map_err(|e| CryptoError::Compression(e.to_string()))?;
    Ok(serde_json::from_slice(&json)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn blob_is_url_safe() {
        let blob = encode(&json!({"k": "v".repeat(200)}), "pw").unwrap();
        assert!(blob
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'));
    }

    #[test]
    fn url_roundtrip() {
        let url = to_url("https://chat.example/app", "QUJD");
        assert_eq!(url, "https://chat.example/app#share=QUJD");
        assert_eq!(extract_blob(&url), Some("QUJD"));
    }

    #[test]
    fn to_url_replaces_existing_fragment() {
        let url = to_url("https://chat.example/app#old", "QUJD");
        assert_eq!(url, "https://chat.example/app#share=QUJD");
    }

    #[test]
    fn extract_blob_from_query_and_bare() {
        assert_eq!(
            extract_blob("https://chat.example/?lang=en&share=QUJD"),
            Some("QUJD")
        );
        assert_eq!(extract_blob("  QUJD  "), Some("QUJD"));
        assert_eq!(extract_blob("https://chat.example/?lang=en"), None);
        assert_eq!(extract_blob("https://chat.example/app"), None);
        assert_eq!(extract_blob(""), None);
    }

    #[test]
    fn extract_blob_from_query_with_trailing_fragment() {
        assert_eq!(
            extract_blob("https://chat.example/app?share=QUJD#settings"),
            Some("QUJD")
        );
        assert_eq!(
            extract_blob("https://chat.example/app?lang=en&share=QUJD#tab=keys"),
            Some("QUJD")
        );
        assert_eq!(
            extract_blob("https://chat.example/app#share=QUJD&x=1"),
            Some("QUJD")
        );
        assert_eq!(extract_blob("https://chat.example/app?lang=en#settings"), None);
    }

    #[test]
    fn corrupted_blob_fails_authentication() {
        let blob = encode(&json!({"model": "gpt-x"}), "pw").unwrap();
        let mut raw = URL_SAFE_NO_PAD.decode(&blob).unwrap();
        let last = raw.len() - 1;
        raw[last] ^= 0x01;
        let tampered = URL_SAFE_NO_PAD.encode(raw);
        let err = decode::<serde_json::Value>(&tampered, "pw").unwrap_err();
        assert!(matches!(err, CryptoError::Authentication));
    }
}
