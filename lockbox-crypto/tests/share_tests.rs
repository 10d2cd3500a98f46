use lockbox_crypto::share::{decode, decode_with_master_key, encode, extract_blob, to_url};
use lockbox_crypto::CryptoError;
use pretty_assertions::assert_eq;
use serde::{Deserialize, Serialize};
use serde_json::json;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct ModelConfig {
    model: String,
}

#[test]
fn encode_decode_roundtrip() {
    let payload = ModelConfig { model: "gpt-x".into() };
    let blob = encode(&payload, "correct-horse").unwrap();

    let decoded: ModelConfig = decode(&blob, "correct-horse").unwrap();
    assert_eq!(decoded, payload);
}

#[test]
fn wrong_password_fails_authentication() {
    let blob = encode(&ModelConfig { model: "gpt-x".into() }, "correct-horse").unwrap();

    let result = decode::<ModelConfig>(&blob, "wrong");
    assert!(matches!(result, Err(CryptoError::Authentication)));
}

#[test]
fn each_encode_produces_different_blob() {
    let payload = json!({"model": "gpt-x"});
    let b1 = encode(&payload, "pw").unwrap();
    let b2 = encode(&payload, "pw").unwrap();

    // Fresh salt and nonce seed each time
    assert_ne!(b1, b2);
    assert_eq!(decode::<serde_json::Value>(&b1, "pw").unwrap(), payload);
    assert_eq!(decode::<serde_json::Value>(&b2, "pw").unwrap(), payload);
}

#[test]
fn not_base64_is_malformed() {
    let result = decode::<serde_json::Value>("this is not a share link!", "pw");
    assert!(matches!(result, Err(CryptoError::MalformedBlob(_))));
}

#[test]
fn too_short_is_malformed() {
    let result = decode::<serde_json::Value>("QUJDREVG", "pw");
    assert!(matches!(result, Err(CryptoError::MalformedBlob(_))));
}

#[test]
fn empty_password_still_roundtrips() {
    let blob = encode(&json!([1, 2, 3]), "").unwrap();
    assert_eq!(decode::<serde_json::Value>(&blob, "").unwrap(), json!([1, 2, 3]));
    assert!(decode::<serde_json::Value>(&blob, " ").is_err());
}

#[test]
fn large_repetitive_payload_compresses() {
    let payload = json!({"history": "hello world ".repeat(2000)});
    let raw_len = serde_json::to_vec(&payload).unwrap().len();
    let blob = encode(&payload, "pw").unwrap();

    assert!(blob.len() < raw_len / 4);
    assert_eq!(decode::<serde_json::Value>(&blob, "pw").unwrap(), payload);
}

#[test]
fn master_key_is_deterministic_for_same_blob_and_password() {
    let blob = encode(&json!({"model": "gpt-x"}), "correct-horse").unwrap();

    let a = decode_with_master_key::<serde_json::Value>(&blob, "correct-horse").unwrap();
    let b = decode_with_master_key::<serde_json::Value>(&blob, "correct-horse").unwrap();
    assert_eq!(a.master_key, b.master_key);
    assert_eq!(a.payload, json!({"model": "gpt-x"}));
}

#[test]
fn master_key_differs_between_blobs() {
    let payload = json!({"model": "gpt-x"});
    let b1 = encode(&payload, "pw").unwrap();
    let b2 = encode(&payload, "pw").unwrap();

    let k1 = decode_with_master_key::<serde_json::Value>(&b1, "pw").unwrap().master_key;
    let k2 = decode_with_master_key::<serde_json::Value>(&b2, "pw").unwrap().master_key;
    assert_ne!(k1, k2);
}

#[test]
fn master_key_requires_correct_password() {
    let blob = encode(&json!({"model": "gpt-x"}), "pw").unwrap();
    let result = decode_with_master_key::<serde_json::Value>(&blob, "nope");
    assert!(matches!(result, Err(CryptoError::Authentication)));
}

#[test]
fn blob_survives_url_embedding() {
    let blob = encode(&json!({"model": "gpt-x"}), "pw").unwrap();
    let url = to_url("https://chat.example/", &blob);

    let extracted = extract_blob(&url).unwrap();
    assert_eq!(extracted, blob);
    assert_eq!(
        decode::<serde_json::Value>(extracted, "pw").unwrap(),
        json!({"model": "gpt-x"})
    );
}

// Property-based tests
mod proptests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(16))]

        #[test]
        fn decode_inverts_encode(value in ".{0,64}", password in ".{0,16}") {
            let blob = encode(&value, &password).unwrap();
            let decoded: String = decode(&blob, &password).unwrap();
            prop_assert_eq!(decoded, value);
        }

        #[test]
        fn other_password_never_decodes(password in "[a-z]{1,12}", suffix in "[A-Z]{1,4}") {
            let blob = encode(&"payload", &password).unwrap();
            let other = format!("{password}{suffix}");
            prop_assert!(matches!(
                decode::<String>(&blob, &other),
                Err(CryptoError::Authentication)
            ));
        }
    }
}
