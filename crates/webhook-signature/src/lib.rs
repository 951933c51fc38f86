//! HMAC-SHA256 webhook signatures.
//!
//! A signature has the form `sha256=<hex digest>` and is computed over the exact
//! bytes that travel on the wire. Structured payloads are serialized to their
//! canonical JSON form first: compact, fields in declaration order, nothing added.
//! Sender and receiver must agree on that form, otherwise verification fails.

use hmac::{Hmac, Mac};
use serde::Serialize;
use sha2::Sha256;
use thiserror::Error;

type HmacSha256 = Hmac<Sha256>;

/// Prefix carried by every signature value.
pub const SIGNATURE_PREFIX: &str = "sha256=";

/// Header used to transport the signature.
pub const SIGNATURE_HEADER: &str = "X-Signature";

/// Hex length of a SHA-256 digest.
const DIGEST_HEX_LEN: usize = 64;

/// Errors raised while producing a signature.
///
/// Verification never returns an error: it fails closed with `false`.
#[derive(Error, Debug)]
pub enum SignatureError {
    #[error("failed to serialize payload: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("invalid signing key")]
    InvalidKey,
}

/// Serialize a payload to its canonical JSON body.
pub fn canonical_json<T: Serialize + ?Sized>(payload: &T) -> Result<String, SignatureError> {
    Ok(serde_json::to_string(payload)?)
}

/// Sign a structured payload.
///
/// Identical payload and secret always yield the identical signature.
pub fn sign<T: Serialize + ?Sized>(secret: &str, payload: &T) -> Result<String, SignatureError> {
    let body = canonical_json(payload)?;
    sign_bytes(secret, body.as_bytes())
}

/// Sign an already serialized body.
pub fn sign_bytes(secret: &str, body: &[u8]) -> Result<String, SignatureError> {
    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).map_err(|_| SignatureError::InvalidKey)?;
    mac.update(body);
    let digest = mac.finalize().into_bytes();
    Ok(format!("{SIGNATURE_PREFIX}{}", hex::encode(digest)))
}

/// Verify a signature against a structured payload.
pub fn verify<T: Serialize + ?Sized>(signature: &str, secret: &str, payload: &T) -> bool {
    match canonical_json(payload) {
        Ok(body) => verify_bytes(signature, secret, body.as_bytes()),
        Err(_) => false,
    }
}

/// Verify a signature against raw body bytes.
///
/// The digest comparison is constant time. Any malformed signature (missing
/// prefix, wrong length, non-hex characters) is rejected.
pub fn verify_bytes(signature: &str, secret: &str, body: &[u8]) -> bool {
    let Some(hex_digest) = signature.strip_prefix(SIGNATURE_PREFIX) else {
        return false;
    };
    if hex_digest.len() != DIGEST_HEX_LEN {
        return false;
    }
    let Ok(provided) = hex::decode(hex_digest) else {
        return false;
    };
    let Ok(mut mac) = HmacSha256::new_from_slice(secret.as_bytes()) else {
        return false;
    };
    mac.update(body);
    mac.verify_slice(&provided).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Serialize)]
    #[serde(rename_all = "camelCase")]
    struct Payload {
        user_id: i64,
        task_id: i64,
        message: String,
        timestamp: String,
    }

    #[derive(Serialize)]
    #[serde(rename_all = "camelCase")]
    struct PayloadWithExtra {
        user_id: i64,
        task_id: i64,
        message: String,
        timestamp: String,
        priority: String,
    }

    fn payload() -> Payload {
        Payload {
            user_id: 1,
            task_id: 42,
            message: "Task 'Write report' has been completed!".to_string(),
            timestamp: "2025-01-15T10:30:00+00:00".to_string(),
        }
    }

    #[test]
    fn test_known_vector() {
        let sig = sign_bytes("key", b"The quick brown fox jumps over the lazy dog").unwrap();
        assert_eq!(
            sig,
            "sha256=f7bc83f430538424b13298e6aa6fb143ef4d59a14946175997479dbc2d1a3cd8"
        );
    }

    #[test]
    fn test_signature_format() {
        let sig = sign("secret", &payload()).unwrap();
        assert!(sig.starts_with(SIGNATURE_PREFIX));
        assert_eq!(sig.len(), 71);
    }

    #[test]
    fn test_sign_is_deterministic() {
        let a = sign("secret", &payload()).unwrap();
        let b = sign("secret", &payload()).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_sign_then_verify() {
        let sig = sign("secret", &payload()).unwrap();
        assert!(verify(&sig, "secret", &payload()));

        let body = canonical_json(&payload()).unwrap();
        assert!(verify_bytes(&sig, "secret", body.as_bytes()));
    }

    #[test]
    fn test_canonical_field_order() {
        let body = canonical_json(&payload()).unwrap();
        assert_eq!(
            body,
            r#"{"userId":1,"taskId":42,"message":"Task 'Write report' has been completed!","timestamp":"2025-01-15T10:30:00+00:00"}"#
        );
    }

    #[test]
    fn test_mutated_payload_fails() {
        let sig = sign("secret", &payload()).unwrap();

        let mut other = payload();
        other.task_id = 43;
        assert!(!verify(&sig, "secret", &other));

        let mut other = payload();
        other.message.push('!');
        assert!(!verify(&sig, "secret", &other));

        let mut other = payload();
        other.timestamp = "2025-01-15T10:30:01+00:00".to_string();
        assert!(!verify(&sig, "secret", &other));
    }

    #[test]
    fn test_wrong_secret_fails() {
        let sig = sign("secret", &payload()).unwrap();
        assert!(!verify(&sig, "secret2", &payload()));
        assert!(!verify(&sig, "", &payload()));
    }

    #[test]
    fn test_reordered_fields_fail() {
        let sig = sign("secret", &payload()).unwrap();
        let reordered = r#"{"taskId":42,"userId":1,"message":"Task 'Write report' has been completed!","timestamp":"2025-01-15T10:30:00+00:00"}"#;
        assert!(!verify_bytes(&sig, "secret", reordered.as_bytes()));
    }

    #[test]
    fn test_extra_field_fails() {
        let sig = sign("secret", &payload()).unwrap();
        let p = payload();
        let extended = PayloadWithExtra {
            user_id: p.user_id,
            task_id: p.task_id,
            message: p.message,
            timestamp: p.timestamp,
            priority: "high".to_string(),
        };
        assert!(!verify(&sig, "secret", &extended));
    }

    #[test]
    fn test_malformed_signatures_fail_closed() {
        let body = canonical_json(&payload()).unwrap();
        let valid = sign_bytes("secret", body.as_bytes()).unwrap();
        let digest = valid.trim_start_matches(SIGNATURE_PREFIX);

        for bad in [
            String::new(),
            "sha256=".to_string(),
            "sha256=invalid".to_string(),
            digest.to_string(),
            format!("sha1={digest}"),
            format!("sha256={}", &digest[..63]),
            format!("sha256={}zz", &digest[..62]),
            format!("{valid}00"),
        ] {
            assert!(
                !verify_bytes(&bad, "secret", body.as_bytes()),
                "accepted malformed signature {bad:?}"
            );
        }
    }

    #[test]
    fn test_uppercase_hex_is_accepted() {
        let body = canonical_json(&payload()).unwrap();
        let valid = sign_bytes("secret", body.as_bytes()).unwrap();
        let upper = format!(
            "{SIGNATURE_PREFIX}{}",
            valid.trim_start_matches(SIGNATURE_PREFIX).to_uppercase()
        );
        assert!(verify_bytes(&upper, "secret", body.as_bytes()));
    }
}
