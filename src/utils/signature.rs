// src/utils/signature.rs

use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Hex-encoded HMAC-SHA256 of `message` under `secret`.
///
/// The payment gateway signs the raw webhook body this way; we recompute and
/// compare before trusting any field of the payload.
pub fn hmac_sha256_hex(secret: &str, message: &str) -> String {
    // HMAC accepts keys of any length, so construction cannot fail.
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .expect("HMAC-SHA256 accepts any key size");
    mac.update(message.as_bytes());
    hex::encode(mac.finalize().into_bytes())
}

/// Verifies a gateway-supplied signature over the raw request body.
pub fn verify_signature(secret: &str, body: &str, provided: &str) -> bool {
    constant_time_eq(&hmac_sha256_hex(secret, body), provided)
}

/// Constant-time comparison; signature checks must not leak match length
/// through timing.
fn constant_time_eq(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }

    let mut diff = 0u8;
    for (x, y) in a.bytes().zip(b.bytes()) {
        diff |= x ^ y;
    }
    diff == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_vector() {
        // RFC test vector for HMAC-SHA256("key", "The quick brown fox ...").
        let sig = hmac_sha256_hex("key", "The quick brown fox jumps over the lazy dog");
        assert_eq!(
            sig,
            "f7bc83f430538424b13298e6aa6fb143ef4d59a14946175997479dbc2d1a3cd8"
        );
    }

    #[test]
    fn verify_accepts_matching_signature() {
        let body = r#"{"eventType":"payment.succeeded"}"#;
        let sig = hmac_sha256_hex("whsec_test", body);
        assert!(verify_signature("whsec_test", body, &sig));
    }

    #[test]
    fn verify_rejects_tampered_body() {
        let sig = hmac_sha256_hex("whsec_test", "original");
        assert!(!verify_signature("whsec_test", "tampered", &sig));
    }

    #[test]
    fn verify_rejects_wrong_length() {
        assert!(!verify_signature("whsec_test", "body", "deadbeef"));
    }
}
