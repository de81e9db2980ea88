//! Webhook signature verification.
//!
//! Providers sign the raw request body with HMAC-SHA256 and send the hex
//! digest in the `X-Webhook-Signature` header. Verification must run over
//! the exact bytes received, before any JSON parsing.

use hmac::{Hmac, Mac};
use sha2::Sha256;
use subtle::ConstantTimeEq;

type HmacSha256 = Hmac<Sha256>;

/// Optional prefix some senders put in front of the hex digest.
const SIGNATURE_PREFIX: &str = "sha256=";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SignatureError {
    /// The server has no webhook secret. This is a deployment problem, not a
    /// rejected request.
    #[error("payment webhook secret is not configured")]
    MissingSecret,
}

/// Compute the hex-encoded HMAC-SHA256 of `raw_body` under `secret`.
///
/// Surrounding whitespace in `secret` is ignored, as in `verify`.
pub fn sign(raw_body: &[u8], secret: &str) -> String {
    let mut mac = HmacSha256::new_from_slice(secret.trim().as_bytes())
        .expect("HMAC accepts keys of any length");
    mac.update(raw_body);
    hex::encode(mac.finalize().into_bytes())
}

/// Check `signature` against the HMAC of `raw_body`.
///
/// # Errors
///
/// `MissingSecret` when `secret` is blank. A blank secret never yields
/// `Ok(true)`.
///
/// # Comparison
///
/// A length mismatch returns `false` immediately; equal-length digests are
/// compared in constant time.
pub fn verify(raw_body: &[u8], signature: &str, secret: &str) -> Result<bool, SignatureError> {
    let secret = secret.trim();
    if secret.is_empty() {
        return Err(SignatureError::MissingSecret);
    }

    let provided = signature.trim();
    let provided = provided.strip_prefix(SIGNATURE_PREFIX).unwrap_or(provided);
    if provided.is_empty() {
        return Ok(false);
    }

    let expected = sign(raw_body, secret);
    if expected.len() != provided.len() {
        return Ok(false);
    }

    Ok(expected.as_bytes().ct_eq(provided.as_bytes()).into())
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "0123456789abcdef0123456789abcdef";

    fn body() -> Vec<u8> {
        br#"{"id":"evt-1","paymentId":"mock_1"}"#.to_vec()
    }

    #[test]
    fn valid_signature_verifies() {
        let signature = sign(&body(), SECRET);
        assert_eq!(verify(&body(), &signature, SECRET), Ok(true));
    }

    #[test]
    fn prefixed_signature_verifies() {
        let signature = format!("sha256={}", sign(&body(), SECRET));
        assert_eq!(verify(&body(), &signature, SECRET), Ok(true));
    }

    #[test]
    fn appended_character_fails() {
        let signature = format!("{}x", sign(&body(), SECRET));
        assert_eq!(verify(&body(), &signature, SECRET), Ok(false));
    }

    #[test]
    fn tampered_body_fails() {
        let signature = sign(&body(), SECRET);
        let tampered = br#"{"id":"evt-1","paymentId":"mock_2"}"#;
        assert_eq!(verify(tampered, &signature, SECRET), Ok(false));
    }

    #[test]
    fn reencoded_body_fails() {
        // Same JSON value, different bytes
        let signature = sign(&body(), SECRET);
        let spaced = br#"{ "id": "evt-1", "paymentId": "mock_1" }"#;
        assert_eq!(verify(spaced, &signature, SECRET), Ok(false));
    }

    #[test]
    fn wrong_secret_fails() {
        let signature = sign(&body(), "another-secret-another-secret!!");
        assert_eq!(verify(&body(), &signature, SECRET), Ok(false));
    }

    #[test]
    fn padded_secret_round_trips() {
        let padded = format!("  {SECRET}\n");
        let signature = sign(&body(), &padded);

        assert_eq!(verify(&body(), &signature, &padded), Ok(true));
        assert_eq!(verify(&body(), &signature, SECRET), Ok(true));
    }

    #[test]
    fn empty_signature_is_false() {
        assert_eq!(verify(&body(), "  ", SECRET), Ok(false));
    }

    #[test]
    fn blank_secret_fails_closed() {
        let signature = sign(&body(), "");
        assert_eq!(
            verify(&body(), &signature, ""),
            Err(SignatureError::MissingSecret)
        );
        assert_eq!(
            verify(&body(), &signature, "   "),
            Err(SignatureError::MissingSecret)
        );
    }

    #[test]
    fn signature_is_lowercase_hex_sha256() {
        let signature = sign(b"payload", SECRET);
        assert_eq!(signature.len(), 64);
        assert!(signature.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    }
}
