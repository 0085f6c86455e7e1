//! Webhook HMAC signing and verification.
//!
//! Signatures are hex-encoded HMAC-SHA256 digests computed over the raw,
//! unparsed request body. Verification must run on those exact bytes: a
//! parse/re-serialize round trip can reorder keys or change whitespace.
//!
//! A signature header may carry an optional `sha256=` prefix and may list
//! several signatures separated by commas or whitespace (secret rotation);
//! any one matching signature is accepted.

use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Optional scheme prefix on a signature value.
pub const SIGNATURE_PREFIX: &str = "sha256=";

/// Compute the hex-encoded HMAC-SHA256 signature of `body`.
pub fn sign_payload(secret: &str, body: &[u8]) -> String {
    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC accepts any key length");
    mac.update(body);
    hex::encode(mac.finalize().into_bytes())
}

/// Verify a signature header against the raw body.
///
/// The digest comparison is constant-time (`Mac::verify_slice`). An empty
/// secret never verifies.
pub fn verify_signature(secret: &str, header: &str, body: &[u8]) -> bool {
    if secret.is_empty() {
        return false;
    }

    header
        .split(|c: char| c == ',' || c.is_whitespace())
        .filter(|candidate| !candidate.is_empty())
        .any(|candidate| verify_one(secret, candidate, body))
}

fn verify_one(secret: &str, candidate: &str, body: &[u8]) -> bool {
    let encoded = candidate.strip_prefix(SIGNATURE_PREFIX).unwrap_or(candidate);
    let Ok(expected) = hex::decode(encoded) else {
        return false;
    };
    let Ok(mut mac) = HmacSha256::new_from_slice(secret.as_bytes()) else {
        return false;
    };
    mac.update(body);
    mac.verify_slice(&expected).is_ok()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "whsec_test";
    const BODY: &[u8] = br#"{"id":"p1","status":"succeeded"}"#;

    #[test]
    fn signature_is_hex_sha256() {
        let sig = sign_payload(SECRET, BODY);
        assert_eq!(sig.len(), 64);
        assert!(sig.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn correctly_signed_body_verifies() {
        let sig = sign_payload(SECRET, BODY);
        assert!(verify_signature(SECRET, &sig, BODY));
        assert!(verify_signature(SECRET, &format!("sha256={sig}"), BODY));
    }

    #[test]
    fn any_single_byte_mutation_invalidates() {
        let sig = sign_payload(SECRET, BODY);
        for i in 0..BODY.len() {
            let mut mutated = BODY.to_vec();
            mutated[i] ^= 0x01;
            assert!(
                !verify_signature(SECRET, &sig, &mutated),
                "mutation at byte {i} should invalidate the signature"
            );
        }
    }

    #[test]
    fn wrong_secret_fails() {
        let sig = sign_payload("other", BODY);
        assert!(!verify_signature(SECRET, &sig, BODY));
    }

    #[test]
    fn empty_secret_never_verifies() {
        let sig = sign_payload("", BODY);
        assert!(!verify_signature("", &sig, BODY));
    }

    #[test]
    fn malformed_headers_fail() {
        assert!(!verify_signature(SECRET, "", BODY));
        assert!(!verify_signature(SECRET, "not-hex", BODY));
        assert!(!verify_signature(SECRET, "sha256=", BODY));
    }

    #[test]
    fn any_listed_signature_may_match() {
        let good = sign_payload(SECRET, BODY);
        let stale = sign_payload("rotated-out", BODY);
        assert!(verify_signature(SECRET, &format!("{stale}, sha256={good}"), BODY));
    }

    #[test]
    fn reserialized_json_does_not_verify() {
        let sig = sign_payload(SECRET, BODY);
        let parsed: serde_json::Value = serde_json::from_slice(BODY).unwrap();
        let pretty = serde_json::to_vec_pretty(&parsed).unwrap();
        assert!(!verify_signature(SECRET, &sig, &pretty));
    }
}
