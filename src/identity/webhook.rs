//! Stripe webhook signature verification
//!
//! Stripe signs webhook payloads with HMAC-SHA256 over `{timestamp}.{body}`
//! and sends the result in the `Stripe-Signature` header as
//! `t=<timestamp>,v1=<hex>`.

use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Maximum allowed age of a signed payload, in seconds
const TOLERANCE_SECS: i64 = 300;

/// Check a `Stripe-Signature` header against the raw request body.
pub fn verify_webhook_signature(
    payload: &[u8],
    signature_header: &str,
    secret: &str,
    now_unix: i64,
) -> bool {
    let mut timestamp: Option<i64> = None;
    let mut signatures: Vec<&str> = Vec::new();

    for part in signature_header.split(',') {
        match part.split_once('=') {
            Some(("t", value)) => timestamp = value.trim().parse().ok(),
            Some(("v1", value)) => signatures.push(value.trim()),
            _ => {}
        }
    }

    let Some(timestamp) = timestamp else {
        return false;
    };
    if signatures.is_empty() {
        return false;
    }
    if (now_unix - timestamp).abs() > TOLERANCE_SECS {
        return false;
    }

    let mut mac = match HmacSha256::new_from_slice(secret.as_bytes()) {
        Ok(mac) => mac,
        Err(_) => return false,
    };
    mac.update(timestamp.to_string().as_bytes());
    mac.update(b".");
    mac.update(payload);
    let expected = hex::encode(mac.finalize().into_bytes());

    signatures.iter().any(|sig| constant_time_eq(sig, &expected))
}

fn constant_time_eq(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.bytes().zip(b.bytes()).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sign(payload: &[u8], secret: &str, timestamp: i64) -> String {
        let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).unwrap();
        mac.update(timestamp.to_string().as_bytes());
        mac.update(b".");
        mac.update(payload);
        format!("t={},v1={}", timestamp, hex::encode(mac.finalize().into_bytes()))
    }

    #[test]
    fn test_valid_signature() {
        let payload = br#"{"type":"identity.verification_session.verified"}"#;
        let header = sign(payload, "whsec_test", 1_700_000_000);
        assert!(verify_webhook_signature(
            payload,
            &header,
            "whsec_test",
            1_700_000_000
        ));
    }

    #[test]
    fn test_wrong_secret_rejected() {
        let payload = b"{}";
        let header = sign(payload, "whsec_test", 1_700_000_000);
        assert!(!verify_webhook_signature(
            payload,
            &header,
            "whsec_other",
            1_700_000_000
        ));
    }

    #[test]
    fn test_tampered_payload_rejected() {
        let header = sign(b"{}", "whsec_test", 1_700_000_000);
        assert!(!verify_webhook_signature(
            b"{\"x\":1}",
            &header,
            "whsec_test",
            1_700_000_000
        ));
    }

    #[test]
    fn test_stale_timestamp_rejected() {
        let payload = b"{}";
        let header = sign(payload, "whsec_test", 1_700_000_000);
        assert!(!verify_webhook_signature(
            payload,
            &header,
            "whsec_test",
            1_700_000_000 + TOLERANCE_SECS + 1
        ));
    }

    #[test]
    fn test_malformed_header_rejected() {
        assert!(!verify_webhook_signature(b"{}", "garbage", "whsec_test", 0));
        assert!(!verify_webhook_signature(b"{}", "t=notanumber,v1=aa", "whsec_test", 0));
        assert!(!verify_webhook_signature(b"{}", "t=100", "whsec_test", 100));
    }
}
