//! GitHub webhook signature computation and verification.
//!
//! GitHub signs the legacy `X-Hub-Signature` header using HMAC-SHA1 over the
//! raw request body, keyed with the secret from the webhook configuration.
//! Reference: https://docs.github.com/en/webhooks/using-webhooks/validating-webhook-deliveries

use hmac::{Hmac, Mac};
use sha1::Sha1;

type HmacSha1 = Hmac<Sha1>;

/// Prefix GitHub puts in front of the hex digest in `X-Hub-Signature`.
pub const SIGNATURE_PREFIX: &str = "sha1=";

/// Calculate the HMAC-SHA1 signature of `payload`, keyed with `secret`.
///
/// Returns the lowercase hex digest without any prefix. Empty payloads and
/// empty secrets are valid and produce a deterministic digest.
pub fn sign(payload: &[u8], secret: &str) -> String {
    let mut mac =
        HmacSha1::new_from_slice(secret.as_bytes()).expect("HMAC can take key of any size");
    mac.update(payload);
    hex::encode(mac.finalize().into_bytes())
}

/// The full header value GitHub would send for `payload`: `sha1=<hex digest>`.
pub fn signature_header_value(payload: &[u8], secret: &str) -> String {
    format!("{}{}", SIGNATURE_PREFIX, sign(payload, secret))
}

/// Verify a provided `X-Hub-Signature` value against the calculated one.
///
/// The provided value is compared as raw header bytes, so a header that is
/// not valid UTF-8 simply fails to match.
pub fn verify(payload: &[u8], secret: &str, provided: &[u8]) -> bool {
    let expected = signature_header_value(payload, secret);
    constant_time_compare(expected.as_bytes(), provided)
}

/// Constant-time byte comparison to prevent timing attacks.
pub(crate) fn constant_time_compare(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }

    let mut result = 0u8;
    for (x, y) in a.iter().zip(b.iter()) {
        result |= x ^ y;
    }
    result == 0
}
