//! Webhook signature verification.
//!
//! WeChat signs each webhook call with `sha1(sort(token, timestamp,
//! nonce))`. Verification happens before any message reaches the
//! coordinator; the GET handshake additionally echoes `echostr` back.

use sha1::{Digest, Sha1};

/// Compute the expected signature for the given parameters.
pub fn compute(token: &str, timestamp: &str, nonce: &str) -> String {
    let mut parts = [token, timestamp, nonce];
    parts.sort_unstable();

    let mut hasher = Sha1::new();
    for part in parts {
        hasher.update(part.as_bytes());
    }
    hex::encode(hasher.finalize())
}

/// Check a claimed signature against the shared token.
pub fn verify(token: &str, timestamp: &str, nonce: &str, signature: &str) -> bool {
    compute(token, timestamp, nonce).eq_ignore_ascii_case(signature)
}
