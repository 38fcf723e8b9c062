//! Shared-secret request signatures.
//!
//! Linear signs the raw webhook body with HMAC-SHA256 and sends the hex digest
//! in the `Linear-Signature` header. Slack signs `v0:{timestamp}:{body}` and
//! sends `v0=<hex>` in `X-Slack-Signature`.
//!
//! Both checks are opt-in: with no secret configured every request passes.

use hmac::{Hmac, Mac};
use sha2::Sha256;
use tracing::warn;

type HmacSha256 = Hmac<Sha256>;

/// Maximum age of a Slack request timestamp, in seconds.
pub const SLACK_MAX_SKEW_SECS: u64 = 60 * 5;

#[derive(Debug, Clone, Default)]
pub struct SignatureValidator {
    secret: Option<String>,
}

impl SignatureValidator {
    pub fn new(secret: Option<String>) -> Self {
        Self {
            secret: secret.filter(|s| !s.is_empty()),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.secret.is_some()
    }

    /// Check `provided` (hex digest, optionally prefixed `sha256=`) against
    /// the HMAC of `body`.
    pub fn is_valid(&self, body: &[u8], provided: Option<&str>) -> bool {
        let Some(secret) = &self.secret else {
            warn!("webhook secret not configured; accepting unsigned request");
            return true;
        };
        let Some(provided) = provided else {
            return false;
        };
        let hex_sig = provided.strip_prefix("sha256=").unwrap_or(provided);
        verify_hex(secret.as_bytes(), body, hex_sig)
    }
}

/// Slack's v0 scheme. `now` is unix seconds.
///
/// Returns `true` when `secret` is empty, mirroring [`SignatureValidator`].
pub fn verify_slack_signature(
    secret: &str,
    timestamp: Option<&str>,
    body: &[u8],
    signature: Option<&str>,
    now: i64,
) -> bool {
    if secret.is_empty() {
        warn!("slack signing secret not configured; accepting unsigned request");
        return true;
    }
    let (Some(timestamp), Some(signature)) = (timestamp, signature) else {
        return false;
    };
    let Ok(ts) = timestamp.parse::<i64>() else {
        return false;
    };
    if now.abs_diff(ts) > SLACK_MAX_SKEW_SECS {
        return false;
    }
    let Some(hex_sig) = signature.strip_prefix("v0=") else {
        return false;
    };

    let mut base = format!("v0:{timestamp}:").into_bytes();
    base.extend_from_slice(body);
    verify_hex(secret.as_bytes(), &base, hex_sig)
}

/// Hex-encoded HMAC-SHA256 of `body`.
pub fn sign(secret: &[u8], body: &[u8]) -> String {
    let mut mac = HmacSha256::new_from_slice(secret).expect("HMAC accepts any key length");
    mac.update(body);
    hex::encode(mac.finalize().into_bytes())
}

/// Digests are compared in canonical form: exactly 64 lowercase hex chars.
fn verify_hex(secret: &[u8], body: &[u8], hex_sig: &str) -> bool {
    if hex_sig.len() != 64 || !hex_sig.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f')) {
        return false;
    }
    let Ok(expected) = hex::decode(hex_sig) else {
        return false;
    };
    let Ok(mut mac) = HmacSha256::new_from_slice(secret) else {
        return false;
    };
    mac.update(body);
    mac.verify_slice(&expected).is_ok()
}
