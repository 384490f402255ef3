//! Webhook signature verification.
//!
//! Each platform signs deliveries with a keyed hash over the raw body (or
//! a timestamped variant). Comparison is constant-time; a malformed or
//! wrongly encoded signature simply fails verification.

use hmac::{Hmac, Mac};
use omnitrack_adapters::WebhookScheme;
use sha2::Sha256;
use subtle::ConstantTimeEq;

type HmacSha256 = Hmac<Sha256>;

fn mac_bytes(secret: &[u8], message: &[u8]) -> Option<Vec<u8>> {
    let mut mac = HmacSha256::new_from_slice(secret).ok()?;
    mac.update(message);
    Some(mac.finalize().into_bytes().to_vec())
}

/// Verify `signature` over `body` under `scheme`.
///
/// `timestamp` is required (and bound into the signed message) only for
/// [`WebhookScheme::TimestampedHmacSha256`]; it is ignored otherwise.
#[must_use]
pub fn verify_signature(
    scheme: WebhookScheme,
    secret: &[u8],
    body: &[u8],
    timestamp: Option<&str>,
    signature: &str,
) -> bool {
    let provided: Vec<u8> = match scheme {
        WebhookScheme::HmacSha256Hex | WebhookScheme::TimestampedHmacSha256 => {
            match hex::decode(signature.trim()) {
                Ok(bytes) => bytes,
                Err(_) => return false,
            }
        }
        WebhookScheme::HmacSha256Base64 => {
            use base64::engine::general_purpose::STANDARD;
            use base64::Engine;
            match STANDARD.decode(signature.trim()) {
                Ok(bytes) => bytes,
                Err(_) => return false,
            }
        }
    };

    let expected = match scheme {
        WebhookScheme::HmacSha256Hex | WebhookScheme::HmacSha256Base64 => {
            mac_bytes(secret, body)
        }
        WebhookScheme::TimestampedHmacSha256 => {
            let Some(ts) = timestamp else {
                return false;
            };
            let mut message = Vec::with_capacity(ts.len() + 1 + body.len());
            message.extend_from_slice(ts.as_bytes());
            message.push(b'.');
            message.extend_from_slice(body);
            mac_bytes(secret, &message)
        }
    };

    match expected {
        Some(expected) => expected.ct_eq(&provided).into(),
        None => false,
    }
}
