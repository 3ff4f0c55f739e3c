// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! HMAC-SHA256 webhook signatures.
//!
//! The header value is `sha256=` followed by the lowercase hex HMAC of the
//! exact request body bytes, keyed with the endpoint's secret.

use super::error::{DeliveryError, Result};
use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

const PREFIX: &str = "sha256=";

/// Sign `body` with `secret`, producing the `X-Webhook-Signature` value.
pub fn sign(body: &[u8], secret: &str) -> Result<String> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|_| DeliveryError::configuration("invalid signing secret"))?;
    mac.update(body);
    Ok(format!("{PREFIX}{}", hex::encode(mac.finalize().into_bytes())))
}

/// Check a received signature header against `body`.
///
/// Receivers can use this to authenticate deliveries.
pub fn verify(body: &[u8], header: &str, secret: &str) -> bool {
    let Some(hex_signature) = header.strip_prefix(PREFIX) else {
        return false;
    };
    let Ok(expected) = hex::decode(hex_signature) else {
        return false;
    };
    let Ok(mut mac) = HmacSha256::new_from_slice(secret.as_bytes()) else {
        return false;
    };
    mac.update(body);
    mac.verify_slice(&expected).is_ok()
}
