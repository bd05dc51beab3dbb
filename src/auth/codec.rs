//! HMAC-SHA256 payload signing and verification.
//!
//! ## Canonical form
//!
//! Payloads are JSON values serialized compactly (no whitespace) with object
//! keys sorted by byte order at every level. Strings, numbers and literals
//! are written exactly as `serde_json` writes them. Every signer and verifier
//! must hash these bytes, so changing this function breaks interoperability.

use std::fmt;

use ring::hmac;
use serde_json::Value;

use super::SharedSecret;

/// Hex-encoded HMAC-SHA256 digest of one canonical payload.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AuthToken(String);

impl AuthToken {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for AuthToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Signs and verifies payloads under a single shared secret.
pub struct AuthCodec {
    key: hmac::Key,
}

impl AuthCodec {
    /// Create a codec that owns `secret`.
    pub fn new(secret: SharedSecret) -> Self {
        let key = hmac::Key::new(hmac::HMAC_SHA256, secret.as_bytes());
        Self { key }
    }

    /// Compute the token for `payload`.
    pub fn sign(&self, payload: &Value) -> AuthToken {
        let message = canonicalize(payload);
        let tag = hmac::sign(&self.key, &message);
        AuthToken(hex::encode(tag.as_ref()))
    }

    /// Check `token` against `payload` in constant time.
    ///
    /// Empty, non-hex or wrong-length tokens are simply rejected.
    pub fn verify(&self, payload: &Value, token: &str) -> bool {
        if token.is_empty() {
            return false;
        }
        let Ok(tag) = hex::decode(token) else {
            return false;
        };
        let message = canonicalize(payload);
        hmac::verify(&self.key, &message, &tag).is_ok()
    }
}

impl fmt::Debug for AuthCodec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthCodec").finish_non_exhaustive()
    }
}

/// Serialize `value` into its canonical byte form.
pub fn canonicalize(value: &Value) -> Vec<u8> {
    let mut out = Vec::new();
    write_canonical(value, &mut out);
    out
}

fn write_canonical(value: &Value, out: &mut Vec<u8>) {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<(&String, &Value)> = map.iter().collect();
            entries.sort_by(|a, b| a.0.cmp(b.0));

            out.push(b'{');
            for (i, (key, item)) in entries.into_iter().enumerate() {
                if i > 0 {
                    out.push(b',');
                }
                write_scalar(&Value::from(key.as_str()), out);
                out.push(b':');
                write_canonical(item, out);
            }
            out.push(b'}');
        }
        Value::Array(items) => {
            out.push(b'[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(b',');
                }
                write_canonical(item, out);
            }
            out.push(b']');
        }
        scalar => write_scalar(scalar, out),
    }
}

fn write_scalar(value: &Value, out: &mut Vec<u8>) {
    // Display on a scalar Value is its compact JSON encoding.
    out.extend_from_slice(value.to_string().as_bytes());
}
