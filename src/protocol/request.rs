//! Outgoing request types.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::auth::AuthCodec;

/// HTTP method used for a signed request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
    Post,
}

/// A request whose `Token` header is the HMAC of its JSON body.
///
/// The only way to build one is [`SignedRequest::new`], so the token always
/// matches the body that is sent.
#[derive(Debug, Clone)]
pub struct SignedRequest {
    pub method: HttpMethod,
    pub url: String,
    pub body: Value,
    pub token: String,
}

impl SignedRequest {
    /// Sign `body` with `codec` and wrap it for sending.
    pub fn new(method: HttpMethod, url: impl Into<String>, body: Value, codec: &AuthCodec) -> Self {
        let token = codec.sign(&body).into_string();
        Self {
            method,
            url: url.into(),
            body,
            token,
        }
    }
}

/// Self-description posted to the registry on registration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceInfo {
    pub service_name: String,
    pub host: String,
    pub port: u16,
    #[serde(default)]
    pub capabilities: Vec<String>,
}

/// Body of the credential lookup request.
#[derive(Debug, Clone, Serialize)]
pub struct CredentialsQuery<'a> {
    pub service_names: &'a [String],
}

/// Fixed liveness payload sent on every heartbeat.
pub fn heartbeat_payload() -> Value {
    serde_json::json!({ "status_code": 200 })
}
