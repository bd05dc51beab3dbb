//! Wire protocol module.
//!
//! Defines the signed request envelope and the payloads exchanged with the
//! registry, the gateway peer and inbound callers.
//!
//! ## Authentication header
//!
//! Every request carries a `Token` header holding the hex HMAC-SHA256 of the
//! canonical JSON body (see [`crate::auth::canonicalize`]).

mod request;
mod response;

pub use request::{heartbeat_payload, CredentialsQuery, HttpMethod, ServiceInfo, SignedRequest};
pub use response::{StatusBody, TransportResponse};

/// Header carrying the HMAC token.
pub const TOKEN_HEADER: &str = "Token";
