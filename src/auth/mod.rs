//! Authentication module.
//!
//! Shared-secret loading, HMAC token signing and verification, and the
//! accept/reject decision for inbound requests.

mod authenticator;
mod codec;
mod secret;

pub use authenticator::{Decision, RequestAuthenticator};
pub use codec::{canonicalize, AuthCodec, AuthToken};
pub use secret::SharedSecret;
