//! Inbound request authentication.

use serde_json::Value;

use crate::error::AuthErrorKind;

use super::AuthCodec;

/// Outcome of authenticating one inbound request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    Accepted,
    Rejected { code: u16, message: String },
}

impl Decision {
    fn reject(kind: AuthErrorKind) -> Self {
        Decision::Rejected {
            code: 401,
            message: kind.to_string(),
        }
    }

    pub fn is_accepted(&self) -> bool {
        matches!(self, Decision::Accepted)
    }
}

/// Validates the `Token` header of inbound requests against their body.
///
/// Holds only the inbound codec, so concurrent requests share nothing mutable.
#[derive(Debug)]
pub struct RequestAuthenticator {
    codec: AuthCodec,
}

impl RequestAuthenticator {
    pub fn new(codec: AuthCodec) -> Self {
        Self { codec }
    }

    /// Decide whether a request may be processed.
    pub fn authenticate(&self, header_token: Option<&str>, body: &Value) -> Decision {
        let token = match header_token.map(str::trim) {
            Some(token) if !token.is_empty() => token,
            _ => return Decision::reject(AuthErrorKind::MissingToken),
        };

        if self.codec.verify(body, token) {
            Decision::Accepted
        } else {
            Decision::reject(AuthErrorKind::InvalidToken)
        }
    }
}
