//! Transport abstraction for signed HTTP traffic.
//!
//! Registry and gateway requests both go through [`Transport`], which keeps
//! the discovery state machine and the outbound forwarder independent of the
//! HTTP client.

mod http;
#[cfg(test)]
pub(crate) mod mock;

use async_trait::async_trait;

use crate::error::RelayError;
use crate::protocol::{SignedRequest, TransportResponse};

pub use http::HttpTransport;

/// Sends a signed request and returns whatever status the peer answered with.
///
/// Non-success statuses are returned as `Ok`; only network failures are `Err`.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: SignedRequest) -> Result<TransportResponse, RelayError>;
}
