//! Signed delivery of chat messages to the gateway peer.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use serde_json::Value;
use tracing::debug;

use crate::auth::AuthCodec;
use crate::discovery::Credential;
use crate::error::{RelayError, RelayResult};
use crate::protocol::{HttpMethod, SignedRequest};
use crate::transport::Transport;

/// POSTs messages to the gateway, signed with the gateway's secret.
///
/// Built only from fetched credentials, so no signed request can exist
/// before discovery is `Ready`.
pub struct GatewayForwarder {
    transport: Arc<dyn Transport>,
    codec: AuthCodec,
    endpoint: String,
    forwarded: AtomicU64,
}

impl GatewayForwarder {
    pub(crate) fn new(
        transport: Arc<dyn Transport>,
        credential: &Credential,
        message_path: &str,
    ) -> Self {
        let path = message_path.trim_start_matches('/');
        Self {
            transport,
            codec: AuthCodec::new(credential.shared_secret.clone()),
            endpoint: format!("{}/{}", credential.base_url(), path),
            forwarded: AtomicU64::new(0),
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Messages accepted by the gateway so far.
    pub fn forwarded(&self) -> u64 {
        self.forwarded.load(Ordering::Relaxed)
    }

    /// Sign and send one message.
    pub async fn forward(&self, message: &Value) -> RelayResult<()> {
        let request = SignedRequest::new(
            HttpMethod::Post,
            self.endpoint.clone(),
            message.clone(),
            &self.codec,
        );
        let response = self.transport.send(request).await?;

        if !response.is_success() {
            return Err(RelayError::Upstream {
                status: response.status,
            });
        }

        self.forwarded.fetch_add(1, Ordering::Relaxed);
        debug!(endpoint = %self.endpoint, "Message forwarded to gateway");
        Ok(())
    }
}
