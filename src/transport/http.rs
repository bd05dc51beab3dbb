//! `reqwest`-backed transport.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use tracing::debug;

use crate::auth::canonicalize;
use crate::error::RelayError;
use crate::protocol::{HttpMethod, SignedRequest, TransportResponse, TOKEN_HEADER};

use super::Transport;

/// HTTP client for registry and gateway requests.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    /// Create a transport whose requests time out after `timeout`.
    pub fn new(timeout: Duration) -> Result<Self, RelayError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .tcp_keepalive(Duration::from_secs(30))
            .build()?;
        Ok(Self { client })
    }

    /// Reuse an existing client.
    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(&self, request: SignedRequest) -> Result<TransportResponse, RelayError> {
        let builder = match request.method {
            HttpMethod::Get => self.client.get(&request.url),
            HttpMethod::Post => self.client.post(&request.url),
        };

        // The body goes out in canonical form so byte-level verifiers agree too.
        let response = builder
            .header(TOKEN_HEADER, &request.token)
            .header(CONTENT_TYPE, "application/json")
            .body(canonicalize(&request.body))
            .send()
            .await?;

        let status = response.status().as_u16();
        let body = response.bytes().await?.to_vec();
        debug!(url = %request.url, status, "Signed request completed");

        Ok(TransportResponse { status, body })
    }
}
