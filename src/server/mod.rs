//! Inbound HTTP endpoint.
//!
//! Exposes `POST /send_response`, through which the chatbot service pushes
//! replies back to chat users. Every request is authenticated before its
//! body is looked at.

mod endpoint;

use std::sync::Arc;

use axum::routing::post;
use axum::Router;
use tokio::net::TcpListener;

use crate::auth::RequestAuthenticator;
use crate::bridge::ChatPlatform;
use crate::error::{RelayError, RelayResult};

use endpoint::{send_response, InboundState};

/// Bind the inbound listener on `host:port`.
///
/// `host` may be an IP literal (v4 or v6) or a name resolved through the
/// system resolver, the same value announced to the registry.
pub async fn bind(host: &str, port: u16) -> RelayResult<TcpListener> {
    TcpListener::bind((host, port)).await.map_err(|e| {
        RelayError::config(format!(
            "Failed to bind inbound endpoint on {}:{}: {}",
            host, port, e
        ))
    })
}

/// Build the inbound router.
pub fn router(authenticator: Arc<RequestAuthenticator>, platform: Arc<dyn ChatPlatform>) -> Router {
    Router::new()
        .route("/send_response", post(send_response))
        .with_state(InboundState {
            authenticator,
            platform,
        })
}
