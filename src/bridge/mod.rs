//! Chat bridge module.
//!
//! Polls the chat platform and forwards every new message to the gateway
//! peer, signed with the gateway's shared secret.

#[cfg(test)]
pub(crate) mod fake;
mod forwarder;
mod platform;
mod telegram;

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};

pub use forwarder::GatewayForwarder;
pub use platform::ChatPlatform;
pub use telegram::{flatten_update, TelegramClient};

/// Poll `platform` every `poll_interval` and forward what arrives.
///
/// Runs until the task is dropped. Poll and forward failures are logged and
/// the loop carries on with the next poll.
pub async fn run_bridge(
    platform: Arc<dyn ChatPlatform>,
    forwarder: Arc<GatewayForwarder>,
    poll_interval: Duration,
) {
    loop {
        tokio::time::sleep(poll_interval).await;

        let messages = match platform.fetch_messages().await {
            Ok(messages) => messages,
            Err(e) => {
                warn!(error = %e, "Failed to poll chat platform");
                continue;
            }
        };

        for message in &messages {
            if let Err(e) = forwarder.forward(message).await {
                warn!(error = %e, endpoint = %forwarder.endpoint(), "Failed to forward message");
            }
        }
        if !messages.is_empty() {
            debug!(count = messages.len(), "Forwarded batch");
        }
    }
}
