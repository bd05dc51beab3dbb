//! Chat platform abstraction.

use async_trait::async_trait;
use serde_json::Value;

use crate::error::RelayError;

/// The chat service on the far side of the relay.
#[async_trait]
pub trait ChatPlatform: Send + Sync {
    /// Messages received since the previous call, ready to forward.
    async fn fetch_messages(&self) -> Result<Vec<Value>, RelayError>;

    /// Deliver `text` to `chat_id`.
    async fn send_message(&self, chat_id: i64, text: &str) -> Result<(), RelayError>;
}
