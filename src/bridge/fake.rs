//! In-memory chat platform for unit tests.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::RelayError;

use super::ChatPlatform;

#[derive(Default)]
pub struct FakePlatform {
    inbox: Mutex<VecDeque<Vec<Value>>>,
    sent: Mutex<Vec<(i64, String)>>,
    polls: Mutex<usize>,
    failing: AtomicBool,
}

impl FakePlatform {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue the result of one future poll.
    pub fn push_batch(&self, batch: Vec<Value>) {
        self.inbox.lock().unwrap().push_back(batch);
    }

    pub fn sent(&self) -> Vec<(i64, String)> {
        self.sent.lock().unwrap().clone()
    }

    pub fn polls(&self) -> usize {
        *self.polls.lock().unwrap()
    }

    /// Make every later `send_message` fail.
    pub fn fail_sends(&self) {
        self.failing.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl ChatPlatform for FakePlatform {
    async fn fetch_messages(&self) -> Result<Vec<Value>, RelayError> {
        *self.polls.lock().unwrap() += 1;
        Ok(self.inbox.lock().unwrap().pop_front().unwrap_or_default())
    }

    async fn send_message(&self, chat_id: i64, text: &str) -> Result<(), RelayError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(RelayError::Upstream { status: 403 });
        }
        self.sent.lock().unwrap().push((chat_id, text.to_string()));
        Ok(())
    }
}
