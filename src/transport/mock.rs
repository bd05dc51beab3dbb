//! Scripted transport for unit tests.

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::RelayError;
use crate::protocol::{SignedRequest, TransportResponse};

use super::Transport;

#[derive(Debug, Clone)]
pub enum MockReply {
    Response(TransportResponse),
    Unreachable,
}

impl MockReply {
    pub fn status(code: u16) -> Self {
        MockReply::Response(TransportResponse::new(code, Vec::new()))
    }

    pub fn json(code: u16, body: Value) -> Self {
        MockReply::Response(TransportResponse::new(code, body.to_string()))
    }
}

struct Route {
    fragment: String,
    replies: VecDeque<MockReply>,
}

/// Replies are matched by URL substring and consumed in order; the last reply
/// of a route repeats forever. Unmatched URLs get a 404.
#[derive(Default)]
pub struct MockTransport {
    routes: Mutex<Vec<Route>>,
    calls: Mutex<Vec<SignedRequest>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on(self, fragment: &str, replies: Vec<MockReply>) -> Self {
        self.routes.lock().unwrap().push(Route {
            fragment: fragment.to_string(),
            replies: replies.into(),
        });
        self
    }

    pub fn calls(&self) -> Vec<SignedRequest> {
        self.calls.lock().unwrap().clone()
    }

    pub fn count(&self, fragment: &str) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|call| call.url.contains(fragment))
            .count()
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn send(&self, request: SignedRequest) -> Result<TransportResponse, RelayError> {
        let reply = {
            let mut routes = self.routes.lock().unwrap();
            routes
                .iter_mut()
                .find(|route| request.url.contains(&route.fragment))
                .map(|route| {
                    if route.replies.len() > 1 {
                        route.replies.pop_front().unwrap()
                    } else {
                        route.replies.front().cloned().unwrap_or(MockReply::status(404))
                    }
                })
                .unwrap_or(MockReply::status(404))
        };
        self.calls.lock().unwrap().push(request);

        match reply {
            MockReply::Response(response) => Ok(response),
            MockReply::Unreachable => Err(RelayError::Transport {
                message: "connection refused".to_string(),
            }),
        }
    }
}
