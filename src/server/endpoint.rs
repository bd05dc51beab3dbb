//! `POST /send_response` handler.

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::Value;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::auth::{Decision, RequestAuthenticator};
use crate::bridge::ChatPlatform;
use crate::protocol::{StatusBody, TOKEN_HEADER};
use crate::validation::validate_chatbot_response;

/// Shared, read-only state for inbound requests.
#[derive(Clone)]
pub(crate) struct InboundState {
    pub(crate) authenticator: Arc<RequestAuthenticator>,
    pub(crate) platform: Arc<dyn ChatPlatform>,
}

/// Authenticate, validate, then deliver a chatbot reply to the chat.
pub(crate) async fn send_response(
    State(state): State<InboundState>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let request_id = Uuid::new_v4();
    // A header that is not visible ASCII still counts as a presented token.
    let token = headers
        .get(TOKEN_HEADER)
        .map(|v| String::from_utf8_lossy(v.as_bytes()));
    // A body that is not JSON can never carry a valid signature; it is
    // authenticated as null and then fails validation.
    let payload: Value = serde_json::from_slice(&body).unwrap_or(Value::Null);

    let decision = state.authenticator.authenticate(token.as_deref(), &payload);
    if let Decision::Rejected { code, message } = decision {
        warn!(request_id = %request_id, code, reason = %message, "Rejected inbound request");
        return status_response(StatusBody::new(code, message));
    }

    let reply = match validate_chatbot_response(&payload) {
        Ok(reply) => reply,
        Err(errors) => {
            debug!(request_id = %request_id, errors = ?errors, "Invalid chatbot response");
            return (StatusCode::BAD_REQUEST, Json(errors)).into_response();
        }
    };

    match state.platform.send_message(reply.chat_id, &reply.text).await {
        Ok(()) => {
            info!(request_id = %request_id, chat_id = reply.chat_id, "Chatbot response delivered");
            status_response(StatusBody::ok())
        }
        Err(e) => {
            error!(
                request_id = %request_id,
                chat_id = reply.chat_id,
                error = %e,
                "Delivery failed"
            );
            status_response(StatusBody::new(502, "delivery failed"))
        }
    }
}

fn status_response(body: StatusBody) -> Response {
    let status = StatusCode::from_u16(body.code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (status, Json(body)).into_response()
}
