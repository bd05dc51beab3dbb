//! Chatbot response validation.
//!
//! The inbound endpoint accepts `{"text": <string>, "chat_id": <integer>}`.
//! Errors are reported per field so callers can fix every problem at once.

use std::collections::BTreeMap;

use serde::Serialize;
use serde_json::Value;

const MISSING: &str = "Missing data for required field.";
const NOT_A_STRING: &str = "Not a valid string.";
const NOT_AN_INTEGER: &str = "Not a valid integer.";
const NOT_AN_OBJECT: &str = "Invalid input type.";

/// A validated reply to deliver to a chat.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChatbotResponse {
    pub text: String,
    pub chat_id: i64,
}

/// Field name to error messages, serialized as the 400 response body.
pub type FieldErrors = BTreeMap<String, Vec<String>>;

/// Validate an inbound body.
pub fn validate_chatbot_response(body: &Value) -> Result<ChatbotResponse, FieldErrors> {
    let mut errors = FieldErrors::new();

    let Some(object) = body.as_object() else {
        errors.insert("_schema".to_string(), vec![NOT_AN_OBJECT.to_string()]);
        return Err(errors);
    };

    let text = match object.get("text") {
        None | Some(Value::Null) => {
            errors.insert("text".to_string(), vec![MISSING.to_string()]);
            None
        }
        Some(Value::String(text)) => Some(text.clone()),
        Some(_) => {
            errors.insert("text".to_string(), vec![NOT_A_STRING.to_string()]);
            None
        }
    };

    let chat_id = match object.get("chat_id") {
        None | Some(Value::Null) => {
            errors.insert("chat_id".to_string(), vec![MISSING.to_string()]);
            None
        }
        Some(value) => match parse_integer(value) {
            Some(id) => Some(id),
            None => {
                errors.insert("chat_id".to_string(), vec![NOT_AN_INTEGER.to_string()]);
                None
            }
        },
    };

    match (text, chat_id) {
        (Some(text), Some(chat_id)) if errors.is_empty() => Ok(ChatbotResponse { text, chat_id }),
        _ => Err(errors),
    }
}

/// Integers may arrive as JSON numbers or numeric strings.
fn parse_integer(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}
