//! Input validation module.
//!
//! Validates inbound request bodies after they have been authenticated.

mod chatbot;

pub use chatbot::{validate_chatbot_response, ChatbotResponse, FieldErrors};
