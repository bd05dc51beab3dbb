//! Relay Daemon Library
//!
//! Bridges a chat platform to an internal service mesh. The relay registers
//! with a service-discovery registry, fetches its gateway peer's credentials,
//! keeps the registration alive with heartbeats, and authenticates every
//! request in both directions with shared-secret HMAC tokens.

pub mod auth;
pub mod bridge;
pub mod config;
pub mod discovery;
pub mod error;
pub mod protocol;
pub mod relay;
pub mod server;
pub mod transport;
pub mod validation;
