//! Service-discovery client.
//!
//! Registers this process with the registry, fetches peer credentials once
//! registered, and keeps the registration alive with heartbeats.

mod client;
mod credentials;
mod heartbeat;
mod state;

pub use client::{DiscoveryClient, DiscoveryPolicy, RegistryEndpoints, RetryPolicy};
pub use credentials::{parse_registry_response, Credential, CredentialStore};
pub use heartbeat::{HeartbeatHandle, HeartbeatStats};
pub use state::{RegistrationState, StateMachine};
