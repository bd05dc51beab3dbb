//! Relay wiring.
//!
//! Builds every component from configuration and enforces the startup order:
//! discovery reaches `Ready` before the inbound endpoint or the outbound
//! bridge can be created.

mod coordinator;

pub use coordinator::{ReadyRelay, RelayCoordinator};
