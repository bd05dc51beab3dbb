//! Error types for the relay daemon.

use thiserror::Error;

use crate::discovery::RegistrationState;

/// Main error type for the relay.
#[derive(Error, Debug)]
pub enum RelayError {
    /// Configuration-related errors.
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// Authentication errors.
    #[error("Authentication error: {kind}")]
    Auth { kind: AuthErrorKind },

    /// Registration, credential exchange and heartbeat errors.
    #[error("Discovery error: {kind}")]
    Discovery { kind: DiscoveryErrorKind },

    /// Network-level failure talking to the registry, gateway or chat API.
    #[error("Transport error: {message}")]
    Transport { message: String },

    /// A peer answered with a non-success status.
    #[error("Upstream returned HTTP {status}")]
    Upstream { status: u16 },

    /// I/O errors.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization errors.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Authentication error kinds.
#[derive(Error, Debug)]
pub enum AuthErrorKind {
    #[error("missing token")]
    MissingToken,

    #[error("invalid token")]
    InvalidToken,

    #[error("Failed to load shared secret: {message}")]
    SecretError { message: String },
}

/// Discovery error kinds.
#[derive(Error, Debug)]
pub enum DiscoveryErrorKind {
    #[error("Invalid registration transition from {from:?} to {to:?}")]
    InvalidTransition {
        from: RegistrationState,
        to: RegistrationState,
    },

    #[error("Gave up on {phase} after {attempts} attempts")]
    RetriesExhausted { phase: &'static str, attempts: u32 },

    #[error("Malformed registry response: {message}")]
    MalformedResponse { message: String },

    #[error("Peer credentials have not been fetched yet")]
    CredentialsNotReady,

    #[error("Peer credentials were already stored")]
    CredentialsAlreadySet,

    #[error("No credentials for peer '{name}'")]
    UnknownPeer { name: String },
}

/// Result type alias for relay operations.
pub type RelayResult<T> = Result<T, RelayError>;

impl RelayError {
    pub(crate) fn discovery(kind: DiscoveryErrorKind) -> Self {
        RelayError::Discovery { kind }
    }

    pub(crate) fn config(message: impl Into<String>) -> Self {
        RelayError::Config {
            message: message.into(),
        }
    }
}

impl From<reqwest::Error> for RelayError {
    fn from(e: reqwest::Error) -> Self {
        RelayError::Transport {
            message: e.to_string(),
        }
    }
}
