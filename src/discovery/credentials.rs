//! Peer credentials and their write-once store.

use std::collections::HashMap;
use std::sync::OnceLock;

use serde::{Deserialize, Deserializer};
use serde_json::Value;

use crate::auth::SharedSecret;
use crate::error::{DiscoveryErrorKind, RelayError};

/// Connection info and shared secret for one peer service.
#[derive(Debug, Clone)]
pub struct Credential {
    pub service_name: String,
    pub host: String,
    pub port: u16,
    pub shared_secret: SharedSecret,
}

impl Credential {
    /// `http://host:port`
    pub fn base_url(&self) -> String {
        format!("http://{}:{}", self.host, self.port)
    }
}

/// Holds peer credentials once discovery has fetched them.
///
/// Written exactly once; every later read is lock-free.
#[derive(Debug, Default)]
pub struct CredentialStore {
    credentials: OnceLock<HashMap<String, Credential>>,
}

impl CredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store the fetched credentials. Fails if called twice.
    pub fn set(&self, credentials: HashMap<String, Credential>) -> Result<(), RelayError> {
        self.credentials
            .set(credentials)
            .map_err(|_| RelayError::discovery(DiscoveryErrorKind::CredentialsAlreadySet))
    }

    /// Look up a peer.
    pub fn get(&self, peer: &str) -> Result<&Credential, RelayError> {
        let credentials = self
            .credentials
            .get()
            .ok_or(RelayError::discovery(DiscoveryErrorKind::CredentialsNotReady))?;

        credentials.get(peer).ok_or_else(|| {
            RelayError::discovery(DiscoveryErrorKind::UnknownPeer {
                name: peer.to_string(),
            })
        })
    }

    pub fn is_ready(&self) -> bool {
        self.credentials.get().is_some()
    }
}

#[derive(Deserialize)]
struct RegistryEntry {
    general: GeneralSection,
    security: SecuritySection,
}

#[derive(Deserialize)]
struct GeneralSection {
    host: String,
    #[serde(deserialize_with = "port_from_number_or_string")]
    port: u16,
}

#[derive(Deserialize)]
struct SecuritySection {
    secret_key: String,
}

// Registries backed by INI files hand ports back as strings.
fn port_from_number_or_string<'de, D>(deserializer: D) -> Result<u16, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Port {
        Number(u16),
        Text(String),
    }

    match Port::deserialize(deserializer)? {
        Port::Number(port) => Ok(port),
        Port::Text(text) => text.trim().parse().map_err(serde::de::Error::custom),
    }
}

/// Parse a `get_services` response into one credential per requested peer.
///
/// Any requested peer that is absent or incomplete makes the whole response
/// malformed.
pub fn parse_registry_response(
    body: &[u8],
    requested: &[String],
) -> Result<HashMap<String, Credential>, RelayError> {
    let mut entries: HashMap<String, Value> =
        serde_json::from_slice(body).map_err(|e| malformed(format!("invalid JSON: {}", e)))?;

    let mut credentials = HashMap::with_capacity(requested.len());
    for name in requested {
        let raw = entries
            .remove(name)
            .ok_or_else(|| malformed(format!("no entry for '{}'", name)))?;
        let entry: RegistryEntry = serde_json::from_value(raw)
            .map_err(|e| malformed(format!("entry for '{}': {}", name, e)))?;
        let shared_secret = SharedSecret::new(entry.security.secret_key)
            .map_err(|_| malformed(format!("empty secret for '{}'", name)))?;

        credentials.insert(
            name.clone(),
            Credential {
                service_name: name.clone(),
                host: entry.general.host,
                port: entry.general.port,
                shared_secret,
            },
        );
    }

    Ok(credentials)
}

fn malformed(message: String) -> RelayError {
    RelayError::discovery(DiscoveryErrorKind::MalformedResponse { message })
}
