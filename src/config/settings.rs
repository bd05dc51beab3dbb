//! Configuration settings for the relay daemon.

use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::auth::SharedSecret;
use crate::discovery::{DiscoveryPolicy, RegistryEndpoints, RetryPolicy};
use crate::error::RelayError;
use crate::protocol::ServiceInfo;

/// Main configuration structure for the relay.
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub general: GeneralConfig,
    pub security: SecretConfig,
    pub registry: RegistryConfig,
    #[serde(default)]
    pub discovery: DiscoveryConfig,
    #[serde(default)]
    pub gateway: GatewayConfig,
    pub telegram: TelegramConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Identity of this service and the address the inbound endpoint binds to.
#[derive(Debug, Clone, Deserialize)]
pub struct GeneralConfig {
    /// Service name announced to the registry.
    pub name: String,
    /// Bind/announce host.
    pub host: String,
    /// Bind/announce port.
    pub port: u16,
    /// Capabilities declared on registration.
    #[serde(default)]
    pub capabilities: Vec<String>,
}

/// A shared secret, given inline or as a path to a 0600 file.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SecretConfig {
    pub secret_key: Option<String>,
    pub secret_path: Option<PathBuf>,
}

/// Service-discovery registry location and trust.
#[derive(Debug, Clone, Deserialize)]
pub struct RegistryConfig {
    pub host: String,
    pub port: u16,
    /// Path of the register endpoint, relative to the registry root.
    #[serde(default = "default_register_endpoint")]
    pub register_endpoint: String,
    #[serde(flatten)]
    pub secret: SecretConfig,
}

/// Retry and heartbeat timing.
#[derive(Debug, Clone, Deserialize)]
pub struct DiscoveryConfig {
    #[serde(default = "default_register_retry")]
    pub register_retry_seconds: u64,
    #[serde(default = "default_credentials_retry")]
    pub credentials_retry_seconds: u64,
    #[serde(default = "default_heartbeat_interval")]
    pub heartbeat_interval_seconds: u64,
    /// Unset means retry forever.
    #[serde(default)]
    pub max_register_attempts: Option<u32>,
    /// Unset means retry forever.
    #[serde(default)]
    pub max_credential_attempts: Option<u32>,
    /// Per-request timeout for registry and gateway calls.
    #[serde(default = "default_request_timeout")]
    pub request_timeout_seconds: u64,
}

/// The peer messages are forwarded to.
#[derive(Debug, Clone, Deserialize)]
pub struct GatewayConfig {
    /// Peer name requested from the registry.
    #[serde(default = "default_gateway_name")]
    pub service_name: String,
    /// Path messages are POSTed to on the peer.
    #[serde(default = "default_message_path")]
    pub message_path: String,
}

/// Telegram Bot API settings.
#[derive(Debug, Clone, Deserialize)]
pub struct TelegramConfig {
    /// Bot token.
    pub token: String,
    /// Pause between polls.
    #[serde(default = "default_poll_interval")]
    pub poll_interval_seconds: u64,
    /// `timeout` passed to getUpdates.
    #[serde(default = "default_long_poll_timeout")]
    pub long_poll_timeout_seconds: u64,
    #[serde(default = "default_api_base")]
    pub api_base: String,
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Log format ("pretty" or "json").
    #[serde(default = "default_log_format")]
    pub format: String,
}

// Default value functions
fn default_register_endpoint() -> String {
    "register".to_string()
}

fn default_register_retry() -> u64 {
    10
}

fn default_credentials_retry() -> u64 {
    3
}

fn default_heartbeat_interval() -> u64 {
    30
}

fn default_request_timeout() -> u64 {
    10
}

fn default_gateway_name() -> String {
    "gateway".to_string()
}

fn default_message_path() -> String {
    "/msg".to_string()
}

fn default_poll_interval() -> u64 {
    10
}

fn default_long_poll_timeout() -> u64 {
    100
}

fn default_api_base() -> String {
    "https://api.telegram.org".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            register_retry_seconds: default_register_retry(),
            credentials_retry_seconds: default_credentials_retry(),
            heartbeat_interval_seconds: default_heartbeat_interval(),
            max_register_attempts: None,
            max_credential_attempts: None,
            request_timeout_seconds: default_request_timeout(),
        }
    }
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            service_name: default_gateway_name(),
            message_path: default_message_path(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

impl SecretConfig {
    /// Resolve into key material. Exactly one source must be set.
    pub fn resolve(&self, section: &str) -> Result<SharedSecret, RelayError> {
        match (&self.secret_key, &self.secret_path) {
            (Some(key), None) => SharedSecret::new(key.as_bytes()),
            (None, Some(path)) => SharedSecret::from_file(path),
            (Some(_), Some(_)) => Err(RelayError::config(format!(
                "[{}] sets both secret_key and secret_path",
                section
            ))),
            (None, None) => Err(RelayError::config(format!(
                "[{}] needs secret_key or secret_path",
                section
            ))),
        }
    }

    fn check(&self, section: &str) -> Result<(), RelayError> {
        match (&self.secret_key, &self.secret_path) {
            (Some(key), None) if key.is_empty() => Err(RelayError::config(format!(
                "[{}] secret_key is empty",
                section
            ))),
            (Some(_), None) | (None, Some(_)) => Ok(()),
            (Some(_), Some(_)) => Err(RelayError::config(format!(
                "[{}] sets both secret_key and secret_path",
                section
            ))),
            (None, None) => Err(RelayError::config(format!(
                "[{}] needs secret_key or secret_path",
                section
            ))),
        }
    }
}

impl DiscoveryConfig {
    pub fn policy(&self) -> DiscoveryPolicy {
        DiscoveryPolicy {
            register: RetryPolicy::fixed(Duration::from_secs(self.register_retry_seconds))
                .with_max_attempts(self.max_register_attempts),
            credentials: RetryPolicy::fixed(Duration::from_secs(self.credentials_retry_seconds))
                .with_max_attempts(self.max_credential_attempts),
            heartbeat_interval: Duration::from_secs(self.heartbeat_interval_seconds),
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_seconds)
    }
}

impl Settings {
    /// Load settings from a TOML configuration file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, RelayError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| RelayError::Config {
            message: format!("Failed to read config file '{}': {}", path.display(), e),
        })?;

        let settings = Self::parse(&content).map_err(|e| RelayError::Config {
            message: format!("Failed to load config file '{}': {}", path.display(), e),
        })?;

        Ok(settings)
    }

    /// Parse and validate settings from TOML text.
    pub fn parse(content: &str) -> Result<Self, RelayError> {
        let settings: Settings = toml::from_str(content).map_err(|e| RelayError::Config {
            message: e.to_string(),
        })?;

        settings.validate()?;

        Ok(settings)
    }

    /// What this process announces to the registry.
    pub fn service_info(&self) -> ServiceInfo {
        ServiceInfo {
            service_name: self.general.name.clone(),
            host: self.general.host.clone(),
            port: self.general.port,
            capabilities: self.general.capabilities.clone(),
        }
    }

    pub fn registry_endpoints(&self) -> RegistryEndpoints {
        RegistryEndpoints::new(
            &self.registry.host,
            self.registry.port,
            &self.registry.register_endpoint,
        )
    }

    /// Validate the settings.
    fn validate(&self) -> Result<(), RelayError> {
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.logging.level.to_lowercase().as_str()) {
            return Err(RelayError::Config {
                message: format!(
                    "Invalid log level '{}'. Valid levels: {:?}",
                    self.logging.level, valid_levels
                ),
            });
        }

        let valid_formats = ["pretty", "json"];
        if !valid_formats.contains(&self.logging.format.to_lowercase().as_str()) {
            return Err(RelayError::Config {
                message: format!(
                    "Invalid log format '{}'. Valid formats: {:?}",
                    self.logging.format, valid_formats
                ),
            });
        }

        if self.general.name.trim().is_empty() {
            return Err(RelayError::config("[general] name cannot be empty"));
        }
        if self.general.host.trim().is_empty() {
            return Err(RelayError::config("[general] host cannot be empty"));
        }
        if self.gateway.service_name.trim().is_empty() {
            return Err(RelayError::config("[gateway] service_name cannot be empty"));
        }

        self.security.check("security")?;
        self.registry.secret.check("registry")?;

        let intervals = [
            ("register_retry_seconds", self.discovery.register_retry_seconds),
            ("credentials_retry_seconds", self.discovery.credentials_retry_seconds),
            ("heartbeat_interval_seconds", self.discovery.heartbeat_interval_seconds),
            ("request_timeout_seconds", self.discovery.request_timeout_seconds),
            ("poll_interval_seconds", self.telegram.poll_interval_seconds),
        ];
        for (name, value) in intervals {
            if value == 0 {
                return Err(RelayError::Config {
                    message: format!("{} must be greater than zero", name),
                });
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"
        [general]
        name = "telegram"
        host = "0.0.0.0"
        port = 8080

        [security]
        secret_key = "inbound"

        [registry]
        host = "registry"
        port = 9000
        secret_key = "registry"

        [telegram]
        token = "123:abc"
    "#;

    #[test]
    fn test_default_values() {
        let settings = Settings::parse(MINIMAL).unwrap();
        assert_eq!(settings.registry.register_endpoint, "register");
        assert_eq!(settings.discovery.register_retry_seconds, 10);
        assert_eq!(settings.discovery.credentials_retry_seconds, 3);
        assert_eq!(settings.discovery.heartbeat_interval_seconds, 30);
        assert_eq!(settings.gateway.service_name, "gateway");
        assert_eq!(settings.gateway.message_path, "/msg");
        assert_eq!(settings.logging.level, "info");
        assert_eq!(settings.logging.format, "pretty");
        assert!(settings.general.capabilities.is_empty());

        let policy = settings.discovery.policy();
        assert_eq!(policy, DiscoveryPolicy::default());
    }

    #[test]
    fn test_secrets_resolve() {
        let settings = Settings::parse(MINIMAL).unwrap();
        assert_eq!(settings.security.resolve("security").unwrap().as_bytes(), b"inbound");
        assert_eq!(
            settings.registry.secret.resolve("registry").unwrap().as_bytes(),
            b"registry"
        );
    }

    #[test]
    fn test_missing_secret_rejected() {
        let content = MINIMAL.replace("secret_key = \"inbound\"", "");
        assert!(matches!(Settings::parse(&content), Err(RelayError::Config { .. })));
    }

    #[test]
    fn test_both_secret_sources_rejected() {
        let content = MINIMAL.replace(
            "secret_key = \"registry\"",
            "secret_key = \"registry\"\nsecret_path = \"/etc/relay/registry.key\"",
        );
        assert!(Settings::parse(&content).is_err());
    }

    #[test]
    fn test_invalid_log_level() {
        let content = format!("{}\n[logging]\nlevel = \"loud\"\n", MINIMAL);
        assert!(Settings::parse(&content).is_err());
    }

    #[test]
    fn test_zero_interval_rejected() {
        let content = format!("{}\n[discovery]\nheartbeat_interval_seconds = 0\n", MINIMAL);
        assert!(Settings::parse(&content).is_err());
    }

    #[test]
    fn test_bounded_policy() {
        let content = format!(
            "{}\n[discovery]\nmax_register_attempts = 5\nregister_retry_seconds = 2\n",
            MINIMAL
        );
        let policy = Settings::parse(&content).unwrap().discovery.policy();
        assert_eq!(policy.register.max_attempts, Some(5));
        assert_eq!(policy.register.delay, Duration::from_secs(2));
        assert_eq!(policy.credentials.max_attempts, None);
    }

    #[tokio::test]
    async fn test_hostname_host_binds() {
        let content = MINIMAL
            .replace("host = \"0.0.0.0\"", "host = \"localhost\"")
            .replace("port = 8080", "port = 0");
        let settings = Settings::parse(&content).unwrap();
        assert_eq!(settings.service_info().host, "localhost");

        let listener = crate::server::bind(&settings.general.host, settings.general.port)
            .await
            .unwrap();
        assert!(listener.local_addr().unwrap().ip().is_loopback());
    }

    #[test]
    fn test_empty_host_rejected() {
        let content = MINIMAL.replace("host = \"0.0.0.0\"", "host = \"\"");
        assert!(matches!(Settings::parse(&content), Err(RelayError::Config { .. })));
    }

    #[test]
    fn test_service_info() {
        let settings = Settings::parse(MINIMAL).unwrap();
        let info = settings.service_info();
        assert_eq!(info.service_name, "telegram");
        assert_eq!(info.port, 8080);
        assert_eq!(
            settings.registry_endpoints().register_url(),
            "http://registry:9000/register"
        );
    }
}
