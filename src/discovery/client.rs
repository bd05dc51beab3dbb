//! Registration, credential fetch and heartbeat against the registry.

use std::future::Future;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tracing::{info, warn};

use crate::auth::AuthCodec;
use crate::error::{DiscoveryErrorKind, RelayError, RelayResult};
use crate::protocol::{heartbeat_payload, CredentialsQuery, HttpMethod, ServiceInfo, SignedRequest};
use crate::transport::Transport;

use super::credentials::parse_registry_response;
use super::heartbeat::spawn_heartbeat;
use super::{CredentialStore, HeartbeatHandle, RegistrationState, StateMachine};

/// Fixed-delay retry policy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    pub delay: Duration,
    /// `None` retries forever.
    pub max_attempts: Option<u32>,
}

impl RetryPolicy {
    pub fn fixed(delay: Duration) -> Self {
        Self {
            delay,
            max_attempts: None,
        }
    }

    pub fn with_max_attempts(mut self, max_attempts: Option<u32>) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    fn is_exhausted(&self, attempts: u32) -> bool {
        self.max_attempts.is_some_and(|max| attempts >= max)
    }
}

/// Timing for the whole discovery protocol.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveryPolicy {
    pub register: RetryPolicy,
    pub credentials: RetryPolicy,
    pub heartbeat_interval: Duration,
}

impl Default for DiscoveryPolicy {
    fn default() -> Self {
        Self {
            register: RetryPolicy::fixed(Duration::from_secs(10)),
            credentials: RetryPolicy::fixed(Duration::from_secs(3)),
            heartbeat_interval: Duration::from_secs(30),
        }
    }
}

/// Registry URLs.
#[derive(Debug, Clone)]
pub struct RegistryEndpoints {
    base_url: String,
    register_endpoint: String,
}

impl RegistryEndpoints {
    pub fn new(host: &str, port: u16, register_endpoint: &str) -> Self {
        Self::from_base_url(format!("http://{}:{}", host, port), register_endpoint)
    }

    pub fn from_base_url(base_url: impl Into<String>, register_endpoint: &str) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            register_endpoint: register_endpoint.trim_start_matches('/').to_string(),
        }
    }

    pub fn register_url(&self) -> String {
        format!("{}/{}", self.base_url, self.register_endpoint)
    }

    pub fn services_url(&self) -> String {
        format!("{}/get_services", self.base_url)
    }

    pub fn heartbeat_url(&self, self_name: &str) -> String {
        format!("{}/heartbeat/{}", self.base_url, self_name)
    }
}

/// Client side of the registry protocol.
///
/// Drives [`RegistrationState`] from `Unregistered` to `Ready`. It is the
/// only writer of that state.
pub struct DiscoveryClient {
    transport: Arc<dyn Transport>,
    codec: Arc<AuthCodec>,
    endpoints: RegistryEndpoints,
    policy: DiscoveryPolicy,
    state: StateMachine,
    register_attempts: AtomicU32,
    fetch_attempts: AtomicU32,
}

impl DiscoveryClient {
    /// `codec` must hold the registry's shared secret.
    pub fn new(
        transport: Arc<dyn Transport>,
        codec: Arc<AuthCodec>,
        endpoints: RegistryEndpoints,
        policy: DiscoveryPolicy,
    ) -> Self {
        Self {
            transport,
            codec,
            endpoints,
            policy,
            state: StateMachine::new(),
            register_attempts: AtomicU32::new(0),
            fetch_attempts: AtomicU32::new(0),
        }
    }

    pub fn state(&self) -> RegistrationState {
        self.state.current()
    }

    pub fn subscribe(&self) -> watch::Receiver<RegistrationState> {
        self.state.subscribe()
    }

    pub fn policy(&self) -> &DiscoveryPolicy {
        &self.policy
    }

    pub fn register_attempts(&self) -> u32 {
        self.register_attempts.load(Ordering::Relaxed)
    }

    pub fn fetch_attempts(&self) -> u32 {
        self.fetch_attempts.load(Ordering::Relaxed)
    }

    /// Register `info` with the registry, retrying until it answers 200.
    pub async fn register(&self, info: &ServiceInfo) -> RelayResult<()> {
        self.state.advance(RegistrationState::Registering)?;

        let body = serde_json::to_value(info)?;
        let request = SignedRequest::new(
            HttpMethod::Post,
            self.endpoints.register_url(),
            body,
            &self.codec,
        );

        retry("registration", &self.policy.register, &self.register_attempts, || {
            let request = request.clone();
            async move {
                let response = self.transport.send(request).await?;
                if !response.is_ok() {
                    return Err(RelayError::Upstream {
                        status: response.status,
                    });
                }
                Ok(())
            }
        })
        .await?;

        info!(
            service = %info.service_name,
            attempts = self.register_attempts(),
            "Registered with service discovery"
        );
        self.state.advance(RegistrationState::WaitingForCredentials)
    }

    /// Fetch credentials for `peers` and publish them into `store`.
    ///
    /// Only valid once registration has succeeded.
    pub async fn fetch_credentials(
        &self,
        peers: &[String],
        store: &CredentialStore,
    ) -> RelayResult<()> {
        let current = self.state.current();
        if current != RegistrationState::WaitingForCredentials {
            return Err(RelayError::discovery(DiscoveryErrorKind::InvalidTransition {
                from: current,
                to: RegistrationState::Ready,
            }));
        }

        let body = serde_json::to_value(CredentialsQuery { service_names: peers })?;
        let request = SignedRequest::new(
            HttpMethod::Get,
            self.endpoints.services_url(),
            body,
            &self.codec,
        );

        let policy = &self.policy.credentials;
        let credentials = retry("credential fetch", policy, &self.fetch_attempts, || {
            let request = request.clone();
            async move {
                let response = self.transport.send(request).await?;
                if !response.is_ok() {
                    return Err(RelayError::Upstream {
                        status: response.status,
                    });
                }
                parse_registry_response(&response.body, peers)
            }
        })
        .await?;

        store.set(credentials)?;
        self.state.advance(RegistrationState::Ready)?;
        info!(peers = ?peers, attempts = self.fetch_attempts(), "Peer credentials fetched");
        Ok(())
    }

    /// Register, then fetch peer credentials. Returns once `Ready`.
    pub async fn discover(
        &self,
        info: &ServiceInfo,
        peers: &[String],
        store: &CredentialStore,
    ) -> RelayResult<()> {
        self.register(info).await?;
        self.fetch_credentials(peers, store).await
    }

    /// Start the periodic heartbeat for `self_name`. Requires `Ready`.
    pub fn start_heartbeat(&self, self_name: &str) -> RelayResult<HeartbeatHandle> {
        if self.state.current() != RegistrationState::Ready {
            return Err(RelayError::discovery(DiscoveryErrorKind::CredentialsNotReady));
        }
        if self.policy.heartbeat_interval.is_zero() {
            return Err(RelayError::config("heartbeat interval must be greater than zero"));
        }

        let request = SignedRequest::new(
            HttpMethod::Post,
            self.endpoints.heartbeat_url(self_name),
            heartbeat_payload(),
            &self.codec,
        );
        info!(
            interval_secs = self.policy.heartbeat_interval.as_secs(),
            "Starting heartbeat"
        );

        Ok(spawn_heartbeat(
            Arc::clone(&self.transport),
            request,
            self.policy.heartbeat_interval,
        ))
    }
}

/// Run `attempt` until it succeeds, sleeping `policy.delay` between tries.
async fn retry<T, F, Fut>(
    phase: &'static str,
    policy: &RetryPolicy,
    counter: &AtomicU32,
    mut attempt: F,
) -> RelayResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = RelayResult<T>>,
{
    let mut attempts = 0u32;
    loop {
        attempts += 1;
        counter.fetch_add(1, Ordering::Relaxed);

        match attempt().await {
            Ok(value) => return Ok(value),
            Err(e) => warn!(phase, attempt = attempts, error = %e, "Registry request failed"),
        }

        if policy.is_exhausted(attempts) {
            return Err(RelayError::discovery(DiscoveryErrorKind::RetriesExhausted {
                phase,
                attempts,
            }));
        }
        tokio::time::sleep(policy.delay).await;
    }
}
