//! Composition root.

use std::sync::Arc;

use axum::Router;
use tracing::info;

use crate::auth::{AuthCodec, RequestAuthenticator};
use crate::bridge::{ChatPlatform, GatewayForwarder};
use crate::config::Settings;
use crate::discovery::{
    CredentialStore, DiscoveryClient, DiscoveryPolicy, HeartbeatHandle, RegistrationState,
};
use crate::error::RelayResult;
use crate::server;
use crate::transport::{HttpTransport, Transport};

/// Wires codecs, discovery and the credential store from [`Settings`].
///
/// Nothing that sends or accepts signed traffic exists until
/// [`RelayCoordinator::bootstrap`] has reached `Ready`.
pub struct RelayCoordinator {
    settings: Arc<Settings>,
    transport: Arc<dyn Transport>,
    registry_codec: Arc<AuthCodec>,
    inbound_codec: AuthCodec,
    discovery: DiscoveryClient,
}

impl RelayCoordinator {
    /// Resolve both secrets and build the discovery client.
    ///
    /// Fails when either secret is missing or unreadable.
    pub fn new(settings: Arc<Settings>, transport: Arc<dyn Transport>) -> RelayResult<Self> {
        let registry_secret = settings.registry.secret.resolve("registry")?;
        let registry_codec = Arc::new(AuthCodec::new(registry_secret));
        let inbound_codec = AuthCodec::new(settings.security.resolve("security")?);

        let discovery = DiscoveryClient::new(
            Arc::clone(&transport),
            Arc::clone(&registry_codec),
            settings.registry_endpoints(),
            settings.discovery.policy(),
        );

        Ok(Self {
            settings,
            transport,
            registry_codec,
            inbound_codec,
            discovery,
        })
    }

    /// Same as [`RelayCoordinator::new`] over HTTP.
    pub fn from_settings(settings: Arc<Settings>) -> RelayResult<Self> {
        let transport = HttpTransport::new(settings.discovery.request_timeout())?;
        Self::new(settings, Arc::new(transport))
    }

    /// Replace the discovery timing from the config file.
    ///
    /// Receivers from an earlier [`DiscoveryClient::subscribe`] stop updating.
    pub fn with_policy(mut self, policy: DiscoveryPolicy) -> Self {
        self.discovery = DiscoveryClient::new(
            Arc::clone(&self.transport),
            Arc::clone(&self.registry_codec),
            self.settings.registry_endpoints(),
            policy,
        );
        self
    }

    pub fn discovery(&self) -> &DiscoveryClient {
        &self.discovery
    }

    /// Register, fetch the gateway credentials and start the heartbeat.
    pub async fn bootstrap(self) -> RelayResult<ReadyRelay> {
        let info = self.settings.service_info();
        let peers = vec![self.settings.gateway.service_name.clone()];
        info!(
            service = %info.service_name,
            registry = %self.settings.registry_endpoints().register_url(),
            "Starting service discovery"
        );

        let store = CredentialStore::new();
        self.discovery.discover(&info, &peers, &store).await?;
        let heartbeat = self.discovery.start_heartbeat(&self.settings.general.name)?;

        Ok(ReadyRelay {
            settings: self.settings,
            transport: self.transport,
            authenticator: Arc::new(RequestAuthenticator::new(self.inbound_codec)),
            discovery: self.discovery,
            store,
            heartbeat,
        })
    }
}

/// A relay whose peer credentials are available.
pub struct ReadyRelay {
    settings: Arc<Settings>,
    transport: Arc<dyn Transport>,
    authenticator: Arc<RequestAuthenticator>,
    discovery: DiscoveryClient,
    store: CredentialStore,
    heartbeat: HeartbeatHandle,
}

impl ReadyRelay {
    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn state(&self) -> RegistrationState {
        self.discovery.state()
    }

    pub fn credentials(&self) -> &CredentialStore {
        &self.store
    }

    pub fn heartbeat(&self) -> &HeartbeatHandle {
        &self.heartbeat
    }

    /// Inbound endpoint delivering replies through `platform`.
    pub fn router(&self, platform: Arc<dyn ChatPlatform>) -> Router {
        server::router(Arc::clone(&self.authenticator), platform)
    }

    /// Outbound forwarder for the configured gateway peer.
    pub fn forwarder(&self) -> RelayResult<GatewayForwarder> {
        let gateway = &self.settings.gateway;
        let credential = self.store.get(&gateway.service_name)?;
        Ok(GatewayForwarder::new(
            Arc::clone(&self.transport),
            credential,
            &gateway.message_path,
        ))
    }
}
