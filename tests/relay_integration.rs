//! Integration tests for the relay daemon.
//!
//! These tests start a fake registry and a fake gateway over real HTTP,
//! load settings from a TOML file, bootstrap the relay against them, and
//! drive the inbound endpoint with a real client.

use std::net::SocketAddr;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::body::Bytes;
use axum::extract::{Path as UrlPath, State};
use axum::http::{HeaderMap, StatusCode};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{json, Value};
use tempfile::TempDir;

use relay_daemon::auth::{canonicalize, AuthCodec, SharedSecret};
use relay_daemon::bridge::ChatPlatform;
use relay_daemon::config::Settings;
use relay_daemon::discovery::{DiscoveryPolicy, RegistrationState, RetryPolicy};
use relay_daemon::error::RelayError;
use relay_daemon::relay::RelayCoordinator;

const REGISTRY_SECRET: &str = "registry-secret";
const INBOUND_SECRET: &str = "inbound-secret";
const GATEWAY_SECRET: &str = "gateway-secret";

/// Registry that rejects the first `fail_registrations` attempts.
struct FakeRegistry {
    codec: AuthCodec,
    gateway: SocketAddr,
    fail_registrations: usize,
    registrations: AtomicUsize,
    lookups: AtomicUsize,
    heartbeats: Mutex<Vec<String>>,
    bad_tokens: AtomicUsize,
}

impl FakeRegistry {
    fn authorized(&self, headers: &HeaderMap, body: &Bytes) -> Option<Value> {
        let token = headers.get("Token")?.to_str().ok()?;
        let payload: Value = serde_json::from_slice(body).ok()?;
        if self.codec.verify(&payload, token) {
            Some(payload)
        } else {
            self.bad_tokens.fetch_add(1, Ordering::SeqCst);
            None
        }
    }
}

async fn register(
    State(registry): State<Arc<FakeRegistry>>,
    headers: HeaderMap,
    body: Bytes,
) -> StatusCode {
    let Some(payload) = registry.authorized(&headers, &body) else {
        return StatusCode::UNAUTHORIZED;
    };
    assert_eq!(payload["service_name"], "telegram");

    let attempt = registry.registrations.fetch_add(1, Ordering::SeqCst);
    if attempt < registry.fail_registrations {
        StatusCode::SERVICE_UNAVAILABLE
    } else {
        StatusCode::OK
    }
}

async fn get_services(
    State(registry): State<Arc<FakeRegistry>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<Value>, StatusCode> {
    let payload = registry
        .authorized(&headers, &body)
        .ok_or(StatusCode::UNAUTHORIZED)?;
    assert_eq!(payload, json!({"service_names": ["gateway"]}));
    registry.lookups.fetch_add(1, Ordering::SeqCst);

    Ok(Json(json!({
        "gateway": {
            "general": {
                "host": registry.gateway.ip().to_string(),
                "port": registry.gateway.port().to_string()
            },
            "security": {"secret_key": GATEWAY_SECRET}
        }
    })))
}

async fn heartbeat(
    State(registry): State<Arc<FakeRegistry>>,
    UrlPath(name): UrlPath<String>,
    headers: HeaderMap,
    body: Bytes,
) -> StatusCode {
    if registry.authorized(&headers, &body).is_none() {
        return StatusCode::UNAUTHORIZED;
    }
    registry.heartbeats.lock().unwrap().push(name);
    StatusCode::OK
}

/// Gateway that records every correctly signed message.
struct FakeGateway {
    codec: AuthCodec,
    received: Mutex<Vec<(Value, Vec<u8>)>>,
}

async fn receive(
    State(gateway): State<Arc<FakeGateway>>,
    headers: HeaderMap,
    body: Bytes,
) -> StatusCode {
    let token = headers
        .get("Token")
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();
    let Ok(payload) = serde_json::from_slice::<Value>(&body) else {
        return StatusCode::BAD_REQUEST;
    };
    if !gateway.codec.verify(&payload, token) {
        return StatusCode::UNAUTHORIZED;
    }
    gateway.received.lock().unwrap().push((payload, body.to_vec()));
    StatusCode::OK
}

/// Chat platform that only records deliveries.
#[derive(Default)]
struct RecordingPlatform {
    sent: Mutex<Vec<(i64, String)>>,
}

#[async_trait]
impl ChatPlatform for RecordingPlatform {
    async fn fetch_messages(&self) -> Result<Vec<Value>, RelayError> {
        Ok(Vec::new())
    }

    async fn send_message(&self, chat_id: i64, text: &str) -> Result<(), RelayError> {
        self.sent.lock().unwrap().push((chat_id, text.to_string()));
        Ok(())
    }
}

fn codec(secret: &str) -> AuthCodec {
    AuthCodec::new(SharedSecret::new(secret).expect("non-empty secret"))
}

async fn serve(app: Router) -> SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind test listener");
    let addr = listener.local_addr().expect("Failed to read local address");
    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("Test server failed");
    });
    addr
}

fn write_secret(dir: &Path, name: &str, secret: &str) -> std::path::PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, format!("{}\n", secret)).expect("Failed to write secret");
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o600))
            .expect("Failed to set secret permissions");
    }
    path
}

fn write_config(dir: &Path, registry: SocketAddr) -> std::path::PathBuf {
    let inbound_secret = write_secret(dir, "inbound.key", INBOUND_SECRET);
    let config = format!(
        r#"
[general]
name = "telegram"
host = "127.0.0.1"
port = 0
capabilities = ["chat"]

[security]
secret_path = "{}"

[registry]
host = "{}"
port = {}
secret_key = "{}"

[telegram]
token = "123:abc"

[logging]
level = "debug"
format = "json"
"#,
        inbound_secret.display(),
        registry.ip(),
        registry.port(),
        REGISTRY_SECRET,
    );

    let path = dir.join("relay.toml");
    std::fs::write(&path, config).expect("Failed to write config");
    path
}

fn fast_policy() -> DiscoveryPolicy {
    DiscoveryPolicy {
        register: RetryPolicy::fixed(Duration::from_millis(20)),
        credentials: RetryPolicy::fixed(Duration::from_millis(20)),
        heartbeat_interval: Duration::from_millis(50),
    }
}

#[tokio::test]
async fn test_relay_end_to_end() {
    let gateway = Arc::new(FakeGateway {
        codec: codec(GATEWAY_SECRET),
        received: Mutex::new(Vec::new()),
    });
    let gateway_addr = serve(
        Router::new()
            .route("/msg", post(receive))
            .with_state(Arc::clone(&gateway)),
    )
    .await;

    let registry = Arc::new(FakeRegistry {
        codec: codec(REGISTRY_SECRET),
        gateway: gateway_addr,
        fail_registrations: 2,
        registrations: AtomicUsize::new(0),
        lookups: AtomicUsize::new(0),
        heartbeats: Mutex::new(Vec::new()),
        bad_tokens: AtomicUsize::new(0),
    });
    let registry_addr = serve(
        Router::new()
            .route("/register", post(register))
            .route("/get_services", get(get_services))
            .route("/heartbeat/:name", post(heartbeat))
            .with_state(Arc::clone(&registry)),
    )
    .await;

    let temp_dir = TempDir::new().expect("Failed to create temp directory");
    let config_path = write_config(temp_dir.path(), registry_addr);
    let settings = Arc::new(Settings::load(&config_path).expect("Failed to load settings"));

    // Discovery
    let relay = RelayCoordinator::from_settings(settings)
        .expect("Failed to build coordinator")
        .with_policy(fast_policy())
        .bootstrap()
        .await
        .expect("Bootstrap failed");

    assert_eq!(relay.state(), RegistrationState::Ready);
    assert_eq!(registry.registrations.load(Ordering::SeqCst), 3);
    assert_eq!(registry.lookups.load(Ordering::SeqCst), 1);
    assert_eq!(registry.bad_tokens.load(Ordering::SeqCst), 0);

    let credential = relay.credentials().get("gateway").expect("gateway credential");
    assert_eq!(credential.port, gateway_addr.port());
    assert_eq!(credential.shared_secret.as_bytes(), GATEWAY_SECRET.as_bytes());

    // Outbound
    let forwarder = relay.forwarder().expect("Failed to build forwarder");
    let message = json!({"text": "hello gateway", "chat_id": 99, "username": null});
    forwarder.forward(&message).await.expect("Forward failed");
    {
        let received = gateway.received.lock().unwrap();
        assert_eq!(received.len(), 1);
        assert_eq!(received[0].0, message);
        assert_eq!(received[0].1, canonicalize(&message));
    }

    // Heartbeat
    tokio::time::sleep(Duration::from_millis(180)).await;
    let heartbeats = registry.heartbeats.lock().unwrap().clone();
    assert!(heartbeats.len() >= 2, "expected heartbeats, got {:?}", heartbeats);
    assert!(heartbeats.iter().all(|name| name == "telegram"));
    assert_eq!(relay.heartbeat().stats().failures(), 0);

    // Inbound
    let platform = Arc::new(RecordingPlatform::default());
    let inbound_addr = serve(relay.router(platform.clone())).await;
    let url = format!("http://{}/send_response", inbound_addr);
    let client = reqwest::Client::new();

    let body = json!({"text": "reply", "chat_id": 7});
    let response = client
        .post(&url)
        .json(&body)
        .send()
        .await
        .expect("Request failed");
    assert_eq!(response.status().as_u16(), 401);
    let json: Value = response.json().await.expect("Invalid JSON");
    assert_eq!(json, json!({"message": "missing token", "code": 401}));

    let forged = codec(REGISTRY_SECRET).sign(&body);
    let response = client
        .post(&url)
        .header("Token", forged.as_str())
        .json(&body)
        .send()
        .await
        .expect("Request failed");
    assert_eq!(response.status().as_u16(), 401);

    let token = codec(INBOUND_SECRET).sign(&body);
    let response = client
        .post(&url)
        .header("Token", token.as_str())
        .json(&body)
        .send()
        .await
        .expect("Request failed");
    assert_eq!(response.status().as_u16(), 200);
    let json: Value = response.json().await.expect("Invalid JSON");
    assert_eq!(json, json!({"message": "OK", "code": 200}));

    assert_eq!(*platform.sent.lock().unwrap(), vec![(7, "reply".to_string())]);
}

#[tokio::test]
async fn test_bounded_registration_against_wrong_secret() {
    let registry = Arc::new(FakeRegistry {
        codec: codec("not-the-relay-secret"),
        gateway: "127.0.0.1:1".parse().unwrap(),
        fail_registrations: 0,
        registrations: AtomicUsize::new(0),
        lookups: AtomicUsize::new(0),
        heartbeats: Mutex::new(Vec::new()),
        bad_tokens: AtomicUsize::new(0),
    });
    let registry_addr = serve(
        Router::new()
            .route("/register", post(register))
            .with_state(Arc::clone(&registry)),
    )
    .await;

    let temp_dir = TempDir::new().expect("Failed to create temp directory");
    let config_path = write_config(temp_dir.path(), registry_addr);
    let settings = Arc::new(Settings::load(&config_path).expect("Failed to load settings"));

    let mut policy = fast_policy();
    policy.register = policy.register.with_max_attempts(Some(3));

    let result = RelayCoordinator::from_settings(settings)
        .expect("Failed to build coordinator")
        .with_policy(policy)
        .bootstrap()
        .await;

    assert!(matches!(result, Err(RelayError::Discovery { .. })));
    assert_eq!(registry.bad_tokens.load(Ordering::SeqCst), 3);
    assert_eq!(registry.registrations.load(Ordering::SeqCst), 0);
}
