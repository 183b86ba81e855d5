//! Common test utilities for E2E tests

#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use actorhub::config::{self, FollowMode};
use actorhub::federation::{SignatureAlgorithm, generate_private_key_pem, public_key_pem};
use actorhub::service::Processor;
use actorhub::{AppState, build_router};
use axum::Router;
use axum::body::Bytes;
use axum::extract::{Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::routing::{get, post};
use tempfile::TempDir;
use tokio::net::TcpListener;

/// A full actorhub instance listening on an ephemeral port.
///
/// The configured domain is the bound `127.0.0.1:PORT`, so actor URLs it
/// hands out are reachable from other instances in the same test.
pub struct TestServer {
    pub addr: String,
    pub host: String,
    pub state: AppState,
    pub _temp_dir: TempDir,
    pub client: reqwest::Client,
}

impl TestServer {
    pub async fn new() -> Self {
        Self::with_follow_mode(FollowMode::Pending).await
    }

    pub async fn with_follow_mode(follow_mode: FollowMode) -> Self {
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir.path().join("test.db");

        // Bind first so the domain can carry the real port.
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let host = listener.local_addr().unwrap().to_string();

        let config = config::AppConfig {
            server: config::ServerConfig {
                host: "127.0.0.1".to_string(),
                port: 0,
                domain: host.clone(),
                protocol: "http".to_string(),
            },
            database: config::DatabaseConfig { path: db_path },
            federation: config::FederationConfig {
                software_name: "actorhub-test".to_string(),
                follow_mode,
                signature_algorithms: vec![
                    SignatureAlgorithm::RsaSha256,
                    SignatureAlgorithm::RsaSha512,
                ],
                signature_expiry_seconds: 30,
                request_timeout_seconds: 10,
                remote_scheme: "http".to_string(),
            },
            accounts: config::AccountsConfig {
                key_bits: 1024,
                password_cost: 4,
            },
            logging: config::LoggingConfig {
                level: "info".to_string(),
                format: "pretty".to_string(),
            },
        };

        let state = AppState::new(config).await.unwrap();
        let app = build_router(state.clone());

        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(10))
            .build()
            .unwrap();

        Self {
            addr: format!("http://{}", host),
            host,
            state,
            _temp_dir: temp_dir,
            client,
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.addr, path)
    }

    pub fn processor(&self) -> &Processor {
        &self.state.processor
    }

    /// Sign up `username` and return the account id.
    pub async fn signup(&self, username: &str) -> String {
        self.processor()
            .signup(&format!("{}@mail.test", username), username, "password")
            .await
            .unwrap()
    }

    pub fn actor_url(&self, account_id: &str) -> String {
        self.processor().urls().actor_url(account_id)
    }
}

/// An inbox delivery captured by a `FakePeer`.
#[derive(Debug, Clone)]
pub struct Delivery {
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl Delivery {
    pub fn json(&self) -> serde_json::Value {
        serde_json::from_slice(&self.body).unwrap()
    }
}

#[derive(Clone)]
struct PeerState {
    host: String,
    public_key_pem: String,
    deliveries: Arc<Mutex<Vec<Delivery>>>,
    inbox_status: StatusCode,
}

/// A minimal remote server hosting a single actor `bob`.
///
/// Serves WebFinger and the actor document, and records every inbox POST
/// without ever answering with an Accept.
pub struct FakePeer {
    pub host: String,
    pub private_key_pem: String,
    deliveries: Arc<Mutex<Vec<Delivery>>>,
}

impl FakePeer {
    pub async fn start() -> Self {
        Self::with_inbox_status(StatusCode::ACCEPTED).await
    }

    pub async fn with_inbox_status(inbox_status: StatusCode) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let host = listener.local_addr().unwrap().to_string();

        let private_key_pem = generate_private_key_pem(1024).unwrap();
        let deliveries = Arc::new(Mutex::new(Vec::new()));
        let state = PeerState {
            host: host.clone(),
            public_key_pem: public_key_pem(&private_key_pem).unwrap(),
            deliveries: deliveries.clone(),
            inbox_status,
        };

        let app = Router::new()
            .route("/.well-known/webfinger", get(peer_webfinger))
            .route("/u/bob", get(peer_actor))
            .route("/u/bob/inbox", post(peer_inbox))
            .with_state(state);

        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            host,
            private_key_pem,
            deliveries,
        }
    }

    pub fn actor_url(&self) -> String {
        format!("http://{}/u/bob", self.host)
    }

    pub fn inbox_url(&self) -> String {
        format!("http://{}/u/bob/inbox", self.host)
    }

    pub fn acct(&self) -> String {
        format!("bob@{}", self.host)
    }

    pub fn deliveries(&self) -> Vec<Delivery> {
        self.deliveries.lock().unwrap().clone()
    }
}

async fn peer_webfinger(
    State(state): State<PeerState>,
    Query(params): Query<std::collections::HashMap<String, String>>,
) -> Result<axum::Json<serde_json::Value>, StatusCode> {
    let expected = format!("acct:bob@{}", state.host);
    if params.get("resource") != Some(&expected) {
        return Err(StatusCode::NOT_FOUND);
    }

    let actor = format!("http://{}/u/bob", state.host);
    Ok(axum::Json(serde_json::json!({
        "subject": expected,
        "links": [
            {"rel": "http://webfinger.net/rel/profile-page", "type": "text/html", "href": format!("http://{}/@bob", state.host)},
            {"rel": "self", "type": "application/activity+json", "href": actor}
        ]
    })))
}

async fn peer_actor(State(state): State<PeerState>) -> axum::Json<serde_json::Value> {
    let actor = format!("http://{}/u/bob", state.host);
    axum::Json(serde_json::json!({
        "@context": ["https://www.w3.org/ns/activitystreams", "https://w3id.org/security/v1"],
        "id": actor,
        "type": "Person",
        "preferredUsername": "bob",
        "inbox": format!("{}/inbox", actor),
        "publicKey": {
            "id": format!("{}#main-key", actor),
            "owner": actor,
            "publicKeyPem": state.public_key_pem
        }
    }))
}

async fn peer_inbox(State(state): State<PeerState>, headers: HeaderMap, body: Bytes) -> StatusCode {
    state
        .deliveries
        .lock()
        .unwrap()
        .push(Delivery { headers, body });
    state.inbox_status
}
