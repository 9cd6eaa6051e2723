//! Shared helpers for integration tests.
//!
//! - token minting (HMAC, same key the middleware is configured with)
//! - an in-process secret store bound to 127.0.0.1:0
//! - on-disk fixtures (CA bundle, identity credential) in a temp dir
#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use axum::body::{Body, to_bytes};
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use serde_json::{Value, json};
use tag_service::services::vault::BootstrapConfig;
use tempfile::TempDir;

pub const KEY: &[u8] = b"tag-service-test-signing-key-0001";
pub const ISSUER: &str = "https://gateway.example.com/oauth2/token";
pub const SECRET_PATH: &str = "secret/tag-service";
pub const CLIENT_TOKEN: &str = "s.5a7f0c9d2e";
pub const ROLE: &str = "tag-service";
pub const CREDENTIAL: &str = "eyJhbGciOiJSUzI1NiJ9.service-account.signature";

pub async fn read_json(response: Response<Body>) -> Value {
    let bytes = to_bytes(response.into_body(), 1024 * 1024)
        .await
        .expect("body");
    serde_json::from_slice(&bytes).expect("json body")
}

pub fn sign(claims: &Value) -> String {
    jsonwebtoken::encode(
        &Header::new(Algorithm::HS256),
        claims,
        &EncodingKey::from_secret(KEY),
    )
    .expect("sign")
}

pub fn user_token(account_id: &str) -> String {
    sign(&json!({
        "iss": ISSUER,
        "sub": "alice@example.com",
        "http://wso2.org/claims/enduser": account_id,
        "http://wso2.org/claims/usertype": "APPLICATION_USER",
    }))
}

pub fn app_token() -> String {
    sign(&json!({
        "iss": ISSUER,
        "sub": "billing-service",
        "http://wso2.org/claims/usertype": "APPLICATION",
    }))
}

/// Canned responses plus call counters for the fake secret store.
pub struct MockVault {
    pub login_status: StatusCode,
    pub login_body: String,
    pub secret_status: StatusCode,
    pub secret_body: String,
    pub login_calls: AtomicUsize,
    pub secret_calls: AtomicUsize,
    pub seen_login: Mutex<Option<Value>>,
    pub seen_token: Mutex<Option<String>>,
}

impl MockVault {
    pub fn healthy(secrets: Value) -> Self {
        Self {
            login_status: StatusCode::OK,
            login_body: json!({ "auth": { "client_token": CLIENT_TOKEN, "lease_duration": 3600 } })
                .to_string(),
            secret_status: StatusCode::OK,
            secret_body: json!({ "lease_duration": 2764800, "data": secrets }).to_string(),
            login_calls: AtomicUsize::new(0),
            secret_calls: AtomicUsize::new(0),
            seen_login: Mutex::new(None),
            seen_token: Mutex::new(None),
        }
    }

    pub fn login_calls(&self) -> usize {
        self.login_calls.load(Ordering::SeqCst)
    }

    pub fn secret_calls(&self) -> usize {
        self.secret_calls.load(Ordering::SeqCst)
    }
}

fn json_response(status: StatusCode, body: &str) -> Response {
    (
        status,
        [(header::CONTENT_TYPE, "application/json")],
        body.to_string(),
    )
        .into_response()
}

async fn login(State(mock): State<Arc<MockVault>>, body: String) -> Response {
    mock.login_calls.fetch_add(1, Ordering::SeqCst);
    *mock.seen_login.lock().unwrap() = serde_json::from_str(&body).ok();
    json_response(mock.login_status, &mock.login_body)
}

async fn secret(State(mock): State<Arc<MockVault>>, headers: HeaderMap) -> Response {
    mock.secret_calls.fetch_add(1, Ordering::SeqCst);
    *mock.seen_token.lock().unwrap() = headers
        .get("x-vault-token")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    json_response(mock.secret_status, &mock.secret_body)
}

/// Serve `mock` on an ephemeral port and return its base address.
pub async fn spawn_vault(mock: Arc<MockVault>) -> String {
    let router = Router::new()
        .route("/v1/auth/kubernetes/login", post(login))
        .route(&format!("/v1/{SECRET_PATH}"), get(secret))
        .with_state(mock);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind");
    let addr = listener.local_addr().expect("addr");
    tokio::spawn(async move {
        axum::serve(listener, router).await.expect("serve");
    });

    format!("http://{addr}")
}

/// CA bundle, client cert/key and identity credential on disk.
pub struct Fixtures {
    pub dir: TempDir,
    pub ca_file: PathBuf,
    pub cert_file: PathBuf,
    pub key_file: PathBuf,
    pub credential_file: PathBuf,
}

impl Fixtures {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().expect("tempdir");
        let rcgen::CertifiedKey { cert, key_pair } =
            rcgen::generate_simple_self_signed(vec!["localhost".to_string()]).expect("cert");

        let ca_file = dir.path().join("ca.pem");
        let cert_file = dir.path().join("client.pem");
        let key_file = dir.path().join("client-key.pem");
        let credential_file = dir.path().join("token");

        std::fs::write(&ca_file, cert.pem()).expect("write ca");
        std::fs::write(&cert_file, cert.pem()).expect("write cert");
        std::fs::write(&key_file, key_pair.serialize_pem()).expect("write key");
        std::fs::write(&credential_file, format!("{CREDENTIAL}\n")).expect("write credential");

        Self {
            dir,
            ca_file,
            cert_file,
            key_file,
            credential_file,
        }
    }

    pub fn path(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }

    pub fn config(&self, address: &str) -> BootstrapConfig {
        BootstrapConfig {
            ca_file: display(&self.ca_file),
            credential_file: display(&self.credential_file),
            role: ROLE.to_string(),
            secret_path: SECRET_PATH.to_string(),
            address: address.to_string(),
            enabled: true,
            ..Default::default()
        }
    }
}

pub fn display(path: &Path) -> String {
    path.display().to_string()
}
