//! Startup secret bootstrap against an in-process secret store.
mod common;

use std::sync::Arc;

use axum::http::StatusCode;
use common::{
    CLIENT_TOKEN, CREDENTIAL, Fixtures, MockVault, ROLE, SECRET_PATH, display, spawn_vault,
};
use serde_json::json;
use tag_service::services::vault::client::{authenticate, build_transport};
use tag_service::services::vault::{BootstrapConfig, SecretStoreClient, VaultError, bootstrap};

async fn run(mock: MockVault) -> (Arc<MockVault>, Fixtures, Result<SecretStoreClient, VaultError>) {
    let mock = Arc::new(mock);
    let address = spawn_vault(mock.clone()).await;
    let fixtures = Fixtures::new();
    let result = SecretStoreClient::connect(&fixtures.config(&address)).await;
    (mock, fixtures, result)
}

#[tokio::test]
async fn logs_in_then_loads_secrets() {
    let (mock, _fixtures, result) = run(MockVault::healthy(json!({
        "JWT_SECRET": "c2VjcmV0",
        "DB_PORT": 5432,
    })))
    .await;

    let client = result.expect("bootstrap");
    assert_eq!(client.read_secret("JWT_SECRET"), "c2VjcmV0");
    assert_eq!(client.read_secret("DB_PORT"), "5432");
    assert!(!client.has_secret("MISSING"));

    assert_eq!(mock.login_calls(), 1);
    assert_eq!(mock.secret_calls(), 1);
    assert_eq!(
        mock.seen_login.lock().unwrap().clone(),
        Some(json!({ "role": ROLE, "jwt": CREDENTIAL }))
    );
    assert_eq!(
        mock.seen_token.lock().unwrap().as_deref(),
        Some(CLIENT_TOKEN)
    );
}

#[tokio::test]
async fn disabled_bootstrap_makes_no_calls() {
    let config = BootstrapConfig::default();
    assert!(bootstrap(&config).await.expect("disabled").is_none());
}

#[tokio::test]
async fn enabled_bootstrap_returns_store() {
    let mock = Arc::new(MockVault::healthy(json!({ "JWT_SECRET": "c2VjcmV0" })));
    let address = spawn_vault(mock.clone()).await;
    let fixtures = Fixtures::new();

    let store = bootstrap(&fixtures.config(&address))
        .await
        .expect("bootstrap")
        .expect("enabled");
    assert!(store.secret_path().ends_with(SECRET_PATH));
}

#[tokio::test]
async fn rejected_login_stops_before_secret_fetch() {
    let mut mock = MockVault::healthy(json!({}));
    mock.login_status = StatusCode::INTERNAL_SERVER_ERROR;

    let (mock, _fixtures, result) = run(mock).await;

    assert!(matches!(result, Err(VaultError::LoginFailed(_))));
    assert_eq!(mock.login_calls(), 1);
    assert_eq!(mock.secret_calls(), 0);
}

#[tokio::test]
async fn login_without_client_token_is_malformed() {
    let mut mock = MockVault::healthy(json!({}));
    mock.login_body = json!({ "auth": { "lease_duration": 3600 } }).to_string();

    let (mock, _fixtures, result) = run(mock).await;

    assert!(matches!(result, Err(VaultError::MalformedLoginResponse(_))));
    assert_eq!(mock.secret_calls(), 0);
}

#[tokio::test]
async fn unreadable_login_body_fails_login() {
    let mut mock = MockVault::healthy(json!({}));
    mock.login_body = "<html>bad gateway</html>".to_string();

    let (_mock, _fixtures, result) = run(mock).await;

    assert!(matches!(result, Err(VaultError::LoginFailed(_))));
}

#[tokio::test]
async fn response_without_data_names_the_path() {
    let mut mock = MockVault::healthy(json!({}));
    mock.secret_body = json!({ "lease_duration": 0 }).to_string();

    let (_mock, _fixtures, result) = run(mock).await;

    match result {
        Err(err @ VaultError::NoSecretFound(_)) => {
            assert!(err.to_string().contains(SECRET_PATH), "{err}");
        }
        other => panic!("expected NoSecretFound, got {other:?}"),
    }
}

#[tokio::test]
async fn denied_secret_fetch_fails() {
    let mut mock = MockVault::healthy(json!({}));
    mock.secret_status = StatusCode::FORBIDDEN;

    let (_mock, _fixtures, result) = run(mock).await;

    assert!(matches!(result, Err(VaultError::SecretFetchFailed { .. })));
}

#[tokio::test]
async fn missing_credential_fails_before_login() {
    let mock = Arc::new(MockVault::healthy(json!({})));
    let address = spawn_vault(mock.clone()).await;
    let fixtures = Fixtures::new();
    let mut config = fixtures.config(&address);
    config.credential_file = display(&fixtures.path("absent-token"));

    let result = SecretStoreClient::connect(&config).await;

    assert!(matches!(result, Err(VaultError::CredentialRead { .. })));
    assert_eq!(mock.login_calls(), 0);
}

#[tokio::test]
async fn empty_credential_fails_before_login() {
    let mock = Arc::new(MockVault::healthy(json!({})));
    let address = spawn_vault(mock.clone()).await;
    let fixtures = Fixtures::new();
    std::fs::write(&fixtures.credential_file, "  \n").unwrap();

    let http = build_transport(&fixtures.config(&address)).expect("transport");
    let result = authenticate(&http, &fixtures.config(&address)).await;

    assert!(matches!(result, Err(VaultError::CredentialRead { .. })));
    assert_eq!(mock.login_calls(), 0);
}

#[tokio::test]
async fn missing_ca_file_is_a_tls_error() {
    let mock = Arc::new(MockVault::healthy(json!({})));
    let address = spawn_vault(mock.clone()).await;
    let fixtures = Fixtures::new();
    let mut config = fixtures.config(&address);
    config.ca_file = display(&fixtures.path("absent-ca.pem"));

    let result = SecretStoreClient::connect(&config).await;

    assert!(matches!(result, Err(VaultError::TlsConfig(_))));
    assert_eq!(mock.login_calls(), 0);
}

#[test]
fn ca_file_without_certificates_is_a_tls_error() {
    let fixtures = Fixtures::new();
    std::fs::write(&fixtures.ca_file, "not a certificate").unwrap();

    let result = build_transport(&fixtures.config("http://127.0.0.1:1"));

    assert!(matches!(result, Err(VaultError::TlsConfig(_))));
}

#[test]
fn client_certificate_is_attached_when_keyfile_set() {
    let fixtures = Fixtures::new();
    let mut config = fixtures.config("http://127.0.0.1:1");
    config.cert_file = display(&fixtures.cert_file);
    config.key_file = display(&fixtures.key_file);

    assert!(build_transport(&config).is_ok());
}

#[test]
fn keyfile_without_certfile_is_rejected() {
    let fixtures = Fixtures::new();
    let mut config = fixtures.config("http://127.0.0.1:1");
    config.key_file = display(&fixtures.key_file);

    assert!(matches!(
        build_transport(&config),
        Err(VaultError::TlsConfig(_))
    ));
}

#[tokio::test]
async fn bootstrapped_key_verifies_tokens() {
    use base64::Engine;
    use base64::engine::general_purpose::STANDARD;
    use tag_service::config::{AppEnv, Config};
    use tag_service::services::auth::access_jwt::TokenLookup;
    use tag_service::services::auth::build_jwt_auth;

    let (_mock, _fixtures, result) =
        run(MockVault::healthy(json!({ "JWT_SECRET": STANDARD.encode(common::KEY) }))).await;
    let store = result.expect("bootstrap");

    let config = Config {
        addr: "127.0.0.1:8080".parse().unwrap(),
        app_env: AppEnv::Development,
        request_timeout_seconds: 30,
        jwt_issuer: common::ISSUER.to_string(),
        jwt_signing_algorithm: "HS256".to_string(),
        jwt_token_lookup: TokenLookup::default(),
        jwt_realm: "tag-service".to_string(),
        jwt_timeout_seconds: 3600,
        jwt_secret: None,
        jwt_secret_key: "JWT_SECRET".to_string(),
    };

    let auth = build_jwt_auth(&config, Some(&store)).expect("auth");
    let claims = auth.verify(&common::app_token()).expect("verified");
    assert_eq!(claims.iss.as_deref(), Some(common::ISSUER));
}
