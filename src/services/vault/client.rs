//! Secret-store bootstrap client.
//!
//! Runs exactly once at startup:
//! 1. build a TLS transport (CA pool, client certificate only if a key is configured)
//! 2. exchange the platform identity credential for a session token (`auth.client_token`)
//! 3. fetch the flat `data` object stored under `{address}/v1/{secretpath}`
//!
//! Every failure is fatal for the caller; nothing here retries.

use std::collections::HashMap;
use std::fmt;
use std::path::Path;

use reqwest::{Certificate, Client, Identity, StatusCode};
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, error, info};

use super::config::BootstrapConfig;
use super::error::VaultError;

/// Header carrying the session token on secret reads.
pub const VAULT_TOKEN_HEADER: &str = "X-Vault-Token";

#[derive(Serialize)]
struct LoginRequest<'a> {
    role: &'a str,
    jwt: &'a str,
}

/// Resolved secrets for the process lifetime.
///
/// The map is never mutated after construction, so shared references can be
/// handed to any number of request tasks.
pub struct SecretStoreClient {
    secret_path: String,
    secrets: HashMap<String, String>,
}

impl fmt::Debug for SecretStoreClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Do not print secret values
        f.debug_struct("SecretStoreClient")
            .field("secret_path", &self.secret_path)
            .field("keys", &self.secrets.len())
            .finish()
    }
}

impl SecretStoreClient {
    /// Build the transport, login, then load the secret bundle.
    pub async fn connect(config: &BootstrapConfig) -> Result<Self, VaultError> {
        let http = build_transport(config)?;

        info!(
            address = %config.address,
            role = %config.role,
            mutual_tls = config.uses_client_certificate(),
            "performing login to the secret store"
        );
        let token = authenticate(&http, config)
            .await
            .inspect_err(|e| error!(error = %e, "secret store login failed"))?;
        info!("successfully logged in to the secret store");

        let secrets = load_secrets(&http, config, &token)
            .await
            .inspect_err(|e| error!(error = %e, "failed to load secrets"))?;
        info!(keys = secrets.len(), "secrets loaded");

        Ok(Self::from_map(config.secret_path.clone(), secrets))
    }

    pub fn from_map(secret_path: impl Into<String>, secrets: HashMap<String, String>) -> Self {
        Self {
            secret_path: secret_path.into(),
            secrets,
        }
    }

    pub fn secret_path(&self) -> &str {
        &self.secret_path
    }

    pub fn has_secret(&self, key: &str) -> bool {
        self.secrets.contains_key(key)
    }

    /// Read a secret that is known to exist.
    ///
    /// # Panics
    ///
    /// Panics if `key` is absent. Optional secrets must be checked with
    /// [`has_secret`](Self::has_secret) first.
    pub fn read_secret(&self, key: &str) -> &str {
        debug!(key, "reading secret");
        match self.secrets.get(key) {
            Some(value) => value,
            None => panic!(
                "secret {key:?} is not present under {}",
                self.secret_path
            ),
        }
    }
}

/// Bootstrap the secret store client, or skip it entirely when disabled.
///
/// A disabled config performs no file or network access.
pub async fn bootstrap(config: &BootstrapConfig) -> Result<Option<SecretStoreClient>, VaultError> {
    if !config.enabled {
        info!("secret store disabled; using static configuration");
        return Ok(None);
    }

    SecretStoreClient::connect(config).await.map(Some)
}

/// HTTP transport trusting only the configured CA bundle.
///
/// The client certificate is attached only when `keyfile` is set.
pub fn build_transport(config: &BootstrapConfig) -> Result<Client, VaultError> {
    let ca_pem = std::fs::read(&config.ca_file).map_err(|e| {
        error!(path = %config.ca_file, error = %e, "failed to load CA certificate");
        VaultError::TlsConfig(format!("failed to read CA file {}: {e}", config.ca_file))
    })?;

    let roots = Certificate::from_pem_bundle(&ca_pem).map_err(|e| {
        VaultError::TlsConfig(format!("failed to parse CA file {}: {e}", config.ca_file))
    })?;
    if roots.is_empty() {
        return Err(VaultError::TlsConfig(format!(
            "no certificates found in CA file {}",
            config.ca_file
        )));
    }

    let mut builder = Client::builder()
        .timeout(config.timeout())
        .tls_built_in_root_certs(false);
    for root in roots {
        builder = builder.add_root_certificate(root);
    }

    if config.uses_client_certificate() {
        builder = builder.identity(load_identity(config)?);
    }

    builder
        .build()
        .map_err(|e| VaultError::TlsConfig(format!("failed to build HTTP client: {e}")))
}

fn load_identity(config: &BootstrapConfig) -> Result<Identity, VaultError> {
    if config.cert_file.is_empty() {
        return Err(VaultError::TlsConfig(
            "certfile is required when keyfile is set".to_string(),
        ));
    }

    let read = |path: &str| {
        std::fs::read(path)
            .map_err(|e| VaultError::TlsConfig(format!("failed to read {path}: {e}")))
    };

    // rustls wants certificate chain and key in a single PEM buffer
    let mut pem = read(&config.cert_file)?;
    pem.push(b'\n');
    pem.extend(read(&config.key_file)?);

    Identity::from_pem(&pem)
        .map_err(|e| VaultError::TlsConfig(format!("invalid client certificate/key: {e}")))
}

/// Exchange the identity credential for a session token.
pub async fn authenticate(http: &Client, config: &BootstrapConfig) -> Result<String, VaultError> {
    let credential = read_credential(Path::new(&config.credential_file))?;

    let response = http
        .post(config.login_url())
        .json(&LoginRequest {
            role: &config.role,
            jwt: &credential,
        })
        .send()
        .await
        .map_err(|e| VaultError::LoginFailed(e.to_string()))?;

    let status = response.status();
    if status != StatusCode::OK {
        return Err(VaultError::LoginFailed(format!(
            "unexpected status {status}"
        )));
    }

    let body: Value = response
        .json()
        .await
        .map_err(|e| VaultError::LoginFailed(format!("unreadable login response: {e}")))?;

    body.pointer("/auth/client_token")
        .and_then(Value::as_str)
        .filter(|token| !token.is_empty())
        .map(str::to_owned)
        .ok_or(VaultError::MalformedLoginResponse(
            "missing auth.client_token",
        ))
}

/// Fetch the secret bundle stored under the configured path.
pub async fn load_secrets(
    http: &Client,
    config: &BootstrapConfig,
    token: &str,
) -> Result<HashMap<String, String>, VaultError> {
    let path = config.secret_url();
    info!(path = %path, "loading secrets from the secret store");

    let response = http
        .get(&path)
        .header(VAULT_TOKEN_HEADER, token)
        .send()
        .await
        .map_err(|e| VaultError::SecretFetchFailed {
            path: path.clone(),
            reason: e.to_string(),
        })?;

    let status = response.status();
    if status != StatusCode::OK {
        return Err(VaultError::SecretFetchFailed {
            path,
            reason: format!("unexpected status {status}"),
        });
    }

    let body: Value = match response.json().await {
        Ok(body) => body,
        Err(e) => {
            return Err(VaultError::MalformedSecretResponse {
                path,
                reason: e.to_string(),
            });
        }
    };

    match body.get("data") {
        None | Some(Value::Null) => Err(VaultError::NoSecretFound(path)),
        Some(Value::Object(data)) => Ok(data
            .iter()
            .map(|(key, value)| (key.clone(), secret_value(value)))
            .collect()),
        Some(_) => Err(VaultError::MalformedSecretResponse {
            path,
            reason: "`data` is not an object".to_string(),
        }),
    }
}

fn read_credential(path: &Path) -> Result<String, VaultError> {
    let raw = std::fs::read_to_string(path).map_err(|e| VaultError::CredentialRead {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;

    let credential = raw.trim();
    if credential.is_empty() {
        return Err(VaultError::CredentialRead {
            path: path.to_path_buf(),
            reason: "credential is empty".to_string(),
        });
    }

    Ok(credential.to_string())
}

// Strings are kept verbatim, other scalars in their JSON text form.
fn secret_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
