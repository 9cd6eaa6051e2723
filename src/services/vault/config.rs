/*
 * Responsibility
 * - secret store への bootstrap 設定 (YAML) の読み込み
 * - {CONFIG_FOLDER}/vault-config-{ENVIRONMENT}.yml を解決する
 * - enabled の場合だけ必須項目をバリデーション (不足なら起動失敗)
 */
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;
use tracing::info;
use url::Url;

/// Environment variable naming the deployment environment (docker-compose / k8s manifest).
pub const ENVIRONMENT: &str = "ENVIRONMENT";

/// Environment variable naming the folder holding `vault-config-*.yml`.
pub const CONFIG_FOLDER: &str = "CONFIG_FOLDER";

const DEFAULT_CONFIG_FOLDER: &str = "config";
const DEFAULT_ENVIRONMENT: &str = "default";
const DEFAULT_TIMEOUT_SECONDS: u64 = 10;

#[derive(Debug, Error)]
pub enum VaultConfigError {
    #[error("failed to read bootstrap config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse bootstrap config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },
    #[error("missing bootstrap setting: {0}")]
    Missing(&'static str),
    #[error("invalid bootstrap setting {key}: {reason}")]
    Invalid { key: &'static str, reason: String },
}

/// Secret-store bootstrap settings.
///
/// Keys follow the lower-cased field names used by the deployment YAML
/// (`cafile`, `secretpath`, ...). Snake-case aliases are accepted too.
#[derive(Clone, Deserialize)]
pub struct BootstrapConfig {
    /// CA bundle used to verify the secret store.
    #[serde(default, rename = "cafile", alias = "ca_file")]
    pub ca_file: String,

    /// Client certificate, only used together with `key_file`.
    #[serde(default, rename = "certfile", alias = "cert_file")]
    pub cert_file: String,

    /// Client private key. Mutual TLS is enabled iff this is set.
    #[serde(default, rename = "keyfile", alias = "key_file")]
    pub key_file: String,

    /// Path of the platform-issued identity credential (service account token).
    #[serde(default, rename = "jwt", alias = "credential_file")]
    pub credential_file: String,

    #[serde(default)]
    pub role: String,

    #[serde(default, rename = "secretpath", alias = "secret_path")]
    pub secret_path: String,

    /// Base address of the secret store, e.g. `https://vault.example.com`.
    #[serde(default)]
    pub address: String,

    #[serde(default)]
    pub enabled: bool,

    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,
}

fn default_timeout_seconds() -> u64 {
    DEFAULT_TIMEOUT_SECONDS
}

impl Default for BootstrapConfig {
    fn default() -> Self {
        Self {
            ca_file: String::new(),
            cert_file: String::new(),
            key_file: String::new(),
            credential_file: String::new(),
            role: String::new(),
            secret_path: String::new(),
            address: String::new(),
            enabled: false,
            timeout_seconds: DEFAULT_TIMEOUT_SECONDS,
        }
    }
}

impl fmt::Debug for BootstrapConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BootstrapConfig")
            .field("address", &self.address)
            .field("role", &self.role)
            .field("secret_path", &self.secret_path)
            .field("mutual_tls", &self.uses_client_certificate())
            .field("enabled", &self.enabled)
            .finish()
    }
}

impl BootstrapConfig {
    /// Resolve the config path from `CONFIG_FOLDER` / `ENVIRONMENT` and load it.
    pub fn from_env() -> Result<Self, VaultConfigError> {
        let folder = env_or(CONFIG_FOLDER, DEFAULT_CONFIG_FOLDER);
        let environment = env_or(ENVIRONMENT, DEFAULT_ENVIRONMENT);
        Self::load(folder, &environment)
    }

    pub fn load(folder: impl AsRef<Path>, environment: &str) -> Result<Self, VaultConfigError> {
        let path = config_path(folder.as_ref(), environment);
        info!(path = %path.display(), "loading bootstrap configuration");

        let source = std::fs::read_to_string(&path).map_err(|source| VaultConfigError::Read {
            path: path.clone(),
            source,
        })?;

        let config: BootstrapConfig =
            serde_yaml::from_str(&source).map_err(|source| VaultConfigError::Parse {
                path: path.clone(),
                source,
            })?;

        config.validate()?;
        Ok(config)
    }

    /// A disabled config never touches the network, so only enabled configs are checked.
    pub fn validate(&self) -> Result<(), VaultConfigError> {
        if !self.enabled {
            return Ok(());
        }

        if self.address.trim().is_empty() {
            return Err(VaultConfigError::Missing("address"));
        }
        Url::parse(&self.address).map_err(|e| VaultConfigError::Invalid {
            key: "address",
            reason: e.to_string(),
        })?;

        let required = [
            ("role", &self.role),
            ("secretpath", &self.secret_path),
            ("jwt", &self.credential_file),
            ("cafile", &self.ca_file),
        ];
        for (key, value) in required {
            if value.trim().is_empty() {
                return Err(VaultConfigError::Missing(key));
            }
        }

        Ok(())
    }

    pub fn uses_client_certificate(&self) -> bool {
        !self.key_file.is_empty()
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }

    pub fn login_url(&self) -> String {
        format!("{}/v1/auth/kubernetes/login", self.base_address())
    }

    pub fn secret_url(&self) -> String {
        format!(
            "{}/v1/{}",
            self.base_address(),
            self.secret_path.trim_start_matches('/')
        )
    }

    fn base_address(&self) -> &str {
        self.address.trim_end_matches('/')
    }
}

pub fn config_path(folder: &Path, environment: &str) -> PathBuf {
    folder.join(format!("vault-config-{environment}.yml"))
}

/// Environment variable or fallback.
pub fn env_or(key: &str, fallback: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| fallback.to_string())
}
