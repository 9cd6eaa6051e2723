/*
 * Responsibility
 * - 環境変数の読み込み (PORT, APP_ENV, JWT_* など)
 * - 設定値のバリデーション (不足なら起動失敗)
 * - secret store の bootstrap 設定は services::vault::config 側 (YAML)
 */
use std::fmt;
use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

use crate::services::auth::access_jwt::{JwtAuthConfig, TokenLookup, UnauthorizedResponder};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppEnv {
    Development,
    Production,
}

impl AppEnv {
    pub fn from_env() -> Self {
        match std::env::var("APP_ENV")
            .unwrap_or_else(|_| "development".to_string())
            .to_ascii_lowercase()
            .as_str()
        {
            "production" | "prod" => Self::Production,
            _ => Self::Development,
        }
    }

    pub fn is_production(&self) -> bool {
        matches!(self, Self::Production)
    }
}

#[derive(Debug)]
pub enum ConfigError {
    Missing(&'static str),
    Invalid(&'static str),
    MissingSecret(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Missing(key) => write!(f, "missing configuration: {}", key),
            ConfigError::Invalid(key) => write!(f, "invalid configuration: {}", key),
            ConfigError::MissingSecret(key) => {
                write!(f, "secret store does not contain key: {}", key)
            }
        }
    }
}

impl std::error::Error for ConfigError {}

pub struct Config {
    pub addr: SocketAddr,
    pub app_env: AppEnv,
    pub request_timeout_seconds: u64,

    pub jwt_issuer: String,
    pub jwt_signing_algorithm: String,
    pub jwt_token_lookup: TokenLookup,
    pub jwt_realm: String,
    pub jwt_timeout_seconds: u64,

    // base64 verification key, used when the secret store is disabled
    pub jwt_secret: Option<String>,
    // secret store key holding the base64 verification key
    pub jwt_secret_key: String,
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("addr", &self.addr)
            .field("app_env", &self.app_env)
            .field("jwt_issuer", &self.jwt_issuer)
            .field("jwt_signing_algorithm", &self.jwt_signing_algorithm)
            .field("jwt_token_lookup", &self.jwt_token_lookup)
            .field("jwt_realm", &self.jwt_realm)
            .field("jwt_secret", &self.jwt_secret.as_ref().map(|_| "<redacted>"))
            .field("jwt_secret_key", &self.jwt_secret_key)
            .finish()
    }
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let port: u16 = std::env::var("PORT")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(8080);

        let addr: SocketAddr = SocketAddr::from_str(&format!("0.0.0.0:{}", port))
            .map_err(|_| ConfigError::Invalid("PORT"))?;

        let app_env = AppEnv::from_env();

        let request_timeout_seconds = std::env::var("REQUEST_TIMEOUT_SECONDS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(30);

        let jwt_issuer =
            std::env::var("JWT_ISSUER").map_err(|_| ConfigError::Missing("JWT_ISSUER"))?;
        if jwt_issuer.trim().is_empty() {
            return Err(ConfigError::Invalid("JWT_ISSUER"));
        }

        let jwt_signing_algorithm =
            std::env::var("JWT_SIGNING_ALGORITHM").unwrap_or_else(|_| "HS256".to_string());

        let jwt_token_lookup = match std::env::var("JWT_TOKEN_LOOKUP") {
            Ok(rule) => rule
                .parse()
                .map_err(|_| ConfigError::Invalid("JWT_TOKEN_LOOKUP"))?,
            Err(_) => TokenLookup::default(),
        };

        let jwt_realm = std::env::var("JWT_REALM").unwrap_or_else(|_| "tag-service".to_string());

        let jwt_timeout_seconds = std::env::var("JWT_TIMEOUT_SECONDS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(3600);

        let jwt_secret = std::env::var("JWT_SECRET")
            .ok()
            .filter(|s| !s.trim().is_empty());

        let jwt_secret_key =
            std::env::var("JWT_SECRET_KEY").unwrap_or_else(|_| "JWT_SECRET".to_string());

        Ok(Self {
            addr,
            app_env,
            request_timeout_seconds,
            jwt_issuer,
            jwt_signing_algorithm,
            jwt_token_lookup,
            jwt_realm,
            jwt_timeout_seconds,
            jwt_secret,
            jwt_secret_key,
        })
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_seconds)
    }

    /// Middleware settings around an already-resolved verification key.
    pub fn jwt_auth_config(&self, key: Vec<u8>) -> JwtAuthConfig {
        JwtAuthConfig {
            key,
            signing_algorithm: self.jwt_signing_algorithm.clone(),
            issuer: self.jwt_issuer.clone(),
            token_lookup: self.jwt_token_lookup.clone(),
            realm: self.jwt_realm.clone(),
            timeout: Duration::from_secs(self.jwt_timeout_seconds),
            unauthorized: UnauthorizedResponder::Default,
        }
    }
}
