/// Factory: build `JwtAuth` from application `Config` and (optionally) bootstrapped secrets.
use std::sync::Arc;

use base64::{Engine, engine::general_purpose::STANDARD};
use tracing::info;

use crate::config::{Config, ConfigError};
use crate::services::auth::JwtAuth;
use crate::services::vault::SecretStoreClient;

/// The verification key comes from the secret store when it is enabled,
/// otherwise from the static `JWT_SECRET` setting. Both are base64.
pub fn build_jwt_auth(
    config: &Config,
    secrets: Option<&SecretStoreClient>,
) -> Result<Arc<JwtAuth>, ConfigError> {
    let encoded = match secrets {
        Some(store) => {
            if !store.has_secret(&config.jwt_secret_key) {
                return Err(ConfigError::MissingSecret(config.jwt_secret_key.clone()));
            }
            info!(key = %config.jwt_secret_key, "using verification key from the secret store");
            store.read_secret(&config.jwt_secret_key).to_string()
        }
        None => config
            .jwt_secret
            .clone()
            .ok_or(ConfigError::Missing("JWT_SECRET"))?,
    };

    let key = STANDARD
        .decode(encoded.trim())
        .map_err(|_| ConfigError::Invalid("JWT_SECRET"))?;

    Ok(Arc::new(JwtAuth::new(config.jwt_auth_config(key))))
}
