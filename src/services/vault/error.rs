/*
 * Responsibility
 * - bootstrap (login / secret fetch) が上位に伝える意味の定義
 * - どれも起動失敗 (fatal) として扱う前提
 */
use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum VaultError {
    #[error("failed to read identity credential {path}: {reason}")]
    CredentialRead { path: PathBuf, reason: String },

    #[error("invalid TLS configuration: {0}")]
    TlsConfig(String),

    #[error("failed to login to the secret store: {0}")]
    LoginFailed(String),

    #[error("malformed login response: {0}")]
    MalformedLoginResponse(&'static str),

    #[error("failed to load secrets from {path}: {reason}")]
    SecretFetchFailed { path: String, reason: String },

    #[error("malformed secret response from {path}: {reason}")]
    MalformedSecretResponse { path: String, reason: String },

    #[error("no secret found in the given path: {0}")]
    NoSecretFound(String),
}
