pub mod client;
pub mod config;
pub mod error;

pub use client::{SecretStoreClient, bootstrap};
pub use config::{BootstrapConfig, VaultConfigError};
pub use error::VaultError;
