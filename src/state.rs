/*
 * Responsibility
 * - Router に紐づける共有コンテキスト (AppState)
 *   - auth: JwtAuth (不変の key / issuer / algorithm)
 *   - secrets: bootstrap 済みの secret (無効時は None)
 * - Clone 前提で持つ (内部は Arc)
 */
use std::sync::Arc;

use crate::services::{auth::JwtAuth, vault::SecretStoreClient};

#[derive(Clone, Debug)]
pub struct AppState {
    pub auth: Arc<JwtAuth>,
    pub secrets: Option<Arc<SecretStoreClient>>,
}

impl AppState {
    pub fn new(auth: Arc<JwtAuth>, secrets: Option<Arc<SecretStoreClient>>) -> Self {
        Self { auth, secrets }
    }
}
