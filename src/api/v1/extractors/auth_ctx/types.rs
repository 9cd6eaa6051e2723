/*
 * Responsibility
 * - Handler から見える「認証済みコンテキスト」の型
 * - middleware が検証して request extensions に格納し、handler はこの型だけを受け取る
 *
 * Notes
 * - 署名検証 / issuer / tenant scope のチェックは services::auth 側の責務
 * - リクエスト毎に作られ、永続化はしない
 */
use crate::services::auth::{Authorized, TokenType};

/// 認証済みのリクエストに付与されるコンテキスト
///
/// - `account_id` / `organisation_id` は end-user token の場合のみ入る
/// - application token では両方 `None`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthCtx {
    pub issuer: String,
    pub subject: Option<String>,
    pub token_type: TokenType,
    pub account_id: Option<String>,
    pub organisation_id: Option<String>,
}

impl AuthCtx {
    pub fn is_end_user(&self) -> bool {
        self.token_type == TokenType::EndUser
    }
}

impl From<Authorized> for AuthCtx {
    fn from(authorized: Authorized) -> Self {
        Self {
            issuer: authorized.issuer,
            subject: authorized.subject,
            token_type: authorized.token_type,
            account_id: authorized.account_id,
            organisation_id: authorized.organisation_id,
        }
    }
}
