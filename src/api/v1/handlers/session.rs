/*
 * Responsibility
 * - GET /api/v1/session
 * - middleware が導出した identity (issuer / accountId / organisationId) をそのまま返す
 */
use axum::Json;

use crate::api::v1::{dto::session::SessionResponse, extractors::AuthCtxExtractor};

pub async fn session(AuthCtxExtractor(ctx): AuthCtxExtractor) -> Json<SessionResponse> {
    tracing::debug!(
        account_id = ctx.account_id.as_deref().unwrap_or("-"),
        end_user = ctx.is_end_user(),
        "session lookup"
    );
    Json(SessionResponse::from(ctx))
}
