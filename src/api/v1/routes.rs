/*
 * Responsibility
 * - v1 の URL 構造を定義
 * - JWT が必要な範囲 (protected) にだけ middleware::auth::access を適用する
 */
use axum::{Router, routing::get};

use crate::api::v1::handlers::session::session;
use crate::middleware;
use crate::state::AppState;

pub fn routes(state: AppState) -> Router<AppState> {
    let protected = Router::new().route("/session", get(session));

    middleware::auth::access::apply(protected, state.auth.clone())
}
