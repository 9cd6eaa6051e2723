//! JWT assertion 検証 → derived identity を request に載せる
//!
//! - 検証ロジック本体は `services::auth::access_jwt::JwtAuth` 側 (HTTP 非依存に近い形)
//! - ここでは「拒否なら 401 を返して打ち切る / 通過なら accountId header と AuthCtx を付与」だけを行う
//! - リクエスト毎の状態は持たない (`Arc<JwtAuth>` は不変)

use std::sync::Arc;

use axum::{
    Router,
    extract::{Request, State},
    http::{HeaderName, HeaderValue},
    middleware::{self, Next},
    response::Response,
};

use crate::api::v1::extractors::AuthCtx;
use crate::services::auth::{AuthError, JwtAuth};

/// Protect every route of `router` with the JWT middleware.
///
/// 例：
/// ```ignore
/// let protected = Router::new().route("/session", get(session));
/// let protected = middleware::auth::access::apply(protected, state.auth.clone());
/// ```
pub fn apply<S>(router: Router<S>, auth: Arc<JwtAuth>) -> Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    router.layer(middleware::from_fn_with_state(auth, jwt_middleware))
}

pub async fn jwt_middleware(
    State(auth): State<Arc<JwtAuth>>,
    mut req: Request,
    next: Next,
) -> Response {
    // accountId is only ever set by us; drop anything the client sent
    let account_header = HeaderName::from_static("accountid");
    req.headers_mut().remove(&account_header);

    let authorized = match auth.authorize(req.headers()) {
        Ok(authorized) => authorized,
        Err(err) => {
            tracing::warn!(
                error = %err,
                method = %req.method(),
                path = %req.uri().path(),
                "request rejected"
            );
            return auth.reject(&err);
        }
    };

    if let Some(account_id) = authorized.account_id.as_deref() {
        match HeaderValue::from_str(account_id) {
            Ok(value) => {
                req.headers_mut().insert(account_header, value);
            }
            Err(_) => {
                tracing::warn!("account id claim is not a valid header value");
                return auth.reject(&AuthError::AuthorizationFailed);
            }
        }
    }

    // middleware → extractor への受け渡し
    req.extensions_mut().insert(AuthCtx::from(authorized));

    next.run(req).await
}
