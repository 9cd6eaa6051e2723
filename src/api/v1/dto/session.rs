use serde::Serialize;

use crate::api::v1::extractors::AuthCtx;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionResponse {
    pub issuer: String,
    pub subject: Option<String>,
    pub token_type: &'static str,
    pub account_id: Option<String>,
    pub organisation_id: Option<String>,
}

impl From<AuthCtx> for SessionResponse {
    fn from(ctx: AuthCtx) -> Self {
        Self {
            token_type: ctx.token_type.as_str(),
            issuer: ctx.issuer,
            subject: ctx.subject,
            account_id: ctx.account_id,
            organisation_id: ctx.organisation_id,
        }
    }
}
