use std::{fmt, str::FromStr, sync::Arc, time::Duration};

use axum::http::{HeaderMap, HeaderName, HeaderValue, StatusCode, header};
use axum::response::Response;
use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use jsonwebtoken::{Algorithm, DecodingKey, Validation, errors::ErrorKind};
use serde::Deserialize;
use thiserror::Error;
use tracing::warn;

use crate::error::error_response;

/// Header the API gateway forwards the signed assertion in.
pub const JWT_ASSERTION_HEADER: &str = "X-JWT-Assertion";

/// Tenant scope supplied by the caller.
pub const ORGANISATION_ID_HEADER: &str = "Organisation-ID";

/// Request header carrying the derived account id to downstream handlers.
pub const ACCOUNT_ID_HEADER: &str = "accountId";

/// `user-type` claim value marking an end-user (as opposed to application) token.
pub const END_USER_TOKEN_TYPE: &str = "APPLICATION_USER";

const DEFAULT_SIGNING_ALGORITHM: &str = "HS256";
const DEFAULT_REALM: &str = "tag-service";
const CHALLENGE_SCHEME: &str = "JWT";

/// Per-request rejection reasons. Every variant maps to 401.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthError {
    #[error("auth header empty")]
    AuthHeaderEmpty,
    // Malformed/unparseable token or failed signature check; carries the underlying message.
    #[error("{0}")]
    InvalidAuthHeader(String),
    #[error("invalid signing algorithm")]
    InvalidSigningAlgorithm,
    #[error("invalid token claims: {0}")]
    InvalidClaims(String),
    #[error("issuer not valid")]
    IssuerInvalid,
    #[error("Authorization failed")]
    AuthorizationFailed,
    #[error("token verification is not configured")]
    NotConfigured,
}

impl AuthError {
    pub fn status(&self) -> StatusCode {
        StatusCode::UNAUTHORIZED
    }
}

/// Errors raised while building the middleware configuration (startup only).
#[derive(Debug, Error)]
pub enum AuthConfigError {
    #[error("unsupported token lookup rule: {0}")]
    UnsupportedTokenLookup(String),
    #[error("invalid header name in token lookup rule: {0}")]
    InvalidHeaderName(String),
}

/// Where to find the token on the request.
///
/// Parsed from `header:<Name>`; header is the only supported source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenLookup {
    Header(HeaderName),
}

impl Default for TokenLookup {
    fn default() -> Self {
        Self::Header(HeaderName::from_static("x-jwt-assertion"))
    }
}

impl FromStr for TokenLookup {
    type Err = AuthConfigError;

    fn from_str(rule: &str) -> Result<Self, Self::Err> {
        match rule.split_once(':') {
            Some(("header", name)) => HeaderName::from_bytes(name.trim().as_bytes())
                .map(Self::Header)
                .map_err(|_| AuthConfigError::InvalidHeaderName(name.to_string())),
            _ => Err(AuthConfigError::UnsupportedTokenLookup(rule.to_string())),
        }
    }
}

impl TokenLookup {
    fn extract<'a>(&self, headers: &'a HeaderMap) -> Result<&'a str, AuthError> {
        match self {
            Self::Header(name) => {
                let Some(value) = headers.get(name) else {
                    return Err(AuthError::AuthHeaderEmpty);
                };
                let value = value
                    .to_str()
                    .map_err(|_| AuthError::InvalidAuthHeader("invalid auth header".into()))?
                    .trim();

                // Allow pointing the rule at `Authorization`
                let token = value.strip_prefix("Bearer ").unwrap_or(value).trim();
                if token.is_empty() {
                    return Err(AuthError::AuthHeaderEmpty);
                }
                Ok(token)
            }
        }
    }
}

pub type ResponderFn = dyn Fn(StatusCode, &str) -> Response + Send + Sync;

/// How a rejected request is rendered.
///
/// The challenge header is added by the middleware in both cases.
#[derive(Clone, Default)]
pub enum UnauthorizedResponder {
    /// `{"code": <status>, "message": <reason>}`
    #[default]
    Default,
    Custom(Arc<ResponderFn>),
}

impl fmt::Debug for UnauthorizedResponder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Default => f.write_str("Default"),
            Self::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}

impl UnauthorizedResponder {
    pub fn custom<F>(responder: F) -> Self
    where
        F: Fn(StatusCode, &str) -> Response + Send + Sync + 'static,
    {
        Self::Custom(Arc::new(responder))
    }

    pub fn respond(&self, status: StatusCode, message: &str) -> Response {
        match self {
            Self::Default => error_response(status, message),
            Self::Custom(responder) => responder(status, message),
        }
    }
}

/// Middleware configuration. Immutable once handed to [`JwtAuth::new`].
#[derive(Clone)]
pub struct JwtAuthConfig {
    /// Raw HMAC secret.
    pub key: Vec<u8>,
    /// `HS256`, `HS384` or `HS512`.
    pub signing_algorithm: String,
    pub issuer: String,
    pub token_lookup: TokenLookup,
    pub realm: String,
    // Informational; the server layer owns request timeouts.
    pub timeout: Duration,
    pub unauthorized: UnauthorizedResponder,
}

impl fmt::Debug for JwtAuthConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Do not print key material
        f.debug_struct("JwtAuthConfig")
            .field("signing_algorithm", &self.signing_algorithm)
            .field("issuer", &self.issuer)
            .field("token_lookup", &self.token_lookup)
            .field("realm", &self.realm)
            .field("timeout", &self.timeout)
            .field("unauthorized", &self.unauthorized)
            .finish()
    }
}

impl JwtAuthConfig {
    pub fn new(key: Vec<u8>, issuer: impl Into<String>) -> Self {
        Self {
            key,
            signing_algorithm: DEFAULT_SIGNING_ALGORITHM.to_string(),
            issuer: issuer.into(),
            token_lookup: TokenLookup::default(),
            realm: DEFAULT_REALM.to_string(),
            timeout: Duration::from_secs(3600),
            unauthorized: UnauthorizedResponder::Default,
        }
    }
}

/// Verified token claims.
///
/// Missing claims decode to `None`; claims of the wrong JSON type fail the decode
/// (`AuthError::InvalidClaims`) instead of silently becoming empty.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenClaims {
    #[serde(default)]
    pub iss: Option<String>,
    #[serde(default)]
    pub sub: Option<String>,
    #[serde(default, rename = "http://wso2.org/claims/enduser")]
    pub account_id: Option<String>,
    #[serde(default, rename = "http://wso2.org/claims/usertype")]
    pub user_type: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenType {
    EndUser,
    Application,
}

impl TokenType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::EndUser => "end_user",
            Self::Application => "application",
        }
    }
}

impl TokenClaims {
    pub fn token_type(&self) -> TokenType {
        match self.user_type.as_deref() {
            Some(END_USER_TOKEN_TYPE) => TokenType::EndUser,
            _ => TokenType::Application,
        }
    }
}

/// Outcome of a successful authorization.
///
/// `account_id` / `organisation_id` are only set for end-user tokens.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Authorized {
    pub issuer: String,
    pub subject: Option<String>,
    pub token_type: TokenType,
    pub account_id: Option<String>,
    pub organisation_id: Option<String>,
}

#[derive(Deserialize)]
struct RawHeader {
    alg: String,
}

/// HMAC bearer-token verifier.
///
/// Holds only immutable configuration, so one instance behind an `Arc` serves
/// every request concurrently.
#[derive(Clone)]
pub struct JwtAuth {
    algorithm: Option<Algorithm>,
    decoding_key: DecodingKey,
    validation: Validation,
    issuer: String,
    key_configured: bool,
    token_lookup: TokenLookup,
    realm: String,
    challenge: HeaderValue,
    timeout: Duration,
    unauthorized: UnauthorizedResponder,
}

impl fmt::Debug for JwtAuth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Do not print key material
        f.debug_struct("JwtAuth")
            .field("algorithm", &self.algorithm)
            .field("issuer", &self.issuer)
            .field("token_lookup", &self.token_lookup)
            .field("realm", &self.realm)
            .finish()
    }
}

impl JwtAuth {
    /// Never fails: a misconfigured verifier is still built, but rejects every request.
    pub fn new(config: JwtAuthConfig) -> Self {
        let algorithm = hmac_algorithm(&config.signing_algorithm);
        if algorithm.is_none() {
            warn!(
                algorithm = %config.signing_algorithm,
                "unsupported signing algorithm; every request will be rejected"
            );
        }

        let key_configured = !config.key.is_empty();
        if !key_configured || config.issuer.is_empty() {
            warn!("verification key or issuer is empty; every request will be rejected");
        }

        let mut validation = Validation::new(algorithm.unwrap_or(Algorithm::HS256));
        // exp/nbf are checked when present but not required; audience is not used.
        validation.required_spec_claims.clear();
        validation.validate_aud = false;
        validation.validate_nbf = true;

        let challenge = HeaderValue::from_str(&format!(
            "{CHALLENGE_SCHEME} realm={}",
            config.realm
        ))
        .unwrap_or_else(|_| {
            warn!(realm = %config.realm, "realm is not a valid header value; using default");
            HeaderValue::from_static("JWT realm=tag-service")
        });

        Self {
            algorithm,
            decoding_key: DecodingKey::from_secret(&config.key),
            validation,
            issuer: config.issuer,
            key_configured,
            token_lookup: config.token_lookup,
            realm: config.realm,
            challenge,
            timeout: config.timeout,
            unauthorized: config.unauthorized,
        }
    }

    pub fn is_configured(&self) -> bool {
        self.key_configured && !self.issuer.is_empty()
    }

    pub fn realm(&self) -> &str {
        &self.realm
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Run the full per-request check: locate token → signature → issuer →
    /// tenant/account scoping (end-user tokens only).
    pub fn authorize(&self, headers: &HeaderMap) -> Result<Authorized, AuthError> {
        if !self.is_configured() {
            return Err(AuthError::NotConfigured);
        }

        let token = self.token_lookup.extract(headers)?;
        let claims = self.verify(token)?;

        if claims.iss.as_deref() != Some(self.issuer.as_str()) {
            warn!("the token issuer is not valid");
            return Err(AuthError::IssuerInvalid);
        }

        let token_type = claims.token_type();
        let (account_id, organisation_id) = match token_type {
            TokenType::Application => (None, None),
            TokenType::EndUser => {
                let Some(organisation_id) = non_empty_header(headers, ORGANISATION_ID_HEADER)
                else {
                    warn!("no Organisation-ID header found; authorization failed");
                    return Err(AuthError::AuthorizationFailed);
                };

                let Some(account_id) = claims
                    .account_id
                    .as_deref()
                    .map(str::trim)
                    .filter(|v| !v.is_empty())
                else {
                    warn!("no account id claim found; authorization failed");
                    return Err(AuthError::AuthorizationFailed);
                };

                (Some(account_id.to_string()), Some(organisation_id.to_string()))
            }
        };

        Ok(Authorized {
            issuer: self.issuer.clone(),
            subject: claims.sub,
            token_type,
            account_id,
            organisation_id,
        })
    }

    /// Check the algorithm declared by the token, then the signature (and exp/nbf if present).
    pub fn verify(&self, token: &str) -> Result<TokenClaims, AuthError> {
        let expected = self.algorithm.ok_or(AuthError::InvalidSigningAlgorithm)?;

        // Compare the raw `alg` before handing the token to jsonwebtoken, so that
        // `none` (which it cannot even parse) is reported as an algorithm error.
        let declared = declared_algorithm(token)?;
        if Algorithm::from_str(&declared).ok() != Some(expected) {
            warn!(declared = %declared, "token signing algorithm does not match configuration");
            return Err(AuthError::InvalidSigningAlgorithm);
        }

        jsonwebtoken::decode::<TokenClaims>(token, &self.decoding_key, &self.validation)
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                ErrorKind::Json(_) => AuthError::InvalidClaims(e.to_string()),
                ErrorKind::InvalidAlgorithm => AuthError::InvalidSigningAlgorithm,
                _ => AuthError::InvalidAuthHeader(e.to_string()),
            })
    }

    /// Render a rejection with the configured responder plus the bearer challenge.
    pub fn reject(&self, err: &AuthError) -> Response {
        let mut response = self.unauthorized.respond(err.status(), &err.to_string());
        response
            .headers_mut()
            .insert(header::WWW_AUTHENTICATE, self.challenge.clone());
        response
    }
}

fn hmac_algorithm(name: &str) -> Option<Algorithm> {
    match Algorithm::from_str(name.trim()) {
        Ok(alg @ (Algorithm::HS256 | Algorithm::HS384 | Algorithm::HS512)) => Some(alg),
        _ => None,
    }
}

fn declared_algorithm(token: &str) -> Result<String, AuthError> {
    let malformed = || AuthError::InvalidAuthHeader("invalid auth header".to_string());

    let mut segments = token.split('.');
    let (Some(header), Some(_), Some(_), None) = (
        segments.next(),
        segments.next(),
        segments.next(),
        segments.next(),
    ) else {
        return Err(malformed());
    };

    let bytes = URL_SAFE_NO_PAD.decode(header).map_err(|_| malformed())?;
    let header: RawHeader = serde_json::from_slice(&bytes).map_err(|_| malformed())?;
    Ok(header.alg)
}

fn non_empty_header<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
}
