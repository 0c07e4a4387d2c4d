//! # Authentication Middleware
//!
//! Every protected route runs [`auth_middleware`] before its handler. The
//! middleware asks the configured [`CredentialValidator`] to pull a
//! credential out of the request headers and validate it:
//!
//! ```text
//! Unauthenticated ──validate ok──► Authorized   (AuthContext inserted, handler runs)
//!                 └─validate err─► Rejected     (401, handler never runs)
//! ```
//!
//! Validators are interchangeable behind [`Authenticator`]; the registrar
//! only ever sees the trait object.
//!
//! | Validator | Header | Principal |
//! |-----------|--------|-----------|
//! | [`SimpleBearerValidator`] | `Authorization: Bearer <token>` | none |
//! | [`ApiKeyValidator`] | `X-API-Key: <key>` | name bound to the key |
//!
//! ## AuthContext
//!
//! Handlers read the outcome through the [`AuthContext`] extractor. Public
//! routes get [`AuthContext::anonymous`] from [`anonymous_context`].

use std::sync::Arc;

use axum::extract::Request;
use axum::http::request::Parts;
use axum::http::{header, HeaderMap, HeaderValue, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum::Json;
use axum_extra::headers::authorization::Bearer;
use axum_extra::headers::{Authorization, HeaderMapExt};
use subtle::ConstantTimeEq;
use thiserror::Error;
use utoipa::openapi::security::{ApiKey, ApiKeyValue, HttpAuthScheme, HttpBuilder, SecurityScheme};
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::error::{AppError, ErrorBody, ErrorDetail};

/// Header carrying the key for [`ApiKeyValidator`].
pub const API_KEY_HEADER: &str = "x-api-key";

/// Longest credential accepted before validation is attempted.
const MAX_CREDENTIAL_LEN: usize = 4096;

// ── AuthContext ─────────────────────────────────────────────────────────────

/// Outcome of credential validation for one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthContext {
    /// Caller identity, when the scheme carries one.
    pub principal: Option<String>,
    /// Name of the scheme that produced this context.
    pub scheme: &'static str,
    pub authenticated: bool,
}

impl AuthContext {
    pub fn authenticated(scheme: &'static str, principal: Option<String>) -> Self {
        Self {
            principal,
            scheme,
            authenticated: true,
        }
    }

    /// Context for routes registered as public.
    pub fn anonymous() -> Self {
        Self {
            principal: None,
            scheme: "none",
            authenticated: false,
        }
    }
}

/// Extracts the context the auth middleware stored in the request
/// extensions. Returns 401 if none is present.
impl<S: Send + Sync> axum::extract::FromRequestParts<S> for AuthContext {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthContext>()
            .cloned()
            .ok_or_else(|| AppError::Unauthorized("no auth context in request".into()))
    }
}

// ── Credentials ─────────────────────────────────────────────────────────────

/// Why a credential was refused. Messages are safe to return to clients.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    #[error("missing {0} header")]
    Missing(&'static str),

    #[error("malformed credential: {0}")]
    Malformed(String),

    #[error("invalid credential")]
    Invalid,
}

/// A credential or configured secret. Zeroed on drop; `Debug` is redacted.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct SecretToken(String);

impl SecretToken {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }

    /// Constant-time comparison. A length mismatch still performs a
    /// comparison so timing does not reveal the expected length.
    pub fn matches(&self, provided: &str) -> bool {
        let expected = self.0.as_bytes();
        let provided = provided.as_bytes();
        if provided.len() != expected.len() {
            let _ = expected.ct_eq(expected);
            return false;
        }
        provided.ct_eq(expected).into()
    }
}

impl std::fmt::Debug for SecretToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("SecretToken([REDACTED])")
    }
}

/// A pluggable credential scheme.
pub trait CredentialValidator: Send + Sync + 'static {
    /// Name under which the scheme is published in the API description.
    fn scheme_name(&self) -> &'static str;

    /// OpenAPI description of the scheme.
    fn security_scheme(&self) -> SecurityScheme;

    /// Pull the credential out of the request headers. Defaults to the
    /// `Authorization: Bearer` header.
    fn extract(&self, headers: &HeaderMap) -> Result<SecretToken, AuthError> {
        if !headers.contains_key(header::AUTHORIZATION) {
            return Err(AuthError::Missing("authorization"));
        }
        headers
            .typed_get::<Authorization<Bearer>>()
            .map(|auth| SecretToken::new(auth.token()))
            .ok_or_else(|| {
                AuthError::Malformed("authorization header must use the Bearer scheme".into())
            })
    }

    fn validate(&self, credential: &SecretToken) -> Result<AuthContext, AuthError>;
}

/// Checks that a credential is a well-formed token68 string (RFC 6750).
fn check_token_format(token: &str) -> Result<(), AuthError> {
    if token.is_empty() {
        return Err(AuthError::Malformed("empty credential".into()));
    }
    if token.len() > MAX_CREDENTIAL_LEN {
        return Err(AuthError::Malformed("credential too long".into()));
    }
    let body = token.trim_end_matches('=');
    let valid = !body.is_empty()
        && body
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'-' | b'.' | b'_' | b'~' | b'+' | b'/'));
    if !valid {
        return Err(AuthError::Malformed("credential contains invalid characters".into()));
    }
    Ok(())
}

/// Bearer tokens checked for presence and format. When an allowlist is
/// configured the token must also be on it.
#[derive(Debug, Clone, Default)]
pub struct SimpleBearerValidator {
    accepted: Vec<SecretToken>,
}

impl SimpleBearerValidator {
    /// Accept any well-formed token.
    pub fn new() -> Self {
        Self::default()
    }

    /// Accept only the given tokens.
    pub fn with_tokens<I, T>(tokens: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        Self {
            accepted: tokens.into_iter().map(SecretToken::new).collect(),
        }
    }
}

impl CredentialValidator for SimpleBearerValidator {
    fn scheme_name(&self) -> &'static str {
        "standard-auth"
    }

    fn security_scheme(&self) -> SecurityScheme {
        SecurityScheme::Http(
            HttpBuilder::new()
                .scheme(HttpAuthScheme::Bearer)
                .bearer_format("Token String")
                .description(Some(
                    "Authorization header using the Bearer scheme. Example: \"Authorization: Bearer {token}\"",
                ))
                .build(),
        )
    }

    fn validate(&self, credential: &SecretToken) -> Result<AuthContext, AuthError> {
        let token = credential.expose();
        check_token_format(token)?;
        if !self.accepted.is_empty() {
            // Visit every entry so timing does not depend on the match position.
            let found = self
                .accepted
                .iter()
                .fold(false, |found, accepted| accepted.matches(token) | found);
            if !found {
                return Err(AuthError::Invalid);
            }
        }
        Ok(AuthContext::authenticated(self.scheme_name(), None))
    }
}

/// Named API keys presented in the `X-API-Key` header.
#[derive(Debug, Clone)]
pub struct ApiKeyValidator {
    keys: Vec<(String, SecretToken)>,
}

impl ApiKeyValidator {
    pub fn new<I, P, K>(keys: I) -> Self
    where
        I: IntoIterator<Item = (P, K)>,
        P: Into<String>,
        K: Into<String>,
    {
        Self {
            keys: keys
                .into_iter()
                .map(|(principal, key)| (principal.into(), SecretToken::new(key)))
                .collect(),
        }
    }
}

impl CredentialValidator for ApiKeyValidator {
    fn scheme_name(&self) -> &'static str {
        "api-key"
    }

    fn security_scheme(&self) -> SecurityScheme {
        SecurityScheme::ApiKey(ApiKey::Header(ApiKeyValue::with_description(
            "X-API-Key",
            "Per-client key issued by the operator",
        )))
    }

    fn extract(&self, headers: &HeaderMap) -> Result<SecretToken, AuthError> {
        let value = headers
            .get(API_KEY_HEADER)
            .ok_or(AuthError::Missing("x-api-key"))?;
        let value = value
            .to_str()
            .map_err(|_| AuthError::Malformed("api key is not visible ASCII".into()))?;
        Ok(SecretToken::new(value.trim()))
    }

    fn validate(&self, credential: &SecretToken) -> Result<AuthContext, AuthError> {
        let key = credential.expose();
        check_token_format(key)?;
        let principal = self
            .keys
            .iter()
            .fold(None, |found, (principal, expected)| {
                if expected.matches(key) {
                    Some(principal)
                } else {
                    found
                }
            })
            .ok_or(AuthError::Invalid)?;
        Ok(AuthContext::authenticated(
            self.scheme_name(),
            Some(principal.clone()),
        ))
    }
}

// ── Authenticator ───────────────────────────────────────────────────────────

/// The validator in force, shared through request extensions.
#[derive(Clone)]
pub struct Authenticator(Arc<dyn CredentialValidator>);

impl std::fmt::Debug for Authenticator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("Authenticator")
            .field(&self.0.scheme_name())
            .finish()
    }
}

impl Authenticator {
    pub fn new(validator: impl CredentialValidator) -> Self {
        Self(Arc::new(validator))
    }

    pub fn validator(&self) -> &dyn CredentialValidator {
        self.0.as_ref()
    }

    pub fn authorize(&self, headers: &HeaderMap) -> Result<AuthContext, AuthError> {
        let credential = self.0.extract(headers)?;
        self.0.validate(&credential)
    }
}

// ── Middleware ──────────────────────────────────────────────────────────────

/// Validate the request credential and either run the handler with an
/// [`AuthContext`] attached, or answer 401 without running it.
///
/// Fails closed when no [`Authenticator`] extension is installed.
pub async fn auth_middleware(mut request: Request, next: Next) -> Response {
    let Some(authenticator) = request.extensions().get::<Authenticator>().cloned() else {
        tracing::error!("auth middleware installed without an authenticator");
        return unauthorized_response("authentication is not configured", "Bearer");
    };

    match authenticator.authorize(request.headers()) {
        Ok(context) => {
            tracing::debug!(
                scheme = context.scheme,
                principal = context.principal.as_deref().unwrap_or("-"),
                "request authenticated"
            );
            request.extensions_mut().insert(context);
            next.run(request).await
        }
        Err(err) => {
            tracing::warn!(reason = %err, scheme = authenticator.validator().scheme_name(), "authentication failed");
            let challenge = match authenticator.validator().security_scheme() {
                SecurityScheme::ApiKey(_) => "ApiKey",
                _ => "Bearer",
            };
            unauthorized_response(&err.to_string(), challenge)
        }
    }
}

/// Attach an anonymous [`AuthContext`] to requests on public routes.
pub async fn anonymous_context(mut request: Request, next: Next) -> Response {
    if request.extensions().get::<AuthContext>().is_none() {
        request.extensions_mut().insert(AuthContext::anonymous());
    }
    next.run(request).await
}

fn unauthorized_response(message: &str, challenge: &'static str) -> Response {
    let body = ErrorBody {
        error: ErrorDetail {
            code: "UNAUTHORIZED".to_string(),
            message: message.to_string(),
            details: None,
        },
    };
    let mut response = (StatusCode::UNAUTHORIZED, Json(body)).into_response();
    response
        .headers_mut()
        .insert(header::WWW_AUTHENTICATE, HeaderValue::from_static(challenge));
    response
}
