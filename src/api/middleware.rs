//! API middleware
//!
//! Contains:
//! - `AppState` shared by every handler
//! - `ApiError` and the uniform JSON error envelope
//! - Extractors that reject with the envelope (`AppJson`, `AppPath`, `AppQuery`)
//! - Access token authentication and role checks

use axum::{
    body::Body,
    extract::{
        rejection::{JsonRejection, PathRejection, QueryRejection},
        ConnectInfo, FromRequest, FromRequestParts, Request, State,
    },
    http::{header, request::Parts, HeaderMap, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::sync::Arc;

use crate::config::{Config, SiteConfig, UploadConfig};
use crate::db::repositories::{
    SqlxBlogPostRepository, SqlxExecutiveRepository, SqlxRefreshTokenRepository,
    SqlxTeamMemberRepository, SqlxTestimonialRepository, SqlxUserRepository,
};
use crate::db::DynDatabasePool;
use crate::models::User;
use crate::relay::EventRelay;
use crate::services::{
    AuthService, AuthServiceError, BlogService, ContentError, EmailService, ExecutiveService,
    Mailer, TeamService, TestimonialService,
};
use crate::theme::ThemeEngine;

/// Name of the cookie carrying the access token
pub const ACCESS_COOKIE: &str = "access_token";
/// Name of the cookie carrying the refresh token
pub const REFRESH_COOKIE: &str = "refresh_token";
/// The refresh cookie is only sent to the auth endpoints
pub const REFRESH_COOKIE_PATH: &str = "/api/v1/auth";

/// Application state containing shared services
#[derive(Clone)]
pub struct AppState {
    pub pool: DynDatabasePool,
    pub auth: Arc<AuthService>,
    pub blog: Arc<BlogService>,
    pub team: Arc<TeamService>,
    pub executives: Arc<ExecutiveService>,
    pub testimonials: Arc<TestimonialService>,
    pub relay: EventRelay,
    pub theme: Arc<ThemeEngine>,
    pub upload_config: Arc<UploadConfig>,
    pub site: Arc<SiteConfig>,
    /// Add `Secure` to auth cookies
    pub cookie_secure: bool,
    /// Take the client address from proxy headers
    pub trust_proxy: bool,
}

impl AppState {
    /// Wire repositories and services on top of an already migrated pool
    pub fn new(config: &Config, pool: DynDatabasePool, mailer: Arc<dyn Mailer>) -> anyhow::Result<Self> {
        let relay = EventRelay::new();
        let email = EmailService::new(mailer, &config.site, config.auth.otp_ttl_minutes);
        let auth = AuthService::new(
            SqlxUserRepository::boxed(pool.clone()),
            SqlxRefreshTokenRepository::boxed(pool.clone()),
            &config.auth,
            email,
        );
        let theme = ThemeEngine::new(&config.theme.path)?;

        Ok(Self {
            auth: Arc::new(auth),
            blog: Arc::new(BlogService::new(
                SqlxBlogPostRepository::boxed(pool.clone()),
                relay.clone(),
            )),
            team: Arc::new(TeamService::new(
                SqlxTeamMemberRepository::boxed(pool.clone()),
                relay.clone(),
            )),
            executives: Arc::new(ExecutiveService::new(
                SqlxExecutiveRepository::boxed(pool.clone()),
                relay.clone(),
            )),
            testimonials: Arc::new(TestimonialService::new(
                SqlxTestimonialRepository::boxed(pool.clone()),
                relay.clone(),
            )),
            pool,
            relay,
            theme: Arc::new(theme),
            upload_config: Arc::new(config.upload.clone()),
            site: Arc::new(config.site.clone()),
            cookie_secure: config.auth.cookie_secure,
            trust_proxy: config.server.trust_proxy,
        })
    }
}

// ============================================================================
// Errors
// ============================================================================

/// Either a single message or one message per invalid field
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ErrorMessage {
    Text(String),
    Fields(Vec<String>),
}

/// Body of every API error response
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorEnvelope {
    pub status_code: u16,
    /// Canonical reason phrase of the status
    pub error: String,
    pub code: String,
    pub message: ErrorMessage,
    /// Filled in by `error_envelope`
    pub path: String,
    pub timestamp: String,
}

/// Error returned by API handlers
#[derive(Debug, Clone)]
pub struct ApiError {
    pub status: StatusCode,
    pub code: &'static str,
    pub message: ErrorMessage,
}

impl ApiError {
    pub fn new(status: StatusCode, code: &'static str, message: impl Into<String>) -> Self {
        Self {
            status,
            code,
            message: ErrorMessage::Text(message.into()),
        }
    }

    pub fn validation(messages: Vec<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            code: "VALIDATION_ERROR",
            message: ErrorMessage::Fields(messages),
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::validation(vec![message.into()])
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, "UNAUTHORIZED", message)
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new(StatusCode::FORBIDDEN, "FORBIDDEN", message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, "NOT_FOUND", message)
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new(StatusCode::CONFLICT, "CONFLICT", message)
    }

    pub fn payload_too_large(message: impl Into<String>) -> Self {
        Self::new(StatusCode::PAYLOAD_TOO_LARGE, "PAYLOAD_TOO_LARGE", message)
    }

    pub fn unsupported_media_type(message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNSUPPORTED_MEDIA_TYPE, "UNSUPPORTED_MEDIA_TYPE", message)
    }

    pub fn rate_limited(message: impl Into<String>) -> Self {
        Self::new(StatusCode::TOO_MANY_REQUESTS, "RATE_LIMITED", message)
    }

    /// Generic 500; the cause is logged and never sent to the client
    pub fn internal(err: impl std::fmt::Display) -> Self {
        tracing::error!("Internal error: {:#}", err);
        Self::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            "INTERNAL_ERROR",
            "An unexpected error occurred",
        )
    }

    pub fn envelope(&self) -> ErrorEnvelope {
        ErrorEnvelope {
            status_code: self.status.as_u16(),
            error: self
                .status
                .canonical_reason()
                .unwrap_or("Unknown")
                .to_string(),
            code: self.code.to_string(),
            message: self.message.clone(),
            path: String::new(),
            timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let envelope = self.envelope();
        let mut response = (self.status, Json(envelope.clone())).into_response();
        response.extensions_mut().insert(envelope);
        response
    }
}

impl From<AuthServiceError> for ApiError {
    fn from(err: AuthServiceError) -> Self {
        match err {
            AuthServiceError::Validation(messages) => ApiError::validation(messages),
            AuthServiceError::Conflict(message) => ApiError::conflict(message),
            AuthServiceError::Authentication(message) => ApiError::unauthorized(message),
            AuthServiceError::EmailNotVerified => ApiError::new(
                StatusCode::FORBIDDEN,
                "EMAIL_NOT_VERIFIED",
                "Email address has not been verified",
            ),
            AuthServiceError::InvalidOtp => ApiError::bad_request("otp is invalid or expired"),
            AuthServiceError::RateLimited => {
                ApiError::rate_limited("Too many attempts, try again later")
            }
            AuthServiceError::Forbidden(message) => ApiError::forbidden(message),
            AuthServiceError::NotFound(what) => ApiError::not_found(format!("{} not found", what)),
            AuthServiceError::InternalError(e) => ApiError::internal(e),
        }
    }
}

impl From<ContentError> for ApiError {
    fn from(err: ContentError) -> Self {
        match err {
            ContentError::Validation(messages) => ApiError::validation(messages),
            ContentError::NotFound(what) => ApiError::not_found(format!("{} not found", what)),
            ContentError::Conflict(message) => ApiError::conflict(message),
            ContentError::InternalError(e) => ApiError::internal(e),
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        match rejection.status() {
            StatusCode::UNSUPPORTED_MEDIA_TYPE => ApiError::unsupported_media_type(
                "Expected request with `Content-Type: application/json`",
            ),
            StatusCode::PAYLOAD_TOO_LARGE => ApiError::payload_too_large("Request body is too large"),
            _ => ApiError::bad_request(rejection.body_text()),
        }
    }
}

impl From<PathRejection> for ApiError {
    fn from(rejection: PathRejection) -> Self {
        ApiError::bad_request(rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        ApiError::bad_request(rejection.body_text())
    }
}

/// Fill in `path` on error envelopes.
///
/// `ApiError::into_response` attaches its envelope as a response extension;
/// the body is rebuilt here once the request URI is known.
pub async fn error_envelope(request: Request, next: Next) -> Response {
    let path = request.uri().path().to_string();
    let mut response = next.run(request).await;

    let Some(mut envelope) = response.extensions_mut().remove::<ErrorEnvelope>() else {
        return response;
    };
    envelope.path = path;

    let (mut parts, _) = response.into_parts();
    parts.headers.remove(header::CONTENT_LENGTH);
    match serde_json::to_vec(&envelope) {
        Ok(body) => Response::from_parts(parts, Body::from(body)),
        Err(e) => ApiError::internal(e).into_response(),
    }
}

/// Fallback for unknown `/api` routes
pub async fn api_not_found() -> ApiError {
    ApiError::not_found("Route not found")
}

pub async fn api_method_not_allowed() -> ApiError {
    ApiError::new(
        StatusCode::METHOD_NOT_ALLOWED,
        "METHOD_NOT_ALLOWED",
        "Method not allowed",
    )
}

// ============================================================================
// Extractors
// ============================================================================

/// JSON body whose rejection is an `ApiError`
#[derive(Debug, FromRequest)]
#[from_request(via(axum::Json), rejection(ApiError))]
pub struct AppJson<T>(pub T);

/// Path parameters whose rejection is an `ApiError`
#[derive(Debug, FromRequestParts)]
#[from_request(via(axum::extract::Path), rejection(ApiError))]
pub struct AppPath<T>(pub T);

/// Query string whose rejection is an `ApiError`
#[derive(Debug, FromRequestParts)]
#[from_request(via(axum::extract::Query), rejection(ApiError))]
pub struct AppQuery<T>(pub T);

/// Client address. With `server.trust_proxy` the proxy headers win
/// (`X-Forwarded-For`, then `X-Real-IP`); otherwise only the socket peer is
/// used, since clients can set those headers to anything.
#[derive(Debug, Clone)]
pub struct ClientIp(pub Option<String>);

impl FromRequestParts<AppState> for ClientIp {
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        Ok(ClientIp(client_ip(parts, state.trust_proxy)))
    }
}

fn client_ip(parts: &Parts, trust_proxy: bool) -> Option<String> {
    let forwarded = if trust_proxy {
        extract_ip_address(&parts.headers)
    } else {
        None
    };
    forwarded.or_else(|| {
        parts
            .extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| addr.ip().to_string())
    })
}

/// Extract the client IP from proxy headers
pub fn extract_ip_address(headers: &HeaderMap) -> Option<String> {
    if let Some(forwarded) = headers.get("x-forwarded-for").and_then(|v| v.to_str().ok()) {
        if let Some(ip) = forwarded.split(',').next().map(str::trim).filter(|ip| !ip.is_empty()) {
            return Some(ip.to_string());
        }
    }

    headers
        .get("x-real-ip")
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|ip| !ip.is_empty())
        .map(str::to_string)
}

// ============================================================================
// Authentication
// ============================================================================

/// Authenticated user extracted from request
#[derive(Debug, Clone)]
pub struct AuthenticatedUser(pub User);

impl<S> FromRequestParts<S> for AuthenticatedUser
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthenticatedUser>()
            .cloned()
            .ok_or_else(|| ApiError::unauthorized("Authentication required"))
    }
}

/// Value of the named cookie
pub fn cookie_value(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|cookies| cookies.split(';'))
        .filter_map(|cookie| cookie.trim().split_once('='))
        .find(|(key, _)| *key == name)
        .map(|(_, value)| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

/// Access token from `Authorization: Bearer`, falling back to the cookie
pub fn extract_access_token(headers: &HeaderMap) -> Option<String> {
    if let Some(auth_header) = headers.get(header::AUTHORIZATION) {
        if let Ok(auth_str) = auth_header.to_str() {
            if let Some(token) = auth_str.strip_prefix("Bearer ") {
                let token = token.trim();
                if !token.is_empty() {
                    return Some(token.to_string());
                }
            }
        }
    }

    cookie_value(headers, ACCESS_COOKIE)
}

/// User behind the request's access token, if any
pub async fn current_user(state: &AppState, headers: &HeaderMap) -> Option<User> {
    let token = extract_access_token(headers)?;
    match state.auth.authenticate(&token).await {
        Ok(user) => user,
        Err(e) => {
            tracing::warn!("Access token check failed: {}", e);
            None
        }
    }
}

/// Authentication middleware
pub async fn require_auth(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = extract_access_token(request.headers())
        .ok_or_else(|| ApiError::unauthorized("Missing authentication token"))?;

    let user = state
        .auth
        .authenticate(&token)
        .await?
        .ok_or_else(|| ApiError::unauthorized("Invalid or expired token"))?;

    request.extensions_mut().insert(AuthenticatedUser(user));
    Ok(next.run(request).await)
}

/// Admin authorization middleware
pub async fn require_admin(request: Request, next: Next) -> Result<Response, ApiError> {
    let user = request
        .extensions()
        .get::<AuthenticatedUser>()
        .ok_or_else(|| ApiError::unauthorized("Authentication required"))?;

    if !user.0.is_admin() {
        return Err(ApiError::forbidden("Admin privileges required"));
    }

    Ok(next.run(request).await)
}

/// Editor authorization middleware (editors and admins)
pub async fn require_editor(request: Request, next: Next) -> Result<Response, ApiError> {
    let user = request
        .extensions()
        .get::<AuthenticatedUser>()
        .ok_or_else(|| ApiError::unauthorized("Authentication required"))?;

    if !user.0.is_editor() {
        return Err(ApiError::forbidden("Editor privileges required"));
    }

    Ok(next.run(request).await)
}

// ============================================================================
// Tests
// ============================================================================


#[cfg(test)]
mod property_tests {
    use super::*;
    use axum::http::HeaderValue;
    use proptest::prelude::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(20))]

        #[test]
        fn bearer_token_always_wins(bearer in "[A-Za-z0-9._-]{1,64}", cookie in "[A-Za-z0-9._-]{1,64}") {
            let mut h = HeaderMap::new();
            h.insert(header::AUTHORIZATION, HeaderValue::from_str(&format!("Bearer {}", bearer)).unwrap());
            h.insert(header::COOKIE, HeaderValue::from_str(&format!("access_token={}", cookie)).unwrap());
            prop_assert_eq!(extract_access_token(&h), Some(bearer));
        }

        #[test]
        fn cookie_found_among_others(
            token in "[A-Za-z0-9._-]{1,64}",
            before in prop::collection::vec("[a-z]{1,8}=[a-z0-9]{0,8}", 0..4),
            after in prop::collection::vec("[a-z]{1,8}=[a-z0-9]{0,8}", 0..4),
        ) {
            let mut parts: Vec<String> = before.into_iter().filter(|c| !c.starts_with("access_token=")).collect();
            parts.push(format!("access_token={}", token));
            parts.extend(after.into_iter().filter(|c| !c.starts_with("access_token=")));
            let mut h = HeaderMap::new();
            h.insert(header::COOKIE, HeaderValue::from_str(&parts.join("; ")).unwrap());
            prop_assert_eq!(extract_access_token(&h), Some(token));
        }
    }
}
