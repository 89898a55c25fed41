//! Authentication API endpoints
//!
//! Public:
//! - POST /api/v1/auth/register
//! - POST /api/v1/auth/verify-email
//! - POST /api/v1/auth/resend-verification
//! - POST /api/v1/auth/login
//! - POST /api/v1/auth/refresh
//! - POST /api/v1/auth/logout
//! - POST /api/v1/auth/forgot-password
//! - POST /api/v1/auth/reset-password
//!
//! Authenticated:
//! - GET /api/v1/auth/me
//! - PUT /api/v1/auth/profile
//! - PUT /api/v1/auth/password
//! - POST /api/v1/auth/change-email
//! - POST /api/v1/auth/confirm-email-change
//! - POST /api/v1/auth/logout-all
//!
//! Token responses also set the `access_token` and `refresh_token` cookies.

use axum::{
    body::Bytes,
    extract::State,
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::IntoResponse,
    routing::{get, post, put},
    Json, Router,
};
use serde::{Deserialize, Serialize};

use crate::api::middleware::{
    cookie_value, ApiError, AppJson, AppState, AuthenticatedUser, ClientIp, ACCESS_COOKIE,
    REFRESH_COOKIE, REFRESH_COOKIE_PATH,
};
use crate::models::User;
use crate::services::AuthTokens;

/// Request body for registration
#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub name: String,
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct EmailRequest {
    pub email: String,
}

#[derive(Debug, Deserialize)]
pub struct VerifyEmailRequest {
    pub email: String,
    pub otp: String,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// Body of refresh and logout; the cookie is used when absent
#[derive(Debug, Default, Deserialize)]
pub struct RefreshRequest {
    #[serde(default)]
    pub refresh_token: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ResetPasswordRequest {
    pub email: String,
    pub otp: String,
    pub new_password: String,
}

#[derive(Debug, Deserialize)]
pub struct UpdateProfileRequest {
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub struct ChangePasswordRequest {
    pub current_password: String,
    pub new_password: String,
}

#[derive(Debug, Deserialize)]
pub struct ChangeEmailRequest {
    pub new_email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct ConfirmEmailChangeRequest {
    pub otp: String,
}

/// Public view of an account
#[derive(Debug, Serialize, Deserialize)]
pub struct UserResponse {
    pub id: i64,
    pub name: String,
    pub email: String,
    pub role: String,
    pub is_verified: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pending_email: Option<String>,
    pub created_at: String,
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            name: user.name,
            email: user.email,
            role: user.role.to_string(),
            is_verified: user.is_verified,
            pending_email: user.pending_email,
            created_at: user.created_at.to_rfc3339(),
        }
    }
}

/// Response for successful authentication
#[derive(Debug, Serialize)]
pub struct TokenResponse {
    pub user: UserResponse,
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: &'static str,
    pub expires_in: i64,
}

#[derive(Debug, Serialize)]
pub struct RegisterResponse {
    pub user: UserResponse,
    pub message: &'static str,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: &'static str,
}

#[derive(Debug, Serialize)]
pub struct LogoutAllResponse {
    pub revoked: u64,
}

/// Build public auth routes (no auth required)
pub fn public_router() -> Router<AppState> {
    Router::new()
        .route("/register", post(register))
        .route("/verify-email", post(verify_email))
        .route("/resend-verification", post(resend_verification))
        .route("/login", post(login))
        .route("/refresh", post(refresh))
        .route("/logout", post(logout))
        .route("/forgot-password", post(forgot_password))
        .route("/reset-password", post(reset_password))
}

/// Build protected auth routes (requires auth middleware)
pub fn protected_router() -> Router<AppState> {
    Router::new()
        .route("/me", get(me))
        .route("/profile", put(update_profile))
        .route("/password", put(change_password))
        .route("/change-email", post(change_email))
        .route("/confirm-email-change", post(confirm_email_change))
        .route("/logout-all", post(logout_all))
}

fn cookie(state: &AppState, name: &str, value: &str, path: &str, same_site: &str, max_age: i64) -> String {
    let mut cookie = format!(
        "{}={}; Path={}; HttpOnly; SameSite={}; Max-Age={}",
        name, value, path, same_site, max_age
    );
    if state.cookie_secure {
        cookie.push_str("; Secure");
    }
    cookie
}

fn append_cookie(headers: &mut HeaderMap, cookie: String) -> Result<(), ApiError> {
    let value = HeaderValue::from_str(&cookie).map_err(ApiError::internal)?;
    headers.append(header::SET_COOKIE, value);
    Ok(())
}

fn token_cookies(state: &AppState, tokens: &AuthTokens) -> Result<HeaderMap, ApiError> {
    let mut headers = HeaderMap::new();
    append_cookie(
        &mut headers,
        cookie(state, ACCESS_COOKIE, &tokens.access_token, "/", "Lax", tokens.expires_in),
    )?;
    append_cookie(
        &mut headers,
        cookie(
            state,
            REFRESH_COOKIE,
            &tokens.refresh_token,
            REFRESH_COOKIE_PATH,
            "Strict",
            tokens.refresh_expires_in,
        ),
    )?;
    Ok(headers)
}

fn cleared_cookies(state: &AppState) -> Result<HeaderMap, ApiError> {
    let mut headers = HeaderMap::new();
    append_cookie(&mut headers, cookie(state, ACCESS_COOKIE, "", "/", "Lax", 0))?;
    append_cookie(
        &mut headers,
        cookie(state, REFRESH_COOKIE, "", REFRESH_COOKIE_PATH, "Strict", 0),
    )?;
    Ok(headers)
}

fn token_response(state: &AppState, tokens: AuthTokens) -> Result<impl IntoResponse, ApiError> {
    let headers = token_cookies(state, &tokens)?;
    Ok((
        headers,
        Json(TokenResponse {
            user: tokens.user.into(),
            access_token: tokens.access_token,
            refresh_token: tokens.refresh_token,
            token_type: tokens.token_type,
            expires_in: tokens.expires_in,
        }),
    ))
}

/// Refresh token from a JSON body, falling back to the cookie.
///
/// An empty body is allowed so browsers can rely on the cookie alone.
fn presented_refresh_token(headers: &HeaderMap, body: &Bytes) -> Result<Option<String>, ApiError> {
    if !body.iter().all(u8::is_ascii_whitespace) {
        let request: RefreshRequest = serde_json::from_slice(body)
            .map_err(|e| ApiError::bad_request(format!("Invalid JSON body: {}", e)))?;
        if let Some(token) = request.refresh_token.filter(|t| !t.trim().is_empty()) {
            return Ok(Some(token));
        }
    }
    Ok(cookie_value(headers, REFRESH_COOKIE))
}

/// POST /api/v1/auth/register
async fn register(
    State(state): State<AppState>,
    AppJson(body): AppJson<RegisterRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let user = state
        .auth
        .register(&body.name, &body.email, &body.password)
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(RegisterResponse {
            user: user.into(),
            message: "Registration successful. Check your email for the verification code.",
        }),
    ))
}

/// POST /api/v1/auth/verify-email
async fn verify_email(
    State(state): State<AppState>,
    AppJson(body): AppJson<VerifyEmailRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let tokens = state.auth.verify_email(&body.email, &body.otp).await?;
    token_response(&state, tokens)
}

/// POST /api/v1/auth/resend-verification
async fn resend_verification(
    State(state): State<AppState>,
    AppJson(body): AppJson<EmailRequest>,
) -> Result<Json<MessageResponse>, ApiError> {
    state.auth.resend_verification(&body.email).await?;
    Ok(Json(MessageResponse {
        message: "If the account exists and is unverified, a new code has been sent.",
    }))
}

/// POST /api/v1/auth/login
async fn login(
    State(state): State<AppState>,
    ClientIp(ip): ClientIp,
    AppJson(body): AppJson<LoginRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let tokens = state
        .auth
        .login(&body.email, &body.password, ip.as_deref())
        .await?;
    token_response(&state, tokens)
}

/// POST /api/v1/auth/refresh
async fn refresh(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<impl IntoResponse, ApiError> {
    let token = presented_refresh_token(&headers, &body)?
        .ok_or_else(|| ApiError::unauthorized("Missing refresh token"))?;
    let tokens = state.auth.refresh(&token).await?;
    token_response(&state, tokens)
}

/// POST /api/v1/auth/logout
///
/// Idempotent: an unknown or missing token still clears the cookies.
async fn logout(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<impl IntoResponse, ApiError> {
    if let Some(token) = presented_refresh_token(&headers, &body)? {
        state.auth.logout(&token).await?;
    }
    Ok((StatusCode::NO_CONTENT, cleared_cookies(&state)?))
}

/// POST /api/v1/auth/forgot-password
async fn forgot_password(
    State(state): State<AppState>,
    AppJson(body): AppJson<EmailRequest>,
) -> Result<Json<MessageResponse>, ApiError> {
    state.auth.forgot_password(&body.email).await?;
    Ok(Json(MessageResponse {
        message: "If the account exists, a reset code has been sent.",
    }))
}

/// POST /api/v1/auth/reset-password
async fn reset_password(
    State(state): State<AppState>,
    AppJson(body): AppJson<ResetPasswordRequest>,
) -> Result<Json<MessageResponse>, ApiError> {
    state
        .auth
        .reset_password(&body.email, &body.otp, &body.new_password)
        .await?;
    Ok(Json(MessageResponse {
        message: "Password has been reset. Please sign in again.",
    }))
}

/// GET /api/v1/auth/me
async fn me(AuthenticatedUser(user): AuthenticatedUser) -> Json<UserResponse> {
    Json(user.into())
}

/// PUT /api/v1/auth/profile
async fn update_profile(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    AppJson(body): AppJson<UpdateProfileRequest>,
) -> Result<Json<UserResponse>, ApiError> {
    let updated = state.auth.update_profile(&user, &body.name).await?;
    Ok(Json(updated.into()))
}

/// PUT /api/v1/auth/password
async fn change_password(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    AppJson(body): AppJson<ChangePasswordRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let tokens = state
        .auth
        .change_password(&user, &body.current_password, &body.new_password)
        .await?;
    token_response(&state, tokens)
}

/// POST /api/v1/auth/change-email
async fn change_email(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    AppJson(body): AppJson<ChangeEmailRequest>,
) -> Result<Json<MessageResponse>, ApiError> {
    state
        .auth
        .request_email_change(&user, &body.new_email, &body.password)
        .await?;
    Ok(Json(MessageResponse {
        message: "A confirmation code has been sent to the new address.",
    }))
}

/// POST /api/v1/auth/confirm-email-change
async fn confirm_email_change(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    AppJson(body): AppJson<ConfirmEmailChangeRequest>,
) -> Result<Json<UserResponse>, ApiError> {
    let updated = state.auth.confirm_email_change(&user, &body.otp).await?;
    Ok(Json(updated.into()))
}

/// POST /api/v1/auth/logout-all
async fn logout_all(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
) -> Result<impl IntoResponse, ApiError> {
    let revoked = state.auth.logout_all(user.id).await?;
    Ok((cleared_cookies(&state)?, Json(LogoutAllResponse { revoked })))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_presented_refresh_token_prefers_body() {
        let mut headers = HeaderMap::new();
        headers.insert(header::COOKIE, HeaderValue::from_static("refresh_token=from-cookie"));

        let body = Bytes::from_static(br#"{"refresh_token":"from-body"}"#);
        assert_eq!(
            presented_refresh_token(&headers, &body).unwrap(),
            Some("from-body".to_string())
        );

        let empty = Bytes::new();
        assert_eq!(
            presented_refresh_token(&headers, &empty).unwrap(),
            Some("from-cookie".to_string())
        );

        let no_field = Bytes::from_static(b"{}");
        assert_eq!(
            presented_refresh_token(&headers, &no_field).unwrap(),
            Some("from-cookie".to_string())
        );
    }

    #[test]
    fn test_presented_refresh_token_rejects_bad_json() {
        let body = Bytes::from_static(b"{not json");
        let err = presented_refresh_token(&HeaderMap::new(), &body).unwrap_err();
        assert_eq!(err.status, StatusCode::BAD_REQUEST);
    }
}
