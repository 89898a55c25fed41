//! Authentication service
//!
//! Account lifecycle and token handling:
//! - Registration (the first account becomes admin) with email OTP verification
//! - Login with per-email and per-IP throttling
//! - Refresh token rotation with reuse detection
//! - Password reset, password change and email change
//! - User administration for admins
//!
//! OTPs are delivered through `EmailService`. A delivery failure is logged and
//! never surfaced to the caller, so the request outcome does not depend on SMTP
//! and does not reveal whether an account exists.

use crate::config::AuthConfig;
use crate::db::repositories::{RefreshTokenRepository, UserRepository};
use crate::models::{ListParams, OtpPurpose, PagedResult, RefreshToken, User, UserRole};
use crate::services::email::EmailService;
use crate::services::otp::{generate_otp, otp_matches, sha256_hex};
use crate::services::password::{check_password_policy, hash_password, verify_password};
use crate::services::rate_limiter::AuthRateLimiter;
use crate::services::token::TokenService;
use anyhow::Context;
use chrono::{Duration, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use std::sync::Arc;

const MAX_NAME_LEN: usize = 100;
const MAX_EMAIL_LEN: usize = 254;

static EMAIL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[^\s@]+@[^\s@.]+(\.[^\s@.]+)+$").expect("email regex is valid")
});

/// Error types for auth service operations
#[derive(Debug, thiserror::Error)]
pub enum AuthServiceError {
    /// One message per invalid field
    #[error("Validation error: {}", .0.join(", "))]
    Validation(Vec<String>),

    #[error("Conflict: {0}")]
    Conflict(String),

    /// Bad credentials or an unusable token
    #[error("Authentication failed: {0}")]
    Authentication(String),

    #[error("Email address has not been verified")]
    EmailNotVerified,

    #[error("Invalid or expired code")]
    InvalidOtp,

    #[error("Too many attempts, try again later")]
    RateLimited,

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("{0} not found")]
    NotFound(String),

    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

type AuthResult<T> = Result<T, AuthServiceError>;

/// Token pair returned by login, verification and refresh
#[derive(Debug, Clone, Serialize)]
pub struct AuthTokens {
    pub user: User,
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: &'static str,
    /// Access token lifetime in seconds
    pub expires_in: i64,
    #[serde(skip)]
    pub refresh_expires_in: i64,
}

/// Lowercased, trimmed email
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

pub fn is_valid_email(email: &str) -> bool {
    email.len() <= MAX_EMAIL_LEN && EMAIL_RE.is_match(email)
}

pub struct AuthService {
    users: Arc<dyn UserRepository>,
    refresh_tokens: Arc<dyn RefreshTokenRepository>,
    tokens: TokenService,
    email: EmailService,
    limiter: AuthRateLimiter,
    otp_ttl: Duration,
}

impl AuthService {
    pub fn new(
        users: Arc<dyn UserRepository>,
        refresh_tokens: Arc<dyn RefreshTokenRepository>,
        config: &AuthConfig,
        email: EmailService,
    ) -> Self {
        Self {
            users,
            refresh_tokens,
            tokens: TokenService::new(config),
            email,
            limiter: AuthRateLimiter::new(),
            otp_ttl: Duration::minutes(config.otp_ttl_minutes),
        }
    }

    pub fn tokens(&self) -> &TokenService {
        &self.tokens
    }

    /// Register a new, unverified account and mail its verification code.
    ///
    /// The very first account is created as admin.
    ///
    /// # Errors
    ///
    /// - `Validation` for a blank name, a malformed email or a short password
    /// - `Conflict` if the email is already registered
    pub async fn register(&self, name: &str, email: &str, password: &str) -> AuthResult<User> {
        let email = normalize_email(email);
        let mut errors = Vec::new();
        validate_name(name, &mut errors);
        if !is_valid_email(&email) {
            errors.push("email must be a valid email address".to_string());
        }
        errors.extend(check_password_policy(password));
        if !errors.is_empty() {
            return Err(AuthServiceError::Validation(errors));
        }

        if self
            .users
            .get_by_email(&email)
            .await
            .context("Failed to check email")?
            .is_some()
        {
            return Err(AuthServiceError::Conflict(
                "Email is already registered".to_string(),
            ));
        }

        let maybe_first = self.users.count().await.context("Failed to count users")? == 0;

        let password_hash = hash_password(password).context("Failed to hash password")?;
        let user = User::new(name.trim().to_string(), email, password_hash, UserRole::Member);
        let mut user = self.users.create(&user).await.context("Failed to create user")?;

        // Decided after the insert: of several concurrent first sign-ups only
        // the lowest id is promoted
        if maybe_first
            && self
                .users
                .first_user_id()
                .await
                .context("Failed to find first user")?
                == Some(user.id)
        {
            user.role = UserRole::Admin;
            user = self.users.update(&user).await.context("Failed to promote first user")?;
        }
        tracing::info!(user_id = user.id, role = %user.role, "User registered");

        self.limiter.try_send_otp(&user.email).await;
        let code = self.set_account_otp(&mut user, OtpPurpose::VerifyEmail).await?;
        self.deliver(self.email.send_verification_code(&user.email, &code).await, &user.email);

        Ok(user)
    }

    /// Re-send the verification code. Unknown and already verified addresses
    /// succeed without sending anything.
    pub async fn resend_verification(&self, email: &str) -> AuthResult<()> {
        let email = normalize_email(email);
        if !self.limiter.try_send_otp(&email).await {
            return Err(AuthServiceError::RateLimited);
        }

        let Some(mut user) = self.users.get_by_email(&email).await.context("Failed to get user")? else {
            tracing::debug!("Verification resend for unknown address");
            return Ok(());
        };
        if user.is_verified {
            return Ok(());
        }

        let code = self.set_account_otp(&mut user, OtpPurpose::VerifyEmail).await?;
        self.deliver(self.email.send_verification_code(&user.email, &code).await, &user.email);
        Ok(())
    }

    /// Consume the verification code and sign the user in
    pub async fn verify_email(&self, email: &str, otp: &str) -> AuthResult<AuthTokens> {
        let email = normalize_email(email);
        let mut user = self
            .take_account_otp(&email, otp, OtpPurpose::VerifyEmail)
            .await?;

        user.is_verified = true;
        let user = self.users.update(&user).await.context("Failed to verify user")?;
        tracing::info!(user_id = user.id, "Email verified");

        self.issue_tokens(user).await
    }

    /// Validate credentials and issue a token pair.
    ///
    /// # Errors
    ///
    /// - `RateLimited` when the IP or the email is over its allowance
    /// - `Authentication` for an unknown email or a wrong password
    /// - `EmailNotVerified` for correct credentials on an unverified account
    pub async fn login(&self, email: &str, password: &str, ip: Option<&str>) -> AuthResult<AuthTokens> {
        let email = normalize_email(email);

        if let Some(ip) = ip {
            if !self.limiter.check_ip(ip).await {
                tracing::warn!(ip = %ip, "Login rate limit exceeded for IP");
                return Err(AuthServiceError::RateLimited);
            }
        }
        if self.limiter.is_email_limited(&email).await {
            tracing::warn!("Login rate limit exceeded for email");
            return Err(AuthServiceError::RateLimited);
        }

        let user = self.users.get_by_email(&email).await.context("Failed to get user")?;
        let verified = match user {
            Some(ref user) => {
                verify_password(password, &user.password_hash).context("Failed to verify password")?
            }
            None => false,
        };

        let user = match user {
            Some(user) if verified => user,
            _ => {
                self.limiter.record_failed_attempt(&email).await;
                tracing::info!("Failed login attempt");
                return Err(AuthServiceError::Authentication(
                    "Invalid email or password".to_string(),
                ));
            }
        };

        if !user.is_verified {
            return Err(AuthServiceError::EmailNotVerified);
        }

        self.limiter.clear_email_attempts(&email).await;
        tracing::info!(user_id = user.id, "User logged in");
        self.issue_tokens(user).await
    }

    /// Rotate a refresh token.
    ///
    /// Presenting a token that was already revoked revokes every token of
    /// its owner.
    pub async fn refresh(&self, refresh_token: &str) -> AuthResult<AuthTokens> {
        let invalid = || AuthServiceError::Authentication("Invalid refresh token".to_string());

        let stored = self
            .refresh_tokens
            .get_by_hash(&sha256_hex(refresh_token))
            .await
            .context("Failed to look up refresh token")?
            .ok_or_else(invalid)?;

        if stored.is_revoked() {
            let revoked = self
                .refresh_tokens
                .revoke_all_for_user(stored.user_id)
                .await
                .context("Failed to revoke tokens")?;
            tracing::warn!(
                user_id = stored.user_id,
                revoked,
                "Refresh token reuse detected, all sessions revoked"
            );
            return Err(invalid());
        }
        if stored.is_expired() {
            return Err(invalid());
        }

        // A concurrent refresh may have won the race
        if !self
            .refresh_tokens
            .revoke(stored.id)
            .await
            .context("Failed to revoke refresh token")?
        {
            return Err(invalid());
        }

        let user = self
            .users
            .get_by_id(stored.user_id)
            .await
            .context("Failed to get user")?
            .ok_or_else(invalid)?;

        self.issue_tokens(user).await
    }

    /// Revoke one refresh token. Unknown or already revoked tokens are ignored.
    pub async fn logout(&self, refresh_token: &str) -> AuthResult<()> {
        if let Some(stored) = self
            .refresh_tokens
            .get_by_hash(&sha256_hex(refresh_token))
            .await
            .context("Failed to look up refresh token")?
        {
            self.refresh_tokens
                .revoke(stored.id)
                .await
                .context("Failed to revoke refresh token")?;
            tracing::info!(user_id = stored.user_id, "User logged out");
        }
        Ok(())
    }

    pub async fn logout_all(&self, user_id: i64) -> AuthResult<u64> {
        let revoked = self
            .refresh_tokens
            .revoke_all_for_user(user_id)
            .await
            .context("Failed to revoke tokens")?;
        tracing::info!(user_id, revoked, "All sessions revoked");
        Ok(revoked)
    }

    /// Mail a reset code if the account exists. Always succeeds unless throttled.
    pub async fn forgot_password(&self, email: &str) -> AuthResult<()> {
        let email = normalize_email(email);
        if !self.limiter.try_send_otp(&email).await {
            return Err(AuthServiceError::RateLimited);
        }

        if let Some(mut user) = self.users.get_by_email(&email).await.context("Failed to get user")? {
            let code = self.set_account_otp(&mut user, OtpPurpose::ResetPassword).await?;
            self.deliver(
                self.email.send_password_reset_code(&user.email, &code).await,
                &user.email,
            );
        }
        Ok(())
    }

    /// Set a new password with a reset code. Every session is revoked.
    pub async fn reset_password(&self, email: &str, otp: &str, new_password: &str) -> AuthResult<()> {
        if let Some(message) = check_password_policy(new_password) {
            return Err(AuthServiceError::Validation(vec![message]));
        }

        let email = normalize_email(email);
        let mut user = self
            .take_account_otp(&email, otp, OtpPurpose::ResetPassword)
            .await?;

        user.password_hash = hash_password(new_password).context("Failed to hash password")?;
        // The code arrived by email, which proves ownership of the address
        user.is_verified = true;
        let user = self.users.update(&user).await.context("Failed to reset password")?;

        self.refresh_tokens
            .revoke_all_for_user(user.id)
            .await
            .context("Failed to revoke tokens")?;
        tracing::info!(user_id = user.id, "Password reset");
        Ok(())
    }

    /// Change the password of a signed-in user.
    ///
    /// Other sessions are revoked and a fresh token pair is returned.
    pub async fn change_password(
        &self,
        user: &User,
        current_password: &str,
        new_password: &str,
    ) -> AuthResult<AuthTokens> {
        if let Some(message) = check_password_policy(new_password) {
            return Err(AuthServiceError::Validation(vec![message]));
        }

        let mut user = self.reload(user.id).await?;
        if !verify_password(current_password, &user.password_hash).context("Failed to verify password")? {
            return Err(AuthServiceError::Validation(vec![
                "current password is incorrect".to_string(),
            ]));
        }

        user.password_hash = hash_password(new_password).context("Failed to hash password")?;
        let user = self.users.update(&user).await.context("Failed to change password")?;
        self.refresh_tokens
            .revoke_all_for_user(user.id)
            .await
            .context("Failed to revoke tokens")?;
        tracing::info!(user_id = user.id, "Password changed");

        self.issue_tokens(user).await
    }

    /// Start an email change: store the pending address and mail a code to it
    pub async fn request_email_change(&self, user: &User, new_email: &str, password: &str) -> AuthResult<()> {
        let new_email = normalize_email(new_email);
        if !is_valid_email(&new_email) {
            return Err(AuthServiceError::Validation(vec![
                "email must be a valid email address".to_string(),
            ]));
        }

        let mut user = self.reload(user.id).await?;
        if !verify_password(password, &user.password_hash).context("Failed to verify password")? {
            return Err(AuthServiceError::Validation(vec!["password is incorrect".to_string()]));
        }
        if new_email == user.email {
            return Err(AuthServiceError::Validation(vec![
                "new email must differ from the current one".to_string(),
            ]));
        }
        self.ensure_email_free(&new_email).await?;

        // Only one account at a time may hold a live claim on an address
        if let Some(other) = self
            .users
            .get_by_pending_email(&new_email)
            .await
            .context("Failed to check pending email")?
        {
            let live = other.pending_email_otp_expires_at.is_some_and(|t| t > Utc::now());
            if other.id != user.id && live {
                return Err(AuthServiceError::Conflict(
                    "Another account is already changing to this email".to_string(),
                ));
            }
        }

        if !self.limiter.try_send_otp(&new_email).await {
            return Err(AuthServiceError::RateLimited);
        }

        let code = generate_otp();
        user.pending_email = Some(new_email.clone());
        user.pending_email_otp_hash = Some(sha256_hex(&code));
        user.pending_email_otp_expires_at = Some(Utc::now() + self.otp_ttl);
        self.users.update(&user).await.context("Failed to store pending email")?;
        tracing::info!(user_id = user.id, "Email change requested");

        self.deliver(self.email.send_email_change_code(&new_email, &code).await, &new_email);
        Ok(())
    }

    /// Apply the pending email change
    pub async fn confirm_email_change(&self, user: &User, otp: &str) -> AuthResult<User> {
        let mut user = self.reload(user.id).await?;
        let Some(new_email) = user.pending_email.clone() else {
            return Err(AuthServiceError::InvalidOtp);
        };

        if self.limiter.is_email_limited(&new_email).await {
            return Err(AuthServiceError::RateLimited);
        }
        if !otp_matches(
            otp,
            user.pending_email_otp_hash.as_deref(),
            user.pending_email_otp_expires_at,
        ) {
            self.limiter.record_failed_attempt(&new_email).await;
            return Err(AuthServiceError::InvalidOtp);
        }

        self.ensure_email_free(&new_email).await?;

        user.email = new_email;
        user.is_verified = true;
        user.clear_pending_email();
        let user = self.users.update(&user).await.context("Failed to change email")?;
        tracing::info!(user_id = user.id, "Email changed");
        Ok(user)
    }

    /// Resolve an access token to its user. Invalid or expired tokens yield `None`.
    pub async fn authenticate(&self, access_token: &str) -> AuthResult<Option<User>> {
        let Some(user_id) = self
            .tokens
            .decode_access_token(access_token)
            .and_then(|claims| claims.user_id())
        else {
            return Ok(None);
        };

        Ok(self.users.get_by_id(user_id).await.context("Failed to get user")?)
    }

    pub async fn update_profile(&self, user: &User, name: &str) -> AuthResult<User> {
        let mut errors = Vec::new();
        validate_name(name, &mut errors);
        if !errors.is_empty() {
            return Err(AuthServiceError::Validation(errors));
        }

        let mut user = self.reload(user.id).await?;
        user.name = name.trim().to_string();
        Ok(self.users.update(&user).await.context("Failed to update profile")?)
    }

    /// Periodic maintenance: drop expired refresh tokens and stale limiter entries
    pub async fn cleanup_expired_tokens(&self) -> AuthResult<u64> {
        let removed = self
            .refresh_tokens
            .delete_expired()
            .await
            .context("Failed to delete expired refresh tokens")?;
        self.limiter.cleanup().await;
        if removed > 0 {
            tracing::info!(removed, "Expired refresh tokens removed");
        }
        Ok(removed)
    }

    pub async fn list_users(&self, params: &ListParams) -> AuthResult<PagedResult<User>> {
        let (users, total) = self
            .users
            .list(params.page as i64, params.per_page as i64)
            .await
            .context("Failed to list users")?;
        Ok(PagedResult::new(users, total, params))
    }

    /// Change another user's role. Admins cannot change their own role.
    pub async fn set_role(&self, actor: &User, user_id: i64, role: UserRole) -> AuthResult<User> {
        if actor.id == user_id {
            return Err(AuthServiceError::Forbidden(
                "You cannot change your own role".to_string(),
            ));
        }
        let mut user = self
            .users
            .get_by_id(user_id)
            .await
            .context("Failed to get user")?
            .ok_or_else(|| AuthServiceError::NotFound("User".to_string()))?;

        user.role = role;
        let user = self.users.update(&user).await.context("Failed to update role")?;
        tracing::info!(actor = actor.id, user_id, role = %role, "User role changed");
        Ok(user)
    }

    pub async fn delete_user(&self, actor: &User, user_id: i64) -> AuthResult<()> {
        if actor.id == user_id {
            return Err(AuthServiceError::Forbidden(
                "You cannot delete your own account".to_string(),
            ));
        }
        if self.users.get_by_id(user_id).await.context("Failed to get user")?.is_none() {
            return Err(AuthServiceError::NotFound("User".to_string()));
        }

        self.users.delete(user_id).await.context("Failed to delete user")?;
        tracing::info!(actor = actor.id, user_id, "User deleted");
        Ok(())
    }

    async fn reload(&self, user_id: i64) -> AuthResult<User> {
        self.users
            .get_by_id(user_id)
            .await
            .context("Failed to get user")?
            .ok_or_else(|| AuthServiceError::Authentication("Account no longer exists".to_string()))
    }

    async fn ensure_email_free(&self, email: &str) -> AuthResult<()> {
        if self
            .users
            .get_by_email(email)
            .await
            .context("Failed to check email")?
            .is_some()
        {
            return Err(AuthServiceError::Conflict(
                "Email is already registered".to_string(),
            ));
        }
        Ok(())
    }

    async fn issue_tokens(&self, user: User) -> AuthResult<AuthTokens> {
        let access = self.tokens.issue_access_token(&user)?;
        let refresh = self.tokens.issue_refresh_token();
        self.refresh_tokens
            .create(&RefreshToken::new(user.id, refresh.token_hash, refresh.expires_at))
            .await
            .context("Failed to store refresh token")?;

        Ok(AuthTokens {
            user,
            access_token: access.token,
            refresh_token: refresh.token,
            token_type: "Bearer",
            expires_in: access.expires_in,
            refresh_expires_in: self.tokens.refresh_ttl().num_seconds(),
        })
    }

    /// Store a fresh account OTP and return the clear code for delivery
    async fn set_account_otp(&self, user: &mut User, purpose: OtpPurpose) -> AuthResult<String> {
        let code = generate_otp();
        user.otp_hash = Some(sha256_hex(&code));
        user.otp_purpose = Some(purpose);
        user.otp_expires_at = Some(Utc::now() + self.otp_ttl);
        *user = self.users.update(user).await.context("Failed to store OTP")?;
        Ok(code)
    }

    /// Check and clear an account OTP. Failures count toward the email's
    /// attempt limit so codes cannot be brute forced.
    async fn take_account_otp(&self, email: &str, otp: &str, purpose: OtpPurpose) -> AuthResult<User> {
        if self.limiter.is_email_limited(email).await {
            return Err(AuthServiceError::RateLimited);
        }

        let user = self.users.get_by_email(email).await.context("Failed to get user")?;
        let matched = user.filter(|u| {
            u.otp_purpose == Some(purpose) && otp_matches(otp, u.otp_hash.as_deref(), u.otp_expires_at)
        });

        match matched {
            Some(mut user) => {
                user.clear_otp();
                Ok(user)
            }
            None => {
                self.limiter.record_failed_attempt(email).await;
                Err(AuthServiceError::InvalidOtp)
            }
        }
    }

    fn deliver(&self, result: anyhow::Result<()>, to: &str) {
        if let Err(e) = result {
            tracing::error!(to = %to, "Failed to deliver email: {:#}", e);
        }
    }
}

fn validate_name(name: &str, errors: &mut Vec<String>) {
    let name = name.trim();
    if name.is_empty() {
        errors.push("name is required".to_string());
    } else if name.chars().count() > MAX_NAME_LEN {
        errors.push(format!("name must be at most {} characters", MAX_NAME_LEN));
    }
}
