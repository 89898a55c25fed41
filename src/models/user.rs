//! User model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Registered account.
///
/// One-time passcodes are never stored in clear text: `otp_hash` and
/// `pending_email_otp_hash` hold SHA-256 hex digests.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub name: String,
    /// Stored lowercase
    pub email: String,
    /// Password hash (argon2)
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub role: UserRole,
    pub is_verified: bool,
    #[serde(skip_serializing)]
    pub otp_hash: Option<String>,
    #[serde(skip_serializing)]
    pub otp_purpose: Option<OtpPurpose>,
    #[serde(skip_serializing)]
    pub otp_expires_at: Option<DateTime<Utc>>,
    /// New address awaiting confirmation
    pub pending_email: Option<String>,
    #[serde(skip_serializing)]
    pub pending_email_otp_hash: Option<String>,
    #[serde(skip_serializing)]
    pub pending_email_otp_expires_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    /// Create an unverified user.
    ///
    /// The password must already be hashed with `services::password::hash_password()`.
    pub fn new(name: String, email: String, password_hash: String, role: UserRole) -> Self {
        let now = Utc::now();
        Self {
            id: 0, // Will be set by the database
            name,
            email,
            password_hash,
            role,
            is_verified: false,
            otp_hash: None,
            otp_purpose: None,
            otp_expires_at: None,
            pending_email: None,
            pending_email_otp_hash: None,
            pending_email_otp_expires_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Check if the user is an administrator
    pub fn is_admin(&self) -> bool {
        self.role == UserRole::Admin
    }

    /// Check if the user may manage site content (editor or higher)
    pub fn is_editor(&self) -> bool {
        matches!(self.role, UserRole::Admin | UserRole::Editor)
    }

    /// Drop any outstanding account OTP
    pub fn clear_otp(&mut self) {
        self.otp_hash = None;
        self.otp_purpose = None;
        self.otp_expires_at = None;
    }

    /// Drop any outstanding email change
    pub fn clear_pending_email(&mut self) {
        self.pending_email = None;
        self.pending_email_otp_hash = None;
        self.pending_email_otp_expires_at = None;
    }
}

/// User role for authorization.
///
/// - Admin: content plus user management
/// - Editor: content management
/// - Member: own account only
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    Admin,
    Editor,
    #[default]
    Member,
}

impl fmt::Display for UserRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UserRole::Admin => write!(f, "admin"),
            UserRole::Editor => write!(f, "editor"),
            UserRole::Member => write!(f, "member"),
        }
    }
}

impl FromStr for UserRole {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "admin" => Ok(UserRole::Admin),
            "editor" => Ok(UserRole::Editor),
            "member" => Ok(UserRole::Member),
            _ => Err(anyhow::anyhow!("Invalid user role: {}", s)),
        }
    }
}

/// What an account OTP was issued for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OtpPurpose {
    VerifyEmail,
    ResetPassword,
}

impl fmt::Display for OtpPurpose {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OtpPurpose::VerifyEmail => write!(f, "verify_email"),
            OtpPurpose::ResetPassword => write!(f, "reset_password"),
        }
    }
}

impl FromStr for OtpPurpose {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "verify_email" => Ok(OtpPurpose::VerifyEmail),
            "reset_password" => Ok(OtpPurpose::ResetPassword),
            _ => Err(anyhow::anyhow!("Invalid OTP purpose: {}", s)),
        }
    }
}
