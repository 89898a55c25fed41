//! Outgoing email
//!
//! `EmailService` renders the account emails and hands them to a `Mailer`.
//! `SmtpMailer` delivers over SMTP with lettre; `LogMailer` writes the message
//! to the log when SMTP is disabled.

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use lettre::{
    message::{header::ContentType, Mailbox},
    transport::smtp::authentication::Credentials,
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};
use std::sync::Arc;

use crate::config::{SiteConfig, SmtpConfig};

/// Delivery backend for plain-text email
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, to: &str, subject: &str, body: &str) -> Result<()>;
}

/// SMTP delivery
pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl SmtpMailer {
    pub fn new(config: &SmtpConfig) -> Result<Self> {
        let from = format!("{} <{}>", config.from_name, config.from)
            .parse::<Mailbox>()
            .map_err(|e| anyhow!("Invalid from address: {}", e))?;

        let mut builder = AsyncSmtpTransport::<Tokio1Executor>::relay(&config.host)
            .map_err(|e| anyhow!("Failed to create SMTP transport: {}", e))?
            .port(config.port);
        if !config.username.is_empty() {
            builder = builder.credentials(Credentials::new(
                config.username.clone(),
                config.password.clone(),
            ));
        }

        Ok(Self {
            transport: builder.build(),
            from,
        })
    }
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send(&self, to: &str, subject: &str, body: &str) -> Result<()> {
        let email = Message::builder()
            .from(self.from.clone())
            .to(to.parse().map_err(|e| anyhow!("Invalid to address: {}", e))?)
            .subject(subject)
            .header(ContentType::TEXT_PLAIN)
            .body(body.to_string())
            .map_err(|e| anyhow!("Failed to build email: {}", e))?;

        self.transport
            .send(email)
            .await
            .map_err(|e| anyhow!("Failed to send email: {}", e))?;

        tracing::info!(to = %to, subject = %subject, "Email sent");
        Ok(())
    }
}

/// Development fallback: logs the message instead of delivering it
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, to: &str, subject: &str, body: &str) -> Result<()> {
        tracing::info!(to = %to, subject = %subject, "SMTP disabled, email not delivered:\n{}", body);
        Ok(())
    }
}

/// Pick SMTP or the log fallback from configuration
pub fn mailer_from_config(config: &SmtpConfig) -> Result<Arc<dyn Mailer>> {
    if config.enabled {
        tracing::info!("Email delivery via SMTP relay {}:{}", config.host, config.port);
        Ok(Arc::new(SmtpMailer::new(config)?))
    } else {
        tracing::warn!("SMTP is disabled; outgoing email will be written to the log");
        Ok(Arc::new(LogMailer))
    }
}

/// Account emails
pub struct EmailService {
    mailer: Arc<dyn Mailer>,
    site_name: String,
    otp_ttl_minutes: i64,
}

impl EmailService {
    pub fn new(mailer: Arc<dyn Mailer>, site: &SiteConfig, otp_ttl_minutes: i64) -> Self {
        Self {
            mailer,
            site_name: site.name.clone(),
            otp_ttl_minutes,
        }
    }

    pub async fn send_verification_code(&self, to: &str, code: &str) -> Result<()> {
        let subject = format!("[{}] Verify your email address", self.site_name);
        self.mailer
            .send(to, &subject, &self.code_body("confirm your email address", code))
            .await
    }

    pub async fn send_password_reset_code(&self, to: &str, code: &str) -> Result<()> {
        let subject = format!("[{}] Password reset code", self.site_name);
        self.mailer
            .send(to, &subject, &self.code_body("reset your password", code))
            .await
    }

    pub async fn send_email_change_code(&self, to: &str, code: &str) -> Result<()> {
        let subject = format!("[{}] Confirm your new email address", self.site_name);
        self.mailer
            .send(to, &subject, &self.code_body("confirm this new email address", code))
            .await
    }

    fn code_body(&self, action: &str, code: &str) -> String {
        format!(
            "Hello,\n\nUse the code below to {}:\n\n    {}\n\nThe code expires in {} minutes. \
             If you did not request it, you can ignore this message.\n\nThe {} team",
            action, code, self.otp_ttl_minutes, self.site_name
        )
    }
}

/// Test double that keeps every message in memory
#[cfg(test)]
#[derive(Default)]
pub struct RecordingMailer {
    sent: std::sync::Mutex<Vec<SentEmail>>,
}

#[cfg(test)]
#[derive(Debug, Clone)]
pub struct SentEmail {
    pub to: String,
    pub subject: String,
    pub body: String,
}

#[cfg(test)]
impl RecordingMailer {
    pub fn sent(&self) -> Vec<SentEmail> {
        self.sent.lock().unwrap().clone()
    }

    /// The six-digit code from the most recent message to `to`
    pub fn last_code_for(&self, to: &str) -> Option<String> {
        self.sent()
            .iter()
            .rev()
            .find(|m| m.to == to)
            .and_then(|m| {
                m.body
                    .split_whitespace()
                    .find(|w| w.len() == 6 && w.bytes().all(|b| b.is_ascii_digit()))
                    .map(str::to_string)
            })
    }
}

#[cfg(test)]
#[async_trait]
impl Mailer for RecordingMailer {
    async fn send(&self, to: &str, subject: &str, body: &str) -> Result<()> {
        self.sent.lock().unwrap().push(SentEmail {
            to: to.to_string(),
            subject: subject.to_string(),
            body: body.to_string(),
        });
        Ok(())
    }
}
