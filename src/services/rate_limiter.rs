//! Sliding-window rate limiting for the auth endpoints
//!
//! - Failed logins: 5 per 15 minutes per email
//! - Login requests: 20 per minute per client IP
//! - OTP emails: 3 per 10 minutes per email

use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Counts events per key inside a trailing time window
#[derive(Clone)]
pub struct SlidingWindowLimiter {
    window: Duration,
    max_events: usize,
    events: Arc<RwLock<HashMap<String, Vec<DateTime<Utc>>>>>,
}

impl SlidingWindowLimiter {
    pub fn new(max_events: usize, window: Duration) -> Self {
        Self {
            window,
            max_events,
            events: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Whether the key has already used up its allowance
    pub async fn is_limited(&self, key: &str) -> bool {
        let mut events = self.events.write().await;
        let cutoff = Utc::now() - self.window;

        match events.get_mut(key) {
            Some(times) => {
                times.retain(|time| *time > cutoff);
                times.len() >= self.max_events
            }
            None => false,
        }
    }

    pub async fn record(&self, key: &str) {
        let mut events = self.events.write().await;
        events.entry(key.to_string()).or_default().push(Utc::now());
    }

    /// Record an event unless the key is limited. Returns false when limited.
    pub async fn try_acquire(&self, key: &str) -> bool {
        let mut events = self.events.write().await;
        let now = Utc::now();
        let cutoff = now - self.window;

        let times = events.entry(key.to_string()).or_default();
        times.retain(|time| *time > cutoff);
        if times.len() >= self.max_events {
            return false;
        }
        times.push(now);
        true
    }

    pub async fn clear(&self, key: &str) {
        self.events.write().await.remove(key);
    }

    /// Drop expired events and empty keys
    pub async fn cleanup(&self) {
        let cutoff = Utc::now() - self.window;
        let mut events = self.events.write().await;
        events.retain(|_, times| {
            times.retain(|time| *time > cutoff);
            !times.is_empty()
        });
    }

    #[cfg(test)]
    async fn tracked_keys(&self) -> usize {
        self.events.read().await.len()
    }
}

/// The limits applied by the auth endpoints
pub struct AuthRateLimiter {
    login_failures: SlidingWindowLimiter,
    login_requests: SlidingWindowLimiter,
    otp_sends: SlidingWindowLimiter,
}

impl AuthRateLimiter {
    pub fn new() -> Self {
        Self {
            login_failures: SlidingWindowLimiter::new(5, Duration::minutes(15)),
            login_requests: SlidingWindowLimiter::new(20, Duration::minutes(1)),
            otp_sends: SlidingWindowLimiter::new(3, Duration::minutes(10)),
        }
    }

    /// Check if an email has too many recent failed logins
    pub async fn is_email_limited(&self, email: &str) -> bool {
        self.login_failures.is_limited(&email.to_lowercase()).await
    }

    pub async fn record_failed_attempt(&self, email: &str) {
        self.login_failures.record(&email.to_lowercase()).await;
    }

    /// Clear failed attempts after a successful login
    pub async fn clear_email_attempts(&self, email: &str) {
        self.login_failures.clear(&email.to_lowercase()).await;
    }

    /// Count a login request from an IP. Returns false when the IP is over its limit.
    pub async fn check_ip(&self, ip: &str) -> bool {
        self.login_requests.try_acquire(ip).await
    }

    /// Count an OTP email for an address. Returns false when the address is over its limit.
    pub async fn try_send_otp(&self, email: &str) -> bool {
        self.otp_sends.try_acquire(&email.to_lowercase()).await
    }

    /// Clean up old entries (called periodically from the maintenance task)
    pub async fn cleanup(&self) {
        self.login_failures.cleanup().await;
        self.login_requests.cleanup().await;
        self.otp_sends.cleanup().await;
    }
}

impl Default for AuthRateLimiter {
    fn default() -> Self {
        Self::new()
    }
}
