//! Outbound email seam. Delivery itself is out of process; the default
//! implementation only records the message in the log.

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::{debug, info};

use super::errors::AuthError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EmailKind {
    PasswordReset { uid: String, token: String },
    EmailVerification { key: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundEmail {
    pub to: String,
    pub subject: String,
    pub body: String,
    pub kind: EmailKind,
}

impl OutboundEmail {
    pub fn password_reset(to: &str, frontend_url: &str, uid: String, token: String) -> Self {
        let link = format!("{}/password-reset/{}/{}/", frontend_url.trim_end_matches('/'), uid, token);
        Self {
            to: to.to_string(),
            subject: "Password reset".into(),
            body: format!("You requested a password reset. Follow this link to choose a new password:\n{link}\n"),
            kind: EmailKind::PasswordReset { uid, token },
        }
    }

    pub fn email_verification(to: &str, frontend_url: &str, key: String) -> Self {
        let link = format!("{}/verify-email/{}/", frontend_url.trim_end_matches('/'), key);
        Self {
            to: to.to_string(),
            subject: "Confirm your e-mail address".into(),
            body: format!("Follow this link to confirm your e-mail address:\n{link}\n"),
            kind: EmailKind::EmailVerification { key },
        }
    }
}

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, email: OutboundEmail) -> Result<(), AuthError>;
}

/// Writes messages to the tracing log instead of delivering them.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, email: OutboundEmail) -> Result<(), AuthError> {
        info!(to = %email.to, subject = %email.subject, "email_dispatched");
        debug!(body = %email.body, "email_body");
        Ok(())
    }
}

/// Keeps every message in memory so tests can read links back.
#[derive(Debug, Default)]
pub struct RecordingMailer {
    sent: Mutex<Vec<OutboundEmail>>,
}

impl RecordingMailer {
    pub async fn sent(&self) -> Vec<OutboundEmail> {
        self.sent.lock().await.clone()
    }

    pub async fn last_to(&self, to: &str) -> Option<OutboundEmail> {
        self.sent.lock().await.iter().rev().find(|m| m.to == to).cloned()
    }
}

#[async_trait]
impl Mailer for RecordingMailer {
    async fn send(&self, email: OutboundEmail) -> Result<(), AuthError> {
        self.sent.lock().await.push(email);
        Ok(())
    }
}
