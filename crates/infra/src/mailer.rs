//! Outbound email.
//!
//! Transport is an external collaborator behind [`Mailer`]. [`LogMailer`]
//! writes every message to the log and keeps an outbox for inspection.

use std::sync::Mutex;

use async_trait::async_trait;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mail {
    pub to: String,
    pub subject: String,
    pub body: String,
}

impl Mail {
    pub fn welcome(to: &str, name: &str, url: &str) -> Self {
        Self {
            to: to.to_string(),
            subject: "Welcome to the Natours Family!".to_string(),
            body: format!("Hi {},\n\nWelcome aboard! Set up your profile at {url}", first_name(name)),
        }
    }

    pub fn password_reset(to: &str, name: &str, url: &str) -> Self {
        Self {
            to: to.to_string(),
            subject: "Your password reset token (valid for only 10 minutes)".to_string(),
            body: format!(
                "Hi {},\n\nForgot your password? Submit a PATCH request with your new password and passwordConfirm to: {url}\nIf you didn't forget your password, please ignore this email.",
                first_name(name)
            ),
        }
    }
}

fn first_name(name: &str) -> &str {
    name.split_whitespace().next().unwrap_or("User")
}

#[derive(Debug, thiserror::Error)]
pub enum MailerError {
    #[error("mail transport failed: {0}")]
    Transport(String),
}

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, mail: Mail) -> Result<(), MailerError>;
}

/// Log-only transport. Set `fail` to simulate a broken relay.
#[derive(Debug, Default)]
pub struct LogMailer {
    outbox: Mutex<Vec<Mail>>,
    fail: bool,
}

impl LogMailer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        Self {
            outbox: Mutex::new(Vec::new()),
            fail: true,
        }
    }

    /// Messages delivered so far, oldest first.
    pub fn outbox(&self) -> Vec<Mail> {
        self.outbox.lock().map(|o| o.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, mail: Mail) -> Result<(), MailerError> {
        if self.fail {
            return Err(MailerError::Transport("relay unavailable".to_string()));
        }
        tracing::info!(to = %mail.to, subject = %mail.subject, "email sent");
        if let Ok(mut outbox) = self.outbox.lock() {
            outbox.push(mail);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn log_mailer_keeps_outbox() {
        let mailer = LogMailer::new();
        mailer
            .send(Mail::password_reset("jonas@example.com", "Jonas Schmedtmann", "http://x/reset/abc"))
            .await
            .unwrap();
        let sent = mailer.outbox();
        assert_eq!(sent.len(), 1);
        assert!(sent[0].body.starts_with("Hi Jonas,"));
        assert!(sent[0].body.contains("http://x/reset/abc"));
    }

    #[tokio::test]
    async fn failing_mailer_errors() {
        let mailer = LogMailer::failing();
        assert!(mailer.send(Mail::welcome("a@b.c", "A", "u")).await.is_err());
        assert!(mailer.outbox().is_empty());
    }
}
