// beech-core/src/tools/mailer.rs

//! Outgoing email over SMTP.

use super::google_auth::required_env;
use crate::config::EmailConfig;
use anyhow::{Context, Result};
use async_trait::async_trait;
use lettre::message::header::ContentType;
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use tracing::info;

pub const HOST_ENV: &str = "EMAIL_HOST";
pub const USER_ENV: &str = "EMAIL_USER";
pub const PASSWORD_ENV: &str = "EMAIL_PASSWORD";

#[derive(Debug, Clone, PartialEq)]
pub struct OutgoingEmail {
    pub to: String,
    pub subject: String,
    pub html: String,
}

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, email: &OutgoingEmail) -> Result<()>;
}

pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl SmtpMailer {
    /// Host comes from the config or `EMAIL_HOST`; the SMTP login
    /// (`EMAIL_USER`, `EMAIL_PASSWORD`) doubles as the sender address.
    pub fn from_env(config: &EmailConfig) -> Result<Self> {
        let host = match &config.host {
            Some(host) => host.clone(),
            None => required_env(HOST_ENV)?,
        };
        let user = required_env(USER_ENV)?;
        let password = required_env(PASSWORD_ENV)?;

        let from = sender(&config.from_name, &user)?;
        let builder = if config.secure {
            AsyncSmtpTransport::<Tokio1Executor>::relay(&host)
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&host)
        }
        .with_context(|| format!("Failed to configure SMTP relay {}", host))?;

        let transport = builder
            .port(config.port)
            .credentials(Credentials::new(user, password))
            .build();
        Ok(Self { transport, from })
    }
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send(&self, email: &OutgoingEmail) -> Result<()> {
        let message = build_message(&self.from, email)?;
        let response = self
            .transport
            .send(message)
            .await
            .with_context(|| format!("Failed to send email to {}", email.to))?;
        info!(to = %email.to, code = %response.code(), "Email sent.");
        Ok(())
    }
}

/// Whether `address` parses as a mailbox we can send to.
pub fn is_valid_recipient(address: &str) -> bool {
    address.parse::<Mailbox>().is_ok()
}

fn sender(name: &str, address: &str) -> Result<Mailbox> {
    let address = address
        .parse()
        .with_context(|| format!("Invalid sender address '{}'", address))?;
    Ok(Mailbox::new(Some(name.to_string()), address))
}

fn build_message(from: &Mailbox, email: &OutgoingEmail) -> Result<Message> {
    let to: Mailbox = email
        .to
        .parse()
        .with_context(|| format!("Invalid recipient address '{}'", email.to))?;
    Message::builder()
        .from(from.clone())
        .to(to)
        .subject(email.subject.clone())
        .header(ContentType::TEXT_HTML)
        .body(email.html.clone())
        .context("Failed to build email message")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_message_headers() {
        let from = sender("PPC AI Agent", "reports@example.com").unwrap();
        let email = OutgoingEmail {
            to: "client@example.com".to_string(),
            subject: "Google Ads Daily Report - 2025-03-01".to_string(),
            html: "<p>Hi</p>".to_string(),
        };
        let formatted = String::from_utf8(build_message(&from, &email).unwrap().formatted()).unwrap();
        assert!(formatted.contains("PPC AI Agent"), "{}", formatted);
        assert!(formatted.contains("<reports@example.com>"), "{}", formatted);
        assert!(formatted.contains("client@example.com"));
        assert!(formatted.contains("Subject: Google Ads Daily Report - 2025-03-01"));
        assert!(formatted.contains("Content-Type: text/html"));
    }

    #[test]
    fn test_invalid_recipient_is_rejected() {
        let from = sender("PPC AI Agent", "reports@example.com").unwrap();
        let email = OutgoingEmail {
            to: "not an address".to_string(),
            subject: "s".to_string(),
            html: String::new(),
        };
        assert!(build_message(&from, &email).is_err());
        assert!(!is_valid_recipient("not an address"));
        assert!(is_valid_recipient("client@example.com"));
    }
}
