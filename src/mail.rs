//! Outgoing email.

use async_trait::async_trait;
use lettre::message::header::ContentType;
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use thiserror::Error;

use crate::config::SmtpConfig;

#[derive(Debug, Error)]
pub enum MailError {
    #[error("invalid address '{0}'")]
    Address(String),

    #[error("failed to build message: {0}")]
    Build(#[from] lettre::error::Error),

    #[error("smtp delivery failed: {0}")]
    Smtp(#[from] lettre::transport::smtp::Error),
}

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, to: &[String], subject: &str, html: &str) -> Result<(), MailError>;
}

pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl SmtpMailer {
    pub fn new(config: &SmtpConfig) -> Result<Self, MailError> {
        let from_address = format!("{} <{}>", config.sender_name, config.sender_email);
        let from = from_address
            .parse()
            .map_err(|_| MailError::Address(from_address.clone()))?;

        let transport = AsyncSmtpTransport::<Tokio1Executor>::relay(&config.host)?
            .port(config.port)
            .credentials(Credentials::new(
                config.username.clone(),
                config.password.clone(),
            ))
            .build();

        Ok(Self { transport, from })
    }
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send(&self, to: &[String], subject: &str, html: &str) -> Result<(), MailError> {
        let mut builder = Message::builder().from(self.from.clone()).subject(subject);
        for recipient in to {
            let mailbox: Mailbox = recipient
                .parse()
                .map_err(|_| MailError::Address(recipient.clone()))?;
            builder = builder.to(mailbox);
        }

        let message = builder
            .header(ContentType::TEXT_HTML)
            .body(html.to_string())?;

        self.transport.send(message).await?;
        tracing::info!(recipients = to.len(), subject, "email sent");
        Ok(())
    }
}

/// Used when no SMTP server is configured.
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, to: &[String], subject: &str, html: &str) -> Result<(), MailError> {
        tracing::info!(to = ?to, subject, "email not sent, smtp is not configured");
        tracing::debug!(body = html, "unsent email body");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;
    use std::sync::{Arc, Mutex};

    #[derive(Clone, Default)]
    struct Captured(Arc<Mutex<Vec<u8>>>);

    impl io::Write for Captured {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_log_mailer_keeps_body_out_of_info_logs() {
        let captured = Captured::default();
        let writer = captured.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::INFO)
            .with_writer(move || writer.clone())
            .with_ansi(false)
            .finish();
        let _guard = tracing::subscriber::set_default(subscriber);

        LogMailer
            .send(
                &["jane@example.com".to_string()],
                "Verify your email",
                "<strong>482913</strong>",
            )
            .await
            .unwrap();

        let logs = String::from_utf8(captured.0.lock().unwrap().clone()).unwrap();
        assert!(logs.contains("jane@example.com"));
        assert!(logs.contains("Verify your email"));
        assert!(!logs.contains("482913"));
    }
}

#[cfg(test)]
pub mod testing {
    use super::*;
    use std::sync::Mutex;

    #[derive(Debug, Clone, PartialEq)]
    pub struct SentMail {
        pub to: Vec<String>,
        pub subject: String,
        pub html: String,
    }

    /// Keeps every message for assertions.
    #[derive(Default)]
    pub struct RecordingMailer {
        sent: Mutex<Vec<SentMail>>,
    }

    impl RecordingMailer {
        pub fn sent(&self) -> Vec<SentMail> {
            self.sent.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl Mailer for RecordingMailer {
        async fn send(&self, to: &[String], subject: &str, html: &str) -> Result<(), MailError> {
            self.sent.lock().unwrap().push(SentMail {
                to: to.to_vec(),
                subject: subject.to_string(),
                html: html.to_string(),
            });
            Ok(())
        }
    }
}
