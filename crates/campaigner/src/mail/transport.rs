//! SMTP transport capability.

use async_trait::async_trait;
use lettre::message::{header::ContentType, Mailbox};
use lettre::transport::smtp::authentication::Credentials;
use lettre::transport::smtp::client::{Tls, TlsParameters};
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use secrecy::{ExposeSecret, SecretString};

use super::error::Result;

/// Port on which the server expects TLS from the first byte.
const IMPLICIT_TLS_PORT: u16 = 465;

/// A fully composed message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingMessage {
    /// Header form, e.g. `"Acme" <news@acme.test>`.
    pub from: String,
    pub to: String,
    pub subject: String,
    pub html: String,
}

/// Connection settings for one sender account.
#[derive(Debug)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: SecretString,
}

/// Something that can deliver one message through one SMTP account.
#[async_trait]
pub trait MailTransport: Send + Sync {
    async fn send(&self, message: &OutgoingMessage, smtp: &SmtpConfig) -> Result<()>;
}

/// Production transport over lettre's tokio SMTP client.
///
/// A new connection is opened per message, since consecutive messages
/// usually go through different sender accounts.
#[derive(Debug, Clone, Copy, Default)]
pub struct SmtpMailTransport;

impl SmtpMailTransport {
    pub fn new() -> Self {
        Self
    }

    fn build_message(message: &OutgoingMessage) -> Result<Message> {
        let from: Mailbox = message.from.parse()?;
        let to: Mailbox = message.to.parse()?;

        Ok(Message::builder()
            .from(from)
            .to(to)
            .subject(message.subject.as_str())
            .header(ContentType::TEXT_HTML)
            .body(message.html.clone())?)
    }

    fn build_mailer(smtp: &SmtpConfig) -> Result<AsyncSmtpTransport<Tokio1Executor>> {
        let params = TlsParameters::new(smtp.host.clone())?;
        let tls = if smtp.port == IMPLICIT_TLS_PORT {
            Tls::Wrapper(params)
        } else {
            Tls::Opportunistic(params)
        };

        let credentials = Credentials::new(
            smtp.username.clone(),
            smtp.password.expose_secret().to_string(),
        );

        Ok(AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&smtp.host)
            .port(smtp.port)
            .tls(tls)
            .credentials(credentials)
            .build())
    }
}

#[async_trait]
impl MailTransport for SmtpMailTransport {
    async fn send(&self, message: &OutgoingMessage, smtp: &SmtpConfig) -> Result<()> {
        let email = Self::build_message(message)?;
        let mailer = Self::build_mailer(smtp)?;

        log::debug!(
            "Sending via {}:{} as {}",
            smtp.host,
            smtp.port,
            smtp.username
        );
        mailer.send(email).await?;
        Ok(())
    }
}
