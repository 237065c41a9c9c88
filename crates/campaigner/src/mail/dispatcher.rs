//! Sends one campaign email through a reserved sender account.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};

use super::compose::{compose_body, format_from};
use super::error::TransportError;
use super::transport::{MailTransport, OutgoingMessage, SmtpConfig};
use crate::config::FooterConfig;
use crate::db::{sender_repo, sender_repo::SenderRow, Database};
use crate::secrets::CredentialCipher;
use crate::settings::TenantSettings;

/// Content of one email before footers are applied.
#[derive(Debug, Clone)]
pub struct EmailData {
    pub to: String,
    pub subject: String,
    pub html: String,
    /// Defaults to the sender's identity.
    pub from: Option<String>,
}

/// Formats and transmits email, owning the success/failure accounting of
/// the sender's daily quota.
///
/// Callers reserve a unit of quota before calling [`MailDispatcher::send`];
/// the dispatcher gives it back when transmission fails, so `daily_sent`
/// ends up counting delivered messages only.
pub struct MailDispatcher {
    db: Database,
    transport: Arc<dyn MailTransport>,
    cipher: Arc<CredentialCipher>,
    footer: FooterConfig,
    timeout: Duration,
}

impl MailDispatcher {
    pub fn new(
        db: Database,
        transport: Arc<dyn MailTransport>,
        cipher: Arc<CredentialCipher>,
        footer: FooterConfig,
        timeout: Duration,
    ) -> Self {
        Self {
            db,
            transport,
            cipher,
            footer,
            timeout,
        }
    }

    /// Returns `true` when the server accepted the message. Never fails:
    /// credential, transport, and timeout problems all come back as `false`.
    pub async fn send(
        &self,
        email: EmailData,
        sender: &SenderRow,
        settings: Option<&TenantSettings>,
    ) -> bool {
        match self.transmit(email, sender, settings).await {
            Ok(()) => true,
            Err(e) => {
                warn!(sender_id = sender.id, error = %e, "Failed to send email");
                if let Err(e) = sender_repo::release_quota(&self.db, sender.id) {
                    warn!(sender_id = sender.id, error = %e, "Failed to release sender quota");
                }
                false
            }
        }
    }

    async fn transmit(
        &self,
        email: EmailData,
        sender: &SenderRow,
        settings: Option<&TenantSettings>,
    ) -> Result<(), TransportError> {
        let password = self
            .cipher
            .decrypt(&sender.smtp_password)
            .map_err(|e| TransportError::Credentials(e.to_string()))?;

        let message = OutgoingMessage {
            from: email
                .from
                .unwrap_or_else(|| format_from(&sender.name, &sender.email)),
            html: compose_body(&email.html, &email.to, settings, &self.footer),
            to: email.to,
            subject: email.subject,
        };
        let smtp = SmtpConfig {
            host: sender.smtp_host.clone(),
            port: sender.smtp_port,
            username: sender.smtp_username.clone(),
            password,
        };

        debug!(sender_id = sender.id, to = %message.to, "Dispatching email");
        match tokio::time::timeout(self.timeout, self.transport.send(&message, &smtp)).await {
            Ok(result) => result,
            Err(_) => Err(TransportError::Timeout(self.timeout)),
        }
    }
}
