//! Recording mail transport.

#![allow(dead_code)]

use std::collections::HashSet;
use std::sync::Mutex;

use async_trait::async_trait;
use secrecy::ExposeSecret;

use campaigner::mail::{MailTransport, OutgoingMessage, SmtpConfig, TransportError};

/// A message accepted by the fake, with the SMTP login it was sent through.
#[derive(Debug, Clone)]
pub struct Delivered {
    pub message: OutgoingMessage,
    pub smtp_username: String,
    pub smtp_password: String,
}

type SendHook = Box<dyn Fn(&OutgoingMessage) + Send + Sync>;

/// Accepts everything except addresses registered with [`FakeTransport::reject`].
#[derive(Default)]
pub struct FakeTransport {
    delivered: Mutex<Vec<Delivered>>,
    rejected: Mutex<HashSet<String>>,
    attempts: Mutex<usize>,
    on_send: Mutex<Option<SendHook>>,
}

impl FakeTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every future send to `address` fails with a 550.
    pub fn reject(&self, address: &str) {
        self.rejected.lock().unwrap().insert(address.to_string());
    }

    /// Runs `hook` while the server is accepting each message.
    pub fn on_send(&self, hook: impl Fn(&OutgoingMessage) + Send + Sync + 'static) {
        *self.on_send.lock().unwrap() = Some(Box::new(hook));
    }

    pub fn delivered(&self) -> Vec<Delivered> {
        self.delivered.lock().unwrap().clone()
    }

    pub fn delivered_to(&self) -> Vec<String> {
        self.delivered()
            .into_iter()
            .map(|d| d.message.to)
            .collect()
    }

    /// Sends attempted, accepted or not.
    pub fn attempts(&self) -> usize {
        *self.attempts.lock().unwrap()
    }
}

#[async_trait]
impl MailTransport for FakeTransport {
    async fn send(&self, message: &OutgoingMessage, smtp: &SmtpConfig) -> Result<(), TransportError> {
        *self.attempts.lock().unwrap() += 1;

        if let Some(hook) = self.on_send.lock().unwrap().as_ref() {
            hook(message);
        }

        if self.rejected.lock().unwrap().contains(&message.to) {
            return Err(TransportError::Rejected(format!(
                "550 mailbox unavailable: {}",
                message.to
            )));
        }

        self.delivered.lock().unwrap().push(Delivered {
            message: message.clone(),
            smtp_username: smtp.username.clone(),
            smtp_password: smtp.password.expose_secret().to_string(),
        });
        Ok(())
    }
}
