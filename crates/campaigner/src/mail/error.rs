//! Mail transport error types.

use std::time::Duration;

use thiserror::Error;

/// Errors that can occur while handing a message to an SMTP server.
#[derive(Error, Debug)]
pub enum TransportError {
    /// A from/to address could not be parsed.
    #[error("Invalid address: {0}")]
    InvalidAddress(#[from] lettre::address::AddressError),

    /// The message could not be assembled.
    #[error("Failed to build message: {0}")]
    Message(#[from] lettre::error::Error),

    /// Connection, TLS, authentication, or protocol failure.
    #[error("SMTP error: {0}")]
    Smtp(#[from] lettre::transport::smtp::Error),

    /// The sender's stored credentials could not be decrypted.
    #[error("Sender credentials unavailable: {0}")]
    Credentials(String),

    /// The server did not accept the message in time.
    #[error("Send timed out after {0:?}")]
    Timeout(Duration),

    /// Rejected by a non-SMTP transport (test doubles, relays).
    #[error("Rejected: {0}")]
    Rejected(String),
}

/// Result type for mail transport operations.
pub type Result<T> = std::result::Result<T, TransportError>;
