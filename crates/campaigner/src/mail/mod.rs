//! Outbound mail: the transport capability, body composition, and the
//! dispatcher that ties them to sender accounts.

pub mod compose;
pub mod dispatcher;
pub mod error;
pub mod transport;

pub use compose::{compose_body, format_from};
pub use dispatcher::{EmailData, MailDispatcher};
pub use error::TransportError;
pub use transport::{MailTransport, OutgoingMessage, SmtpConfig, SmtpMailTransport};
