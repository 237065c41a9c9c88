pub mod campaign;
pub mod config;
pub mod db;
pub mod error;
pub mod mail;
pub mod scheduler;
pub mod secrets;
pub mod settings;
pub mod status;
pub mod telemetry;

pub use campaign::{CampaignRunner, LifecycleError, PassReport, RunnerError, RunnerOptions};
pub use config::{load_config, Config};
pub use db::{Database, DatabaseError};
pub use error::{CampaignerError, ConfigError, Result};
pub use mail::{MailDispatcher, MailTransport, SmtpMailTransport, TransportError};
pub use scheduler::CampaignScheduler;
pub use secrets::{resolve_secret, resolve_secret_optional, CredentialCipher, SecretError};
pub use settings::{DbSettingsProvider, SendingSchedule, SettingsProvider, TenantSettings};
pub use status::{CampaignStatus, DeliveryStatus, LogStatus, RecipientStatus, SenderStatus};
