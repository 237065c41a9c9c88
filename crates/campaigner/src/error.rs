use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CampaignerError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Settings error: {0}")]
    Settings(#[from] crate::settings::SettingsError),

    #[error("Secret error: {0}")]
    Secret(#[from] crate::secrets::SecretError),

    #[error("Campaign run error: {0}")]
    Runner(#[from] crate::campaign::RunnerError),

    #[error("Campaign lifecycle error: {0}")]
    Lifecycle(#[from] crate::campaign::LifecycleError),

    #[error("Logging setup failed: {0}")]
    Telemetry(#[from] crate::telemetry::TelemetryError),

    #[error("Failed to start scheduler runtime: {0}")]
    SchedulerRuntime(#[source] std::io::Error),

    #[error("Failed to install signal handler: {0}")]
    Signal(#[from] ctrlc::Error),

    #[error("Database error: {0}")]
    Database(#[from] crate::db::DatabaseError),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config JSON: {0}")]
    ParseJson(#[from] serde_json::Error),

    #[error("Config validation failed: {message}")]
    Validation { message: String },

    #[error("Schema validation failed: {errors}")]
    SchemaValidation { errors: String },

    #[error("No config path given and no home directory to fall back to")]
    NoConfigPath,

    #[error("No database_path configured and no home directory to fall back to")]
    NoDatabasePath,
}

pub type Result<T> = std::result::Result<T, CampaignerError>;
