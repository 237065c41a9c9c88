use std::path::{Path, PathBuf};

use crate::config::schema::Config;
use crate::error::ConfigError;

const SCHEMA_JSON: &str = include_str!("../../../../schema/config-v1.json");

/// Environment variable naming the config file for `campaignerd`.
pub const CONFIG_PATH_ENV_VAR: &str = "CAMPAIGNER_CONFIG";

/// `$CAMPAIGNER_CONFIG`, else `~/.campaigner/config.json`.
pub fn default_config_path() -> Result<PathBuf, ConfigError> {
    if let Some(path) = std::env::var_os(CONFIG_PATH_ENV_VAR) {
        if !path.is_empty() {
            return Ok(PathBuf::from(path));
        }
    }
    dirs::home_dir()
        .map(|h| h.join(".campaigner").join("config.json"))
        .ok_or(ConfigError::NoConfigPath)
}

pub fn load_config<P: AsRef<Path>>(path: P) -> Result<Config, ConfigError> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadFile {
        path: path.to_path_buf(),
        source: e,
    })?;

    load_config_from_str(&content)
}

pub fn load_config_from_str(content: &str) -> Result<Config, ConfigError> {
    let json_value: serde_json::Value = serde_json::from_str(content)?;

    validate_schema(&json_value)?;

    let config: Config = serde_json::from_value(json_value)?;

    validate_config(&config)?;

    Ok(config)
}

fn validate_schema(json_value: &serde_json::Value) -> Result<(), ConfigError> {
    let schema: serde_json::Value =
        serde_json::from_str(SCHEMA_JSON).map_err(|e| ConfigError::Validation {
            message: format!("Invalid embedded schema JSON: {}", e),
        })?;

    let validator = jsonschema::validator_for(&schema).map_err(|e| ConfigError::Validation {
        message: format!("Failed to compile JSON schema: {}", e),
    })?;

    let error_messages: Vec<String> = validator
        .iter_errors(json_value)
        .map(|e| e.to_string())
        .collect();
    if !error_messages.is_empty() {
        return Err(ConfigError::SchemaValidation {
            errors: error_messages.join("; "),
        });
    }

    Ok(())
}

fn validate_config(config: &Config) -> Result<(), ConfigError> {
    if config.version != "1.0" {
        return Err(ConfigError::Validation {
            message: format!("Unsupported config version: {}", config.version),
        });
    }

    let positive = [
        ("batch_size", u64::from(config.batch_size)),
        ("frequency_cap_days", u64::from(config.frequency_cap_days)),
        ("dispatch_timeout_secs", config.dispatch_timeout_secs),
        ("tick_interval_secs", config.tick_interval_secs),
        ("stale_sending_secs", config.stale_sending_secs),
    ];
    for (name, value) in positive {
        if value == 0 {
            return Err(ConfigError::Validation {
                message: format!("{} must be greater than zero", name),
            });
        }
    }

    // A row younger than one dispatch timeout may still be in flight.
    if config.stale_sending_secs <= config.dispatch_timeout_secs {
        return Err(ConfigError::Validation {
            message: format!(
                "stale_sending_secs ({}) must exceed dispatch_timeout_secs ({})",
                config.stale_sending_secs, config.dispatch_timeout_secs
            ),
        });
    }

    Ok(())
}
