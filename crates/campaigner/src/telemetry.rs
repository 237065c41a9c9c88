//! Logging setup for the daemon.
//!
//! Library code logs through both `log` (infrastructure) and `tracing`
//! (pass spans); `LogTracer` forwards the former into the same subscriber.

use tracing_subscriber::{fmt, layer::SubscriberExt, EnvFilter, Layer, Registry};

use crate::config::LogConfig;

#[derive(Debug, thiserror::Error)]
pub enum TelemetryError {
    #[error("Failed to bridge log records: {0}")]
    LogBridge(#[from] tracing_log::log_tracer::SetLoggerError),

    #[error("Failed to install tracing subscriber: {0}")]
    Subscriber(#[from] tracing::subscriber::SetGlobalDefaultError),
}

/// Filter directives: `RUST_LOG` when set, otherwise the configured level.
pub fn build_filter(config: &LogConfig) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level))
}

/// Installs the global subscriber. Call once, at startup.
pub fn init_logging(config: &LogConfig) -> Result<(), TelemetryError> {
    let fmt_layer: Box<dyn Layer<Registry> + Send + Sync> = if config.json {
        fmt::layer().json().with_current_span(true).boxed()
    } else {
        fmt::layer().with_target(true).boxed()
    };

    let subscriber = Registry::default()
        .with(fmt_layer)
        .with(build_filter(config));

    tracing::subscriber::set_global_default(subscriber)?;
    tracing_log::LogTracer::init()?;

    tracing::info!(level = %config.level, json = config.json, "Logging initialized");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    #[serial]
    fn test_filter_uses_config_level_without_rust_log() {
        let saved = std::env::var("RUST_LOG").ok();
        std::env::remove_var("RUST_LOG");

        let filter = build_filter(&LogConfig {
            level: "debug".to_string(),
            json: false,
        });
        assert_eq!(filter.to_string(), "debug");

        if let Some(value) = saved {
            std::env::set_var("RUST_LOG", value);
        }
    }

    #[test]
    #[serial]
    fn test_rust_log_overrides_config() {
        let saved = std::env::var("RUST_LOG").ok();
        std::env::set_var("RUST_LOG", "campaigner=trace");

        let filter = build_filter(&LogConfig::default());
        assert_eq!(filter.to_string(), "campaigner=trace");

        match saved {
            Some(value) => std::env::set_var("RUST_LOG", value),
            None => std::env::remove_var("RUST_LOG"),
        }
    }
}
