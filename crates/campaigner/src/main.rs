//! `campaignerd`: runs campaign passes on a fixed tick until interrupted.

use std::process::ExitCode;
use std::sync::Arc;

use tokio::sync::broadcast;

use campaigner::config::{default_config_path, load_config, Config};
use campaigner::db::Database;
use campaigner::error::ConfigError;
use campaigner::mail::SmtpMailTransport;
use campaigner::secrets::CredentialCipher;
use campaigner::{telemetry, CampaignRunner, CampaignScheduler, CampaignerError};

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("{}", e);
            eprintln!("campaignerd: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn run() -> Result<(), CampaignerError> {
    let config_path = default_config_path()?;
    let config = if config_path.exists() {
        load_config(&config_path)?
    } else {
        Config::default()
    };

    telemetry::init_logging(&config.log)?;
    log::info!("Starting campaignerd v{}", env!("CARGO_PKG_VERSION"));
    if config_path.exists() {
        log::info!("Configuration loaded from {}", config_path.display());
    } else {
        log::warn!(
            "No config file at {}, using defaults",
            config_path.display()
        );
    }

    let db_path = config.database_path().ok_or(ConfigError::NoDatabasePath)?;
    let db = Database::open(&db_path)?;
    let cipher = Arc::new(CredentialCipher::from_config(&config.credentials)?);

    let runner = Arc::new(CampaignRunner::from_config(
        &config,
        db,
        Arc::new(SmtpMailTransport::new()),
        cipher,
    ));

    let scheduler = Arc::new(CampaignScheduler::new(runner, config.tick_interval()));
    let (trigger_tx, trigger_rx) = broadcast::channel(16);
    let handle = scheduler
        .start(trigger_rx)
        .map_err(CampaignerError::SchedulerRuntime)?;

    // Run once right away instead of waiting a full tick.
    let _ = trigger_tx.send(());

    {
        let scheduler = Arc::clone(&scheduler);
        let trigger_tx = trigger_tx.clone();
        ctrlc::set_handler(move || {
            log::info!("Shutdown requested");
            scheduler.stop();
            let _ = trigger_tx.send(());
        })?;
    }

    log::info!(
        "Scheduler running every {}s",
        config.tick_interval().as_secs()
    );

    if handle.join().is_err() {
        log::error!("Scheduler thread panicked");
    }

    log::info!("campaignerd stopped");
    Ok(())
}
