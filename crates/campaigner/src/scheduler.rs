//! Periodic campaign scheduler.
//!
//! Runs one pass for every `Sending` campaign on each tick, and on demand
//! when something is sent on the trigger channel (e.g. right after a
//! campaign is started or resumed).

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use tokio::sync::broadcast;

use crate::campaign::CampaignRunner;

pub struct CampaignScheduler {
    runner: Arc<CampaignRunner>,
    interval: Duration,
    shutdown: Arc<AtomicBool>,
}

impl CampaignScheduler {
    pub fn new(runner: Arc<CampaignRunner>, interval: Duration) -> Self {
        Self {
            runner,
            interval,
            shutdown: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Starts the tick loop on a background thread with its own
    /// single-threaded runtime.
    pub fn start(
        &self,
        mut trigger_rx: broadcast::Receiver<()>,
    ) -> std::io::Result<JoinHandle<()>> {
        let runner = Arc::clone(&self.runner);
        let shutdown = Arc::clone(&self.shutdown);
        let interval = self.interval;

        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()?;

        std::thread::Builder::new()
            .name("campaign-scheduler".into())
            .spawn(move || {
                rt.block_on(async {
                    let mut interval_timer = tokio::time::interval(interval);
                    interval_timer.tick().await; // first tick fires immediately
                    let mut triggers_open = true;

                    loop {
                        if shutdown.load(Ordering::Acquire) {
                            break;
                        }

                        tokio::select! {
                            _ = interval_timer.tick() => {},
                            result = trigger_rx.recv(), if triggers_open => match result {
                                Ok(()) | Err(broadcast::error::RecvError::Lagged(_)) => {
                                    log::info!("Manual campaign run triggered");
                                }
                                Err(broadcast::error::RecvError::Closed) => {
                                    log::debug!("Trigger channel closed, ticking only");
                                    triggers_open = false;
                                    continue;
                                }
                            },
                        }

                        if shutdown.load(Ordering::Acquire) {
                            break;
                        }

                        match runner.run_sending_campaigns().await {
                            Ok(reports) => {
                                let sent: usize = reports.iter().map(|r| r.sent).sum();
                                if !reports.is_empty() {
                                    log::info!(
                                        "Tick: {} campaign(s) processed, {} email(s) sent",
                                        reports.len(),
                                        sent
                                    );
                                }
                            }
                            Err(e) => log::error!("Failed to list sending campaigns: {}", e),
                        }
                    }
                });
            })
    }

    /// Signals the loop to exit at its next wake-up.
    pub fn stop(&self) {
        self.shutdown.store(true, Ordering::Release);
    }
}
