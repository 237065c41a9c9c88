//! One processing pass over a `Sending` campaign.
//!
//! Steps: load campaign and template, schedule gate, fail interrupted sends,
//! fetch a batch, process recipients one by one, completion check.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, FixedOffset, Local, Utc};
use tracing::{debug, error, info, info_span, warn, Instrument};

use crate::config::Config;
use crate::db::campaign_repo::{self, CampaignRow};
use crate::db::recipient_repo::RecipientRow;
use crate::db::template_repo::{self, TemplateRow};
use crate::db::{delivery_repo, Database, DatabaseError};
use crate::mail::{EmailData, MailDispatcher, MailTransport};
use crate::secrets::CredentialCipher;
use crate::settings::{DbSettingsProvider, SettingsProvider, TenantSettings};
use crate::status::CampaignStatus;

use super::audit::AuditLog;
use super::decision::{decide, Decision};
use super::eligibility::EligibilityFilter;
use super::error::RunnerError;
use super::selector::SenderSelector;

/// Tunables for a pass.
#[derive(Debug, Clone)]
pub struct RunnerOptions {
    pub batch_size: u32,
    pub frequency_cap_days: u32,
    /// `Sending` rows older than this are treated as interrupted.
    pub stale_sending_after: Duration,
}

impl RunnerOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            batch_size: config.batch_size,
            frequency_cap_days: config.frequency_cap_days,
            stale_sending_after: config.stale_sending_after(),
        }
    }
}

impl Default for RunnerOptions {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

/// Summary of one pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PassReport {
    pub campaign_id: i64,
    /// The schedule gate refused the pass; nothing else ran.
    pub deferred: bool,
    /// Recipients fetched for this pass.
    pub batch: usize,
    pub sent: usize,
    pub failed: usize,
    pub skipped: usize,
    pub no_sender: usize,
    /// Stale `Sending` rows moved to `Failed` at the start of the pass.
    pub interrupted: usize,
    /// Recipients claimed by a concurrent pass between batch fetch and claim.
    pub already_claimed: usize,
    pub completed: bool,
}

impl PassReport {
    fn new(campaign_id: i64) -> Self {
        Self {
            campaign_id,
            ..Default::default()
        }
    }

    fn record(&mut self, outcome: Outcome) {
        match outcome {
            Outcome::Sent => self.sent += 1,
            Outcome::Failed => self.failed += 1,
            Outcome::Skipped => self.skipped += 1,
            Outcome::NoSender => self.no_sender += 1,
            Outcome::AlreadyClaimed => self.already_claimed += 1,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Outcome {
    Sent,
    Failed,
    Skipped,
    NoSender,
    AlreadyClaimed,
}

pub struct CampaignRunner {
    db: Database,
    settings: Arc<dyn SettingsProvider>,
    dispatcher: MailDispatcher,
    selector: SenderSelector,
    eligibility: EligibilityFilter,
    audit: AuditLog,
    options: RunnerOptions,
}

impl CampaignRunner {
    pub fn new(
        db: Database,
        settings: Arc<dyn SettingsProvider>,
        dispatcher: MailDispatcher,
        options: RunnerOptions,
    ) -> Self {
        let frequency_cap = chrono::Duration::days(i64::from(options.frequency_cap_days));
        Self {
            selector: SenderSelector::new(db.clone()),
            eligibility: EligibilityFilter::new(db.clone(), frequency_cap),
            audit: AuditLog::new(db.clone(), options.frequency_cap_days),
            db,
            settings,
            dispatcher,
            options,
        }
    }

    /// Production constructor: settings from the database, dispatcher from
    /// config.
    pub fn from_config(
        config: &Config,
        db: Database,
        transport: Arc<dyn MailTransport>,
        cipher: Arc<CredentialCipher>,
    ) -> Self {
        let dispatcher = MailDispatcher::new(
            db.clone(),
            transport,
            cipher,
            config.footer.clone(),
            config.dispatch_timeout(),
        );
        let settings = Arc::new(DbSettingsProvider::new(db.clone()));
        Self::new(db, settings, dispatcher, RunnerOptions::from_config(config))
    }

    /// Runs one pass using the local wall clock for the schedule gate.
    pub async fn run_pass(&self, campaign_id: i64) -> Result<PassReport, RunnerError> {
        self.run_pass_at(campaign_id, Local::now().fixed_offset()).await
    }

    /// Runs one pass, evaluating the tenant's sending schedule at `local_now`.
    pub async fn run_pass_at(
        &self,
        campaign_id: i64,
        local_now: DateTime<FixedOffset>,
    ) -> Result<PassReport, RunnerError> {
        let span = info_span!("campaign_pass", campaign_id);
        self.pass(campaign_id, local_now).instrument(span).await
    }

    /// One pass for every campaign currently `Sending`. A failing campaign is
    /// logged and does not stop the others.
    pub async fn run_sending_campaigns(&self) -> Result<Vec<PassReport>, DatabaseError> {
        let campaigns = campaign_repo::find_by_status(&self.db, CampaignStatus::Sending)?;
        let mut reports = Vec::with_capacity(campaigns.len());

        for campaign in campaigns {
            match self.run_pass(campaign.id).await {
                Ok(report) => reports.push(report),
                Err(e) => error!(campaign_id = campaign.id, error = %e, "Campaign pass failed"),
            }
        }

        Ok(reports)
    }

    async fn pass(
        &self,
        campaign_id: i64,
        local_now: DateTime<FixedOffset>,
    ) -> Result<PassReport, RunnerError> {
        let mut report = PassReport::new(campaign_id);

        // Step 1: Load campaign and template
        let (campaign, template) = self.step_load(campaign_id)?;

        // Step 2: Schedule gate
        let settings = self.settings.settings(campaign.tenant_id)?;
        if !self.step_schedule_gate(&campaign, settings.as_ref(), &local_now)? {
            report.deferred = true;
            return Ok(report);
        }

        // Step 3: Fail sends that never finished
        report.interrupted = self.step_fail_interrupted(campaign.id)?;

        // Step 4: Fetch batch
        let batch = {
            let _step = info_span!("fetch_batch").entered();
            self.eligibility
                .next_batch(campaign.id, campaign.tenant_id, self.options.batch_size, Utc::now())?
        };
        report.batch = batch.len();
        debug!(batch = batch.len(), "Fetched recipient batch");

        // Step 5: Recipients, strictly one at a time
        for recipient in &batch {
            let span = info_span!("recipient", recipient_id = recipient.id);
            let outcome = self
                .process_recipient(&campaign, &template, recipient, settings.as_ref())
                .instrument(span)
                .await?;
            report.record(outcome);
        }

        // Step 6: Completion check
        report.completed = self.step_complete(&campaign)?;

        info!(
            batch = report.batch,
            sent = report.sent,
            failed = report.failed,
            skipped = report.skipped,
            no_sender = report.no_sender,
            interrupted = report.interrupted,
            completed = report.completed,
            "Campaign pass finished"
        );
        Ok(report)
    }

    fn step_load(&self, campaign_id: i64) -> Result<(CampaignRow, TemplateRow), RunnerError> {
        let campaign = campaign_repo::find_by_id(&self.db, campaign_id)?
            .ok_or(RunnerError::CampaignNotFound(campaign_id))?;

        if campaign.status != CampaignStatus::Sending {
            return Err(RunnerError::NotSending {
                campaign_id,
                status: campaign.status,
            });
        }

        let template = template_repo::find_by_id(&self.db, campaign.template_id)?.ok_or(
            RunnerError::TemplateNotFound {
                campaign_id,
                template_id: campaign.template_id,
            },
        )?;

        Ok((campaign, template))
    }

    /// Returns `false` (after writing the deferral entry) when the tenant's
    /// schedule forbids sending at `local_now`. Missing settings never gate.
    fn step_schedule_gate(
        &self,
        campaign: &CampaignRow,
        settings: Option<&TenantSettings>,
        local_now: &DateTime<FixedOffset>,
    ) -> Result<bool, RunnerError> {
        let Some(schedule) = settings.map(|s| s.sending_schedule) else {
            return Ok(true);
        };

        if schedule.permits(local_now) {
            return Ok(true);
        }

        info!(schedule = ?schedule, at = %local_now, "Outside sending schedule, deferring");
        self.audit.deferred(campaign.id)?;
        Ok(false)
    }

    fn step_fail_interrupted(&self, campaign_id: i64) -> Result<usize, RunnerError> {
        let stale_after = chrono::Duration::from_std(self.options.stale_sending_after)
            .unwrap_or_else(|_| chrono::Duration::weeks(52));
        let stale = delivery_repo::find_stale_sending(&self.db, campaign_id, Utc::now() - stale_after)?;

        let mut failed = 0;
        for row in stale {
            if delivery_repo::mark_failed(&self.db, row.id)? {
                warn!(recipient_id = row.recipient_id, "Marking interrupted send as failed");
                self.audit.interrupted(campaign_id, row.recipient_id, row.sender_id)?;
                failed += 1;
            }
        }
        Ok(failed)
    }

    async fn process_recipient(
        &self,
        campaign: &CampaignRow,
        template: &TemplateRow,
        recipient: &RecipientRow,
        settings: Option<&TenantSettings>,
    ) -> Result<Outcome, RunnerError> {
        let available = self.selector.available(campaign.tenant_id)?;
        let recent = self.eligibility.recent_sends(&[recipient.id], Utc::now())?;

        let chosen = match decide(recipient, &available, &recent) {
            Decision::NoSender => {
                debug!("No sender with remaining quota");
                self.audit.no_sender(campaign.id, recipient.id)?;
                return Ok(Outcome::NoSender);
            }
            Decision::FrequencyCapped { sender } => {
                debug!("Recipient is frequency capped");
                self.audit.frequency_capped(campaign.id, recipient.id, sender.id)?;
                return Ok(Outcome::Skipped);
            }
            Decision::Send { sender } => sender,
        };

        let Some(sender) = self.selector.reserve(campaign.tenant_id, chosen)? else {
            self.audit.no_sender(campaign.id, recipient.id)?;
            return Ok(Outcome::NoSender);
        };

        let delivery_id =
            match delivery_repo::insert_sending(&self.db, campaign.id, recipient.id, sender.id) {
                Ok(id) => id,
                Err(e) => {
                    crate::db::sender_repo::release_quota(&self.db, sender.id)?;
                    if e.is_unique_violation() {
                        debug!("Recipient already claimed by another pass");
                        return Ok(Outcome::AlreadyClaimed);
                    }
                    return Err(e.into());
                }
            };

        let email = EmailData {
            to: recipient.email.clone(),
            subject: template.subject.clone(),
            html: template.content.clone(),
            from: None,
        };

        if self.dispatcher.send(email, &sender, settings).await {
            if !delivery_repo::record_success(&self.db, delivery_id, Utc::now())? {
                warn!(delivery_id, "Delivery row was already recorded as sent");
            }
            self.audit.sent(campaign.id, recipient.id, sender.id)?;
            debug!(sender_id = sender.id, "Email sent");
            Ok(Outcome::Sent)
        } else {
            delivery_repo::mark_failed(&self.db, delivery_id)?;
            self.audit.transport_failed(campaign.id, recipient.id, sender.id)?;
            Ok(Outcome::Failed)
        }
    }

    fn step_complete(&self, campaign: &CampaignRow) -> Result<bool, RunnerError> {
        let _step = info_span!("completion_check").entered();
        if self.eligibility.has_pending(campaign.id, campaign.tenant_id)? {
            return Ok(false);
        }

        let completed = campaign_repo::transition(
            &self.db,
            campaign.id,
            CampaignStatus::Sending,
            CampaignStatus::Completed,
        )?;
        if completed {
            info!("Campaign completed");
        } else {
            debug!("Campaign left Sending during the pass; not completing");
        }
        Ok(completed)
    }
}
