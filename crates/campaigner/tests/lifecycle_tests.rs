//! Campaign lifecycle control and its interaction with running passes.

mod common;

use std::sync::{Arc, OnceLock};
use std::time::Duration;

use async_trait::async_trait;

use campaigner::campaign::{self, CampaignRunner, LifecycleError, RunnerError, RunnerOptions};
use campaigner::config::FooterConfig;
use campaigner::db::{template_repo, tenant_repo, Database};
use campaigner::mail::{MailDispatcher, MailTransport, OutgoingMessage, SmtpConfig, TransportError};
use campaigner::settings::DbSettingsProvider;
use campaigner::status::CampaignStatus;

use common::{local_time, TestHarness};

/// Pauses the campaign from inside the first send, the way a user clicking
/// "pause" mid-pass would.
struct PausingTransport {
    db: Database,
    tenant_id: i64,
    campaign_id: OnceLock<i64>,
}

#[async_trait]
impl MailTransport for PausingTransport {
    async fn send(&self, _: &OutgoingMessage, _: &SmtpConfig) -> Result<(), TransportError> {
        if let Some(&id) = self.campaign_id.get() {
            let _ = campaign::pause(&self.db, self.tenant_id, id);
        }
        Ok(())
    }
}

#[test]
fn test_create_campaign_counts_active_recipients() {
    let h = TestHarness::new();
    h.add_recipients(3);

    let draft = campaign::create_campaign(&h.db, h.tenant_id, "Draft", h.template_id, None).unwrap();
    let scheduled = campaign::create_campaign(
        &h.db,
        h.tenant_id,
        "Later",
        h.template_id,
        Some(chrono::Utc::now() + chrono::Duration::days(1)),
    )
    .unwrap();

    assert_eq!(h.campaign(draft).status, CampaignStatus::Draft);
    assert_eq!(h.campaign(draft).total_recipients, 3);
    assert_eq!(h.campaign(scheduled).status, CampaignStatus::Scheduled);
    assert!(h.campaign(scheduled).scheduled_date.is_some());
}

#[test]
fn test_template_of_another_tenant_is_rejected() {
    let h = TestHarness::new();
    let other = tenant_repo::insert(&h.db, "Globex", "owner@globex.test").unwrap();
    let foreign = template_repo::insert(&h.db, other, "Theirs", "Hi", "<p>Hi</p>").unwrap();

    let err = campaign::create_campaign(&h.db, h.tenant_id, "Stolen", foreign, None).unwrap_err();
    assert!(matches!(err, LifecycleError::WrongTenant { entity: "Template", .. }));
}

#[test]
fn test_pause_resume_cycle() {
    let h = TestHarness::new();
    let id = h.sending_campaign();

    campaign::pause(&h.db, h.tenant_id, id).unwrap();
    assert_eq!(h.campaign(id).status, CampaignStatus::Paused);

    let err = campaign::pause(&h.db, h.tenant_id, id).unwrap_err();
    assert!(matches!(
        err,
        LifecycleError::InvalidTransition {
            from: CampaignStatus::Paused,
            to: CampaignStatus::Paused,
            ..
        }
    ));

    campaign::resume(&h.db, h.tenant_id, id).unwrap();
    assert_eq!(h.campaign(id).status, CampaignStatus::Sending);
}

#[test]
fn test_other_tenant_cannot_control_campaign() {
    let h = TestHarness::new();
    let id = h.sending_campaign();
    let other = tenant_repo::insert(&h.db, "Globex", "owner@globex.test").unwrap();

    let err = campaign::pause(&h.db, other, id).unwrap_err();
    assert!(matches!(err, LifecycleError::WrongTenant { entity: "Campaign", .. }));
    assert_eq!(h.campaign(id).status, CampaignStatus::Sending);
}

#[tokio::test]
async fn test_paused_campaign_is_not_processed() {
    let h = TestHarness::new();
    h.add_sender("a@acme.test", 100, 0);
    h.add_recipients(2);
    let id = h.sending_campaign();
    campaign::pause(&h.db, h.tenant_id, id).unwrap();

    let err = h.runner().run_pass_at(id, local_time(14, 10)).await.unwrap_err();

    assert!(matches!(
        err,
        RunnerError::NotSending {
            status: CampaignStatus::Paused,
            ..
        }
    ));
    assert_eq!(h.transport.attempts(), 0);
    assert!(h.runner().run_sending_campaigns().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_pause_during_pass_is_not_overwritten_by_completion() {
    let h = TestHarness::new();
    h.add_sender("a@acme.test", 100, 0);
    h.add_recipients(2);
    let id = h.sending_campaign();

    let transport = Arc::new(PausingTransport {
        db: h.db.clone(),
        tenant_id: h.tenant_id,
        campaign_id: OnceLock::new(),
    });
    transport.campaign_id.set(id).unwrap();

    let dispatcher = MailDispatcher::new(
        h.db.clone(),
        transport,
        h.cipher.clone(),
        FooterConfig::default(),
        Duration::from_secs(5),
    );
    let runner = CampaignRunner::new(
        h.db.clone(),
        Arc::new(DbSettingsProvider::new(h.db.clone())),
        dispatcher,
        RunnerOptions::default(),
    );

    let report = runner.run_pass_at(id, local_time(14, 10)).await.unwrap();

    // The batch already fetched is finished, but the status stays Paused.
    assert_eq!(report.sent, 2);
    assert!(!report.completed);
    assert_eq!(h.campaign(id).status, CampaignStatus::Paused);
}

#[tokio::test]
async fn test_resumed_campaign_continues_where_it_stopped() {
    let h = TestHarness::new();
    h.add_sender("a@acme.test", 100, 0);
    h.add_recipients(3);
    let id = h.sending_campaign();
    let runner = h.runner_with(RunnerOptions {
        batch_size: 2,
        ..Default::default()
    });

    runner.run_pass_at(id, local_time(14, 10)).await.unwrap();
    campaign::pause(&h.db, h.tenant_id, id).unwrap();
    campaign::resume(&h.db, h.tenant_id, id).unwrap();
    let report = runner.run_pass_at(id, local_time(14, 11)).await.unwrap();

    assert_eq!(report.batch, 1);
    assert!(report.completed);
    assert_eq!(
        h.transport.delivered_to(),
        vec!["r1@example.test", "r2@example.test", "r3@example.test"]
    );
}
