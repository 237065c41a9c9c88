//! Test harness for isolated campaign pass execution.
//!
//! The `TestHarness` owns an in-memory database seeded with one tenant and
//! one template, plus helpers to add senders, recipients, and campaigns and
//! to read back what a pass wrote.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, FixedOffset, TimeZone, Utc};

use campaigner::campaign::{self, CampaignRunner, RunnerOptions};
use campaigner::config::FooterConfig;
use campaigner::db::campaign_repo::{self, CampaignRow, NewCampaign};
use campaigner::db::delivery_repo::{self, DeliveryRow};
use campaigner::db::email_log_repo::{self, EmailLogRow};
use campaigner::db::recipient_repo::{self, NewRecipient};
use campaigner::db::sender_repo::{self, NewSender, SenderRow};
use campaigner::db::{template_repo, tenant_repo, Database};
use campaigner::mail::MailDispatcher;
use campaigner::secrets::CredentialCipher;
use campaigner::settings::{self, DbSettingsProvider, SendingSchedule, TenantSettings};
use campaigner::status::CampaignStatus;

use super::transport::FakeTransport;

/// AES-256 key used for every sender password in tests.
pub const TEST_KEY: &str = "00112233445566778899aabbccddeeff00112233445566778899aabbccddeeff";

/// A fixed wall-clock instant at UTC+02:00.
///
/// 2026-10-14 is a Wednesday.
pub fn local_time(day: u32, hour: u32) -> DateTime<FixedOffset> {
    FixedOffset::east_opt(2 * 3600)
        .unwrap()
        .with_ymd_and_hms(2026, 10, day, hour, 0, 0)
        .unwrap()
}

pub struct TestHarness {
    pub db: Database,
    pub cipher: Arc<CredentialCipher>,
    pub transport: Arc<FakeTransport>,
    pub tenant_id: i64,
    pub template_id: i64,
}

impl TestHarness {
    pub fn new() -> Self {
        let db = Database::open_in_memory().expect("Failed to open in-memory database");
        let cipher = Arc::new(CredentialCipher::from_hex_key(TEST_KEY).expect("Invalid test key"));
        let tenant_id = tenant_repo::insert(&db, "Acme", "owner@acme.test").unwrap();
        let template_id = template_repo::insert(
            &db,
            tenant_id,
            "October newsletter",
            "News from Acme",
            "<p>Hello from Acme</p>",
        )
        .unwrap();

        Self {
            db,
            cipher,
            transport: Arc::new(FakeTransport::new()),
            tenant_id,
            template_id,
        }
    }

    /// Registers an Active sender that has already sent `daily_sent` today.
    pub fn add_sender(&self, email: &str, daily_limit: i64, daily_sent: i64) -> i64 {
        let id = sender_repo::insert(
            &self.db,
            &NewSender {
                tenant_id: self.tenant_id,
                email: email.to_string(),
                name: format!("Sender {}", email),
                smtp_host: "smtp.acme.test".to_string(),
                smtp_port: 587,
                smtp_username: email.to_string(),
                smtp_password: self.cipher.encrypt("smtp-secret").unwrap(),
                daily_limit,
            },
        )
        .unwrap();

        self.db
            .with_conn(|conn| {
                conn.execute(
                    "UPDATE sender_accounts SET daily_sent = ?1 WHERE id = ?2",
                    rusqlite::params![daily_sent, id],
                )?;
                Ok(())
            })
            .unwrap();
        id
    }

    /// Adds `count` Active recipients `r1@example.test`, `r2@…`, in id order.
    pub fn add_recipients(&self, count: usize) -> Vec<i64> {
        (1..=count)
            .map(|i| {
                recipient_repo::upsert(
                    &self.db,
                    self.tenant_id,
                    &NewRecipient {
                        email: format!("r{}@example.test", i),
                        name: Some(format!("Recipient {}", i)),
                        ..Default::default()
                    },
                )
                .unwrap()
            })
            .collect()
    }

    /// Creates a campaign over the seeded template and starts it.
    pub fn sending_campaign(&self) -> i64 {
        let id = campaign::create_campaign(
            &self.db,
            self.tenant_id,
            "October",
            self.template_id,
            None,
        )
        .unwrap();
        campaign::start(&self.db, self.tenant_id, id).unwrap();
        id
    }

    pub fn save_settings(&self, settings: &TenantSettings) {
        settings::save_settings(&self.db, self.tenant_id, settings).unwrap();
    }

    pub fn set_schedule(&self, schedule: SendingSchedule) {
        self.save_settings(&TenantSettings {
            sending_schedule: schedule,
            ..Default::default()
        });
    }

    /// Records that `recipient_id` received another campaign at `sent_at`.
    pub fn seed_previous_send(&self, recipient_id: i64, sender_id: i64, sent_at: DateTime<Utc>) {
        let other = campaign_repo::insert(
            &self.db,
            &NewCampaign {
                tenant_id: self.tenant_id,
                name: "Earlier campaign".to_string(),
                template_id: self.template_id,
                status: CampaignStatus::Completed,
                scheduled_date: None,
                total_recipients: 1,
            },
        )
        .unwrap();
        let delivery = delivery_repo::insert_sending(&self.db, other, recipient_id, sender_id).unwrap();
        assert!(delivery_repo::record_success(&self.db, delivery, sent_at).unwrap());
    }

    pub fn runner(&self) -> CampaignRunner {
        self.runner_with(RunnerOptions::default())
    }

    pub fn runner_with(&self, options: RunnerOptions) -> CampaignRunner {
        let dispatcher = MailDispatcher::new(
            self.db.clone(),
            self.transport.clone(),
            self.cipher.clone(),
            FooterConfig::default(),
            Duration::from_secs(5),
        );
        CampaignRunner::new(
            self.db.clone(),
            Arc::new(DbSettingsProvider::new(self.db.clone())),
            dispatcher,
            options,
        )
    }

    pub fn campaign(&self, id: i64) -> CampaignRow {
        campaign_repo::find_by_id(&self.db, id).unwrap().unwrap()
    }

    pub fn sender(&self, id: i64) -> SenderRow {
        sender_repo::find_by_id(&self.db, id).unwrap().unwrap()
    }

    pub fn deliveries(&self, campaign_id: i64) -> Vec<DeliveryRow> {
        delivery_repo::list_for_campaign(&self.db, campaign_id).unwrap()
    }

    pub fn logs(&self, campaign_id: i64) -> Vec<EmailLogRow> {
        email_log_repo::list_for_campaign(&self.db, campaign_id).unwrap()
    }
}
