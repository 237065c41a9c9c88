//! Append-only record of every per-recipient and per-pass outcome.

use crate::db::email_log_repo::{self, NewEmailLog};
use crate::db::{Database, DatabaseError};
use crate::status::LogStatus;

pub const MSG_SCHEDULE_DEFERRED: &str = "Campaign processing paused due to sending schedule settings";
pub const MSG_NO_SENDER: &str = "No available sender accounts";
pub const MSG_SENT: &str = "Email sent successfully";
pub const MSG_TRANSPORT_FAILED: &str = "Failed to send email";
pub const MSG_INTERRUPTED: &str = "Send interrupted before completion; not retried";

#[derive(Clone)]
pub struct AuditLog {
    db: Database,
    frequency_cap_days: u32,
}

impl AuditLog {
    pub fn new(db: Database, frequency_cap_days: u32) -> Self {
        Self {
            db,
            frequency_cap_days,
        }
    }

    pub fn deferred(&self, campaign_id: i64) -> Result<(), DatabaseError> {
        self.write(campaign_id, None, None, LogStatus::Scheduled, MSG_SCHEDULE_DEFERRED)
    }

    pub fn no_sender(&self, campaign_id: i64, recipient_id: i64) -> Result<(), DatabaseError> {
        self.write(campaign_id, Some(recipient_id), None, LogStatus::Failed, MSG_NO_SENDER)
    }

    pub fn frequency_capped(
        &self,
        campaign_id: i64,
        recipient_id: i64,
        sender_id: i64,
    ) -> Result<(), DatabaseError> {
        let message = format!(
            "Frequency cap: already received email within {} days",
            self.frequency_cap_days
        );
        self.write(
            campaign_id,
            Some(recipient_id),
            Some(sender_id),
            LogStatus::Skipped,
            &message,
        )
    }

    pub fn sent(&self, campaign_id: i64, recipient_id: i64, sender_id: i64) -> Result<(), DatabaseError> {
        self.write(campaign_id, Some(recipient_id), Some(sender_id), LogStatus::Sent, MSG_SENT)
    }

    pub fn transport_failed(
        &self,
        campaign_id: i64,
        recipient_id: i64,
        sender_id: i64,
    ) -> Result<(), DatabaseError> {
        self.write(
            campaign_id,
            Some(recipient_id),
            Some(sender_id),
            LogStatus::Failed,
            MSG_TRANSPORT_FAILED,
        )
    }

    pub fn interrupted(
        &self,
        campaign_id: i64,
        recipient_id: i64,
        sender_id: Option<i64>,
    ) -> Result<(), DatabaseError> {
        self.write(campaign_id, Some(recipient_id), sender_id, LogStatus::Failed, MSG_INTERRUPTED)
    }

    fn write(
        &self,
        campaign_id: i64,
        recipient_id: Option<i64>,
        sender_id: Option<i64>,
        status: LogStatus,
        message: &str,
    ) -> Result<(), DatabaseError> {
        email_log_repo::insert(
            &self.db,
            &NewEmailLog {
                campaign_id,
                recipient_id,
                sender_id,
                status,
                message,
            },
        )?;
        Ok(())
    }
}
