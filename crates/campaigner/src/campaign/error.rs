use thiserror::Error;

use crate::db::DatabaseError;
use crate::settings::SettingsError;
use crate::status::CampaignStatus;

/// Errors that abort a processing pass before or between recipients.
///
/// Per-recipient outcomes (no sender, frequency cap, transport failure) are
/// not errors; they end up in the audit log and the [`super::PassReport`].
#[derive(Error, Debug)]
pub enum RunnerError {
    #[error("Campaign {0} not found")]
    CampaignNotFound(i64),

    #[error("Template {template_id} for campaign {campaign_id} not found")]
    TemplateNotFound { campaign_id: i64, template_id: i64 },

    #[error("Campaign {campaign_id} is {status}, not Sending")]
    NotSending {
        campaign_id: i64,
        status: CampaignStatus,
    },

    #[error("Settings unavailable: {0}")]
    Settings(#[from] SettingsError),

    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),
}

#[derive(Error, Debug)]
pub enum LifecycleError {
    #[error("Campaign {0} not found")]
    CampaignNotFound(i64),

    #[error("Template {0} not found")]
    TemplateNotFound(i64),

    #[error("{entity} {id} does not belong to tenant {tenant_id}")]
    WrongTenant {
        entity: &'static str,
        id: i64,
        tenant_id: i64,
    },

    #[error("Cannot move campaign {campaign_id} from {from} to {to}")]
    InvalidTransition {
        campaign_id: i64,
        from: CampaignStatus,
        to: CampaignStatus,
    },

    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),
}
