//! Campaign creation and the start / pause / resume control actions.
//!
//! These only change `status`; running a pass is left to the caller or the
//! scheduler tick.

use chrono::{DateTime, Utc};

use crate::db::campaign_repo::{self, CampaignRow, NewCampaign};
use crate::db::{recipient_repo, template_repo, timestamp, Database};
use crate::status::CampaignStatus;

use super::error::LifecycleError;

/// Creates a campaign for `tenant_id`.
///
/// The campaign starts `Scheduled` when a date is given, `Draft` otherwise.
/// `total_recipients` is the tenant's Active recipient count right now.
pub fn create_campaign(
    db: &Database,
    tenant_id: i64,
    name: &str,
    template_id: i64,
    scheduled_date: Option<DateTime<Utc>>,
) -> Result<i64, LifecycleError> {
    let template = template_repo::find_by_id(db, template_id)?
        .ok_or(LifecycleError::TemplateNotFound(template_id))?;
    if template.tenant_id != tenant_id {
        return Err(LifecycleError::WrongTenant {
            entity: "Template",
            id: template_id,
            tenant_id,
        });
    }

    let status = if scheduled_date.is_some() {
        CampaignStatus::Scheduled
    } else {
        CampaignStatus::Draft
    };
    let total_recipients = recipient_repo::count_active(db, tenant_id)?;

    let id = campaign_repo::insert(
        db,
        &NewCampaign {
            tenant_id,
            name: name.to_string(),
            template_id,
            status,
            scheduled_date: scheduled_date.map(timestamp),
            total_recipients: total_recipients as i64,
        },
    )?;

    log::info!(
        "Created campaign {} '{}' for tenant {} ({}, {} recipients)",
        id,
        name,
        tenant_id,
        status,
        total_recipients
    );
    Ok(id)
}

/// `Draft | Scheduled -> Sending`.
pub fn start(db: &Database, tenant_id: i64, campaign_id: i64) -> Result<(), LifecycleError> {
    move_campaign(
        db,
        tenant_id,
        campaign_id,
        &[CampaignStatus::Draft, CampaignStatus::Scheduled],
        CampaignStatus::Sending,
    )
}

/// `Sending -> Paused`. A pass already running finishes its batch.
pub fn pause(db: &Database, tenant_id: i64, campaign_id: i64) -> Result<(), LifecycleError> {
    move_campaign(
        db,
        tenant_id,
        campaign_id,
        &[CampaignStatus::Sending],
        CampaignStatus::Paused,
    )
}

/// `Paused -> Sending`.
pub fn resume(db: &Database, tenant_id: i64, campaign_id: i64) -> Result<(), LifecycleError> {
    move_campaign(
        db,
        tenant_id,
        campaign_id,
        &[CampaignStatus::Paused],
        CampaignStatus::Sending,
    )
}

fn find_owned(
    db: &Database,
    tenant_id: i64,
    campaign_id: i64,
) -> Result<CampaignRow, LifecycleError> {
    let campaign = campaign_repo::find_by_id(db, campaign_id)?
        .ok_or(LifecycleError::CampaignNotFound(campaign_id))?;
    if campaign.tenant_id != tenant_id {
        return Err(LifecycleError::WrongTenant {
            entity: "Campaign",
            id: campaign_id,
            tenant_id,
        });
    }
    Ok(campaign)
}

fn move_campaign(
    db: &Database,
    tenant_id: i64,
    campaign_id: i64,
    accepted: &[CampaignStatus],
    to: CampaignStatus,
) -> Result<(), LifecycleError> {
    let campaign = find_owned(db, tenant_id, campaign_id)?;
    let from = campaign.status;

    if !accepted.contains(&from) || !from.can_transition_to(to) {
        return Err(LifecycleError::InvalidTransition {
            campaign_id,
            from,
            to,
        });
    }

    if !campaign_repo::transition(db, campaign_id, from, to)? {
        // Someone else moved it first; report what it is now.
        let current = find_owned(db, tenant_id, campaign_id)?.status;
        return Err(LifecycleError::InvalidTransition {
            campaign_id,
            from: current,
            to,
        });
    }

    log::info!("Campaign {} moved {} -> {}", campaign_id, from, to);
    Ok(())
}
