//! Campaign repository: the `campaigns` table.
//!
//! Status changes go through [`transition`], a compare-and-set that only
//! applies when the stored status still equals the expected one.

use rusqlite::{params, Connection, OptionalExtension, Row};

use super::{now_timestamp, Database, DatabaseError};
use crate::status::CampaignStatus;

/// A campaign row.
#[derive(Debug, Clone, PartialEq)]
pub struct CampaignRow {
    pub id: i64,
    pub tenant_id: i64,
    pub name: String,
    pub template_id: i64,
    pub status: CampaignStatus,
    pub scheduled_date: Option<String>,
    pub total_recipients: i64,
    pub sent_count: i64,
    pub opened_count: i64,
    pub clicked_count: i64,
    pub created_at: String,
    pub updated_at: String,
}

impl CampaignRow {
    fn from_row(row: &Row<'_>) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            id: row.get("id")?,
            tenant_id: row.get("tenant_id")?,
            name: row.get("name")?,
            template_id: row.get("template_id")?,
            status: row.get("status")?,
            scheduled_date: row.get("scheduled_date")?,
            total_recipients: row.get("total_recipients")?,
            sent_count: row.get("sent_count")?,
            opened_count: row.get("opened_count")?,
            clicked_count: row.get("clicked_count")?,
            created_at: row.get("created_at")?,
            updated_at: row.get("updated_at")?,
        })
    }
}

/// Fields needed to create a campaign.
#[derive(Debug, Clone)]
pub struct NewCampaign {
    pub tenant_id: i64,
    pub name: String,
    pub template_id: i64,
    pub status: CampaignStatus,
    pub scheduled_date: Option<String>,
    pub total_recipients: i64,
}

pub fn insert(db: &Database, campaign: &NewCampaign) -> Result<i64, DatabaseError> {
    let now = now_timestamp();
    db.with_conn(|conn| {
        conn.execute(
            "INSERT INTO campaigns (tenant_id, name, template_id, status, scheduled_date,
             total_recipients, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?7)",
            params![
                campaign.tenant_id,
                campaign.name,
                campaign.template_id,
                campaign.status,
                campaign.scheduled_date,
                campaign.total_recipients,
                now,
            ],
        )?;
        Ok(conn.last_insert_rowid())
    })
}

pub fn find_by_id(db: &Database, id: i64) -> Result<Option<CampaignRow>, DatabaseError> {
    db.with_conn(|conn| {
        Ok(conn
            .query_row(
                "SELECT * FROM campaigns WHERE id = ?1",
                params![id],
                CampaignRow::from_row,
            )
            .optional()?)
    })
}

/// Lists campaigns in the given status across all tenants, oldest first.
pub fn find_by_status(
    db: &Database,
    status: CampaignStatus,
) -> Result<Vec<CampaignRow>, DatabaseError> {
    db.with_conn(|conn| {
        let mut stmt =
            conn.prepare("SELECT * FROM campaigns WHERE status = ?1 ORDER BY id ASC")?;
        let rows = stmt
            .query_map(params![status], CampaignRow::from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    })
}

/// Moves a campaign from `from` to `to` if it is still in `from`.
///
/// Returns `false` when another caller changed the status first. The
/// transition table itself is checked by the caller.
pub fn transition(
    db: &Database,
    id: i64,
    from: CampaignStatus,
    to: CampaignStatus,
) -> Result<bool, DatabaseError> {
    let now = now_timestamp();
    db.with_conn(|conn| {
        let changed = conn.execute(
            "UPDATE campaigns SET status = ?3, updated_at = ?4 WHERE id = ?1 AND status = ?2",
            params![id, from, to, now],
        )?;
        Ok(changed == 1)
    })
}

/// Adds one to `sent_count`. Runs on a caller-held connection so it can
/// join a transaction.
pub(crate) fn increment_sent_count(
    conn: &Connection,
    id: i64,
    now: &str,
) -> Result<(), DatabaseError> {
    conn.execute(
        "UPDATE campaigns SET sent_count = sent_count + 1, updated_at = ?2 WHERE id = ?1",
        params![id, now],
    )?;
    Ok(())
}
