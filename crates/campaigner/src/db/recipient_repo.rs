//! Recipient repository: the `recipients` table.

use rusqlite::{params, OptionalExtension, Row};

use chrono::{DateTime, Utc};

use super::{now_timestamp, timestamp, Database, DatabaseError};
use crate::status::{LogStatus, RecipientStatus};

/// A contact belonging to one tenant.
#[derive(Debug, Clone, PartialEq)]
pub struct RecipientRow {
    pub id: i64,
    pub tenant_id: i64,
    pub email: String,
    pub name: Option<String>,
    pub company: Option<String>,
    pub phone: Option<String>,
    pub status: RecipientStatus,
    /// Informational only. Frequency capping reads `campaign_recipients.sent_at`.
    pub last_sent: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl RecipientRow {
    fn from_row(row: &Row<'_>) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            id: row.get("id")?,
            tenant_id: row.get("tenant_id")?,
            email: row.get("email")?,
            name: row.get("name")?,
            company: row.get("company")?,
            phone: row.get("phone")?,
            status: row.get("status")?,
            last_sent: row.get("last_sent")?,
            created_at: row.get("created_at")?,
            updated_at: row.get("updated_at")?,
        })
    }
}

/// Contact fields accepted by [`upsert`].
#[derive(Debug, Clone, Default)]
pub struct NewRecipient {
    pub email: String,
    pub name: Option<String>,
    pub company: Option<String>,
    pub phone: Option<String>,
}

/// Imports a contact. An existing `(tenant, email)` pair keeps its id and
/// status; only the descriptive fields are refreshed.
pub fn upsert(db: &Database, tenant_id: i64, recipient: &NewRecipient) -> Result<i64, DatabaseError> {
    let now = now_timestamp();
    db.with_conn(|conn| {
        let id = conn.query_row(
            "INSERT INTO recipients (tenant_id, email, name, company, phone, status, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?7)
             ON CONFLICT(tenant_id, email) DO UPDATE SET
                name = excluded.name,
                company = excluded.company,
                phone = excluded.phone,
                updated_at = excluded.updated_at
             RETURNING id",
            params![
                tenant_id,
                recipient.email,
                recipient.name,
                recipient.company,
                recipient.phone,
                RecipientStatus::Active,
                now,
            ],
            |r| r.get(0),
        )?;
        Ok(id)
    })
}

/// Finds a recipient by its ID.
pub fn find_by_id(db: &Database, id: i64) -> Result<Option<RecipientRow>, DatabaseError> {
    db.with_conn(|conn| {
        Ok(conn
            .query_row(
                "SELECT * FROM recipients WHERE id = ?1",
                params![id],
                RecipientRow::from_row,
            )
            .optional()?)
    })
}

/// Marks a recipient unsubscribed, bounced or active again.
pub fn update_status(
    db: &Database,
    id: i64,
    status: RecipientStatus,
) -> Result<bool, DatabaseError> {
    let now = now_timestamp();
    db.with_conn(|conn| {
        let changed = conn.execute(
            "UPDATE recipients SET status = ?2, updated_at = ?3 WHERE id = ?1",
            params![id, status, now],
        )?;
        Ok(changed == 1)
    })
}

/// Active recipients of `tenant_id` with no `campaign_recipients` row for
/// `campaign_id`, lowest id first.
///
/// A recipient this campaign already skipped for the frequency cap is left
/// out while it still has a send newer than `capped_since`, so capped
/// recipients cannot occupy the head of every batch.
pub fn find_eligible(
    db: &Database,
    campaign_id: i64,
    tenant_id: i64,
    limit: u32,
    capped_since: DateTime<Utc>,
) -> Result<Vec<RecipientRow>, DatabaseError> {
    let capped_since = timestamp(capped_since);
    db.with_conn(|conn| {
        let mut stmt = conn.prepare(
            "SELECT r.* FROM recipients r
             LEFT JOIN campaign_recipients cr
                ON cr.recipient_id = r.id AND cr.campaign_id = ?1
             WHERE r.tenant_id = ?2 AND r.status = ?3 AND cr.id IS NULL
               AND NOT (
                    EXISTS (SELECT 1 FROM email_logs l
                            WHERE l.campaign_id = ?1 AND l.recipient_id = r.id AND l.status = ?5)
                    AND EXISTS (SELECT 1 FROM campaign_recipients s
                                WHERE s.recipient_id = r.id AND s.sent_at >= ?6)
               )
             ORDER BY r.id ASC
             LIMIT ?4",
        )?;
        let rows = stmt
            .query_map(
                params![
                    campaign_id,
                    tenant_id,
                    RecipientStatus::Active,
                    limit,
                    LogStatus::Skipped,
                    capped_since
                ],
                RecipientRow::from_row,
            )?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    })
}

/// Recipients with no `campaign_recipients` row for `campaign_id`.
///
/// Unlike [`find_eligible`] this counts capped recipients too: they still
/// have to be mailed once their window expires.
pub fn count_eligible(db: &Database, campaign_id: i64, tenant_id: i64) -> Result<u64, DatabaseError> {
    db.with_conn(|conn| {
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM recipients r
             LEFT JOIN campaign_recipients cr
                ON cr.recipient_id = r.id AND cr.campaign_id = ?1
             WHERE r.tenant_id = ?2 AND r.status = ?3 AND cr.id IS NULL",
            params![campaign_id, tenant_id, RecipientStatus::Active],
            |r| r.get(0),
        )?;
        Ok(count as u64)
    })
}

/// Number of Active recipients of a tenant.
pub fn count_active(db: &Database, tenant_id: i64) -> Result<u64, DatabaseError> {
    db.with_conn(|conn| {
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM recipients WHERE tenant_id = ?1 AND status = ?2",
            params![tenant_id, RecipientStatus::Active],
            |r| r.get(0),
        )?;
        Ok(count as u64)
    })
}
