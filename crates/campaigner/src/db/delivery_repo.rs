//! Delivery ledger: the `campaign_recipients` table.
//!
//! One row per (campaign, recipient) pair, created the first time a pass
//! attempts the recipient. The UNIQUE constraint on that pair is the
//! exactly-once guard between concurrent passes.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use rusqlite::{params, params_from_iter, OptionalExtension, Row};

use super::{campaign_repo, now_timestamp, timestamp, Database, DatabaseError};
use crate::status::DeliveryStatus;

/// A single campaign/recipient delivery record.
#[derive(Debug, Clone, PartialEq)]
pub struct DeliveryRow {
    pub id: i64,
    pub campaign_id: i64,
    pub recipient_id: i64,
    pub sender_id: Option<i64>,
    pub status: DeliveryStatus,
    pub sent_at: Option<String>,
    pub opened_at: Option<String>,
    pub clicked_at: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl DeliveryRow {
    fn from_row(row: &Row<'_>) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            id: row.get("id")?,
            campaign_id: row.get("campaign_id")?,
            recipient_id: row.get("recipient_id")?,
            sender_id: row.get("sender_id")?,
            status: row.get("status")?,
            sent_at: row.get("sent_at")?,
            opened_at: row.get("opened_at")?,
            clicked_at: row.get("clicked_at")?,
            created_at: row.get("created_at")?,
            updated_at: row.get("updated_at")?,
        })
    }
}

/// Claims a recipient for a campaign by creating its row in `Sending`.
///
/// A second claim for the same pair fails with
/// [`DatabaseError::UniqueViolation`].
pub fn insert_sending(
    db: &Database,
    campaign_id: i64,
    recipient_id: i64,
    sender_id: i64,
) -> Result<i64, DatabaseError> {
    let now = now_timestamp();
    db.with_conn(|conn| {
        conn.execute(
            "INSERT INTO campaign_recipients (campaign_id, recipient_id, sender_id, status,
             created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?5)",
            params![campaign_id, recipient_id, sender_id, DeliveryStatus::Sending, now],
        )?;
        Ok(conn.last_insert_rowid())
    })
}

/// Marks a row as `Sent`, stamps the recipient's `last_sent`, and bumps the
/// campaign's `sent_count`, all in one transaction.
///
/// Accepts a row still `Sending` or one already swept to `Failed` as
/// interrupted while the server was accepting the message: a confirmed send
/// always wins. Returns `false` (and changes nothing) when the row was
/// already recorded as sent.
pub fn record_success(
    db: &Database,
    delivery_id: i64,
    sent_at: DateTime<Utc>,
) -> Result<bool, DatabaseError> {
    let sent_at = timestamp(sent_at);
    db.with_transaction(|conn| {
        let claimed: Option<(i64, i64)> = conn
            .query_row(
                "UPDATE campaign_recipients SET status = ?2, sent_at = ?3, updated_at = ?3
                 WHERE id = ?1 AND status IN (?4, ?5) AND sent_at IS NULL
                 RETURNING campaign_id, recipient_id",
                params![
                    delivery_id,
                    DeliveryStatus::Sent,
                    sent_at,
                    DeliveryStatus::Sending,
                    DeliveryStatus::Failed
                ],
                |r| Ok((r.get(0)?, r.get(1)?)),
            )
            .optional()?;

        let Some((campaign_id, recipient_id)) = claimed else {
            return Ok(false);
        };

        conn.execute(
            "UPDATE recipients SET last_sent = ?2, updated_at = ?2 WHERE id = ?1",
            params![recipient_id, sent_at],
        )?;
        campaign_repo::increment_sent_count(conn, campaign_id, &sent_at)?;
        Ok(true)
    })
}

/// Marks a `Sending` row as `Failed`. Rows in any other state are left alone.
pub fn mark_failed(db: &Database, delivery_id: i64) -> Result<bool, DatabaseError> {
    let now = now_timestamp();
    db.with_conn(|conn| {
        let changed = conn.execute(
            "UPDATE campaign_recipients SET status = ?2, updated_at = ?3
             WHERE id = ?1 AND status = ?4",
            params![
                delivery_id,
                DeliveryStatus::Failed,
                now,
                DeliveryStatus::Sending
            ],
        )?;
        Ok(changed == 1)
    })
}

/// Finds the row for one campaign/recipient pair.
pub fn find(
    db: &Database,
    campaign_id: i64,
    recipient_id: i64,
) -> Result<Option<DeliveryRow>, DatabaseError> {
    db.with_conn(|conn| {
        Ok(conn
            .query_row(
                "SELECT * FROM campaign_recipients WHERE campaign_id = ?1 AND recipient_id = ?2",
                params![campaign_id, recipient_id],
                DeliveryRow::from_row,
            )
            .optional()?)
    })
}

/// All rows of a campaign in creation order.
pub fn list_for_campaign(db: &Database, campaign_id: i64) -> Result<Vec<DeliveryRow>, DatabaseError> {
    db.with_conn(|conn| {
        let mut stmt = conn
            .prepare("SELECT * FROM campaign_recipients WHERE campaign_id = ?1 ORDER BY id ASC")?;
        let rows = stmt
            .query_map(params![campaign_id], DeliveryRow::from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    })
}

/// Which of `recipient_ids` have a `sent_at` later than `since`, in any
/// campaign.
pub fn find_recently_sent(
    db: &Database,
    recipient_ids: &[i64],
    since: DateTime<Utc>,
) -> Result<HashSet<i64>, DatabaseError> {
    if recipient_ids.is_empty() {
        return Ok(HashSet::new());
    }

    let placeholders = vec!["?"; recipient_ids.len()].join(", ");
    let sql = format!(
        "SELECT DISTINCT recipient_id FROM campaign_recipients
         WHERE sent_at IS NOT NULL AND sent_at > ? AND recipient_id IN ({placeholders})"
    );
    let since = timestamp(since);

    db.with_conn(|conn| {
        let mut stmt = conn.prepare(&sql)?;
        let values = std::iter::once(rusqlite::types::Value::Text(since))
            .chain(recipient_ids.iter().map(|id| rusqlite::types::Value::Integer(*id)));
        let ids = stmt
            .query_map(params_from_iter(values), |r| r.get::<_, i64>(0))?
            .collect::<Result<HashSet<_>, _>>()?;
        Ok(ids)
    })
}

/// Rows of a campaign still `Sending` whose last update is before `before`.
pub fn find_stale_sending(
    db: &Database,
    campaign_id: i64,
    before: DateTime<Utc>,
) -> Result<Vec<DeliveryRow>, DatabaseError> {
    let before = timestamp(before);
    db.with_conn(|conn| {
        let mut stmt = conn.prepare(
            "SELECT * FROM campaign_recipients
             WHERE campaign_id = ?1 AND status = ?2 AND updated_at < ?3
             ORDER BY id ASC",
        )?;
        let rows = stmt
            .query_map(
                params![campaign_id, DeliveryStatus::Sending, before],
                DeliveryRow::from_row,
            )?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    })
}
