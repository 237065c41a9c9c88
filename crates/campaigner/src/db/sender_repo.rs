//! Sender account repository: the `sender_accounts` table.
//!
//! `daily_sent` is only ever changed by single conditional UPDATE
//! statements; nothing here reads the counter and writes it back.

use rusqlite::{params, OptionalExtension, Row};

use super::{now_timestamp, Database, DatabaseError};
use crate::status::SenderStatus;

/// A sending account row.
#[derive(Debug, Clone, PartialEq)]
pub struct SenderRow {
    pub id: i64,
    pub tenant_id: i64,
    pub email: String,
    pub name: String,
    pub smtp_host: String,
    pub smtp_port: u16,
    pub smtp_username: String,
    /// Ciphertext produced by [`crate::secrets::CredentialCipher`].
    pub smtp_password: String,
    pub daily_limit: i64,
    pub daily_sent: i64,
    pub status: SenderStatus,
    pub created_at: String,
    pub updated_at: String,
}

impl SenderRow {
    fn from_row(row: &Row<'_>) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            id: row.get("id")?,
            tenant_id: row.get("tenant_id")?,
            email: row.get("email")?,
            name: row.get("name")?,
            smtp_host: row.get("smtp_host")?,
            smtp_port: row.get("smtp_port")?,
            smtp_username: row.get("smtp_username")?,
            smtp_password: row.get("smtp_password")?,
            daily_limit: row.get("daily_limit")?,
            daily_sent: row.get("daily_sent")?,
            status: row.get("status")?,
            created_at: row.get("created_at")?,
            updated_at: row.get("updated_at")?,
        })
    }

    /// True when the account may be handed out by the selector.
    pub fn has_quota(&self) -> bool {
        self.status == SenderStatus::Active && self.daily_sent < self.daily_limit
    }
}

/// Fields needed to register a sending account.
#[derive(Debug, Clone)]
pub struct NewSender {
    pub tenant_id: i64,
    pub email: String,
    pub name: String,
    pub smtp_host: String,
    pub smtp_port: u16,
    pub smtp_username: String,
    /// Already encrypted.
    pub smtp_password: String,
    pub daily_limit: i64,
}

/// Inserts a new Active sender with an empty daily counter.
pub fn insert(db: &Database, sender: &NewSender) -> Result<i64, DatabaseError> {
    let now = now_timestamp();
    db.with_conn(|conn| {
        conn.execute(
            "INSERT INTO sender_accounts (tenant_id, email, name, smtp_host, smtp_port,
             smtp_username, smtp_password, daily_limit, daily_sent, status, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, 0, ?9, ?10, ?10)",
            params![
                sender.tenant_id,
                sender.email,
                sender.name,
                sender.smtp_host,
                sender.smtp_port,
                sender.smtp_username,
                sender.smtp_password,
                sender.daily_limit,
                SenderStatus::Active,
                now,
            ],
        )?;
        Ok(conn.last_insert_rowid())
    })
}

/// Finds a sender by its ID.
pub fn find_by_id(db: &Database, id: i64) -> Result<Option<SenderRow>, DatabaseError> {
    db.with_conn(|conn| {
        Ok(conn
            .query_row(
                "SELECT * FROM sender_accounts WHERE id = ?1",
                params![id],
                SenderRow::from_row,
            )
            .optional()?)
    })
}

/// Lists every sender of a tenant, newest first.
pub fn list_for_tenant(db: &Database, tenant_id: i64) -> Result<Vec<SenderRow>, DatabaseError> {
    db.with_conn(|conn| {
        let mut stmt = conn.prepare(
            "SELECT * FROM sender_accounts WHERE tenant_id = ?1 ORDER BY created_at DESC, id DESC",
        )?;
        let rows = stmt
            .query_map(params![tenant_id], SenderRow::from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    })
}

/// Lists the tenant's Active senders that still have quota, least loaded
/// (by `daily_sent / daily_limit`) first. Ties keep insertion order.
pub fn find_available(db: &Database, tenant_id: i64) -> Result<Vec<SenderRow>, DatabaseError> {
    db.with_conn(|conn| {
        let mut stmt = conn.prepare(
            "SELECT * FROM sender_accounts
             WHERE tenant_id = ?1 AND status = ?2 AND daily_sent < daily_limit
             ORDER BY CAST(daily_sent AS REAL) / daily_limit ASC, id ASC",
        )?;
        let rows = stmt
            .query_map(params![tenant_id, SenderStatus::Active], SenderRow::from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    })
}

/// Atomically takes one unit of daily quota.
///
/// Returns `false` when the sender is inactive or already at its limit,
/// including when a concurrent caller took the last unit first.
pub fn try_consume_quota(db: &Database, id: i64) -> Result<bool, DatabaseError> {
    let now = now_timestamp();
    db.with_conn(|conn| {
        let changed = conn.execute(
            "UPDATE sender_accounts
             SET daily_sent = daily_sent + 1, updated_at = ?3
             WHERE id = ?1 AND status = ?2 AND daily_sent < daily_limit",
            params![id, SenderStatus::Active, now],
        )?;
        Ok(changed == 1)
    })
}

/// Gives back a unit taken by [`try_consume_quota`]. Never goes below zero.
pub fn release_quota(db: &Database, id: i64) -> Result<(), DatabaseError> {
    let now = now_timestamp();
    db.with_conn(|conn| {
        conn.execute(
            "UPDATE sender_accounts
             SET daily_sent = daily_sent - 1, updated_at = ?2
             WHERE id = ?1 AND daily_sent > 0",
            params![id, now],
        )?;
        Ok(())
    })
}

/// Activates or deactivates a sender.
pub fn update_status(db: &Database, id: i64, status: SenderStatus) -> Result<bool, DatabaseError> {
    let now = now_timestamp();
    db.with_conn(|conn| {
        let changed = conn.execute(
            "UPDATE sender_accounts SET status = ?2, updated_at = ?3 WHERE id = ?1",
            params![id, status, now],
        )?;
        Ok(changed == 1)
    })
}

/// Zeroes every daily counter. Intended for an external daily reset job.
pub fn reset_daily_counts(db: &Database) -> Result<u64, DatabaseError> {
    let now = now_timestamp();
    db.with_conn(|conn| {
        let changed = conn.execute(
            "UPDATE sender_accounts SET daily_sent = 0, updated_at = ?1 WHERE daily_sent > 0",
            params![now],
        )?;
        Ok(changed as u64)
    })
}
