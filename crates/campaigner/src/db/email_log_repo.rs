//! Audit trail: the append-only `email_logs` table.

use rusqlite::{params, Row};

use super::{now_timestamp, Database, DatabaseError};
use crate::status::LogStatus;

#[derive(Debug, Clone, PartialEq)]
pub struct EmailLogRow {
    pub id: i64,
    pub campaign_id: i64,
    pub recipient_id: Option<i64>,
    pub sender_id: Option<i64>,
    pub status: LogStatus,
    pub message: Option<String>,
    pub created_at: String,
}

impl EmailLogRow {
    fn from_row(row: &Row<'_>) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            id: row.get("id")?,
            campaign_id: row.get("campaign_id")?,
            recipient_id: row.get("recipient_id")?,
            sender_id: row.get("sender_id")?,
            status: row.get("status")?,
            message: row.get("message")?,
            created_at: row.get("created_at")?,
        })
    }
}

/// One audit entry to append.
#[derive(Debug, Clone)]
pub struct NewEmailLog<'a> {
    pub campaign_id: i64,
    pub recipient_id: Option<i64>,
    pub sender_id: Option<i64>,
    pub status: LogStatus,
    pub message: &'a str,
}

pub fn insert(db: &Database, entry: &NewEmailLog<'_>) -> Result<i64, DatabaseError> {
    let now = now_timestamp();
    db.with_conn(|conn| {
        conn.execute(
            "INSERT INTO email_logs (campaign_id, recipient_id, sender_id, status, message, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                entry.campaign_id,
                entry.recipient_id,
                entry.sender_id,
                entry.status,
                entry.message,
                now,
            ],
        )?;
        Ok(conn.last_insert_rowid())
    })
}

/// Entries for a campaign in the order they were written.
pub fn list_for_campaign(db: &Database, campaign_id: i64) -> Result<Vec<EmailLogRow>, DatabaseError> {
    db.with_conn(|conn| {
        let mut stmt =
            conn.prepare("SELECT * FROM email_logs WHERE campaign_id = ?1 ORDER BY id ASC")?;
        let rows = stmt
            .query_map(params![campaign_id], EmailLogRow::from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::campaign_repo::{self, NewCampaign};
    use crate::db::{template_repo, tenant_repo};
    use crate::status::CampaignStatus;

    #[test]
    fn test_append_and_list_in_order() {
        let db = Database::open_in_memory().unwrap();
        let tenant = tenant_repo::insert(&db, "Acme", "owner@acme.test").unwrap();
        let template = template_repo::insert(&db, tenant, "T", "S", "B").unwrap();
        let campaign = campaign_repo::insert(
            &db,
            &NewCampaign {
                tenant_id: tenant,
                name: "C".to_string(),
                template_id: template,
                status: CampaignStatus::Sending,
                scheduled_date: None,
                total_recipients: 0,
            },
        )
        .unwrap();

        for (status, message) in [
            (LogStatus::Scheduled, "deferred"),
            (LogStatus::Failed, "no sender"),
        ] {
            insert(
                &db,
                &NewEmailLog {
                    campaign_id: campaign,
                    recipient_id: None,
                    sender_id: None,
                    status,
                    message,
                },
            )
            .unwrap();
        }

        let logs = list_for_campaign(&db, campaign).unwrap();
        assert_eq!(logs.len(), 2);
        assert_eq!(logs[0].status, LogStatus::Scheduled);
        assert_eq!(logs[1].message.as_deref(), Some("no sender"));
        assert!(list_for_campaign(&db, campaign + 1).unwrap().is_empty());
    }
}
