//! Template repository: the `templates` table.

use rusqlite::{params, OptionalExtension, Row};

use super::{now_timestamp, Database, DatabaseError};

/// A reusable subject/body pair.
#[derive(Debug, Clone, PartialEq)]
pub struct TemplateRow {
    pub id: i64,
    pub tenant_id: i64,
    pub name: String,
    pub subject: String,
    /// HTML body, sent as-is before the compliance footer is appended.
    pub content: String,
    pub created_at: String,
    pub updated_at: String,
}

impl TemplateRow {
    fn from_row(row: &Row<'_>) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            id: row.get("id")?,
            tenant_id: row.get("tenant_id")?,
            name: row.get("name")?,
            subject: row.get("subject")?,
            content: row.get("content")?,
            created_at: row.get("created_at")?,
            updated_at: row.get("updated_at")?,
        })
    }
}

pub fn insert(
    db: &Database,
    tenant_id: i64,
    name: &str,
    subject: &str,
    content: &str,
) -> Result<i64, DatabaseError> {
    let now = now_timestamp();
    db.with_conn(|conn| {
        conn.execute(
            "INSERT INTO templates (tenant_id, name, subject, content, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?5)",
            params![tenant_id, name, subject, content, now],
        )?;
        Ok(conn.last_insert_rowid())
    })
}

pub fn find_by_id(db: &Database, id: i64) -> Result<Option<TemplateRow>, DatabaseError> {
    db.with_conn(|conn| {
        Ok(conn
            .query_row(
                "SELECT * FROM templates WHERE id = ?1",
                params![id],
                TemplateRow::from_row,
            )
            .optional()?)
    })
}

/// Replaces subject and body. Campaigns already sending pick up the new
/// content on their next pass.
pub fn update(db: &Database, id: i64, subject: &str, content: &str) -> Result<bool, DatabaseError> {
    let now = now_timestamp();
    db.with_conn(|conn| {
        let changed = conn.execute(
            "UPDATE templates SET subject = ?2, content = ?3, updated_at = ?4 WHERE id = ?1",
            params![id, subject, content, now],
        )?;
        Ok(changed == 1)
    })
}
