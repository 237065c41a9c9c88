//! Tenant repository: the `tenants` and `tenant_settings` tables.

use rusqlite::{params, OptionalExtension, Row};

use super::{now_timestamp, Database, DatabaseError};

/// A raw tenant row from the database.
#[derive(Debug, Clone)]
pub struct TenantRow {
    pub id: i64,
    pub name: String,
    pub email: String,
    pub created_at: String,
    pub updated_at: String,
}

impl TenantRow {
    fn from_row(row: &Row<'_>) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            id: row.get("id")?,
            name: row.get("name")?,
            email: row.get("email")?,
            created_at: row.get("created_at")?,
            updated_at: row.get("updated_at")?,
        })
    }
}

/// Inserts a new tenant and returns its id.
pub fn insert(db: &Database, name: &str, email: &str) -> Result<i64, DatabaseError> {
    let now = now_timestamp();
    db.with_conn(|conn| {
        conn.execute(
            "INSERT INTO tenants (name, email, created_at, updated_at) VALUES (?1, ?2, ?3, ?3)",
            params![name, email, now],
        )?;
        Ok(conn.last_insert_rowid())
    })
}

/// Finds a tenant by its ID.
pub fn find_by_id(db: &Database, id: i64) -> Result<Option<TenantRow>, DatabaseError> {
    db.with_conn(|conn| {
        Ok(conn
            .query_row(
                "SELECT * FROM tenants WHERE id = ?1",
                params![id],
                TenantRow::from_row,
            )
            .optional()?)
    })
}

/// Returns the raw settings blob for a tenant, if one was ever saved.
pub fn find_settings(db: &Database, tenant_id: i64) -> Result<Option<String>, DatabaseError> {
    db.with_conn(|conn| {
        Ok(conn
            .query_row(
                "SELECT settings FROM tenant_settings WHERE tenant_id = ?1",
                params![tenant_id],
                |r| r.get(0),
            )
            .optional()?)
    })
}

/// Inserts or replaces the settings blob for a tenant.
pub fn upsert_settings(db: &Database, tenant_id: i64, settings: &str) -> Result<(), DatabaseError> {
    let now = now_timestamp();
    db.with_conn(|conn| {
        conn.execute(
            "INSERT INTO tenant_settings (tenant_id, settings, updated_at) VALUES (?1, ?2, ?3)
             ON CONFLICT(tenant_id) DO UPDATE SET settings = ?2, updated_at = ?3",
            params![tenant_id, settings, now],
        )?;
        Ok(())
    })
}
