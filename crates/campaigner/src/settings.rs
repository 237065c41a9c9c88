//! Per-tenant settings: sending schedule, signature, compliance flags.
//!
//! Settings are stored as a camelCase JSON blob in `tenant_settings`. Every
//! recognised option has an explicit default, so partial blobs are fine.
//! A stored field that does not validate falls back to its own default while
//! the rest of the blob is kept. Only a blob that is not a JSON object at all
//! is treated as "no settings available", which makes the dispatcher fall
//! back to the default compliance footer.

use chrono::{DateTime, Datelike, TimeZone, Timelike, Weekday};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

use crate::db::{tenant_repo, Database, DatabaseError};

#[derive(Error, Debug)]
pub enum SettingsError {
    #[error("Invalid tenant settings: {0}")]
    Invalid(#[from] serde_json::Error),

    #[error("Invalid daily sending limit '{0}'")]
    InvalidDailyLimit(String),

    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),
}

/// When a tenant allows campaigns to send.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SendingSchedule {
    #[default]
    Anytime,
    /// Local hour in `[9, 17)`.
    BusinessHours,
    /// Monday to Friday.
    Weekdays,
    /// No gating rule exists for this policy; it always permits.
    Optimal,
}

impl SendingSchedule {
    /// Whether a pass may send at `at` (evaluated in `at`'s own offset).
    pub fn permits<Tz: TimeZone>(&self, at: &DateTime<Tz>) -> bool {
        match self {
            SendingSchedule::Anytime | SendingSchedule::Optimal => true,
            SendingSchedule::BusinessHours => (9..17).contains(&at.hour()),
            SendingSchedule::Weekdays => !matches!(at.weekday(), Weekday::Sat | Weekday::Sun),
        }
    }
}

/// Typed view of the settings blob.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TenantSettings {
    #[serde(deserialize_with = "null_as_default")]
    pub theme: String,
    #[serde(deserialize_with = "null_as_default")]
    pub default_sender_name: String,
    #[serde(deserialize_with = "null_as_default")]
    pub default_sender_email: String,
    /// HTML appended below the body when non-empty.
    #[serde(deserialize_with = "null_as_default")]
    pub email_signature: String,
    #[serde(deserialize_with = "daily_limit")]
    pub daily_sending_limit: u32,
    pub add_unsubscribe_link: bool,
    pub gdpr_compliance: bool,
    pub email_tracking_enabled: bool,
    pub link_tracking_enabled: bool,
    #[serde(deserialize_with = "null_as_default")]
    pub sending_schedule: SendingSchedule,
}

impl Default for TenantSettings {
    fn default() -> Self {
        Self {
            theme: "system".to_string(),
            default_sender_name: String::new(),
            default_sender_email: String::new(),
            email_signature: String::new(),
            daily_sending_limit: 500,
            add_unsubscribe_link: true,
            gdpr_compliance: true,
            email_tracking_enabled: true,
            link_tracking_enabled: true,
            sending_schedule: SendingSchedule::Anytime,
        }
    }
}

impl TenantSettings {
    /// Parses and validates a raw settings blob.
    pub fn from_json(raw: &str) -> Result<Self, SettingsError> {
        Ok(serde_json::from_str(raw)?)
    }

    /// Reads a stored blob field by field.
    ///
    /// Fields that fail validation keep their defaults and are returned by
    /// name. Fails only when the blob is not a JSON object.
    pub fn from_stored_json(raw: &str) -> Result<(Self, Vec<String>), SettingsError> {
        let stored: Map<String, Value> = serde_json::from_str(raw)?;
        let mut merged = match serde_json::to_value(Self::default())? {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        let mut dropped = Vec::new();

        for (key, value) in stored {
            let mut candidate = merged.clone();
            candidate.insert(key.clone(), value);
            if serde_json::from_value::<Self>(Value::Object(candidate.clone())).is_ok() {
                merged = candidate;
            } else {
                dropped.push(key);
            }
        }

        Ok((serde_json::from_value(Value::Object(merged))?, dropped))
    }

    pub fn to_json(&self) -> Result<String, SettingsError> {
        Ok(serde_json::to_string(self)?)
    }
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

// Older blobs store the limit as a string ("500").
fn daily_limit<'de, D>(deserializer: D) -> Result<u32, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Number(u32),
        Text(String),
    }

    match Option::<Raw>::deserialize(deserializer)? {
        None => Ok(500),
        Some(Raw::Number(n)) => Ok(n),
        Some(Raw::Text(s)) if s.trim().is_empty() => Ok(500),
        Some(Raw::Text(s)) => s.trim().parse().map_err(|_| {
            serde::de::Error::custom(SettingsError::InvalidDailyLimit(s.clone()))
        }),
    }
}

/// Source of tenant settings for the runner.
pub trait SettingsProvider: Send + Sync {
    /// `Ok(None)` means settings exist but could not be understood.
    /// A tenant that never saved settings gets the defaults.
    fn settings(&self, tenant_id: i64) -> Result<Option<TenantSettings>, SettingsError>;
}

/// Reads settings from the `tenant_settings` table.
#[derive(Clone)]
pub struct DbSettingsProvider {
    db: Database,
}

impl DbSettingsProvider {
    pub fn new(db: Database) -> Self {
        Self { db }
    }
}

impl SettingsProvider for DbSettingsProvider {
    fn settings(&self, tenant_id: i64) -> Result<Option<TenantSettings>, SettingsError> {
        let Some(raw) = tenant_repo::find_settings(&self.db, tenant_id)? else {
            return Ok(Some(TenantSettings::default()));
        };

        match TenantSettings::from_stored_json(&raw) {
            Ok((settings, dropped)) => {
                if !dropped.is_empty() {
                    log::warn!(
                        "Using defaults for invalid settings fields of tenant {}: {}",
                        tenant_id,
                        dropped.join(", ")
                    );
                }
                Ok(Some(settings))
            }
            Err(e) => {
                log::warn!("Ignoring unreadable settings for tenant {}: {}", tenant_id, e);
                Ok(None)
            }
        }
    }
}

/// Stores settings for a tenant, replacing any previous blob.
pub fn save_settings(
    db: &Database,
    tenant_id: i64,
    settings: &TenantSettings,
) -> Result<(), SettingsError> {
    tenant_repo::upsert_settings(db, tenant_id, &settings.to_json()?)?;
    Ok(())
}

/// Validates a raw blob (e.g. from a settings form) before storing it.
pub fn save_raw_settings(db: &Database, tenant_id: i64, raw: &str) -> Result<(), SettingsError> {
    let settings = TenantSettings::from_json(raw)?;
    save_settings(db, tenant_id, &settings)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{FixedOffset, NaiveDate};

    fn at(day: u32, hour: u32) -> DateTime<FixedOffset> {
        // 2026-03-02 is a Monday.
        let offset = FixedOffset::east_opt(2 * 3600).unwrap();
        NaiveDate::from_ymd_opt(2026, 3, day)
            .unwrap()
            .and_hms_opt(hour, 30, 0)
            .unwrap()
            .and_local_timezone(offset)
            .unwrap()
    }

    #[test]
    fn test_business_hours_window() {
        let policy = SendingSchedule::BusinessHours;
        assert!(!policy.permits(&at(2, 8)));
        assert!(policy.permits(&at(2, 9)));
        assert!(policy.permits(&at(2, 16)));
        assert!(!policy.permits(&at(2, 17)));
        assert!(!policy.permits(&at(2, 20)));
    }

    #[test]
    fn test_weekdays_policy() {
        let policy = SendingSchedule::Weekdays;
        assert!(policy.permits(&at(6, 12))); // Friday
        assert!(!policy.permits(&at(7, 12))); // Saturday
        assert!(!policy.permits(&at(8, 12))); // Sunday
    }

    #[test]
    fn test_anytime_and_optimal_always_permit() {
        for hour in [0, 8, 12, 23] {
            assert!(SendingSchedule::Anytime.permits(&at(7, hour)));
            assert!(SendingSchedule::Optimal.permits(&at(7, hour)));
        }
    }

    #[test]
    fn test_partial_blob_gets_defaults() {
        let settings = TenantSettings::from_json(r#"{"sendingSchedule":"weekdays"}"#).unwrap();
        assert_eq!(settings.sending_schedule, SendingSchedule::Weekdays);
        assert!(settings.add_unsubscribe_link);
        assert!(settings.gdpr_compliance);
        assert_eq!(settings.daily_sending_limit, 500);
        assert_eq!(settings.email_signature, "");
    }

    #[test]
    fn test_legacy_blob_with_string_limit_and_nulls() {
        let raw = r#"{
            "theme": "dark",
            "dailySendingLimit": "250",
            "emailSignature": null,
            "sendingSchedule": null,
            "addUnsubscribeLink": false,
            "gdprCompliance": false
        }"#;
        let settings = TenantSettings::from_json(raw).unwrap();
        assert_eq!(settings.daily_sending_limit, 250);
        assert_eq!(settings.email_signature, "");
        assert_eq!(settings.sending_schedule, SendingSchedule::Anytime);
        assert!(!settings.add_unsubscribe_link);
        assert!(!settings.gdpr_compliance);
    }

    #[test]
    fn test_rejects_unknown_schedule_and_bad_limit() {
        assert!(TenantSettings::from_json(r#"{"sendingSchedule":"midnight"}"#).is_err());
        assert!(TenantSettings::from_json(r#"{"dailySendingLimit":"lots"}"#).is_err());
        assert!(TenantSettings::from_json("not json").is_err());
    }

    #[test]
    fn test_provider_defaults_stored_and_unreadable() {
        let db = Database::open_in_memory().unwrap();
        let tenant = tenant_repo::insert(&db, "Acme", "owner@acme.test").unwrap();
        let provider = DbSettingsProvider::new(db.clone());

        assert_eq!(
            provider.settings(tenant).unwrap(),
            Some(TenantSettings::default())
        );

        let custom = TenantSettings {
            email_signature: "<b>Acme</b>".to_string(),
            sending_schedule: SendingSchedule::BusinessHours,
            ..Default::default()
        };
        save_settings(&db, tenant, &custom).unwrap();
        assert_eq!(provider.settings(tenant).unwrap(), Some(custom));

        tenant_repo::upsert_settings(&db, tenant, "not json").unwrap();
        assert_eq!(provider.settings(tenant).unwrap(), None);

        tenant_repo::upsert_settings(&db, tenant, "[1, 2]").unwrap();
        assert_eq!(provider.settings(tenant).unwrap(), None);
    }

    #[test]
    fn test_invalid_field_keeps_the_rest_of_the_blob() {
        let raw = r#"{
            "emailSignature": "<b>Acme</b>",
            "dailySendingLimit": "lots",
            "sendingSchedule": 42,
            "gdprCompliance": false
        }"#;
        let (settings, mut dropped) = TenantSettings::from_stored_json(raw).unwrap();
        dropped.sort();

        assert_eq!(dropped, vec!["dailySendingLimit", "sendingSchedule"]);
        assert_eq!(settings.email_signature, "<b>Acme</b>");
        assert!(!settings.gdpr_compliance);
        assert_eq!(settings.daily_sending_limit, 500);
        assert_eq!(settings.sending_schedule, SendingSchedule::Anytime);

        let db = Database::open_in_memory().unwrap();
        let tenant = tenant_repo::insert(&db, "Acme", "owner@acme.test").unwrap();
        tenant_repo::upsert_settings(&db, tenant, raw).unwrap();
        let provided = DbSettingsProvider::new(db).settings(tenant).unwrap().unwrap();
        assert_eq!(provided, settings);
    }

    #[test]
    fn test_save_raw_settings_validates_first() {
        let db = Database::open_in_memory().unwrap();
        let tenant = tenant_repo::insert(&db, "Acme", "owner@acme.test").unwrap();

        assert!(save_raw_settings(&db, tenant, r#"{"sendingSchedule":"soon"}"#).is_err());
        assert!(tenant_repo::find_settings(&db, tenant).unwrap().is_none());

        save_raw_settings(&db, tenant, r#"{"gdprCompliance":false}"#).unwrap();
        let stored = tenant_repo::find_settings(&db, tenant).unwrap().unwrap();
        assert!(stored.contains("\"sendingSchedule\":\"anytime\""));
    }
}
