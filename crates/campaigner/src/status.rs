//! Enumerated status types stored as text columns.
//!
//! Every status column in the record store maps onto one of these enums.
//! Unknown strings are rejected when a row is decoded.

use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use thiserror::Error;

/// A status string that does not name any known variant.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Unknown {kind} status '{value}'")]
pub struct UnknownStatus {
    pub kind: &'static str,
    pub value: String,
}

macro_rules! text_status {
    ($name:ident, $kind:literal { $($variant:ident => $text:literal),+ $(,)? }) => {
        impl $name {
            /// Storage representation.
            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $text),+
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl std::str::FromStr for $name {
            type Err = UnknownStatus;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($text => Ok($name::$variant),)+
                    other => Err(UnknownStatus {
                        kind: $kind,
                        value: other.to_string(),
                    }),
                }
            }
        }

        impl ToSql for $name {
            fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
                Ok(ToSqlOutput::from(self.as_str()))
            }
        }

        impl FromSql for $name {
            fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
                value
                    .as_str()?
                    .parse()
                    .map_err(|e| FromSqlError::Other(Box::new(e)))
            }
        }
    };
}

/// Whether a sending account may be picked by the selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SenderStatus {
    Active,
    Inactive,
}

text_status!(SenderStatus, "sender" {
    Active => "Active",
    Inactive => "Inactive",
});

/// Deliverability state of a recipient. Only `Active` recipients are mailed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecipientStatus {
    Active,
    Unsubscribed,
    Bounced,
}

text_status!(RecipientStatus, "recipient" {
    Active => "Active",
    Unsubscribed => "Unsubscribed",
    Bounced => "Bounced",
});

/// Campaign lifecycle.
///
/// ```text
/// Draft ──┐
///         ├──> Sending ──> Completed
/// Scheduled┘     │  ^
///                v  │
///               Paused
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CampaignStatus {
    Draft,
    Scheduled,
    Sending,
    Paused,
    Completed,
}

text_status!(CampaignStatus, "campaign" {
    Draft => "Draft",
    Scheduled => "Scheduled",
    Sending => "Sending",
    Paused => "Paused",
    Completed => "Completed",
});

impl CampaignStatus {
    /// States reachable from `self` in one step.
    pub fn allowed_transitions(self) -> &'static [CampaignStatus] {
        use CampaignStatus::*;
        match self {
            Draft => &[Scheduled, Sending],
            Scheduled => &[Sending],
            Sending => &[Paused, Completed],
            Paused => &[Sending],
            Completed => &[],
        }
    }

    pub fn can_transition_to(self, next: CampaignStatus) -> bool {
        self.allowed_transitions().contains(&next)
    }

    pub fn is_terminal(self) -> bool {
        self.allowed_transitions().is_empty()
    }
}

/// Per-recipient journey inside one campaign (`campaign_recipients.status`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeliveryStatus {
    Pending,
    Sending,
    Sent,
    Failed,
    Skipped,
}

text_status!(DeliveryStatus, "delivery" {
    Pending => "Pending",
    Sending => "Sending",
    Sent => "Sent",
    Failed => "Failed",
    Skipped => "Skipped",
});

/// Outcome tag written to the audit log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LogStatus {
    Sent,
    Failed,
    Skipped,
    Scheduled,
}

text_status!(LogStatus, "log" {
    Sent => "Sent",
    Failed => "Failed",
    Skipped => "Skipped",
    Scheduled => "Scheduled",
});

#[cfg(test)]
mod tests {
    use super::*;

    const ALL_CAMPAIGN: [CampaignStatus; 5] = [
        CampaignStatus::Draft,
        CampaignStatus::Scheduled,
        CampaignStatus::Sending,
        CampaignStatus::Paused,
        CampaignStatus::Completed,
    ];

    #[test]
    fn test_campaign_transition_table() {
        use CampaignStatus::*;
        let allowed = [
            (Draft, Scheduled),
            (Draft, Sending),
            (Scheduled, Sending),
            (Sending, Paused),
            (Sending, Completed),
            (Paused, Sending),
        ];

        for from in ALL_CAMPAIGN {
            for to in ALL_CAMPAIGN {
                assert_eq!(
                    from.can_transition_to(to),
                    allowed.contains(&(from, to)),
                    "{} -> {}",
                    from,
                    to
                );
            }
        }
    }

    #[test]
    fn test_completed_is_terminal() {
        assert!(CampaignStatus::Completed.is_terminal());
        assert!(!CampaignStatus::Paused.is_terminal());
    }

    #[test]
    fn test_parse_rejects_unknown_and_lowercase() {
        let err = "sending".parse::<CampaignStatus>().unwrap_err();
        assert_eq!(err.kind, "campaign");
        assert_eq!(err.value, "sending");
        assert!("Archived".parse::<DeliveryStatus>().is_err());
    }

    #[test]
    fn test_status_text_round_trip_through_sqlite() {
        let conn = rusqlite::Connection::open_in_memory().unwrap();
        conn.execute_batch("CREATE TABLE t (s TEXT NOT NULL);").unwrap();
        conn.execute("INSERT INTO t (s) VALUES (?1)", [RecipientStatus::Bounced])
            .unwrap();

        let raw: String = conn.query_row("SELECT s FROM t", [], |r| r.get(0)).unwrap();
        assert_eq!(raw, "Bounced");
        let typed: RecipientStatus = conn.query_row("SELECT s FROM t", [], |r| r.get(0)).unwrap();
        assert_eq!(typed, RecipientStatus::Bounced);
    }

    #[test]
    fn test_unknown_stored_value_fails_decoding() {
        let conn = rusqlite::Connection::open_in_memory().unwrap();
        let result: rusqlite::Result<SenderStatus> =
            conn.query_row("SELECT 'Suspended'", [], |r| r.get(0));
        assert!(result.is_err());
    }
}
