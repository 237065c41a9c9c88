//! Which recipients a campaign may still mail.

use std::collections::HashSet;

use chrono::{DateTime, Duration, Utc};

use crate::db::{delivery_repo, recipient_repo, recipient_repo::RecipientRow, Database, DatabaseError};

/// Recipients with a send newer than the frequency cap window.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecentSends {
    recipients: HashSet<i64>,
}

impl RecentSends {
    pub fn contains(&self, recipient_id: i64) -> bool {
        self.recipients.contains(&recipient_id)
    }
}

impl FromIterator<i64> for RecentSends {
    fn from_iter<I: IntoIterator<Item = i64>>(iter: I) -> Self {
        Self {
            recipients: iter.into_iter().collect(),
        }
    }
}

/// Batch query plus the frequency-cap lookup.
#[derive(Clone)]
pub struct EligibilityFilter {
    db: Database,
    frequency_cap: Duration,
}

impl EligibilityFilter {
    pub fn new(db: Database, frequency_cap: Duration) -> Self {
        Self { db, frequency_cap }
    }

    /// Up to `limit` Active recipients of the tenant that have no ledger row
    /// for this campaign yet, leaving out those this campaign already skipped
    /// and that are still inside the cap window ending at `now`.
    pub fn next_batch(
        &self,
        campaign_id: i64,
        tenant_id: i64,
        limit: u32,
        now: DateTime<Utc>,
    ) -> Result<Vec<RecipientRow>, DatabaseError> {
        recipient_repo::find_eligible(
            &self.db,
            campaign_id,
            tenant_id,
            limit,
            now - self.frequency_cap,
        )
    }

    /// Whether any recipient still lacks a ledger row, capped ones included.
    pub fn has_pending(&self, campaign_id: i64, tenant_id: i64) -> Result<bool, DatabaseError> {
        Ok(recipient_repo::count_eligible(&self.db, campaign_id, tenant_id)? > 0)
    }

    /// Which of `recipient_ids` were sent anything, by any campaign, within
    /// the cap window ending at `now`.
    pub fn recent_sends(
        &self,
        recipient_ids: &[i64],
        now: DateTime<Utc>,
    ) -> Result<RecentSends, DatabaseError> {
        let since = now - self.frequency_cap;
        let ids = delivery_repo::find_recently_sent(&self.db, recipient_ids, since)?;
        Ok(ids.into_iter().collect())
    }
}
