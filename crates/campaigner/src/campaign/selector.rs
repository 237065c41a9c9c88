//! Sender pool selection under per-account daily quotas.

use crate::db::{sender_repo, sender_repo::SenderRow, Database, DatabaseError};

// Upper bound on reservation retries when other passes keep winning.
const MAX_RESERVE_ATTEMPTS: usize = 8;

/// Picks the sender with the lowest `daily_sent / daily_limit` among those
/// that still have quota. The first of equally loaded senders wins.
pub fn least_loaded(candidates: &[SenderRow]) -> Option<&SenderRow> {
    candidates
        .iter()
        .filter(|s| s.has_quota())
        .fold(None, |best: Option<&SenderRow>, s| match best {
            // a/b < c/d  <=>  a*d < c*b  for positive limits
            Some(b) if s.daily_sent * b.daily_limit >= b.daily_sent * s.daily_limit => Some(b),
            _ => Some(s),
        })
}

/// Reads candidate senders and turns a choice into a quota reservation.
#[derive(Clone)]
pub struct SenderSelector {
    db: Database,
}

impl SenderSelector {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Senders of the tenant that could take one more message right now.
    pub fn available(&self, tenant_id: i64) -> Result<Vec<SenderRow>, DatabaseError> {
        sender_repo::find_available(&self.db, tenant_id)
    }

    /// The least loaded available sender. Read-only.
    pub fn select(&self, tenant_id: i64) -> Result<Option<SenderRow>, DatabaseError> {
        let candidates = self.available(tenant_id)?;
        Ok(least_loaded(&candidates).cloned())
    }

    /// Atomically takes one unit of quota, starting with `preferred`.
    ///
    /// If another pass used up the preferred sender in the meantime, the
    /// candidates are re-read and the next least loaded one is tried.
    /// Returns the sender that was charged, or `None` when every sender is
    /// exhausted.
    ///
    /// The charged unit is refunded when the delivery claim loses to another
    /// pass or the transport rejects the message. A crash after the charge
    /// but before the claim is written loses that unit until the daily reset.
    pub fn reserve(
        &self,
        tenant_id: i64,
        preferred: &SenderRow,
    ) -> Result<Option<SenderRow>, DatabaseError> {
        let mut candidate = preferred.clone();

        for _ in 0..MAX_RESERVE_ATTEMPTS {
            if sender_repo::try_consume_quota(&self.db, candidate.id)? {
                candidate.daily_sent += 1;
                return Ok(Some(candidate));
            }

            log::debug!(
                "Sender {} lost its last quota to a concurrent pass, reselecting",
                candidate.id
            );
            match self.select(tenant_id)? {
                Some(next) => candidate = next,
                None => return Ok(None),
            }
        }

        log::warn!(
            "Gave up reserving a sender for tenant {} after {} attempts",
            tenant_id,
            MAX_RESERVE_ATTEMPTS
        );
        Ok(None)
    }
}
