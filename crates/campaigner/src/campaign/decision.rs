//! Per-recipient sending policy, free of side effects.

use crate::db::{recipient_repo::RecipientRow, sender_repo::SenderRow};

use super::eligibility::RecentSends;
use super::selector::least_loaded;

/// What to do with one recipient of the current batch.
#[derive(Debug, Clone, PartialEq)]
pub enum Decision<'a> {
    /// No sender has quota left. The recipient stays eligible.
    NoSender,
    /// Mailed within the cap window; skipped without a ledger row.
    FrequencyCapped { sender: &'a SenderRow },
    Send { sender: &'a SenderRow },
}

/// Sender availability is checked before the frequency cap, so a capped
/// recipient is only reported as such when a sender was actually free.
pub fn decide<'a>(
    recipient: &RecipientRow,
    available_senders: &'a [SenderRow],
    recent_sends: &RecentSends,
) -> Decision<'a> {
    let Some(sender) = least_loaded(available_senders) else {
        return Decision::NoSender;
    };

    if recent_sends.contains(recipient.id) {
        return Decision::FrequencyCapped { sender };
    }

    Decision::Send { sender }
}
