//! The campaign sending engine.
//!
//! [`CampaignRunner`] drives one processing pass; the other modules are the
//! pieces it composes: sender selection, recipient eligibility, the pure
//! per-recipient [`decide`] policy, and the audit log. [`lifecycle`] holds
//! the external control actions.

pub mod audit;
pub mod decision;
pub mod eligibility;
pub mod error;
pub mod lifecycle;
pub mod runner;
pub mod selector;

pub use audit::AuditLog;
pub use decision::{decide, Decision};
pub use eligibility::{EligibilityFilter, RecentSends};
pub use error::{LifecycleError, RunnerError};
pub use lifecycle::{create_campaign, pause, resume, start};
pub use runner::{CampaignRunner, PassReport, RunnerOptions};
pub use selector::{least_loaded, SenderSelector};
