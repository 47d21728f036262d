use serde::{Deserialize, Serialize};

use crate::db_types::Purchase;

/// The result of a successful cart batch transition.
///
/// Course names are collected for the post-commit notification; the purchases are the records created when the
/// batch target was `Completed` (empty otherwise).
#[derive(Debug, Clone, Default)]
pub struct CartBatchOutcome {
    pub course_names: Vec<String>,
    pub purchases: Vec<Purchase>,
}

/// A payout creation request after the acting user has been resolved to a concrete instructor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PayoutDraft {
    pub instructor_id: i64,
    pub purchase_ids: Vec<i64>,
}
