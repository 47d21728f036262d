//! # Database management and control.
//!
//! This module provides the interfaces that define the contracts of the settlement engine database *backends*.
//!
//! ## Traits
//! * [`SettlementDatabase`] defines the state-changing settlement flows: cart batch transitions, payout creation
//!   and settlement, and the ledger bootstrap. Every method that touches more than one record runs as a single
//!   atomic transaction on the backend.
//! * [`RecordManagement`] provides the read paths: record fetches, role-scoped searches and the ledger snapshot.

mod data_objects;
mod record_management;
mod settlement_database;

pub use data_objects::{CartBatchOutcome, PayoutDraft};
pub use record_management::{RecordManagement, RecordSearchError};
pub use settlement_database::{SettlementDatabase, SettlementError};
