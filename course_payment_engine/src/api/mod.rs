//! The public API layer of the settlement engine.
//!
//! [`SettlementApi`] orchestrates the state-changing flows (carts, payouts, ledger bootstrap) on top of a
//! [`SettlementDatabase`](crate::traits::SettlementDatabase) backend and a
//! [`Notifier`](crate::notify::Notifier), applying the role rules and sending the flow notifications.
//! [`RecordApi`] serves the read paths with role-based scoping. [`objects`] holds the query filter and
//! paging types shared with HTTP front-ends.

pub mod objects;
mod record_api;
mod settlement_api;

pub use record_api::RecordApi;
pub use settlement_api::SettlementApi;
