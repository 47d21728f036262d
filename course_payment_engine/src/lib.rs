//! Course Payment Engine
//!
//! The settlement core of the course marketplace: the cart, purchase and payout state machines, and the
//! transactional balance-transfer logic that connects them to the platform ledger.
//!
//! The library is divided into two main sections:
//! 1. Database management and control ([`mod@sqlite`]). SQLite is the supported backend. You should never need to
//!    access the database directly. Instead, use the public flow APIs. The exception is the data types used in the
//!    database, which are defined in the [`db_types`] module and are public.
//! 2. The public flow APIs ([`mod@api`]). [`api::SettlementApi`] drives every status transition (cart batches, payout
//!    creation and approval) and the post-commit notifications they trigger; [`api::RecordApi`] serves the role-scoped
//!    read paths. Backends implement the traits in [`mod@traits`] to plug in underneath.

pub mod api;
pub mod db_types;
pub mod helpers;
pub mod notify;
pub mod traits;

#[cfg(any(feature = "test_utils", test))]
pub mod test_utils;

#[cfg(feature = "sqlite")]
mod sqlite;

#[cfg(feature = "sqlite")]
pub use sqlite::SqliteDatabase;

pub use api::{objects, RecordApi, SettlementApi};
pub use traits::{RecordManagement, SettlementDatabase, SettlementError};
