use thiserror::Error;

use crate::{
    api::objects::{CartQueryFilter, LedgerSnapshot, Pagination, PayoutQueryFilter, PurchaseQueryFilter, SearchResult},
    db_types::{Cart, Course, Payout, PayoutEntry, Purchase, User, UserPayoutHistoryEntry},
};

#[derive(Debug, Clone, Error)]
pub enum RecordSearchError {
    #[error("We have an internal database engine error: {0}")]
    DatabaseError(String),
    #[error("Item is not exists.")]
    ItemNotFound,
}

impl From<sqlx::Error> for RecordSearchError {
    fn from(e: sqlx::Error) -> Self {
        Self::DatabaseError(e.to_string())
    }
}

/// The read side of a settlement backend: single-record fetches, paged searches and the ledger snapshot.
///
/// Soft-deleted rows are invisible through every method here. Role scoping (which student or instructor a
/// search is pinned to) is applied by the API layer before the filter reaches the backend.
#[allow(async_fn_in_trait)]
pub trait RecordManagement: Clone {
    async fn fetch_cart(&self, id: i64) -> Result<Option<Cart>, RecordSearchError>;

    async fn fetch_purchase(&self, id: i64) -> Result<Option<Purchase>, RecordSearchError>;

    async fn fetch_payout(&self, id: i64) -> Result<Option<Payout>, RecordSearchError>;

    async fn fetch_payout_entries(&self, payout_id: i64) -> Result<Vec<PayoutEntry>, RecordSearchError>;

    /// Fetches a user that is verified and not deleted. Unverified or deleted users are reported as absent.
    async fn fetch_active_user(&self, id: i64) -> Result<Option<User>, RecordSearchError>;

    async fn fetch_course(&self, id: i64) -> Result<Option<Course>, RecordSearchError>;

    /// Every payout the user has ever been paid, newest first.
    async fn fetch_payout_history(&self, user_id: i64) -> Result<Vec<UserPayoutHistoryEntry>, RecordSearchError>;

    /// The ledger singleton together with its transaction log, newest entries first.
    async fn ledger_snapshot(&self) -> Result<LedgerSnapshot, RecordSearchError>;

    /// Cart items matching `query`, newest first. Carts still in `New` are reported with the course's *current*
    /// price and discount rather than the stale snapshot taken at cart creation.
    async fn search_carts(
        &self,
        query: CartQueryFilter,
        pagination: Pagination,
    ) -> Result<SearchResult<Cart>, RecordSearchError>;

    async fn search_purchases(
        &self,
        query: PurchaseQueryFilter,
        pagination: Pagination,
    ) -> Result<SearchResult<Purchase>, RecordSearchError>;

    async fn search_payouts(
        &self,
        query: PayoutQueryFilter,
        pagination: Pagination,
    ) -> Result<SearchResult<Payout>, RecordSearchError>;
}
