use crate::{
    api::objects::{CartQueryFilter, LedgerSnapshot, Pagination, PayoutQueryFilter, PurchaseQueryFilter, SearchResult},
    db_types::{Actor, Cart, Payout, PayoutEntry, Purchase, Role, User, UserPayoutHistoryEntry},
    traits::{RecordManagement, RecordSearchError},
};

/// Role-scoped read access to settlement records.
///
/// Scoping happens here, before the filter reaches the backend: students only ever see their own carts and
/// purchases, instructors only the purchases and payouts belonging to them, and admins see everything.
pub struct RecordApi<B> {
    db: B,
}

impl<B: Clone> Clone for RecordApi<B> {
    fn clone(&self) -> Self {
        Self { db: self.db.clone() }
    }
}

impl<B: RecordManagement> RecordApi<B> {
    pub fn new(db: B) -> Self {
        Self { db }
    }

    pub async fn fetch_active_user(&self, id: i64) -> Result<User, RecordSearchError> {
        self.db.fetch_active_user(id).await?.ok_or(RecordSearchError::ItemNotFound)
    }

    pub async fn fetch_cart(&self, id: i64) -> Result<Cart, RecordSearchError> {
        self.db.fetch_cart(id).await?.ok_or(RecordSearchError::ItemNotFound)
    }

    pub async fn fetch_purchase(&self, id: i64) -> Result<Purchase, RecordSearchError> {
        self.db.fetch_purchase(id).await?.ok_or(RecordSearchError::ItemNotFound)
    }

    pub async fn fetch_payout_with_entries(&self, id: i64) -> Result<(Payout, Vec<PayoutEntry>), RecordSearchError> {
        let payout = self.db.fetch_payout(id).await?.ok_or(RecordSearchError::ItemNotFound)?;
        let entries = self.db.fetch_payout_entries(payout.id).await?;
        Ok((payout, entries))
    }

    pub async fn ledger_snapshot(&self) -> Result<LedgerSnapshot, RecordSearchError> {
        self.db.ledger_snapshot().await
    }

    /// The acting user's own payout history, newest first.
    pub async fn payout_history(&self, actor: Actor) -> Result<Vec<UserPayoutHistoryEntry>, RecordSearchError> {
        self.db.fetch_payout_history(actor.user_id).await
    }

    pub async fn search_carts(
        &self,
        actor: Actor,
        mut query: CartQueryFilter,
        pagination: Pagination,
    ) -> Result<SearchResult<Cart>, RecordSearchError> {
        if actor.role == Role::Student {
            query.student_id = Some(actor.user_id);
        }
        self.db.search_carts(query, pagination).await
    }

    pub async fn search_purchases(
        &self,
        actor: Actor,
        mut query: PurchaseQueryFilter,
        pagination: Pagination,
    ) -> Result<SearchResult<Purchase>, RecordSearchError> {
        match actor.role {
            Role::Admin => {},
            Role::Instructor => query.instructor_id = Some(actor.user_id),
            Role::Student => query.student_id = Some(actor.user_id),
        }
        self.db.search_purchases(query, pagination).await
    }

    pub async fn search_payouts(
        &self,
        actor: Actor,
        mut query: PayoutQueryFilter,
        pagination: Pagination,
    ) -> Result<SearchResult<Payout>, RecordSearchError> {
        if actor.role == Role::Instructor {
            query.instructor_id = Some(actor.user_id);
        }
        self.db.search_payouts(query, pagination).await
    }
}
