//! `SqliteDatabase` is a concrete implementation of a course payment engine backend.
//!
//! Unsurprisingly, it uses SQLite as the backend and implements all the traits defined in the [`crate::traits`]
//! module. The multi-record flows (cart batches, payout creation, payout settlement) each run inside a single
//! transaction; a business-rule violation anywhere in a batch rolls the whole batch back.
use std::fmt::Debug;

use cpg_common::Money;
use log::*;
use sqlx::{SqliteConnection, SqlitePool};

use super::db::{carts, courses, db_url, ledger, new_pool, payouts, purchases, users};
use crate::{
    api::objects::{CartQueryFilter, LedgerSnapshot, Pagination, PayoutQueryFilter, PurchaseQueryFilter, SearchResult},
    db_types::{
        Cart,
        CartItemRef,
        CartStatus,
        Course,
        NewCart,
        Payout,
        PayoutEntry,
        PayoutStatus,
        Purchase,
        PurchaseStatus,
        Setting,
        User,
        UserPayoutHistoryEntry,
    },
    helpers::{generate_record_no, RecordNoPrefix},
    traits::{
        CartBatchOutcome,
        PayoutDraft,
        RecordManagement,
        RecordSearchError,
        SettlementDatabase,
        SettlementError,
    },
};

#[derive(Clone)]
pub struct SqliteDatabase {
    url: String,
    pool: SqlitePool,
}

impl Debug for SqliteDatabase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "SqliteDatabase ({:?})", self.pool)
    }
}

impl SqliteDatabase {
    /// Connects using the URL from the `CPG_DATABASE_URL` environment variable.
    pub async fn new(max_connections: u32) -> Result<Self, sqlx::Error> {
        let url = db_url();
        Self::new_with_url(&url, max_connections).await
    }

    pub async fn new_with_url(url: &str, max_connections: u32) -> Result<Self, sqlx::Error> {
        let pool = new_pool(url, max_connections).await?;
        Ok(Self { url: url.to_string(), pool })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

impl SettlementDatabase for SqliteDatabase {
    fn url(&self) -> &str {
        self.url.as_str()
    }

    async fn bootstrap_ledger(&self) -> Result<Setting, SettlementError> {
        let mut conn = self.pool.acquire().await?;
        if ledger::fetch_setting(&mut conn).await?.is_some() {
            return Err(SettlementError::LedgerAlreadyExists);
        }
        let setting = ledger::create_default_setting(&mut conn).await?;
        info!("🗃️ Ledger singleton created with id {}", setting.id);
        Ok(setting)
    }

    async fn fetch_ledger(&self) -> Result<Setting, SettlementError> {
        let mut conn = self.pool.acquire().await?;
        ledger::fetch_setting(&mut conn).await?.ok_or(SettlementError::LedgerNotInitialised)
    }

    async fn create_cart(&self, cart: NewCart) -> Result<Cart, SettlementError> {
        let mut conn = self.pool.acquire().await?;
        let course =
            courses::fetch_active_course(cart.course_id, &mut conn).await?.ok_or(SettlementError::CourseNotFound)?;
        if course.user_id == cart.student_id {
            return Err(SettlementError::OwnCourseInCart);
        }
        if purchases::purchase_exists_for_course_and_student(cart.course_id, cart.student_id, &mut conn).await? {
            return Err(SettlementError::AlreadyPurchased(course.name));
        }
        if let Some(existing) = carts::cart_for_course_and_student(cart.course_id, cart.student_id, &mut conn).await? {
            return Err(SettlementError::CourseAlreadyInCart(existing.status));
        }
        let cart_no = generate_record_no(RecordNoPrefix::Cart);
        let cart = carts::insert_cart(&cart_no, &course, cart.student_id, &mut conn).await?;
        Ok(cart)
    }

    async fn delete_cart(&self, cart_id: i64) -> Result<(), SettlementError> {
        let mut conn = self.pool.acquire().await?;
        let cart = carts::fetch_cart(cart_id, &mut conn)
            .await
            .map_err(RecordSearchError::from)?
            .ok_or(RecordSearchError::ItemNotFound)?;
        if !matches!(cart.status, CartStatus::New | CartStatus::Cancel) {
            return Err(SettlementError::CartNotDeletable);
        }
        carts::soft_delete(cart.id, &mut conn).await?;
        debug!("🛒️ Cart [{}] soft-deleted", cart.cart_no);
        Ok(())
    }

    async fn update_cart_statuses(
        &self,
        target: CartStatus,
        items: &[CartItemRef],
    ) -> Result<CartBatchOutcome, SettlementError> {
        let mut tx = self.pool.begin().await?;
        match cart_batch(target, items, &mut tx).await {
            Ok(outcome) => {
                tx.commit().await?;
                Ok(outcome)
            },
            Err(e) => {
                debug!("🛒️ Cart batch to {target} aborted. {e}");
                tx.rollback().await.ok();
                Err(SettlementError::TransactionFailed(e.to_string()))
            },
        }
    }

    async fn create_payout(&self, draft: PayoutDraft) -> Result<Payout, SettlementError> {
        let mut tx = self.pool.begin().await?;
        match payout_batch(&draft, &mut tx).await {
            Ok(payout) => {
                tx.commit().await?;
                Ok(payout)
            },
            Err(e) => {
                debug!("💰️ Payout creation for instructor {} aborted. {e}", draft.instructor_id);
                tx.rollback().await.ok();
                Err(SettlementError::CreateFailed(e.to_string()))
            },
        }
    }

    async fn settle_payout(&self, payout: &Payout) -> Result<(), SettlementError> {
        let mut tx = self.pool.begin().await?;
        match settle(payout, &mut tx).await {
            Ok(()) => {
                tx.commit().await?;
                Ok(())
            },
            Err(e) => {
                debug!("💰️ Settlement of payout [{}] aborted. {e}", payout.payout_no);
                tx.rollback().await.ok();
                Err(SettlementError::TransactionFailed(e.to_string()))
            },
        }
    }

    async fn update_payout_status(&self, payout_id: i64, status: PayoutStatus) -> Result<Payout, SettlementError> {
        let mut conn = self.pool.acquire().await?;
        payouts::update_status(payout_id, status, &mut conn).await?.ok_or(SettlementError::PayoutNotFound)
    }
}

/// The body of the cart batch transaction. Every guard violation aborts the whole batch.
async fn cart_batch(
    target: CartStatus,
    items: &[CartItemRef],
    conn: &mut SqliteConnection,
) -> Result<CartBatchOutcome, SettlementError> {
    ledger::fetch_setting(conn).await?.ok_or(SettlementError::LedgerNotInitialised)?;
    let mut outcome = CartBatchOutcome::default();
    for item in items {
        let cart =
            carts::fetch_cart(item.id, conn).await?.ok_or_else(|| SettlementError::CartNotFound(item.cart_no.clone()))?;
        if cart.status == CartStatus::Completed {
            return Err(SettlementError::CartAlreadyCompleted(item.cart_no.clone()));
        }
        if !CartStatus::is_valid_transition(cart.status, target) {
            return Err(SettlementError::InvalidCartTransition {
                cart_no: item.cart_no.clone(),
                from: cart.status,
                to: target,
            });
        }
        let course = courses::fetch_active_course(cart.course_id, conn).await?.ok_or(SettlementError::CourseNotFound)?;
        outcome.course_names.push(course.name.clone());
        if target == CartStatus::WaitingPaid {
            let price_paid = course.price.apply_discount(course.discount);
            carts::freeze_pricing(cart.id, course.price, course.discount, price_paid, conn).await?;
        }
        let cart = carts::update_status(cart.id, target, conn).await?;
        if target == CartStatus::Completed {
            if purchases::purchase_exists_for_course_and_student(cart.course_id, cart.student_id, conn).await? {
                return Err(SettlementError::AlreadyPurchased(course.name));
            }
            let purchase_no = generate_record_no(RecordNoPrefix::Purchase);
            let purchase = purchases::insert_purchase(&purchase_no, &cart, conn).await?;
            ledger::credit_sale(cart.price_paid, purchase.id, cart.instructor_id, conn).await?;
            outcome.purchases.push(purchase);
        }
    }
    Ok(outcome)
}

/// The body of the payout creation transaction: claim each purchase, then persist the batch and its
/// per-purchase snapshots.
async fn payout_batch(draft: &PayoutDraft, conn: &mut SqliteConnection) -> Result<Payout, SettlementError> {
    let setting = ledger::fetch_setting(conn).await?.ok_or(SettlementError::LedgerNotInitialised)?;
    let mut claimed = Vec::with_capacity(draft.purchase_ids.len());
    for &purchase_id in &draft.purchase_ids {
        let purchase = purchases::fetch_purchase_with_status(purchase_id, PurchaseStatus::New, conn)
            .await?
            .ok_or(SettlementError::PurchaseNotClaimable)?;
        if purchase.instructor_id != draft.instructor_id {
            return Err(SettlementError::PurchaseNotOwned(purchase.purchase_no));
        }
        if purchases::claimed_in_payout(purchase.id, conn).await? {
            return Err(SettlementError::PurchaseAlreadyClaimed(purchase.purchase_no));
        }
        let purchase = purchases::update_status(purchase.id, PurchaseStatus::RequestPaid, conn).await?;
        claimed.push(purchase);
    }
    let balance_origin: Money = claimed.iter().map(|p| p.price_paid).sum();
    let (received, retained) = balance_origin.split_for_ratio(setting.instructor_ratio);
    let payout_no = generate_record_no(RecordNoPrefix::Payout);
    let payout = payouts::insert_payout(
        &payout_no,
        draft.instructor_id,
        setting.instructor_ratio,
        balance_origin,
        retained,
        received,
        conn,
    )
    .await?;
    for purchase in &claimed {
        payouts::insert_entry(payout.id, purchase, conn).await?;
    }
    Ok(payout)
}

/// The body of the payout settlement transaction. The payout's own status is deliberately untouched here; it
/// is saved by the caller after the completion notifications have gone out.
async fn settle(payout: &Payout, conn: &mut SqliteConnection) -> Result<(), SettlementError> {
    ledger::debit_payout(
        payout.balance_instructor_received,
        payout.id,
        payout.instructor_id,
        payout.instructor_ratio,
        conn,
    )
    .await?;
    users::credit_balance(payout.instructor_id, payout.balance_instructor_received, conn).await?;
    users::append_payout_history(
        payout.instructor_id,
        payout.id,
        &payout.payout_no,
        payout.balance_instructor_received,
        conn,
    )
    .await?;
    let entries = payouts::entries_for_payout(payout.id, conn).await?;
    for entry in entries {
        let purchase = purchases::fetch_purchase_with_status(entry.purchase_id, PurchaseStatus::RequestPaid, conn)
            .await?
            .ok_or(SettlementError::PurchaseNotSettleable)?;
        purchases::update_status(purchase.id, PurchaseStatus::Completed, conn).await?;
    }
    Ok(())
}

impl RecordManagement for SqliteDatabase {
    async fn fetch_cart(&self, id: i64) -> Result<Option<Cart>, RecordSearchError> {
        let mut conn = self.pool.acquire().await?;
        Ok(carts::fetch_cart(id, &mut conn).await?)
    }

    async fn fetch_purchase(&self, id: i64) -> Result<Option<Purchase>, RecordSearchError> {
        let mut conn = self.pool.acquire().await?;
        Ok(purchases::fetch_purchase(id, &mut conn).await?)
    }

    async fn fetch_payout(&self, id: i64) -> Result<Option<Payout>, RecordSearchError> {
        let mut conn = self.pool.acquire().await?;
        Ok(payouts::fetch_payout(id, &mut conn).await?)
    }

    async fn fetch_payout_entries(&self, payout_id: i64) -> Result<Vec<PayoutEntry>, RecordSearchError> {
        let mut conn = self.pool.acquire().await?;
        Ok(payouts::entries_for_payout(payout_id, &mut conn).await?)
    }

    async fn fetch_active_user(&self, id: i64) -> Result<Option<User>, RecordSearchError> {
        let mut conn = self.pool.acquire().await?;
        Ok(users::fetch_active_user(id, &mut conn).await?)
    }

    async fn fetch_course(&self, id: i64) -> Result<Option<Course>, RecordSearchError> {
        let mut conn = self.pool.acquire().await?;
        Ok(courses::fetch_course(id, &mut conn).await?)
    }

    async fn fetch_payout_history(&self, user_id: i64) -> Result<Vec<UserPayoutHistoryEntry>, RecordSearchError> {
        let mut conn = self.pool.acquire().await?;
        Ok(users::payout_history(user_id, &mut conn).await?)
    }

    async fn ledger_snapshot(&self) -> Result<LedgerSnapshot, RecordSearchError> {
        let mut conn = self.pool.acquire().await?;
        let setting = ledger::fetch_setting(&mut conn).await?.ok_or(RecordSearchError::ItemNotFound)?;
        let transactions = ledger::entries_newest_first(&mut conn).await?;
        Ok(LedgerSnapshot { setting, transactions })
    }

    async fn search_carts(
        &self,
        query: CartQueryFilter,
        pagination: Pagination,
    ) -> Result<SearchResult<Cart>, RecordSearchError> {
        let mut conn = self.pool.acquire().await?;
        let (items, total_items) = carts::search_carts(&query, pagination, &mut conn).await?;
        Ok(SearchResult::new(items, pagination, total_items))
    }

    async fn search_purchases(
        &self,
        query: PurchaseQueryFilter,
        pagination: Pagination,
    ) -> Result<SearchResult<Purchase>, RecordSearchError> {
        let mut conn = self.pool.acquire().await?;
        let (items, total_items) = purchases::search_purchases(&query, pagination, &mut conn).await?;
        Ok(SearchResult::new(items, pagination, total_items))
    }

    async fn search_payouts(
        &self,
        query: PayoutQueryFilter,
        pagination: Pagination,
    ) -> Result<SearchResult<Payout>, RecordSearchError> {
        let mut conn = self.pool.acquire().await?;
        let (items, total_items) = payouts::search_payouts(&query, pagination, &mut conn).await?;
        Ok(SearchResult::new(items, pagination, total_items))
    }
}
