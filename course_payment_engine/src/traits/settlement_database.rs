use thiserror::Error;

use crate::{
    db_types::{Cart, CartItemRef, CartStatus, NewCart, Payout, PayoutStatus, Setting},
    notify::NotifyError,
    traits::{CartBatchOutcome, PayoutDraft, RecordManagement, RecordSearchError},
};

#[derive(Debug, Clone, Error)]
pub enum SettlementError {
    #[error("We have an internal database engine error: {0}")]
    DatabaseError(String),
    #[error("Setting default not exist! Please run api migrate setting default!")]
    LedgerNotInitialised,
    #[error("Setting default is exist")]
    LedgerAlreadyExists,
    #[error("Cart '{0}' does not exist.")]
    CartNotFound(String),
    #[error("Cart '{0}' is already completed!")]
    CartAlreadyCompleted(String),
    #[error("Invalid status change. Current cart item '{cart_no}' cannot update status: {from} -> {to}")]
    InvalidCartTransition { cart_no: String, from: CartStatus, to: CartStatus },
    #[error("Cannot update status Cart to 'New'")]
    CartTargetNew,
    #[error("You only delete cart with status 'New' or 'Cancel'")]
    CartNotDeletable,
    #[error("Course is not exist!")]
    CourseNotFound,
    #[error("Course is already in cart with status '{0}'!")]
    CourseAlreadyInCart(CartStatus),
    #[error("You cannot add courses you created to cart!")]
    OwnCourseInCart,
    #[error("You have purchased the course '{0}'!")]
    AlreadyPurchased(String),
    #[error("Purchase not found or status is not new.")]
    PurchaseNotClaimable,
    #[error("Instructor not owner purchase '{0}'")]
    PurchaseNotOwned(String),
    #[error("Purchase '{0}' already in payout list!")]
    PurchaseAlreadyClaimed(String),
    #[error("Purchase not found or status is not request_paid.")]
    PurchaseNotSettleable,
    #[error("Payout not found!")]
    PayoutNotFound,
    #[error("Payout '{0}' already completed!")]
    PayoutAlreadyCompleted(String),
    #[error("Invalid status change. Current payout item '{payout_no}' cannot update status: {from} -> {to}")]
    InvalidPayoutTransition { payout_no: String, from: PayoutStatus, to: PayoutStatus },
    #[error("Please provide instructor_id!")]
    InstructorIdRequired,
    #[error("Instructor not exist!")]
    InstructorNotFound,
    #[error("User is not found!")]
    UserNotFound,
    #[error("Only admin can update completed or rejected status.")]
    AdminOnlyTransition,
    #[error("Please enter a comment reason reject payout of instructor!")]
    RejectCommentRequired,
    #[error("Update item failed! {0}")]
    TransactionFailed(String),
    #[error("Create item failed! {0}")]
    CreateFailed(String),
    #[error("{0}")]
    RecordError(#[from] RecordSearchError),
    #[error("{0}")]
    NotificationFailed(#[from] NotifyError),
}

impl From<sqlx::Error> for SettlementError {
    fn from(e: sqlx::Error) -> Self {
        Self::DatabaseError(e.to_string())
    }
}

/// The primary trait for moving money through the platform.
///
/// Implementations guarantee that each method is atomic: either every record mutation it describes lands, or
/// none do. Business-rule violations discovered mid-batch abort the whole batch and surface as
/// [`SettlementError::TransactionFailed`] (or [`SettlementError::CreateFailed`] for payout creation), wrapping
/// the underlying violation's message.
#[allow(async_fn_in_trait)]
pub trait SettlementDatabase: Clone + RecordManagement {
    /// The database URL the backend was created against.
    fn url(&self) -> &str;

    /// Creates the ledger singleton with a zero balance and the default instructor ratio. Fails with
    /// [`SettlementError::LedgerAlreadyExists`] if it has already been bootstrapped.
    async fn bootstrap_ledger(&self) -> Result<Setting, SettlementError>;

    /// The current ledger singleton, or [`SettlementError::LedgerNotInitialised`].
    async fn fetch_ledger(&self) -> Result<Setting, SettlementError>;

    /// Adds a course to a student's cart, guarding against duplicates, completed purchases and the student's
    /// own courses.
    async fn create_cart(&self, cart: NewCart) -> Result<Cart, SettlementError>;

    /// Soft-deletes a cart item. Only `New` and `Cancel` carts may be deleted.
    async fn delete_cart(&self, cart_id: i64) -> Result<(), SettlementError>;

    /// Moves every cart in `items` to `target` in a single transaction.
    ///
    /// * Moving to `WaitingPaid` freezes the financial snapshot from the course's current price and discount.
    /// * Moving to `Completed` creates a `Purchase` per cart and credits the ledger, chaining `balance_old` /
    ///   `balance_new` across the batch.
    ///
    /// Callers must reject `target == New` before calling; backends assume the target has been vetted.
    async fn update_cart_statuses(
        &self,
        target: CartStatus,
        items: &[CartItemRef],
    ) -> Result<CartBatchOutcome, SettlementError>;

    /// Reserves the draft's purchases (`New` -> `RequestPaid`) and persists a new payout batch with its
    /// per-purchase snapshot entries, splitting the total with the ledger's current instructor ratio.
    async fn create_payout(&self, draft: PayoutDraft) -> Result<Payout, SettlementError>;

    /// Executes the financial leg of completing `payout`: debits the ledger, credits the instructor's balance,
    /// appends their payout history and completes each reserved purchase. Does *not* change the payout's own
    /// status; that is saved separately after the completion notifications.
    async fn settle_payout(&self, payout: &Payout) -> Result<(), SettlementError>;

    /// Persists `status` on the payout record.
    async fn update_payout_status(&self, payout_id: i64, status: PayoutStatus) -> Result<Payout, SettlementError>;
}
