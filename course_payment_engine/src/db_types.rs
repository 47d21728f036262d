use std::{fmt::Display, str::FromStr};

use chrono::{DateTime, Utc};
use log::error;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, Type};
use thiserror::Error;

pub use cpg_common::Money;

#[derive(Debug, Clone, Error)]
#[error("{0}")]
pub struct ConversionError(String);

//--------------------------------------        Role        ---------------------------------------------------------
/// The role a platform user acts under. Roles gate both HTTP routes and the payout approval workflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Instructor,
    Student,
}

impl Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::Admin => write!(f, "Admin"),
            Role::Instructor => write!(f, "Instructor"),
            Role::Student => write!(f, "Student"),
        }
    }
}

impl FromStr for Role {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Admin" | "admin" => Ok(Self::Admin),
            "Instructor" | "instructor" => Ok(Self::Instructor),
            "Student" | "student" => Ok(Self::Student),
            s => Err(ConversionError(format!("Invalid role: {s}"))),
        }
    }
}

/// The authenticated caller of a settlement operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub user_id: i64,
    pub role: Role,
}

impl Actor {
    pub fn new(user_id: i64, role: Role) -> Self {
        Self { user_id, role }
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

//--------------------------------------     CartStatus     ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CartStatus {
    /// The cart item has been created and the student has not committed to a price yet.
    New,
    /// The student has committed to buy. The financial snapshot is frozen at this point.
    WaitingPaid,
    /// Payment went through. Terminal; creates a Purchase and credits the ledger.
    Completed,
    /// The student backed out. May return to `WaitingPaid` on a renewed attempt.
    Cancel,
}

impl CartStatus {
    /// The explicit whitelist of permitted cart transitions. Any pair not listed here is rejected.
    pub fn is_valid_transition(from: CartStatus, to: CartStatus) -> bool {
        use CartStatus::*;
        matches!((from, to), (New, WaitingPaid) | (Cancel, WaitingPaid) | (WaitingPaid, Completed) | (WaitingPaid, Cancel))
    }
}

impl Display for CartStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CartStatus::New => write!(f, "New"),
            CartStatus::WaitingPaid => write!(f, "WaitingPaid"),
            CartStatus::Completed => write!(f, "Completed"),
            CartStatus::Cancel => write!(f, "Cancel"),
        }
    }
}

impl FromStr for CartStatus {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "New" => Ok(Self::New),
            "WaitingPaid" => Ok(Self::WaitingPaid),
            "Completed" => Ok(Self::Completed),
            "Cancel" => Ok(Self::Cancel),
            s => Err(ConversionError(format!("Invalid cart status: {s}"))),
        }
    }
}

impl From<String> for CartStatus {
    fn from(value: String) -> Self {
        value.parse().unwrap_or_else(|_| {
            error!("Invalid cart status: {value}. But this conversion cannot fail. Defaulting to New");
            CartStatus::New
        })
    }
}

//--------------------------------------   PurchaseStatus   ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PurchaseStatus {
    /// Sold, but not yet claimed by any payout.
    New,
    /// Included in a pending payout batch.
    RequestPaid,
    /// The payout that included it has been paid out. Terminal.
    Completed,
}

impl Display for PurchaseStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PurchaseStatus::New => write!(f, "New"),
            PurchaseStatus::RequestPaid => write!(f, "RequestPaid"),
            PurchaseStatus::Completed => write!(f, "Completed"),
        }
    }
}

impl FromStr for PurchaseStatus {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "New" => Ok(Self::New),
            "RequestPaid" => Ok(Self::RequestPaid),
            "Completed" => Ok(Self::Completed),
            s => Err(ConversionError(format!("Invalid purchase status: {s}"))),
        }
    }
}

impl From<String> for PurchaseStatus {
    fn from(value: String) -> Self {
        value.parse().unwrap_or_else(|_| {
            error!("Invalid purchase status: {value}. But this conversion cannot fail. Defaulting to New");
            PurchaseStatus::New
        })
    }
}

//--------------------------------------    PayoutStatus    ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PayoutStatus {
    /// The batch has been created and its purchases reserved.
    New,
    /// The instructor has asked to be paid.
    RequestPayout,
    /// An admin has paid out. Terminal; triggers the ledger and instructor balance mutation.
    Completed,
    /// An admin declined. The instructor may re-request.
    Rejected,
}

impl PayoutStatus {
    /// The explicit whitelist of permitted payout transitions. Any pair not listed here is rejected.
    pub fn is_valid_transition(from: PayoutStatus, to: PayoutStatus) -> bool {
        use PayoutStatus::*;
        matches!(
            (from, to),
            (New, RequestPayout) | (Rejected, RequestPayout) | (RequestPayout, Completed) | (RequestPayout, Rejected)
        )
    }
}

impl Display for PayoutStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PayoutStatus::New => write!(f, "New"),
            PayoutStatus::RequestPayout => write!(f, "RequestPayout"),
            PayoutStatus::Completed => write!(f, "Completed"),
            PayoutStatus::Rejected => write!(f, "Rejected"),
        }
    }
}

impl FromStr for PayoutStatus {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "New" => Ok(Self::New),
            "RequestPayout" => Ok(Self::RequestPayout),
            "Completed" => Ok(Self::Completed),
            "Rejected" => Ok(Self::Rejected),
            s => Err(ConversionError(format!("Invalid payout status: {s}"))),
        }
    }
}

impl From<String> for PayoutStatus {
    fn from(value: String) -> Self {
        value.parse().unwrap_or_else(|_| {
            error!("Invalid payout status: {value}. But this conversion cannot fail. Defaulting to New");
            PayoutStatus::New
        })
    }
}

//--------------------------------------    CourseStatus    ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CourseStatus {
    New,
    Active,
    Inactive,
}

impl Display for CourseStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CourseStatus::New => write!(f, "New"),
            CourseStatus::Active => write!(f, "Active"),
            CourseStatus::Inactive => write!(f, "Inactive"),
        }
    }
}

impl From<String> for CourseStatus {
    fn from(value: String) -> Self {
        match value.as_str() {
            "New" => Self::New,
            "Active" => Self::Active,
            "Inactive" => Self::Inactive,
            s => {
                error!("Invalid course status: {s}. But this conversion cannot fail. Defaulting to Inactive");
                Self::Inactive
            },
        }
    }
}

//--------------------------------------  LedgerEntryType   ---------------------------------------------------------
/// The two ways money moves through the ledger: a completed sale credits it, a completed payout debits it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LedgerEntryType {
    Purchase,
    Paid,
}

impl Display for LedgerEntryType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LedgerEntryType::Purchase => write!(f, "Purchase"),
            LedgerEntryType::Paid => write!(f, "Paid"),
        }
    }
}

//--------------------------------------       Setting      ---------------------------------------------------------
/// The ledger singleton. Exactly one non-deleted row exists once the migrate step has run.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Setting {
    pub id: i64,
    pub balance_total: Money,
    /// Percentage (0-100) of net sale revenue allocated to the instructor at payout time.
    pub instructor_ratio: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub is_deleted: bool,
}

//--------------------------------------    LedgerEntry     ---------------------------------------------------------
/// One append-only ledger transaction. `balance_new = balance_old + amount` for Purchase entries and
/// `balance_new = balance_old - amount` for Paid entries.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub id: i64,
    pub entry_type: LedgerEntryType,
    pub amount: Money,
    pub balance_old: Money,
    pub balance_new: Money,
    pub purchase_id: Option<i64>,
    pub payout_id: Option<i64>,
    pub instructor_id: Option<i64>,
    pub instructor_ratio: Option<i64>,
    pub created_at: DateTime<Utc>,
}

//--------------------------------------        Cart        ---------------------------------------------------------
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Cart {
    pub id: i64,
    pub cart_no: String,
    pub status: CartStatus,
    /// Course price snapshot. Display-only until the cart reaches `WaitingPaid`, when it is recomputed and frozen.
    pub price: Money,
    pub discount: i64,
    pub price_paid: Money,
    pub course_id: i64,
    pub student_id: i64,
    pub instructor_id: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub is_deleted: bool,
}

/// A new intent-to-purchase, before the gateway assigns a `cart_no` and snapshots the course pricing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewCart {
    pub course_id: i64,
    pub student_id: i64,
}

/// A cart reference as supplied in a batch status-update request. The `cart_no` is echoed back in error
/// messages so callers can identify the offending item.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CartItemRef {
    pub id: i64,
    pub cart_no: String,
}

//--------------------------------------      Purchase      ---------------------------------------------------------
/// The durable record of a finished sale. Financial fields are copied from the cart at creation time and
/// never recomputed.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Purchase {
    pub id: i64,
    pub purchase_no: String,
    pub status: PurchaseStatus,
    pub price: Money,
    pub discount: i64,
    pub price_paid: Money,
    pub cart_id: i64,
    pub course_id: i64,
    pub student_id: i64,
    pub instructor_id: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub is_deleted: bool,
}

//--------------------------------------       Payout       ---------------------------------------------------------
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Payout {
    pub id: i64,
    pub payout_no: String,
    pub status: PayoutStatus,
    pub instructor_id: i64,
    /// Ledger ratio snapshotted at creation time. Later ratio changes do not affect this payout.
    pub instructor_ratio: i64,
    /// Sum of the included purchases' `price_paid`.
    pub balance_origin: Money,
    /// The platform's retained share.
    pub balance_instructor_paid: Money,
    /// The instructor's share, paid out on completion.
    pub balance_instructor_received: Money,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub is_deleted: bool,
}

/// A per-purchase snapshot embedded in a payout batch.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct PayoutEntry {
    pub id: i64,
    pub payout_id: i64,
    pub purchase_id: i64,
    pub price: Money,
    pub discount: i64,
    pub price_paid: Money,
    pub created_at: DateTime<Utc>,
}

//--------------------------------------        User        ---------------------------------------------------------
/// Collaborator record. The settlement core only reads users, except for crediting an instructor's balance
/// when their payout completes.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub name: String,
    pub email: String,
    pub role: Role,
    pub is_verified: bool,
    pub balance_total: Money,
    pub bank_name: Option<String>,
    pub bank_account_no: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub is_deleted: bool,
}

/// One entry in an instructor's personal settlement history, appended when a payout completes.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct UserPayoutHistoryEntry {
    pub id: i64,
    pub user_id: i64,
    pub payout_id: i64,
    pub payout_no: String,
    pub amount: Money,
    pub created_at: DateTime<Utc>,
}

//--------------------------------------       Course       ---------------------------------------------------------
/// Collaborator record, read-only from the settlement core's point of view.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Course {
    pub id: i64,
    pub name: String,
    pub status: CourseStatus,
    pub price: Money,
    pub discount: i64,
    /// The instructor who owns the course.
    pub user_id: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub is_deleted: bool,
}

#[cfg(test)]
mod test {
    use super::*;

    const CART_STATUSES: [CartStatus; 4] =
        [CartStatus::New, CartStatus::WaitingPaid, CartStatus::Completed, CartStatus::Cancel];
    const PAYOUT_STATUSES: [PayoutStatus; 4] =
        [PayoutStatus::New, PayoutStatus::RequestPayout, PayoutStatus::Completed, PayoutStatus::Rejected];

    #[test]
    fn cart_transition_whitelist_is_exhaustive() {
        use CartStatus::*;
        let allowed = [(New, WaitingPaid), (Cancel, WaitingPaid), (WaitingPaid, Completed), (WaitingPaid, Cancel)];
        for from in CART_STATUSES {
            for to in CART_STATUSES {
                let expected = allowed.contains(&(from, to));
                assert_eq!(
                    CartStatus::is_valid_transition(from, to),
                    expected,
                    "unexpected verdict for {from} -> {to}"
                );
            }
        }
    }

    #[test]
    fn payout_transition_whitelist_is_exhaustive() {
        use PayoutStatus::*;
        let allowed =
            [(New, RequestPayout), (Rejected, RequestPayout), (RequestPayout, Completed), (RequestPayout, Rejected)];
        for from in PAYOUT_STATUSES {
            for to in PAYOUT_STATUSES {
                let expected = allowed.contains(&(from, to));
                assert_eq!(
                    PayoutStatus::is_valid_transition(from, to),
                    expected,
                    "unexpected verdict for {from} -> {to}"
                );
            }
        }
    }

    #[test]
    fn statuses_round_trip_through_strings() {
        for s in CART_STATUSES {
            assert_eq!(s.to_string().parse::<CartStatus>().unwrap(), s);
        }
        for s in PAYOUT_STATUSES {
            assert_eq!(s.to_string().parse::<PayoutStatus>().unwrap(), s);
        }
        for s in [PurchaseStatus::New, PurchaseStatus::RequestPaid, PurchaseStatus::Completed] {
            assert_eq!(s.to_string().parse::<PurchaseStatus>().unwrap(), s);
        }
    }

    #[test]
    fn unknown_status_strings_default_to_new() {
        assert_eq!(CartStatus::from("garbage".to_string()), CartStatus::New);
        assert_eq!(PayoutStatus::from("garbage".to_string()), PayoutStatus::New);
    }
}
