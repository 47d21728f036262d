use std::fmt::Display;

use course_payment_engine::{
    db_types::{CartItemRef, CartStatus, PayoutStatus, PurchaseStatus},
    objects::{CartQueryFilter, Pagination, PayoutQueryFilter, PurchaseQueryFilter},
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonResponse {
    pub success: bool,
    pub message: String,
}

impl JsonResponse {
    pub fn success<S: Display>(message: S) -> Self {
        Self { success: true, message: message.to_string() }
    }

    pub fn failure<S: Display>(message: S) -> Self {
        Self { success: false, message: message.to_string() }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthRequest {
    pub user_id: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CartCreateRequest {
    pub course_id: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CartUpdateStatusRequest {
    pub status: CartStatus,
    pub items: Vec<CartItemRef>,
}

fn default_page_num() -> u32 {
    1
}

fn default_page_size() -> u32 {
    10
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CartSearchRequest {
    #[serde(default)]
    pub course_id: Option<i64>,
    #[serde(default)]
    pub status: Option<CartStatus>,
    #[serde(default = "default_page_num")]
    pub page_num: u32,
    #[serde(default = "default_page_size")]
    pub page_size: u32,
}

impl CartSearchRequest {
    pub fn into_parts(self) -> (CartQueryFilter, Pagination) {
        let filter = CartQueryFilter { course_id: self.course_id, status: self.status, student_id: None };
        (filter, Pagination::new(self.page_num, self.page_size))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PurchaseSearchRequest {
    #[serde(default)]
    pub purchase_no: Option<String>,
    #[serde(default)]
    pub course_id: Option<i64>,
    #[serde(default)]
    pub status: Option<PurchaseStatus>,
    #[serde(default)]
    pub student_id: Option<i64>,
    #[serde(default)]
    pub instructor_id: Option<i64>,
    #[serde(default = "default_page_num")]
    pub page_num: u32,
    #[serde(default = "default_page_size")]
    pub page_size: u32,
}

impl PurchaseSearchRequest {
    pub fn into_parts(self) -> (PurchaseQueryFilter, Pagination) {
        let filter = PurchaseQueryFilter {
            purchase_no: self.purchase_no,
            course_id: self.course_id,
            status: self.status,
            student_id: self.student_id,
            instructor_id: self.instructor_id,
        };
        (filter, Pagination::new(self.page_num, self.page_size))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PayoutCreateRequest {
    /// Required when an admin creates the payout; ignored for instructors.
    #[serde(default)]
    pub instructor_id: Option<i64>,
    pub purchase_ids: Vec<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PayoutUpdateStatusRequest {
    pub status: PayoutStatus,
    /// Required when rejecting.
    #[serde(default)]
    pub comment: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PayoutSearchRequest {
    #[serde(default)]
    pub payout_no: Option<String>,
    #[serde(default)]
    pub status: Option<PayoutStatus>,
    #[serde(default)]
    pub instructor_id: Option<i64>,
    #[serde(default = "default_page_num")]
    pub page_num: u32,
    #[serde(default = "default_page_size")]
    pub page_size: u32,
}

impl PayoutSearchRequest {
    pub fn into_parts(self) -> (PayoutQueryFilter, Pagination) {
        let filter =
            PayoutQueryFilter { payout_no: self.payout_no, status: self.status, instructor_id: self.instructor_id };
        (filter, Pagination::new(self.page_num, self.page_size))
    }
}
