use serde::{Deserialize, Serialize};

use crate::db_types::{CartStatus, LedgerEntry, PayoutStatus, PurchaseStatus, Setting};

/// 1-based page selection for the search endpoints.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Pagination {
    pub page_num: u32,
    pub page_size: u32,
}

impl Default for Pagination {
    fn default() -> Self {
        Self { page_num: 1, page_size: 10 }
    }
}

impl Pagination {
    pub fn new(page_num: u32, page_size: u32) -> Self {
        Self { page_num: page_num.max(1), page_size: page_size.max(1) }
    }

    pub fn limit(&self) -> i64 {
        i64::from(self.page_size)
    }

    pub fn offset(&self) -> i64 {
        i64::from(self.page_num.saturating_sub(1)) * i64::from(self.page_size)
    }
}

/// One page of search results plus the paging bookkeeping clients need to render a pager.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResult<T> {
    pub items: Vec<T>,
    pub page_num: u32,
    pub page_size: u32,
    pub total_items: i64,
    pub total_pages: i64,
}

impl<T> SearchResult<T> {
    pub fn new(items: Vec<T>, pagination: Pagination, total_items: i64) -> Self {
        let page_size = i64::from(pagination.page_size);
        let total_pages = (total_items + page_size - 1) / page_size;
        Self { items, page_num: pagination.page_num, page_size: pagination.page_size, total_items, total_pages }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CartQueryFilter {
    pub course_id: Option<i64>,
    pub status: Option<CartStatus>,
    pub student_id: Option<i64>,
}

impl CartQueryFilter {
    pub fn with_course_id(mut self, course_id: i64) -> Self {
        self.course_id = Some(course_id);
        self
    }

    pub fn with_status(mut self, status: CartStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn with_student_id(mut self, student_id: i64) -> Self {
        self.student_id = Some(student_id);
        self
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PurchaseQueryFilter {
    /// Substring match against `purchase_no`.
    pub purchase_no: Option<String>,
    pub course_id: Option<i64>,
    pub status: Option<PurchaseStatus>,
    pub student_id: Option<i64>,
    pub instructor_id: Option<i64>,
}

impl PurchaseQueryFilter {
    pub fn with_purchase_no<S: Into<String>>(mut self, purchase_no: S) -> Self {
        self.purchase_no = Some(purchase_no.into());
        self
    }

    pub fn with_course_id(mut self, course_id: i64) -> Self {
        self.course_id = Some(course_id);
        self
    }

    pub fn with_status(mut self, status: PurchaseStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn with_student_id(mut self, student_id: i64) -> Self {
        self.student_id = Some(student_id);
        self
    }

    pub fn with_instructor_id(mut self, instructor_id: i64) -> Self {
        self.instructor_id = Some(instructor_id);
        self
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PayoutQueryFilter {
    /// Substring match against `payout_no`.
    pub payout_no: Option<String>,
    pub status: Option<PayoutStatus>,
    pub instructor_id: Option<i64>,
}

impl PayoutQueryFilter {
    pub fn with_payout_no<S: Into<String>>(mut self, payout_no: S) -> Self {
        self.payout_no = Some(payout_no.into());
        self
    }

    pub fn with_status(mut self, status: PayoutStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn with_instructor_id(mut self, instructor_id: i64) -> Self {
        self.instructor_id = Some(instructor_id);
        self
    }
}

/// The ledger singleton together with its full transaction log, newest entries first.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerSnapshot {
    pub setting: Setting,
    pub transactions: Vec<LedgerEntry>,
}
