use log::{debug, trace};
use sqlx::{QueryBuilder, SqliteConnection};

use crate::{
    api::objects::{Pagination, PurchaseQueryFilter},
    db_types::{Cart, Purchase, PurchaseStatus},
};

pub async fn fetch_purchase(id: i64, conn: &mut SqliteConnection) -> Result<Option<Purchase>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM purchases WHERE id = $1 AND is_deleted = 0").bind(id).fetch_optional(conn).await
}

/// Fetches a purchase only if it currently carries the given status.
pub async fn fetch_purchase_with_status(
    id: i64,
    status: PurchaseStatus,
    conn: &mut SqliteConnection,
) -> Result<Option<Purchase>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM purchases WHERE id = $1 AND status = $2 AND is_deleted = 0")
        .bind(id)
        .bind(status.to_string())
        .fetch_optional(conn)
        .await
}

/// Whether the student has already bought the course, in any purchase state.
pub async fn purchase_exists_for_course_and_student(
    course_id: i64,
    student_id: i64,
    conn: &mut SqliteConnection,
) -> Result<bool, sqlx::Error> {
    let row: Option<(i64,)> =
        sqlx::query_as("SELECT id FROM purchases WHERE course_id = $1 AND student_id = $2 AND is_deleted = 0 LIMIT 1")
            .bind(course_id)
            .bind(student_id)
            .fetch_optional(conn)
            .await?;
    Ok(row.is_some())
}

/// Creates the durable sale record from a completed cart. Financial fields are copied verbatim from the
/// cart's frozen snapshot.
pub async fn insert_purchase(
    purchase_no: &str,
    cart: &Cart,
    conn: &mut SqliteConnection,
) -> Result<Purchase, sqlx::Error> {
    let purchase: Purchase = sqlx::query_as(
        r#"
            INSERT INTO purchases (purchase_no, status, price, discount, price_paid, cart_id, course_id,
                student_id, instructor_id)
            VALUES ($1, 'New', $2, $3, $4, $5, $6, $7, $8)
            RETURNING *;
        "#,
    )
    .bind(purchase_no)
    .bind(cart.price)
    .bind(cart.discount)
    .bind(cart.price_paid)
    .bind(cart.id)
    .bind(cart.course_id)
    .bind(cart.student_id)
    .bind(cart.instructor_id)
    .fetch_one(conn)
    .await?;
    debug!("📝️ Purchase [{}] inserted with id {}", purchase.purchase_no, purchase.id);
    Ok(purchase)
}

pub async fn update_status(
    id: i64,
    status: PurchaseStatus,
    conn: &mut SqliteConnection,
) -> Result<Purchase, sqlx::Error> {
    sqlx::query_as("UPDATE purchases SET status = $1, updated_at = CURRENT_TIMESTAMP WHERE id = $2 RETURNING *")
        .bind(status.to_string())
        .bind(id)
        .fetch_one(conn)
        .await
}

/// Whether any payout batch, in any state, has ever claimed this purchase.
pub async fn claimed_in_payout(purchase_id: i64, conn: &mut SqliteConnection) -> Result<bool, sqlx::Error> {
    let row: Option<(i64,)> = sqlx::query_as("SELECT id FROM payout_entries WHERE purchase_id = $1 LIMIT 1")
        .bind(purchase_id)
        .fetch_optional(conn)
        .await?;
    Ok(row.is_some())
}

fn push_filters(builder: &mut QueryBuilder<'_, sqlx::Sqlite>, query: &PurchaseQueryFilter) {
    if let Some(purchase_no) = &query.purchase_no {
        builder.push(" AND purchase_no LIKE ");
        builder.push_bind(format!("%{purchase_no}%"));
    }
    if let Some(course_id) = query.course_id {
        builder.push(" AND course_id = ");
        builder.push_bind(course_id);
    }
    if let Some(status) = query.status {
        builder.push(" AND status = ");
        builder.push_bind(status.to_string());
    }
    if let Some(student_id) = query.student_id {
        builder.push(" AND student_id = ");
        builder.push_bind(student_id);
    }
    if let Some(instructor_id) = query.instructor_id {
        builder.push(" AND instructor_id = ");
        builder.push_bind(instructor_id);
    }
}

/// Fetches purchases matching the filter, newest first.
pub async fn search_purchases(
    query: &PurchaseQueryFilter,
    pagination: Pagination,
    conn: &mut SqliteConnection,
) -> Result<(Vec<Purchase>, i64), sqlx::Error> {
    let mut count = QueryBuilder::new("SELECT COUNT(*) FROM purchases WHERE is_deleted = 0");
    push_filters(&mut count, query);
    let total_items: i64 = count.build_query_scalar().fetch_one(&mut *conn).await?;

    let mut builder = QueryBuilder::new("SELECT * FROM purchases WHERE is_deleted = 0");
    push_filters(&mut builder, query);
    builder.push(" ORDER BY created_at DESC, id DESC LIMIT ");
    builder.push_bind(pagination.limit());
    builder.push(" OFFSET ");
    builder.push_bind(pagination.offset());

    trace!("📝️ Executing query: {}", builder.sql());
    let purchases = builder.build_query_as::<Purchase>().fetch_all(conn).await?;
    Ok((purchases, total_items))
}
