use cpg_common::Money;
use log::{debug, trace};
use sqlx::{QueryBuilder, SqliteConnection};

use crate::{
    api::objects::{Pagination, PayoutQueryFilter},
    db_types::{Payout, PayoutEntry, PayoutStatus, Purchase},
};

pub async fn fetch_payout(id: i64, conn: &mut SqliteConnection) -> Result<Option<Payout>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM payouts WHERE id = $1 AND is_deleted = 0").bind(id).fetch_optional(conn).await
}

/// Inserts a `New` payout batch with its balance split already computed.
pub async fn insert_payout(
    payout_no: &str,
    instructor_id: i64,
    instructor_ratio: i64,
    balance_origin: Money,
    balance_instructor_paid: Money,
    balance_instructor_received: Money,
    conn: &mut SqliteConnection,
) -> Result<Payout, sqlx::Error> {
    let payout: Payout = sqlx::query_as(
        r#"
            INSERT INTO payouts (payout_no, status, instructor_id, instructor_ratio, balance_origin,
                balance_instructor_paid, balance_instructor_received)
            VALUES ($1, 'New', $2, $3, $4, $5, $6)
            RETURNING *;
        "#,
    )
    .bind(payout_no)
    .bind(instructor_id)
    .bind(instructor_ratio)
    .bind(balance_origin)
    .bind(balance_instructor_paid)
    .bind(balance_instructor_received)
    .fetch_one(conn)
    .await?;
    debug!("💰️ Payout [{}] inserted with id {}", payout.payout_no, payout.id);
    Ok(payout)
}

/// Snapshots one claimed purchase into the payout batch.
pub async fn insert_entry(
    payout_id: i64,
    purchase: &Purchase,
    conn: &mut SqliteConnection,
) -> Result<PayoutEntry, sqlx::Error> {
    sqlx::query_as(
        r#"
            INSERT INTO payout_entries (payout_id, purchase_id, price, discount, price_paid)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING *;
        "#,
    )
    .bind(payout_id)
    .bind(purchase.id)
    .bind(purchase.price)
    .bind(purchase.discount)
    .bind(purchase.price_paid)
    .fetch_one(conn)
    .await
}

pub async fn entries_for_payout(payout_id: i64, conn: &mut SqliteConnection) -> Result<Vec<PayoutEntry>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM payout_entries WHERE payout_id = $1 ORDER BY id ASC")
        .bind(payout_id)
        .fetch_all(conn)
        .await
}

pub async fn update_status(
    id: i64,
    status: PayoutStatus,
    conn: &mut SqliteConnection,
) -> Result<Option<Payout>, sqlx::Error> {
    sqlx::query_as("UPDATE payouts SET status = $1, updated_at = CURRENT_TIMESTAMP WHERE id = $2 RETURNING *")
        .bind(status.to_string())
        .bind(id)
        .fetch_optional(conn)
        .await
}

fn push_filters(builder: &mut QueryBuilder<'_, sqlx::Sqlite>, query: &PayoutQueryFilter) {
    if let Some(payout_no) = &query.payout_no {
        builder.push(" AND payout_no LIKE ");
        builder.push_bind(format!("%{payout_no}%"));
    }
    if let Some(status) = query.status {
        builder.push(" AND status = ");
        builder.push_bind(status.to_string());
    }
    if let Some(instructor_id) = query.instructor_id {
        builder.push(" AND instructor_id = ");
        builder.push_bind(instructor_id);
    }
}

/// Fetches payouts matching the filter, newest first.
pub async fn search_payouts(
    query: &PayoutQueryFilter,
    pagination: Pagination,
    conn: &mut SqliteConnection,
) -> Result<(Vec<Payout>, i64), sqlx::Error> {
    let mut count = QueryBuilder::new("SELECT COUNT(*) FROM payouts WHERE is_deleted = 0");
    push_filters(&mut count, query);
    let total_items: i64 = count.build_query_scalar().fetch_one(&mut *conn).await?;

    let mut builder = QueryBuilder::new("SELECT * FROM payouts WHERE is_deleted = 0");
    push_filters(&mut builder, query);
    builder.push(" ORDER BY created_at DESC, id DESC LIMIT ");
    builder.push_bind(pagination.limit());
    builder.push(" OFFSET ");
    builder.push_bind(pagination.offset());

    trace!("💰️ Executing query: {}", builder.sql());
    let payouts = builder.build_query_as::<Payout>().fetch_all(conn).await?;
    Ok((payouts, total_items))
}
