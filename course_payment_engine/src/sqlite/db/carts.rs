use cpg_common::Money;
use log::{debug, trace};
use sqlx::{QueryBuilder, SqliteConnection};

use crate::{
    api::objects::{CartQueryFilter, Pagination},
    db_types::{Cart, CartStatus, Course},
};

pub async fn fetch_cart(id: i64, conn: &mut SqliteConnection) -> Result<Option<Cart>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM carts WHERE id = $1 AND is_deleted = 0").bind(id).fetch_optional(conn).await
}

/// The student's existing cart item for a course, if any. Used to guard against duplicates at creation time.
pub async fn cart_for_course_and_student(
    course_id: i64,
    student_id: i64,
    conn: &mut SqliteConnection,
) -> Result<Option<Cart>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM carts WHERE course_id = $1 AND student_id = $2 AND is_deleted = 0")
        .bind(course_id)
        .bind(student_id)
        .fetch_optional(conn)
        .await
}

/// Inserts a `New` cart item. The financial snapshot taken here is display-only; it is recomputed and frozen
/// when the cart moves to `WaitingPaid`.
pub async fn insert_cart(
    cart_no: &str,
    course: &Course,
    student_id: i64,
    conn: &mut SqliteConnection,
) -> Result<Cart, sqlx::Error> {
    let price_paid = course.price.apply_discount(course.discount);
    let cart: Cart = sqlx::query_as(
        r#"
            INSERT INTO carts (cart_no, status, price, discount, price_paid, course_id, student_id, instructor_id)
            VALUES ($1, 'New', $2, $3, $4, $5, $6, $7)
            RETURNING *;
        "#,
    )
    .bind(cart_no)
    .bind(course.price)
    .bind(course.discount)
    .bind(price_paid)
    .bind(course.id)
    .bind(student_id)
    .bind(course.user_id)
    .fetch_one(conn)
    .await?;
    debug!("🛒️ Cart [{}] inserted with id {}", cart.cart_no, cart.id);
    Ok(cart)
}

pub async fn update_status(id: i64, status: CartStatus, conn: &mut SqliteConnection) -> Result<Cart, sqlx::Error> {
    sqlx::query_as("UPDATE carts SET status = $1, updated_at = CURRENT_TIMESTAMP WHERE id = $2 RETURNING *")
        .bind(status.to_string())
        .bind(id)
        .fetch_one(conn)
        .await
}

/// Freezes the financial snapshot on the cart. Called exactly once, on the move to `WaitingPaid`.
pub async fn freeze_pricing(
    id: i64,
    price: Money,
    discount: i64,
    price_paid: Money,
    conn: &mut SqliteConnection,
) -> Result<Cart, sqlx::Error> {
    sqlx::query_as(
        r#"
            UPDATE carts SET price = $1, discount = $2, price_paid = $3, updated_at = CURRENT_TIMESTAMP
            WHERE id = $4
            RETURNING *;
        "#,
    )
    .bind(price)
    .bind(discount)
    .bind(price_paid)
    .bind(id)
    .fetch_one(conn)
    .await
}

pub async fn soft_delete(id: i64, conn: &mut SqliteConnection) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE carts SET is_deleted = 1, updated_at = CURRENT_TIMESTAMP WHERE id = $1")
        .bind(id)
        .execute(conn)
        .await?;
    Ok(())
}

fn push_filters(builder: &mut QueryBuilder<'_, sqlx::Sqlite>, query: &CartQueryFilter) {
    if let Some(course_id) = query.course_id {
        builder.push(" AND carts.course_id = ");
        builder.push_bind(course_id);
    }
    if let Some(status) = query.status {
        builder.push(" AND carts.status = ");
        builder.push_bind(status.to_string());
    }
    if let Some(student_id) = query.student_id {
        builder.push(" AND carts.student_id = ");
        builder.push_bind(student_id);
    }
}

/// Fetches cart items matching the filter, newest first.
///
/// Carts still in `New` are projected with the course's *current* price and discount, and a `price_paid`
/// recomputed from them with the same truncating formula as [`Money::apply_discount`]. Frozen carts report
/// their stored snapshot untouched.
pub async fn search_carts(
    query: &CartQueryFilter,
    pagination: Pagination,
    conn: &mut SqliteConnection,
) -> Result<(Vec<Cart>, i64), sqlx::Error> {
    let mut count = QueryBuilder::new("SELECT COUNT(*) FROM carts WHERE carts.is_deleted = 0");
    push_filters(&mut count, query);
    let total_items: i64 = count.build_query_scalar().fetch_one(&mut *conn).await?;

    let mut builder = QueryBuilder::new(
        r#"
    SELECT
        carts.id AS id,
        carts.cart_no AS cart_no,
        carts.status AS status,
        CASE WHEN carts.status = 'New' THEN courses.price ELSE carts.price END AS price,
        CASE WHEN carts.status = 'New' THEN courses.discount ELSE carts.discount END AS discount,
        CASE WHEN carts.status = 'New' THEN
            CASE WHEN courses.discount > 0
                THEN courses.price - courses.price * courses.discount / 100
                ELSE courses.price
            END
        ELSE carts.price_paid END AS price_paid,
        carts.course_id AS course_id,
        carts.student_id AS student_id,
        carts.instructor_id AS instructor_id,
        carts.created_at AS created_at,
        carts.updated_at AS updated_at,
        carts.is_deleted AS is_deleted
    FROM carts JOIN courses ON carts.course_id = courses.id
    WHERE carts.is_deleted = 0"#,
    );
    push_filters(&mut builder, query);
    builder.push(" ORDER BY carts.created_at DESC, carts.id DESC LIMIT ");
    builder.push_bind(pagination.limit());
    builder.push(" OFFSET ");
    builder.push_bind(pagination.offset());

    trace!("🛒️ Executing query: {}", builder.sql());
    let carts = builder.build_query_as::<Cart>().fetch_all(conn).await?;
    Ok((carts, total_items))
}
