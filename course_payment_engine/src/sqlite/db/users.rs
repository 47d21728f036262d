use cpg_common::Money;
use log::debug;
use sqlx::SqliteConnection;

use crate::{
    db_types::{User, UserPayoutHistoryEntry},
    traits::SettlementError,
};

/// Fetches a user that is verified and not soft-deleted. Anyone else is invisible to the settlement flows.
pub async fn fetch_active_user(id: i64, conn: &mut SqliteConnection) -> Result<Option<User>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM users WHERE id = $1 AND is_verified = 1 AND is_deleted = 0")
        .bind(id)
        .fetch_optional(conn)
        .await
}

/// Adds `amount` to the instructor's lifetime balance. Part of the payout settlement transaction.
pub async fn credit_balance(user_id: i64, amount: Money, conn: &mut SqliteConnection) -> Result<(), SettlementError> {
    let result =
        sqlx::query("UPDATE users SET balance_total = balance_total + $1, updated_at = CURRENT_TIMESTAMP WHERE id = $2")
            .bind(amount)
            .bind(user_id)
            .execute(conn)
            .await?;
    if result.rows_affected() == 0 {
        return Err(SettlementError::UserNotFound);
    }
    debug!("🗃️ User {user_id} balance credited with {amount}");
    Ok(())
}

pub async fn append_payout_history(
    user_id: i64,
    payout_id: i64,
    payout_no: &str,
    amount: Money,
    conn: &mut SqliteConnection,
) -> Result<UserPayoutHistoryEntry, sqlx::Error> {
    sqlx::query_as(
        r#"
            INSERT INTO user_payout_history (user_id, payout_id, payout_no, amount)
            VALUES ($1, $2, $3, $4)
            RETURNING *;
        "#,
    )
    .bind(user_id)
    .bind(payout_id)
    .bind(payout_no)
    .bind(amount)
    .fetch_one(conn)
    .await
}

pub async fn payout_history(user_id: i64, conn: &mut SqliteConnection) -> Result<Vec<UserPayoutHistoryEntry>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM user_payout_history WHERE user_id = $1 ORDER BY id DESC")
        .bind(user_id)
        .fetch_all(conn)
        .await
}
