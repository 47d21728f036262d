use cpg_common::Money;
use log::debug;
use sqlx::SqliteConnection;

use crate::{
    db_types::{LedgerEntry, LedgerEntryType, Setting},
    traits::SettlementError,
};

pub const DEFAULT_INSTRUCTOR_RATIO: i64 = 70;

/// The ledger singleton, if it has been bootstrapped.
pub async fn fetch_setting(conn: &mut SqliteConnection) -> Result<Option<Setting>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM settings WHERE is_deleted = 0 LIMIT 1").fetch_optional(conn).await
}

pub async fn create_default_setting(conn: &mut SqliteConnection) -> Result<Setting, sqlx::Error> {
    sqlx::query_as("INSERT INTO settings (balance_total, instructor_ratio) VALUES (0, $1) RETURNING *")
        .bind(DEFAULT_INSTRUCTOR_RATIO)
        .fetch_one(conn)
        .await
}

/// Credits the platform balance with a completed sale and appends the matching ledger entry.
///
/// Not atomic on its own. Call it inside the transaction that creates the purchase so the balance chain and
/// the sale commit or roll back together. Within a transaction the setting read observes earlier writes of
/// the same transaction, which is what chains `balance_old`/`balance_new` across a batch.
pub async fn credit_sale(
    amount: Money,
    purchase_id: i64,
    instructor_id: i64,
    conn: &mut SqliteConnection,
) -> Result<LedgerEntry, SettlementError> {
    let setting = fetch_setting(conn).await?.ok_or(SettlementError::LedgerNotInitialised)?;
    let balance_old = setting.balance_total;
    let balance_new = balance_old + amount;
    sqlx::query("UPDATE settings SET balance_total = $1, updated_at = CURRENT_TIMESTAMP WHERE id = $2")
        .bind(balance_new)
        .bind(setting.id)
        .execute(&mut *conn)
        .await?;
    let entry = sqlx::query_as(
        r#"
            INSERT INTO ledger_entries (entry_type, amount, balance_old, balance_new, purchase_id, instructor_id)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING *;
        "#,
    )
    .bind(LedgerEntryType::Purchase.to_string())
    .bind(amount)
    .bind(balance_old)
    .bind(balance_new)
    .bind(purchase_id)
    .bind(instructor_id)
    .fetch_one(conn)
    .await?;
    debug!("🗃️ Ledger credited {amount} for purchase {purchase_id}. Balance: {balance_old} -> {balance_new}");
    Ok(entry)
}

/// Debits the platform balance for a completed payout and appends the matching ledger entry.
///
/// Same transactional caveat as [`credit_sale`].
pub async fn debit_payout(
    amount: Money,
    payout_id: i64,
    instructor_id: i64,
    instructor_ratio: i64,
    conn: &mut SqliteConnection,
) -> Result<LedgerEntry, SettlementError> {
    let setting = fetch_setting(conn).await?.ok_or(SettlementError::LedgerNotInitialised)?;
    let balance_old = setting.balance_total;
    let balance_new = balance_old - amount;
    sqlx::query("UPDATE settings SET balance_total = $1, updated_at = CURRENT_TIMESTAMP WHERE id = $2")
        .bind(balance_new)
        .bind(setting.id)
        .execute(&mut *conn)
        .await?;
    let entry = sqlx::query_as(
        r#"
            INSERT INTO ledger_entries (entry_type, amount, balance_old, balance_new, payout_id, instructor_id,
                instructor_ratio)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING *;
        "#,
    )
    .bind(LedgerEntryType::Paid.to_string())
    .bind(amount)
    .bind(balance_old)
    .bind(balance_new)
    .bind(payout_id)
    .bind(instructor_id)
    .bind(instructor_ratio)
    .fetch_one(conn)
    .await?;
    debug!("🗃️ Ledger debited {amount} for payout {payout_id}. Balance: {balance_old} -> {balance_new}");
    Ok(entry)
}

pub async fn entries_newest_first(conn: &mut SqliteConnection) -> Result<Vec<LedgerEntry>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM ledger_entries ORDER BY id DESC").fetch_all(conn).await
}
