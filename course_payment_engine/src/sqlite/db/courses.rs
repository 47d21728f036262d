use sqlx::SqliteConnection;

use crate::db_types::Course;

pub async fn fetch_course(id: i64, conn: &mut SqliteConnection) -> Result<Option<Course>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM courses WHERE id = $1 AND is_deleted = 0").bind(id).fetch_optional(conn).await
}

/// Only `Active` courses can be bought or move through the cart flow.
pub async fn fetch_active_course(id: i64, conn: &mut SqliteConnection) -> Result<Option<Course>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM courses WHERE id = $1 AND status = 'Active' AND is_deleted = 0")
        .bind(id)
        .fetch_optional(conn)
        .await
}
