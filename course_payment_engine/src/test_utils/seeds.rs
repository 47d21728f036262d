use cpg_common::Money;

use crate::{
    db_types::{Course, CourseStatus, Role, User},
    SqliteDatabase,
};

/// Inserts a verified user with the given role, returning the stored row.
pub async fn seed_user(db: &SqliteDatabase, name: &str, role: Role) -> User {
    let email = format!("{}@example.com", name.to_lowercase().replace(' ', "."));
    sqlx::query_as(
        r#"
            INSERT INTO users (name, email, role, is_verified, bank_name, bank_account_no)
            VALUES ($1, $2, $3, 1, 'Test Bank', '000-111-222')
            RETURNING *;
        "#,
    )
    .bind(name)
    .bind(email)
    .bind(role.to_string())
    .fetch_one(db.pool())
    .await
    .expect("Error seeding user")
}

/// Inserts an `Active` course owned by `instructor_id`.
pub async fn seed_course(db: &SqliteDatabase, name: &str, price: Money, discount: i64, instructor_id: i64) -> Course {
    sqlx::query_as(
        r#"
            INSERT INTO courses (name, status, price, discount, user_id)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING *;
        "#,
    )
    .bind(name)
    .bind(CourseStatus::Active.to_string())
    .bind(price)
    .bind(discount)
    .bind(instructor_id)
    .fetch_one(db.pool())
    .await
    .expect("Error seeding course")
}
