//! Fixtures shared by repository, service and API tests

use chrono::Utc;

use super::{create_test_pool, migrations, DynDatabasePool};
use crate::models::UserRole;

/// Fresh in-memory database with the full schema
pub async fn migrated_pool() -> DynDatabasePool {
    let pool = create_test_pool().await.expect("Failed to create test pool");
    migrations::run_migrations(&pool)
        .await
        .expect("Failed to run migrations");
    pool
}

pub async fn seed_user(pool: &DynDatabasePool, username: &str, role: UserRole) -> i64 {
    let now = Utc::now();
    sqlx::query(
        "INSERT INTO users (username, email, password_hash, role, created_at, updated_at) VALUES (?, ?, ?, ?, ?, ?)",
    )
    .bind(username)
    .bind(format!("{}@example.com", username))
    .bind("not-a-real-hash")
    .bind(role.as_str())
    .bind(now)
    .bind(now)
    .execute(pool.as_sqlite().unwrap())
    .await
    .expect("Failed to seed user")
    .last_insert_rowid()
}

pub async fn seed_category(pool: &DynDatabasePool, name: &str) -> i64 {
    let now = Utc::now();
    sqlx::query("INSERT INTO categories (name, slug, created_at, updated_at) VALUES (?, ?, ?, ?)")
        .bind(name)
        .bind(name.to_lowercase().replace(' ', "-"))
        .bind(now)
        .bind(now)
        .execute(pool.as_sqlite().unwrap())
        .await
        .expect("Failed to seed category")
        .last_insert_rowid()
}

pub async fn seed_book(pool: &DynDatabasePool, category_id: i64, title: &str) -> i64 {
    let now = Utc::now();
    sqlx::query(
        "INSERT INTO books (title, author, category_id, created_at, updated_at) VALUES (?, ?, ?, ?, ?)",
    )
    .bind(title)
    .bind("Test Author")
    .bind(category_id)
    .bind(now)
    .bind(now)
    .execute(pool.as_sqlite().unwrap())
    .await
    .expect("Failed to seed book")
    .last_insert_rowid()
}

pub async fn seed_tutorial(pool: &DynDatabasePool, category_id: i64, title: &str) -> i64 {
    let now = Utc::now();
    sqlx::query(
        "INSERT INTO tutorials (title, category_id, video_url, youtube_id, created_at, updated_at) \
         VALUES (?, ?, ?, ?, ?, ?)",
    )
    .bind(title)
    .bind(category_id)
    .bind("https://youtu.be/dQw4w9WgXcQ")
    .bind("dQw4w9WgXcQ")
    .bind(now)
    .bind(now)
    .execute(pool.as_sqlite().unwrap())
    .await
    .expect("Failed to seed tutorial")
    .last_insert_rowid()
}
