//! User repository
//!
//! Database operations for accounts and roles.
//!
//! This module provides:
//! - `UserRepository` trait defining the interface for user data access
//! - `SqlxUserRepository` implementing the trait for SQLite and MySQL

use crate::db::{bind_args, dispatch, like_pattern, DynDatabasePool, InsertedId, SqlArg};
use crate::models::{ListParams, NewUser, Role, User, UserProfile, UserRole, UserStatus};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use std::sync::Arc;

const USER_COLUMNS: &str = "id, username, email, password_hash, full_name, avatar, bio, role, status, \
     last_login_at, created_at, updated_at";

/// User repository trait
#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Insert a new user and return the stored row
    async fn create(&self, user: &NewUser) -> Result<User>;

    /// Get user by ID
    async fn get_by_id(&self, id: i64) -> Result<Option<User>>;

    /// Get user by username (case-insensitive)
    async fn get_by_username(&self, username: &str) -> Result<Option<User>>;

    /// Get user by email (case-insensitive)
    async fn get_by_email(&self, email: &str) -> Result<Option<User>>;

    /// Persist profile fields, email, role and status of `user`
    async fn update(&self, user: &User) -> Result<User>;

    /// Replace the password hash
    async fn update_password(&self, id: i64, password_hash: &str) -> Result<()>;

    /// Stamp a successful sign-in
    async fn touch_last_login(&self, id: i64) -> Result<()>;

    /// Delete a user; dependent rows cascade or are detached by the schema
    async fn delete(&self, id: i64) -> Result<bool>;

    /// Count total users
    async fn count(&self) -> Result<i64>;

    /// Count users holding `role`
    async fn count_by_role(&self, role: UserRole) -> Result<i64>;

    /// List users, newest first, optionally filtered by a search term and role
    async fn list(
        &self,
        params: &ListParams,
        search: Option<&str>,
        role: Option<UserRole>,
    ) -> Result<(Vec<User>, i64)>;

    /// List users with their engagement counters
    async fn list_profiles(&self, params: &ListParams) -> Result<(Vec<UserProfile>, i64)>;

    /// All roles with the number of users holding each
    async fn list_roles(&self) -> Result<Vec<Role>>;
}

/// SQLx-based user repository implementation
pub struct SqlxUserRepository {
    pool: DynDatabasePool,
}

impl SqlxUserRepository {
    /// Create a new SQLx user repository
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    /// Create a boxed repository for use with dependency injection
    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn UserRepository> {
        Arc::new(Self::new(pool))
    }

    async fn find_one(&self, column: &str, value: SqlArg) -> Result<Option<User>> {
        let sql = format!("SELECT {} FROM users WHERE {} = ?", USER_COLUMNS, column);
        let args = [value];
        let user = dispatch!(self.pool, db => {
            bind_args!(sqlx::query_as::<_, User>(&sql), args)
                .fetch_optional(db)
                .await
                .with_context(|| format!("Failed to get user by {}", column))?
        });
        Ok(user)
    }
}

#[async_trait]
impl UserRepository for SqlxUserRepository {
    async fn create(&self, user: &NewUser) -> Result<User> {
        let now = Utc::now();
        let id = dispatch!(self.pool, db => {
            sqlx::query(
                "INSERT INTO users (username, email, password_hash, full_name, role, status, created_at, updated_at) \
                 VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
            )
            .bind(&user.username)
            .bind(&user.email)
            .bind(&user.password_hash)
            .bind(&user.full_name)
            .bind(user.role.as_str())
            .bind(UserStatus::Active.as_str())
            .bind(now)
            .bind(now)
            .execute(db)
            .await
            .context("Failed to create user")?
            .inserted_id()
        });

        self.get_by_id(id)
            .await?
            .context("User not found after insert")
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<User>> {
        self.find_one("id", SqlArg::Int(id)).await
    }

    async fn get_by_username(&self, username: &str) -> Result<Option<User>> {
        self.find_one("LOWER(username)", SqlArg::Text(username.to_lowercase())).await
    }

    async fn get_by_email(&self, email: &str) -> Result<Option<User>> {
        self.find_one("LOWER(email)", SqlArg::Text(email.to_lowercase())).await
    }

    async fn update(&self, user: &User) -> Result<User> {
        let now = Utc::now();
        dispatch!(self.pool, db => {
            sqlx::query(
                "UPDATE users SET email = ?, full_name = ?, avatar = ?, bio = ?, role = ?, status = ?, updated_at = ? \
                 WHERE id = ?",
            )
            .bind(&user.email)
            .bind(&user.full_name)
            .bind(&user.avatar)
            .bind(&user.bio)
            .bind(user.role.as_str())
            .bind(user.status.as_str())
            .bind(now)
            .bind(user.id)
            .execute(db)
            .await
            .context("Failed to update user")?;
        });

        self.get_by_id(user.id)
            .await?
            .context("User not found after update")
    }

    async fn update_password(&self, id: i64, password_hash: &str) -> Result<()> {
        dispatch!(self.pool, db => {
            sqlx::query("UPDATE users SET password_hash = ?, updated_at = ? WHERE id = ?")
                .bind(password_hash)
                .bind(Utc::now())
                .bind(id)
                .execute(db)
                .await
                .context("Failed to update password")?;
        });
        Ok(())
    }

    async fn touch_last_login(&self, id: i64) -> Result<()> {
        dispatch!(self.pool, db => {
            sqlx::query("UPDATE users SET last_login_at = ? WHERE id = ?")
                .bind(Utc::now())
                .bind(id)
                .execute(db)
                .await
                .context("Failed to record login time")?;
        });
        Ok(())
    }

    async fn delete(&self, id: i64) -> Result<bool> {
        let affected = dispatch!(self.pool, db => {
            sqlx::query("DELETE FROM users WHERE id = ?")
                .bind(id)
                .execute(db)
                .await
                .context("Failed to delete user")?
                .rows_affected()
        });
        Ok(affected > 0)
    }

    async fn count(&self) -> Result<i64> {
        let count: i64 = dispatch!(self.pool, db => {
            sqlx::query_scalar("SELECT COUNT(*) FROM users")
                .fetch_one(db)
                .await
                .context("Failed to count users")?
        });
        Ok(count)
    }

    async fn count_by_role(&self, role: UserRole) -> Result<i64> {
        let count: i64 = dispatch!(self.pool, db => {
            sqlx::query_scalar("SELECT COUNT(*) FROM users WHERE role = ?")
                .bind(role.as_str())
                .fetch_one(db)
                .await
                .context("Failed to count users by role")?
        });
        Ok(count)
    }

    async fn list(
        &self,
        params: &ListParams,
        search: Option<&str>,
        role: Option<UserRole>,
    ) -> Result<(Vec<User>, i64)> {
        let mut clauses = Vec::new();
        let mut args = Vec::new();

        if let Some(term) = search.map(str::trim).filter(|s| !s.is_empty()) {
            clauses.push(
                "(LOWER(username) LIKE ? ESCAPE '!' OR LOWER(email) LIKE ? ESCAPE '!' \
                 OR LOWER(COALESCE(full_name, '')) LIKE ? ESCAPE '!')",
            );
            let pattern = like_pattern(term);
            args.extend(std::iter::repeat(SqlArg::Text(pattern)).take(3));
        }
        if let Some(role) = role {
            clauses.push("role = ?");
            args.push(SqlArg::Text(role.as_str().to_string()));
        }

        let where_sql = if clauses.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", clauses.join(" AND "))
        };
        let count_sql = format!("SELECT COUNT(*) FROM users {}", where_sql);
        let list_sql = format!(
            "SELECT {} FROM users {} ORDER BY created_at DESC, id DESC LIMIT ? OFFSET ?",
            USER_COLUMNS, where_sql
        );

        let mut page_args = args.clone();
        page_args.push(SqlArg::Int(params.limit()));
        page_args.push(SqlArg::Int(params.offset()));

        let (users, total): (Vec<User>, i64) = dispatch!(self.pool, db => {
            let total = bind_args!(sqlx::query_scalar(&count_sql), args)
                .fetch_one(db)
                .await
                .context("Failed to count users")?;
            let users = bind_args!(sqlx::query_as::<_, User>(&list_sql), page_args)
                .fetch_all(db)
                .await
                .context("Failed to list users")?;
            (users, total)
        });

        Ok((users, total))
    }

    async fn list_profiles(&self, params: &ListParams) -> Result<(Vec<UserProfile>, i64)> {
        let total = self.count().await?;
        let profiles = dispatch!(self.pool, db => {
            sqlx::query_as::<_, UserProfile>(
                "SELECT u.id, u.username, u.email, u.password_hash, u.full_name, u.avatar, u.bio, u.role, \
                        u.status, u.last_login_at, u.created_at, u.updated_at, \
                        (SELECT COUNT(*) FROM bookmarks b WHERE b.user_id = u.id) AS bookmark_count, \
                        (SELECT COUNT(*) FROM ratings r WHERE r.user_id = u.id) AS rating_count, \
                        (SELECT COUNT(*) FROM comments c WHERE c.user_id = u.id) AS comment_count, \
                        (SELECT COUNT(*) FROM download_logs d WHERE d.user_id = u.id) AS download_count \
                 FROM users u ORDER BY u.created_at DESC, u.id DESC LIMIT ? OFFSET ?",
            )
            .bind(params.limit())
            .bind(params.offset())
            .fetch_all(db)
            .await
            .context("Failed to list user profiles")?
        });
        Ok((profiles, total))
    }

    async fn list_roles(&self) -> Result<Vec<Role>> {
        let roles = dispatch!(self.pool, db => {
            sqlx::query_as::<_, Role>(
                "SELECT r.id, r.name, r.description, \
                        (SELECT COUNT(*) FROM users u WHERE u.role = r.name) AS user_count \
                 FROM roles r ORDER BY r.id",
            )
            .fetch_all(db)
            .await
            .context("Failed to list roles")?
        });
        Ok(roles)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_support::migrated_pool;

    async fn setup_test_repo() -> (DynDatabasePool, SqlxUserRepository) {
        let pool = migrated_pool().await;
        let repo = SqlxUserRepository::new(pool.clone());
        (pool, repo)
    }

    fn new_user(username: &str, email: &str) -> NewUser {
        NewUser {
            username: username.to_string(),
            email: email.to_string(),
            password_hash: "$2b$04$placeholderhash".to_string(),
            full_name: None,
            role: UserRole::User,
        }
    }

    #[tokio::test]
    async fn test_create_and_get_user() {
        let (_pool, repo) = setup_test_repo().await;

        let created = repo
            .create(&new_user("reader", "reader@example.com"))
            .await
            .expect("Failed to create user");

        assert!(created.id > 0);
        assert_eq!(created.role, UserRole::User);
        assert_eq!(created.status, UserStatus::Active);

        let found = repo.get_by_id(created.id).await.unwrap().expect("User not found");
        assert_eq!(found.username, "reader");
        assert_eq!(found.password_hash, "$2b$04$placeholderhash");
    }

    #[tokio::test]
    async fn test_get_by_email_is_case_insensitive() {
        let (_pool, repo) = setup_test_repo().await;
        repo.create(&new_user("mixed", "Mixed@Example.com")).await.unwrap();

        let found = repo.get_by_email("mixed@example.COM").await.unwrap();
        assert_eq!(found.map(|u| u.username), Some("mixed".to_string()));
        assert!(repo.get_by_username("nobody").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_usernames_ignore_case() {
        let (_pool, repo) = setup_test_repo().await;
        repo.create(&new_user("Alice", "alice@example.com")).await.unwrap();

        let found = repo.get_by_username("aLICE").await.unwrap();
        assert_eq!(found.map(|u| u.username), Some("Alice".to_string()));
        assert!(repo.create(&new_user("alice", "other@example.com")).await.is_err());
    }

    #[tokio::test]
    async fn test_unique_constraints() {
        let (_pool, repo) = setup_test_repo().await;
        repo.create(&new_user("dup", "a@example.com")).await.unwrap();

        assert!(repo.create(&new_user("dup", "b@example.com")).await.is_err());
        assert!(repo.create(&new_user("other", "a@example.com")).await.is_err());
    }

    #[tokio::test]
    async fn test_update_role_and_status() {
        let (_pool, repo) = setup_test_repo().await;
        let mut user = repo.create(&new_user("promote", "p@example.com")).await.unwrap();

        user.role = UserRole::Editor;
        user.status = UserStatus::Banned;
        user.bio = Some("Loves poetry".into());
        let updated = repo.update(&user).await.unwrap();

        assert_eq!(updated.role, UserRole::Editor);
        assert_eq!(updated.status, UserStatus::Banned);
        assert_eq!(updated.bio.as_deref(), Some("Loves poetry"));
        assert_eq!(repo.count_by_role(UserRole::Editor).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_list_with_search_and_role() {
        let (_pool, repo) = setup_test_repo().await;
        repo.create(&new_user("alice", "alice@example.com")).await.unwrap();
        repo.create(&new_user("bob", "bob@example.com")).await.unwrap();
        let mut carol = repo.create(&new_user("carol", "carol@example.com")).await.unwrap();
        carol.role = UserRole::Admin;
        repo.update(&carol).await.unwrap();

        let (all, total) = repo.list(&ListParams::new(1, 2), None, None).await.unwrap();
        assert_eq!(total, 3);
        assert_eq!(all.len(), 2);

        let (found, total) = repo.list(&ListParams::default(), Some("ALI"), None).await.unwrap();
        assert_eq!(total, 1);
        assert_eq!(found[0].username, "alice");

        let (admins, _) = repo
            .list(&ListParams::default(), None, Some(UserRole::Admin))
            .await
            .unwrap();
        assert_eq!(admins.len(), 1);
        assert_eq!(admins[0].username, "carol");
    }

    #[tokio::test]
    async fn test_list_roles_counts_users() {
        let (_pool, repo) = setup_test_repo().await;
        repo.create(&new_user("one", "one@example.com")).await.unwrap();

        let roles = repo.list_roles().await.unwrap();
        let names: Vec<&str> = roles.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["admin", "editor", "user"]);
        assert_eq!(roles[2].user_count, 1);
    }

    #[tokio::test]
    async fn test_delete_and_profiles() {
        let (_pool, repo) = setup_test_repo().await;
        let user = repo.create(&new_user("gone", "gone@example.com")).await.unwrap();

        let (profiles, total) = repo.list_profiles(&ListParams::default()).await.unwrap();
        assert_eq!(total, 1);
        assert_eq!(profiles[0].bookmark_count, 0);

        assert!(repo.delete(user.id).await.unwrap());
        assert!(!repo.delete(user.id).await.unwrap());
        assert_eq!(repo.count().await.unwrap(), 0);
    }
}
