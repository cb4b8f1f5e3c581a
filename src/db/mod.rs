//! Database layer
//!
//! This module provides database abstraction for the iYKELib library backend.
//! It supports:
//! - MySQL (production deployments)
//! - SQLite (in-memory for tests, single file for demos)
//!
//! The database driver is selected based on configuration.
//!
//! # Architecture
//!
//! The database layer uses a trait-based abstraction (`DatabasePool`) so that
//! repositories work with either backend. Both drivers accept `?` placeholders,
//! so repositories write one SQL string and run it through [`dispatch!`], which
//! expands the query body once per driver.
//!
//! # Usage
//!
//! ```ignore
//! use iykelib::config::DatabaseConfig;
//! use iykelib::db::{create_pool, migrations};
//!
//! let pool = create_pool(&DatabaseConfig::default()).await?;
//! migrations::run_migrations(&pool).await?;
//! pool.ping().await?;
//! ```

pub mod migrations;
pub mod pool;
pub mod repositories;

#[cfg(test)]
pub(crate) mod test_support;

pub use pool::{
    create_pool, create_test_pool, DatabasePool, DynDatabasePool, MysqlDatabase, SqliteDatabase,
};

use sqlx::{mysql::MySqlQueryResult, sqlite::SqliteQueryResult};

/// Run `$body` against the concrete pool behind a `DynDatabasePool`.
///
/// `$db` is bound to `&SqlitePool` or `&MySqlPool` in turn, so the body must
/// produce the same type for both drivers. Use this only inside functions that
/// return `anyhow::Result`.
macro_rules! dispatch {
    ($pool:expr, $db:ident => $body:expr) => {
        match $pool.driver() {
            $crate::config::DatabaseDriver::Sqlite => {
                let $db = $pool
                    .as_sqlite()
                    .ok_or_else(|| anyhow::anyhow!("SQLite pool unavailable"))?;
                $body
            }
            $crate::config::DatabaseDriver::Mysql => {
                let $db = $pool
                    .as_mysql()
                    .ok_or_else(|| anyhow::anyhow!("MySQL pool unavailable"))?;
                $body
            }
        }
    };
}

/// Bind a slice of [`SqlArg`] values onto a query in order.
macro_rules! bind_args {
    ($query:expr, $args:expr) => {{
        let mut query = $query;
        for arg in $args.iter() {
            query = match arg {
                $crate::db::SqlArg::Int(v) => query.bind(*v),
                $crate::db::SqlArg::Text(v) => query.bind(v.clone()),
                $crate::db::SqlArg::Bool(v) => query.bind(*v),
            };
        }
        query
    }};
}

pub(crate) use bind_args;
pub(crate) use dispatch;

/// A value bound into a dynamically assembled query
#[derive(Debug, Clone, PartialEq)]
pub enum SqlArg {
    Int(i64),
    Text(String),
    Bool(bool),
}

/// Driver-neutral access to the id generated by an INSERT
pub trait InsertedId {
    fn inserted_id(&self) -> i64;
}

impl InsertedId for SqliteQueryResult {
    fn inserted_id(&self) -> i64 {
        self.last_insert_rowid()
    }
}

impl InsertedId for MySqlQueryResult {
    fn inserted_id(&self) -> i64 {
        self.last_insert_id() as i64
    }
}

/// Lowercased `%term%` pattern for `LOWER(col) LIKE ? ESCAPE '!'`.
///
/// `!` is the escape character because both drivers read it the same way.
pub fn like_pattern(term: &str) -> String {
    let mut escaped = String::with_capacity(term.len() + 2);
    escaped.push('%');
    for c in term.to_lowercase().chars() {
        if matches!(c, '%' | '_' | '!') {
            escaped.push('!');
        }
        escaped.push(c);
    }
    escaped.push('%');
    escaped
}

/// True when the error is a UNIQUE constraint violation
pub fn is_unique_violation(err: &anyhow::Error) -> bool {
    err.chain().any(|cause| {
        cause
            .downcast_ref::<sqlx::Error>()
            .and_then(|e| e.as_database_error())
            .map(|db| db.is_unique_violation())
            .unwrap_or(false)
    })
}
