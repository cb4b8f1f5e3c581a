//! Create or promote the iYKELib admin account
//!
//! Reads `IYKELIB_ADMIN_USERNAME`, `IYKELIB_ADMIN_EMAIL` and
//! `IYKELIB_ADMIN_PASSWORD`, connects with the server configuration, applies
//! pending migrations and makes sure the account exists with the admin role.
//! An existing account keeps its password.
//!
//! Usage: `seed-admin [config.yml]`

use anyhow::{bail, Context, Result};
use std::path::Path;
use std::process::ExitCode;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use iykelib::{
    config::Config,
    db::{self, repositories::SqlxUserRepository},
    services::{AdminSeed, TokenService, UserService},
};

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "iykelib=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("Admin seeding failed: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn required_env(key: &str) -> Result<String> {
    match std::env::var(key) {
        Ok(value) if !value.trim().is_empty() => Ok(value),
        _ => bail!("{} must be set", key),
    }
}

async fn run() -> Result<()> {
    let username = required_env("IYKELIB_ADMIN_USERNAME")?;
    let email = required_env("IYKELIB_ADMIN_EMAIL")?;
    let password = required_env("IYKELIB_ADMIN_PASSWORD")?;

    let config_path = std::env::args()
        .nth(1)
        .or_else(|| std::env::var("IYKELIB_CONFIG").ok())
        .unwrap_or_else(|| "config.yml".to_string());
    let config = Config::load_with_env(Path::new(&config_path))?;
    config.validate()?;

    let pool = db::create_pool(&config.database)
        .await
        .context("Failed to connect to the database")?;
    let applied = db::migrations::run_migrations(&pool).await?;
    if applied > 0 {
        tracing::info!("Applied {} migrations", applied);
    }

    let users = UserService::new(
        SqlxUserRepository::boxed(pool.clone()),
        TokenService::from_config(&config.auth),
        config.auth.bcrypt_cost,
    );
    let result = users.ensure_admin(&username, &email, &password).await;
    pool.close().await;

    let (user, outcome) = result?;
    match outcome {
        AdminSeed::Created => tracing::info!("Created admin account {} ({})", user.username, user.email),
        AdminSeed::Promoted => tracing::info!("Promoted {} to admin", user.username),
        AdminSeed::AlreadyAdmin => tracing::info!("{} is already an admin", user.username),
    }
    Ok(())
}
