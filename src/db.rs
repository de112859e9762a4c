use std::future::Future;
use std::time::Duration;

use anyhow::Context;
use sqlx::{postgres::PgPoolOptions, PgPool};
use thiserror::Error;
use tracing::{debug, info};

use crate::auth::{password::hash_password, repo::UserStore};
use crate::config::AppConfig;

/// Persistence failure as seen by services.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database query failed: {0}")]
    Database(#[from] sqlx::Error),

    #[error("database call exceeded {0:?}")]
    Timeout(Duration),

    #[error("unique constraint violated: {0}")]
    Conflict(String),
}

/// Runs one database call under `limit`. Dropping the returned future cancels the query.
pub async fn with_timeout<T, F>(limit: Duration, fut: F) -> Result<T, StoreError>
where
    F: Future<Output = Result<T, sqlx::Error>>,
{
    match tokio::time::timeout(limit, fut).await {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(err)) => Err(classify(err)),
        Err(_) => Err(StoreError::Timeout(limit)),
    }
}

fn classify(err: sqlx::Error) -> StoreError {
    let constraint = err
        .as_database_error()
        .filter(|db| db.is_unique_violation())
        .map(|db| db.constraint().unwrap_or("unique").to_owned());
    match constraint {
        Some(name) => StoreError::Conflict(name),
        None => StoreError::Database(err),
    }
}

pub async fn connect(config: &AppConfig) -> anyhow::Result<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(config.database_max_connections)
        .min_connections(2.min(config.database_max_connections))
        .idle_timeout(Duration::from_secs(5 * 60))
        .acquire_timeout(config.request_timeout)
        .connect(&config.database_url)
        .await
        .context("connect to database")?;

    sqlx::query("SELECT 1")
        .execute(&pool)
        .await
        .context("ping database")?;

    Ok(pool)
}

pub async fn migrate(pool: &PgPool) -> anyhow::Result<()> {
    sqlx::migrate!("./migrations")
        .run(pool)
        .await
        .context("run migrations")?;
    info!("migrations applied");
    Ok(())
}

const SEED_USERS: &[(&str, &str, &str)] = &[
    ("admin", "admin123", "admin"),
    ("user1", "1111", "user"),
    ("user2", "2222", "user"),
];

/// Inserts the demo accounts that are not present yet.
pub async fn ensure_seed_users(users: &dyn UserStore) -> anyhow::Result<()> {
    for (username, password, role) in SEED_USERS {
        if users
            .exists_by_username(username)
            .await
            .with_context(|| format!("look up seed user {username}"))?
        {
            debug!(%username, "seed user present");
            continue;
        }

        let hash = hash_password((*password).to_owned())
            .await
            .with_context(|| format!("hash seed password for {username}"))?;
        match users.create(username, role, &hash).await {
            Ok(user) => info!(user_id = %user.id, %username, %role, "seed user created"),
            // another replica won the race
            Err(StoreError::Conflict(_)) => debug!(%username, "seed user created concurrently"),
            Err(err) => {
                return Err(err).with_context(|| format!("create seed user {username}"));
            }
        }
    }
    Ok(())
}
