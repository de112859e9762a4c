use std::time::Duration;

use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use crate::auth::repo_types::{ResetCode, User, UserRow};
use crate::db::{with_timeout, StoreError};

const USER_COLUMNS: &str = "id, username, password_hash, reset_code_hash, \
                            reset_code_expires_at, role, created_at, updated_at";

/// Persistence of user identities, credentials and reset state.
#[async_trait]
pub trait UserStore: Send + Sync {
    async fn get_by_username(&self, username: &str) -> Result<Option<User>, StoreError>;

    async fn get_by_id(&self, id: Uuid) -> Result<Option<User>, StoreError>;

    async fn exists_by_username(&self, username: &str) -> Result<bool, StoreError>;

    /// Fails with [`StoreError::Conflict`] when the username is taken.
    async fn create(&self, username: &str, role: &str, password_hash: &str)
        -> Result<User, StoreError>;

    /// `None` clears the reset state.
    async fn update_reset_code(
        &self,
        user_id: Uuid,
        reset: Option<ResetCode>,
    ) -> Result<(), StoreError>;

    /// Writes the new hash and clears any pending reset code in one statement.
    async fn update_password(&self, user_id: Uuid, password_hash: &str) -> Result<(), StoreError>;
}

#[derive(Clone)]
pub struct PgUserStore {
    pool: PgPool,
    timeout: Duration,
}

impl PgUserStore {
    pub fn new(pool: PgPool, timeout: Duration) -> Self {
        Self { pool, timeout }
    }
}

#[async_trait]
impl UserStore for PgUserStore {
    async fn get_by_username(&self, username: &str) -> Result<Option<User>, StoreError> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE username = $1");
        let row = with_timeout(
            self.timeout,
            sqlx::query_as::<_, UserRow>(&sql)
                .bind(username)
                .fetch_optional(&self.pool),
        )
        .await?;
        Ok(row.map(User::from))
    }

    async fn get_by_id(&self, id: Uuid) -> Result<Option<User>, StoreError> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1");
        let row = with_timeout(
            self.timeout,
            sqlx::query_as::<_, UserRow>(&sql)
                .bind(id)
                .fetch_optional(&self.pool),
        )
        .await?;
        Ok(row.map(User::from))
    }

    async fn exists_by_username(&self, username: &str) -> Result<bool, StoreError> {
        with_timeout(
            self.timeout,
            sqlx::query_scalar::<_, bool>(
                r#"SELECT EXISTS (SELECT 1 FROM users WHERE username = $1)"#,
            )
            .bind(username)
            .fetch_one(&self.pool),
        )
        .await
    }

    async fn create(
        &self,
        username: &str,
        role: &str,
        password_hash: &str,
    ) -> Result<User, StoreError> {
        let sql = format!(
            "INSERT INTO users (username, password_hash, role) \
             VALUES ($1, $2, $3) \
             RETURNING {USER_COLUMNS}"
        );
        let row = with_timeout(
            self.timeout,
            sqlx::query_as::<_, UserRow>(&sql)
                .bind(username)
                .bind(password_hash)
                .bind(role)
                .fetch_one(&self.pool),
        )
        .await?;
        Ok(row.into())
    }

    async fn update_reset_code(
        &self,
        user_id: Uuid,
        reset: Option<ResetCode>,
    ) -> Result<(), StoreError> {
        let (hash, expires_at) = match reset {
            Some(ResetCode { hash, expires_at }) => (Some(hash), Some(expires_at)),
            None => (None, None),
        };
        with_timeout(
            self.timeout,
            sqlx::query(
                r#"
                UPDATE users
                SET reset_code_hash = $2, reset_code_expires_at = $3, updated_at = NOW()
                WHERE id = $1
                "#,
            )
            .bind(user_id)
            .bind(hash)
            .bind(expires_at)
            .execute(&self.pool),
        )
        .await?;
        Ok(())
    }

    async fn update_password(&self, user_id: Uuid, password_hash: &str) -> Result<(), StoreError> {
        with_timeout(
            self.timeout,
            sqlx::query(
                r#"
                UPDATE users
                SET password_hash = $2,
                    reset_code_hash = NULL,
                    reset_code_expires_at = NULL,
                    updated_at = NOW()
                WHERE id = $1
                "#,
            )
            .bind(user_id)
            .bind(password_hash)
            .execute(&self.pool),
        )
        .await?;
        Ok(())
    }
}
