use std::sync::Arc;

use rand::{rngs::OsRng, Rng};
use time::{Duration as TimeDuration, OffsetDateTime};
use tracing::{info, warn};
use uuid::Uuid;

use crate::auth::jwt::{IssuedToken, JwtKeys};
use crate::auth::password::{hash_password, verify_password};
use crate::auth::repo::UserStore;
use crate::auth::repo_types::{ResetCode, User};
use crate::db::StoreError;
use crate::error::{AppError, Result};

const RESET_CODE_DIGITS: usize = 6;
const RESET_CODE_TTL: TimeDuration = TimeDuration::minutes(10);
const DEFAULT_ROLE: &str = "user";

pub struct AuthSettings {
    pub password_min_len: usize,
    /// Echo reset codes back to the caller instead of relying on out-of-band delivery.
    pub dev_reset_codes: bool,
}

pub struct LoginOutcome {
    pub token: IssuedToken,
    pub user: User,
}

/// Credential checks, token issuance, the reset-code flow and user creation.
pub struct AuthService {
    users: Arc<dyn UserStore>,
    keys: JwtKeys,
    settings: AuthSettings,
}

impl AuthService {
    pub fn new(users: Arc<dyn UserStore>, keys: JwtKeys, settings: AuthSettings) -> Self {
        Self {
            users,
            keys,
            settings,
        }
    }

    pub async fn login(&self, username: &str, password: &str) -> Result<LoginOutcome> {
        let Some(user) = self.users.get_by_username(username).await? else {
            warn!(%username, "login unknown user");
            return Err(invalid_credentials());
        };

        if !verify_password(password.to_owned(), user.password_hash.clone()).await? {
            warn!(user_id = %user.id, "login invalid password");
            return Err(invalid_credentials());
        }

        let token = self
            .keys
            .sign(user.id, &user.username, &user.role)
            .map_err(|e| AppError::internal(format!("jwt sign: {e}")))?;

        info!(user_id = %user.id, %username, "user logged in");
        Ok(LoginOutcome { token, user })
    }

    /// Stores a fresh reset code. The plaintext comes back only in dev mode.
    pub async fn forgot(&self, username: &str) -> Result<Option<String>> {
        let user = self
            .users
            .get_by_username(username)
            .await?
            .ok_or_else(user_not_found)?;

        let code = generate_reset_code();
        let hash = hash_password(code.clone()).await?;
        let reset = ResetCode {
            hash,
            expires_at: OffsetDateTime::now_utc() + RESET_CODE_TTL,
        };
        self.users.update_reset_code(user.id, Some(reset)).await?;

        info!(user_id = %user.id, "reset code issued");
        Ok(self.settings.dev_reset_codes.then_some(code))
    }

    pub async fn reset(&self, username: &str, code: &str, new_password: &str) -> Result<()> {
        self.check_password_len(new_password)?;

        let user = self
            .users
            .get_by_username(username)
            .await?
            .ok_or_else(user_not_found)?;

        let Some(reset) = user.reset else {
            return Err(AppError::validation("reset code not requested"));
        };
        if OffsetDateTime::now_utc() >= reset.expires_at {
            return Err(AppError::validation("reset code expired"));
        }
        if !verify_password(code.to_owned(), reset.hash).await? {
            warn!(user_id = %user.id, "reset with wrong code");
            return Err(AppError::validation("invalid reset code"));
        }

        let hash = hash_password(new_password.to_owned()).await?;
        self.users.update_password(user.id, &hash).await?;

        info!(user_id = %user.id, "password reset");
        Ok(())
    }

    pub async fn create_user(&self, username: &str, password: &str, role: &str) -> Result<User> {
        self.check_password_len(password)?;

        if self.users.exists_by_username(username).await? {
            return Err(username_taken());
        }

        let role = match role.trim() {
            "" => DEFAULT_ROLE,
            other => other,
        };
        let hash = hash_password(password.to_owned()).await?;
        let user = self
            .users
            .create(username, role, &hash)
            .await
            .map_err(|e| match e {
                StoreError::Conflict(_) => username_taken(),
                other => other.into(),
            })?;

        info!(user_id = %user.id, %username, %role, "user created");
        Ok(user)
    }

    pub async fn profile(&self, user_id: Uuid) -> Result<User> {
        self.users
            .get_by_id(user_id)
            .await?
            .ok_or_else(user_not_found)
    }

    fn check_password_len(&self, password: &str) -> Result<()> {
        let min = self.settings.password_min_len;
        if password.chars().count() < min {
            return Err(AppError::validation(format!(
                "password must be at least {min} characters"
            )));
        }
        Ok(())
    }
}

/// Six independent uniform digits from the OS RNG.
pub fn generate_reset_code() -> String {
    let mut rng = OsRng;
    (0..RESET_CODE_DIGITS)
        .map(|_| char::from(b'0' + rng.gen_range(0..10u8)))
        .collect()
}

fn invalid_credentials() -> AppError {
    AppError::unauthorized("invalid credentials")
}

fn user_not_found() -> AppError {
    AppError::not_found("user not found")
}

fn username_taken() -> AppError {
    AppError::conflict("username already exists")
}
