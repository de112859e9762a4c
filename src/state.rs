use std::sync::Arc;

use sqlx::PgPool;

use crate::auth::jwt::JwtKeys;
use crate::auth::repo::{PgUserStore, UserStore};
use crate::auth::services::{AuthService, AuthSettings};
use crate::config::AppConfig;
use crate::middleware::{cors::CorsPolicy, rate_limit::RateLimiter};
use crate::transactions::repo::{PgTransactionStore, TransactionStore};
use crate::transactions::services::TransactionService;

/// Everything a handler or middleware needs, wired once at startup.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub jwt: JwtKeys,
    pub auth: Arc<AuthService>,
    pub transactions: Arc<TransactionService>,
    pub rate_limiter: Arc<RateLimiter>,
    pub cors: CorsPolicy,
}

impl AppState {
    pub fn new(db: PgPool, config: AppConfig) -> Self {
        let users = Arc::new(PgUserStore::new(db.clone(), config.request_timeout));
        let transactions = Arc::new(PgTransactionStore::new(db, config.request_timeout));
        Self::from_parts(config, users, transactions)
    }

    pub fn from_parts(
        config: AppConfig,
        users: Arc<dyn UserStore>,
        transactions: Arc<dyn TransactionStore>,
    ) -> Self {
        let jwt = JwtKeys::new(&config.jwt);
        let auth = AuthService::new(
            users,
            jwt.clone(),
            AuthSettings {
                password_min_len: config.password_min_len,
                dev_reset_codes: config.dev_reset_codes,
            },
        );
        Self {
            jwt,
            auth: Arc::new(auth),
            transactions: Arc::new(TransactionService::new(transactions)),
            rate_limiter: Arc::new(RateLimiter::new(config.rate_limit_per_min)),
            cors: CorsPolicy::new(&config.cors),
            config: Arc::new(config),
        }
    }
}
