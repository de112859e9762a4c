use std::time::Duration;

use axum::extract::FromRef;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use tracing::debug;
use uuid::Uuid;

use crate::config::JwtConfig;
use crate::state::AppState;

/// Access token payload. `sub` repeats `user_id`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Claims {
    pub user_id: Uuid,
    pub username: String,
    pub role: String,
    pub iat: i64,
    pub exp: i64,
    pub sub: String,
}

#[derive(Debug)]
pub struct IssuedToken {
    pub token: String,
    pub expires_in: u64,
}

/// HS256 signing and verification keys derived from the shared secret.
#[derive(Clone)]
pub struct JwtKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
    ttl: Duration,
}

impl FromRef<AppState> for JwtKeys {
    fn from_ref(state: &AppState) -> Self {
        state.jwt.clone()
    }
}

impl JwtKeys {
    pub fn new(config: &JwtConfig) -> Self {
        Self {
            encoding: EncodingKey::from_secret(config.secret.as_bytes()),
            decoding: DecodingKey::from_secret(config.secret.as_bytes()),
            ttl: config.expires_in,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn sign(
        &self,
        user_id: Uuid,
        username: &str,
        role: &str,
    ) -> jsonwebtoken::errors::Result<IssuedToken> {
        self.sign_at(user_id, username, role, OffsetDateTime::now_utc())
    }

    pub fn sign_at(
        &self,
        user_id: Uuid,
        username: &str,
        role: &str,
        now: OffsetDateTime,
    ) -> jsonwebtoken::errors::Result<IssuedToken> {
        let iat = now.unix_timestamp();
        let claims = Claims {
            user_id,
            username: username.to_owned(),
            role: role.to_owned(),
            iat,
            exp: iat + self.ttl.as_secs() as i64,
            sub: user_id.to_string(),
        };
        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)?;
        debug!(%user_id, "jwt signed");
        Ok(IssuedToken {
            token,
            expires_in: self.ttl.as_secs(),
        })
    }

    /// Checks signature and expiry with no leeway.
    pub fn verify(&self, token: &str) -> jsonwebtoken::errors::Result<Claims> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        let data = decode::<Claims>(token, &self.decoding, &validation)?;
        Ok(data.claims)
    }
}
