use async_trait::async_trait;
use axum::{
    extract::{FromRequestParts, Request, State},
    http::{header::AUTHORIZATION, request::Parts},
    middleware::Next,
    response::Response,
};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::auth::jwt::JwtKeys;
use crate::error::AppError;

/// Identity bound to the request by [`require_auth`].
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub id: Uuid,
    pub username: String,
    pub role: String,
}

/// Rejects requests without a valid `Bearer` token and attaches [`AuthUser`].
pub async fn require_auth(
    State(keys): State<JwtKeys>,
    mut req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let token = req
        .headers()
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .ok_or_else(|| AppError::unauthorized("missing token"))?;

    let claims = keys.verify(token).map_err(|e| {
        warn!(error = %e, "token rejected");
        AppError::unauthorized("invalid token")
    })?;
    debug!(user_id = %claims.user_id, "token accepted");

    req.extensions_mut().insert(AuthUser {
        id: claims.user_id,
        username: claims.username,
        role: claims.role,
    });
    Ok(next.run(req).await)
}

#[async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthUser>()
            .cloned()
            .ok_or_else(|| AppError::unauthorized("missing token"))
    }
}
