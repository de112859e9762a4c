use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use tracing::instrument;

use crate::{
    auth::{
        dto::{
            CreateUserRequest, ForgotRequest, ForgotResponse, LoginRequest, MessageResponse,
            ResetRequest, TokenResponse, TokenUser,
        },
        extractors::AuthUser,
        repo_types::UserView,
    },
    error::Result,
    extract::ValidJson,
    state::AppState,
};

/// Unauthenticated endpoints under `/auth`.
pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/auth/login", post(login))
        .route("/auth/forgot", post(forgot))
        .route("/auth/reset", post(reset))
}

/// Endpoints that need a bearer token.
pub fn account_routes() -> Router<AppState> {
    Router::new()
        .route("/me", get(get_me))
        .route("/users", post(create_user))
}

#[instrument(skip(state, payload), fields(username = %payload.username))]
pub async fn login(
    State(state): State<AppState>,
    ValidJson(payload): ValidJson<LoginRequest>,
) -> Result<Json<TokenResponse>> {
    let outcome = state.auth.login(&payload.username, &payload.password).await?;
    Ok(Json(TokenResponse {
        access_token: outcome.token.token,
        token_type: "Bearer",
        expires_in: outcome.token.expires_in,
        user: TokenUser {
            id: outcome.user.id,
            username: outcome.user.username,
            role: outcome.user.role,
        },
    }))
}

#[instrument(skip(state, payload), fields(username = %payload.username))]
pub async fn forgot(
    State(state): State<AppState>,
    ValidJson(payload): ValidJson<ForgotRequest>,
) -> Result<Json<ForgotResponse>> {
    let code = state.auth.forgot(&payload.username).await?;
    Ok(Json(ForgotResponse {
        message: "reset code sent",
        code,
    }))
}

#[instrument(skip(state, payload), fields(username = %payload.username))]
pub async fn reset(
    State(state): State<AppState>,
    ValidJson(payload): ValidJson<ResetRequest>,
) -> Result<Json<MessageResponse>> {
    state
        .auth
        .reset(&payload.username, &payload.code, &payload.new_password)
        .await?;
    Ok(Json(MessageResponse {
        message: "password updated",
    }))
}

#[instrument(skip(state, user), fields(user_id = %user.id))]
pub async fn get_me(State(state): State<AppState>, user: AuthUser) -> Result<Json<UserView>> {
    let user = state.auth.profile(user.id).await?;
    Ok(Json(UserView::from(&user)))
}

#[instrument(skip(state, caller, payload), fields(caller = %caller.id))]
pub async fn create_user(
    State(state): State<AppState>,
    caller: AuthUser,
    ValidJson(payload): ValidJson<CreateUserRequest>,
) -> Result<(StatusCode, Json<UserView>)> {
    let user = state
        .auth
        .create_user(&payload.username, &payload.password, &payload.role)
        .await?;
    Ok((StatusCode::CREATED, Json(UserView::from(&user))))
}
