use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(length(min = 1, message = "username is required"))]
    pub username: String,
    #[validate(length(min = 1, message = "password is required"))]
    pub password: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct ForgotRequest {
    #[validate(length(min = 1, message = "username is required"))]
    pub username: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct ResetRequest {
    #[validate(length(min = 1, message = "username is required"))]
    pub username: String,
    #[validate(length(equal = 6, message = "code must be 6 digits"))]
    pub code: String,
    #[validate(length(min = 1, message = "new_password is required"))]
    pub new_password: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateUserRequest {
    #[validate(length(min = 1, message = "username is required"))]
    pub username: String,
    #[validate(length(min = 1, message = "password is required"))]
    pub password: String,
    #[serde(default)]
    pub role: String,
}

#[derive(Debug, Serialize)]
pub struct TokenUser {
    pub id: Uuid,
    pub username: String,
    pub role: String,
}

#[derive(Debug, Serialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub token_type: &'static str,
    pub expires_in: u64,
    pub user: TokenUser,
}

#[derive(Debug, Serialize)]
pub struct ForgotResponse {
    pub message: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: &'static str,
}
