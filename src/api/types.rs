//! Request/response types for the auth endpoints.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::auth::user::LoginUser;

/// Uniform JSON envelope: `{code, message, data}`.
///
/// `code` mirrors the HTTP status so service-to-service callers can branch
/// on the body alone.
#[derive(Serialize, Deserialize, Debug)]
pub struct ApiResult<T> {
    pub code: u16,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

impl<T> ApiResult<T> {
    pub fn ok(data: T) -> Self {
        Self {
            code: 200,
            message: "ok".to_string(),
            data: Some(data),
        }
    }

    pub fn fail(code: u16, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            data: None,
        }
    }
}

impl ApiResult<()> {
    #[must_use]
    pub fn ok_empty() -> Self {
        Self {
            code: 200,
            message: "ok".to_string(),
            data: None,
        }
    }
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

/// Name of the header clients send the token back in.
pub const TOKEN_NAME: &str = "Authorization";

#[derive(ToSchema, Serialize, Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    pub token: Option<String>,
    pub token_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<LoginUser>,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct UserInfoResponse {
    pub user: LoginUser,
    pub roles: Vec<String>,
    pub permissions: Vec<String>,
}

#[derive(Deserialize, Debug)]
pub struct ExchangeQuery {
    pub code: String,
}
