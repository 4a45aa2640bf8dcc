//! Error taxonomy for the login pipeline.
//!
//! Wrong-username and wrong-password both map to `InvalidCredentials`,
//! so the two failure paths are indistinguishable to the caller. Lock and
//! rate-limit errors reveal only coarse remaining time, never counter
//! values.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};

use crate::api::types::ApiResult;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuthError {
    #[error("{0}")]
    Validation(String),

    #[error("too many requests, please retry later")]
    RateLimited,

    #[error("account is locked, please retry in {0} minute(s)")]
    AccountLocked(u64),

    #[error("account is locked, please retry later")]
    AccountLockedRetryLater,

    /// Lockout edge: this attempt tripped the threshold.
    #[error("too many failed attempts, account locked for {0} minute(s)")]
    LockedOut(u64),

    #[error("invalid username or password")]
    InvalidCredentials,

    #[error("please login first")]
    Unauthorized,

    #[error("inner call authentication failed")]
    InnerCallAuth,

    #[error("authentication service temporarily unavailable")]
    Unavailable,
}

impl AuthError {
    #[must_use]
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            Self::AccountLocked(_) | Self::AccountLockedRetryLater | Self::LockedOut(_) => {
                StatusCode::LOCKED
            }
            Self::InvalidCredentials | Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::InnerCallAuth => StatusCode::FORBIDDEN,
            Self::Unavailable => StatusCode::SERVICE_UNAVAILABLE,
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let envelope = ApiResult::<()>::fail(status.as_u16(), self.to_string());
        (status, Json(envelope)).into_response()
    }
}
