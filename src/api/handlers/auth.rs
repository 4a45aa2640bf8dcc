//! Login, logout, session info, and token refresh.

use axum::{
    extract::{ConnectInfo, State},
    http::HeaderMap,
    Json,
};
use std::net::SocketAddr;
use tracing::instrument;

use crate::api::types::{ApiResult, LoginRequest, LoginResponse, UserInfoResponse};
use crate::api::AppState;
use crate::auth::error::AuthError;
use crate::headers::extract_client_ip;

#[utoipa::path(
    post,
    path = "/auth/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Login successful", body = LoginResponse, content_type = "application/json"),
        (status = 401, description = "Invalid username or password"),
        (status = 423, description = "Account locked"),
        (status = 429, description = "Too many requests from this address"),
    ),
    tag = "auth"
)]
#[instrument(skip(state, peer, headers, payload))]
pub async fn login(
    State(state): State<AppState>,
    peer: Option<ConnectInfo<SocketAddr>>,
    headers: HeaderMap,
    payload: Option<Json<LoginRequest>>,
) -> Result<Json<ApiResult<LoginResponse>>, AuthError> {
    let Some(Json(request)) = payload else {
        return Err(AuthError::Validation("missing payload".to_string()));
    };

    let ctx = state.provider.context(&headers);
    // Proxy headers first, else the connection's own peer address, so a
    // direct client is rate limited too.
    let client_ip = extract_client_ip(&headers)
        .or_else(|| peer.map(|ConnectInfo(addr)| addr.ip().to_string()));
    let outcome = state
        .login
        .login(&ctx, &request.username, &request.password, client_ip.as_deref())
        .await?;

    Ok(Json(ApiResult::ok(LoginResponse {
        token: outcome.token,
        token_name: outcome.token_name.to_string(),
        user: Some(outcome.user),
    })))
}

#[utoipa::path(
    post,
    path = "/auth/logout",
    responses(
        (status = 200, description = "Session terminated", content_type = "application/json"),
    ),
    tag = "auth"
)]
pub async fn logout(State(state): State<AppState>, headers: HeaderMap) -> Json<ApiResult<()>> {
    let ctx = state.provider.context(&headers);
    state.login.logout(&ctx).await;
    Json(ApiResult::ok_empty())
}

#[utoipa::path(
    get,
    path = "/auth/info",
    responses(
        (status = 200, description = "Authenticated principal", body = UserInfoResponse, content_type = "application/json"),
        (status = 401, description = "Not logged in"),
    ),
    tag = "auth"
)]
pub async fn user_info(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<ApiResult<UserInfoResponse>>, AuthError> {
    let ctx = state.provider.context(&headers);
    let user = state.login.user_info(&ctx).await?;

    let mut roles: Vec<String> = user.roles.iter().cloned().collect();
    roles.sort();
    let mut permissions: Vec<String> = user.permissions.iter().cloned().collect();
    permissions.sort();

    Ok(Json(ApiResult::ok(UserInfoResponse {
        user,
        roles,
        permissions,
    })))
}

#[utoipa::path(
    post,
    path = "/auth/refresh",
    responses(
        (status = 200, description = "Session extended", body = LoginResponse, content_type = "application/json"),
        (status = 401, description = "No live session"),
    ),
    tag = "auth"
)]
pub async fn refresh(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<ApiResult<LoginResponse>>, AuthError> {
    let ctx = state.provider.context(&headers);
    let token = state.login.refresh(&ctx).await?;
    Ok(Json(ApiResult::ok(LoginResponse {
        token,
        token_name: crate::api::types::TOKEN_NAME.to_string(),
        user: None,
    })))
}
