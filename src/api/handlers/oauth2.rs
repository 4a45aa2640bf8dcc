//! OIDC callback and one-time code exchange.
//!
//! Tokens never ride in redirect URLs: the callback hands the frontend a
//! short-lived single-use code, and the frontend swaps it for the token
//! over `/auth/exchange`.

use axum::{
    extract::{Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Redirect, Response},
    Json,
};
use serde_json::json;
use tracing::{debug, warn};
use url::Url;

use crate::api::types::{ApiResult, ExchangeQuery, LoginResponse, TOKEN_NAME};
use crate::api::AppState;
use crate::auth::error::AuthError;
use crate::auth::user::LoginUser;
use crate::remote::{NewUser, RemoteError};

fn redirect_with(uri: &Url, key: &str, value: &str) -> Response {
    let mut target = uri.clone();
    target.query_pairs_mut().append_pair(key, value);
    Redirect::to(target.as_str()).into_response()
}

/// Mirror an externally provisioned user into the system of record.
/// Conflicts mean the user already exists and are not an error.
async fn sync_user(state: &AppState, user: &LoginUser) {
    let Some(username) = &user.username else {
        return;
    };
    let payload = NewUser::oauth2(
        username.clone(),
        user.nickname.clone(),
        user.email.clone(),
        None,
    );
    match state.users.create_oauth2_user(&payload).await {
        Ok(()) => debug!("provisioned user {username} from OIDC login"),
        Err(RemoteError::Rejected { code: 409, .. }) => {
            debug!("user {username} already provisioned");
        }
        Err(err) => warn!("failed to sync user {username}: {err}"),
    }
}

#[utoipa::path(
    get,
    path = "/auth/callback",
    responses(
        (status = 302, description = "Redirect to the frontend with a one-time code"),
        (status = 200, description = "One-time code, when no redirect target is configured"),
        (status = 401, description = "No verifiable identity on the request"),
    ),
    tag = "oauth2"
)]
pub async fn callback(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Response, AuthError> {
    // The inbound token rides the Authorization header only. Accepting it
    // as a query parameter would put it into access logs and referrers,
    // which is exactly what the outbound one-time code avoids.
    let ctx = state.provider.context(&headers);

    let Some(user) = state.provider.get_login_user(&ctx).await else {
        return match &state.frontend_redirect_uri {
            Some(uri) => Ok(redirect_with(uri, "error", "no_user")),
            None => Err(AuthError::Unauthorized),
        };
    };

    sync_user(&state, &user).await;

    let token = state
        .provider
        .get_token(&ctx)
        .ok_or(AuthError::Unauthorized)?;
    let code = state.exchange.issue(&token).await.map_err(|err| {
        warn!("failed to issue exchange code: {err}");
        AuthError::Unavailable
    })?;

    match &state.frontend_redirect_uri {
        Some(uri) => Ok(redirect_with(uri, "code", &code)),
        None => Ok(Json(ApiResult::ok(json!({ "code": code }))).into_response()),
    }
}

#[utoipa::path(
    get,
    path = "/auth/exchange",
    params(("code" = String, Query, description = "One-time exchange code")),
    responses(
        (status = 200, description = "Token for the redeemed code", body = LoginResponse, content_type = "application/json"),
        (status = 401, description = "Unknown, expired, or already redeemed code"),
    ),
    tag = "oauth2"
)]
pub async fn exchange(
    State(state): State<AppState>,
    Query(query): Query<ExchangeQuery>,
) -> Result<Json<ApiResult<LoginResponse>>, Response> {
    let token = state.exchange.redeem(&query.code).await.map_err(|err| {
        warn!("failed to redeem exchange code: {err}");
        AuthError::Unavailable.into_response()
    })?;

    let Some(token) = token else {
        let envelope =
            ApiResult::<()>::fail(401, "invalid or expired exchange code");
        return Err((StatusCode::UNAUTHORIZED, Json(envelope)).into_response());
    };

    Ok(Json(ApiResult::ok(LoginResponse {
        token: Some(token),
        token_name: TOKEN_NAME.to_string(),
        user: None,
    })))
}
