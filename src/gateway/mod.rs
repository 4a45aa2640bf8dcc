//! Gateway identity filter.
//!
//! Every request first loses all trust and identity headers, whatever the
//! client sent. Only after that, and only when the configured provider
//! verifies the bearer token, are identity headers re-injected for
//! downstream handlers. The request is always forwarded: endpoints decide
//! for themselves whether anonymous access is acceptable.

use axum::{
    extract::{Request, State},
    http::{HeaderMap, HeaderValue},
    middleware::Next,
    response::Response,
};
use std::sync::Arc;
use tracing::debug;

use crate::auth::provider::AuthProvider;
use crate::headers::{
    HEADER_FROM_SOURCE, HEADER_INNER_AUTH_SIGN, HEADER_INNER_AUTH_TIMESTAMP, HEADER_TENANT_ID,
    HEADER_USERNAME, HEADER_USER_ID,
};

const TRUST_HEADERS: [&str; 6] = [
    HEADER_USER_ID,
    HEADER_USERNAME,
    HEADER_TENANT_ID,
    HEADER_FROM_SOURCE,
    HEADER_INNER_AUTH_SIGN,
    HEADER_INNER_AUTH_TIMESTAMP,
];

fn strip_trust_headers(headers: &mut HeaderMap) {
    for name in TRUST_HEADERS {
        if headers.remove(name).is_some() {
            debug!("stripped client-supplied header {name}");
        }
    }
}

fn insert_if_valid(headers: &mut HeaderMap, name: &'static str, value: &str) {
    match HeaderValue::from_str(value) {
        Ok(value) => {
            headers.insert(name, value);
        }
        Err(err) => debug!("identity value for {name} is not header-safe: {err}"),
    }
}

pub async fn identity_filter(
    State(provider): State<Arc<AuthProvider>>,
    mut request: Request,
    next: Next,
) -> Response {
    strip_trust_headers(request.headers_mut());

    // The context is built after stripping, so forwarded identity can only
    // come from what this filter verifies below.
    let ctx = provider.context(request.headers());
    if let Some(user) = provider.get_login_user(&ctx).await {
        let headers = request.headers_mut();
        if let Some(user_id) = user.user_id {
            insert_if_valid(headers, HEADER_USER_ID, &user_id.to_string());
        }
        if let Some(username) = &user.username {
            insert_if_valid(headers, HEADER_USERNAME, username);
        }
        if let Some(tenant_id) = &user.tenant_id {
            insert_if_valid(headers, HEADER_TENANT_ID, tenant_id);
        }
    }

    next.run(request).await
}
