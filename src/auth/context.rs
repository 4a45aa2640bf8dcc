//! Per-request authentication context.
//!
//! There is no ambient security context: each request's token and any
//! gateway-verified identity headers are captured into an [`AuthContext`]
//! up front and passed explicitly through the provider calls.

use axum::http::{header::AUTHORIZATION, HeaderMap};

use crate::auth::provider::oidc::OidcClaims;
use crate::headers::{bearer_token, HEADER_TENANT_ID, HEADER_USERNAME, HEADER_USER_ID};

/// Identity injected by the gateway identity filter. Trusted because the
/// filter strips these headers from anything arriving from outside.
#[derive(Debug, Clone, Default)]
pub struct ForwardedIdentity {
    pub user_id: Option<String>,
    pub username: Option<String>,
    pub tenant_id: Option<String>,
}

impl ForwardedIdentity {
    #[must_use]
    pub fn from_headers(headers: &HeaderMap) -> Self {
        let get = |name: &str| {
            headers
                .get(name)
                .and_then(|value| value.to_str().ok())
                .filter(|value| !value.is_empty())
                .map(str::to_string)
        };
        Self {
            user_id: get(HEADER_USER_ID),
            username: get(HEADER_USERNAME),
            tenant_id: get(HEADER_TENANT_ID),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct AuthContext {
    /// Bearer token from the `Authorization` header, unverified.
    pub token: Option<String>,
    /// Claims of the bearer token, present only after verification.
    pub claims: Option<OidcClaims>,
    pub forwarded: ForwardedIdentity,
}

impl AuthContext {
    /// Capture the raw token and forwarded identity from request headers.
    /// Claim verification is the provider's job; see
    /// [`crate::auth::provider::AuthProvider::context`].
    #[must_use]
    pub fn from_headers(headers: &HeaderMap) -> Self {
        let token = headers
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(bearer_token);
        Self {
            token,
            claims: None,
            forwarded: ForwardedIdentity::from_headers(headers),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn captures_bearer_token_and_identity() {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer tok123"));
        headers.insert(HEADER_USER_ID, HeaderValue::from_static("42"));
        headers.insert(HEADER_USERNAME, HeaderValue::from_static("admin"));
        let ctx = AuthContext::from_headers(&headers);
        assert_eq!(ctx.token.as_deref(), Some("tok123"));
        assert!(ctx.claims.is_none());
        assert_eq!(ctx.forwarded.user_id.as_deref(), Some("42"));
        assert_eq!(ctx.forwarded.username.as_deref(), Some("admin"));
        assert!(ctx.forwarded.tenant_id.is_none());
    }

    #[test]
    fn empty_headers_yield_empty_context() {
        let ctx = AuthContext::from_headers(&HeaderMap::new());
        assert!(ctx.token.is_none());
        assert!(ctx.forwarded.user_id.is_none());
    }

    #[test]
    fn non_bearer_authorization_is_ignored() {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_static("Basic Zm9v"));
        let ctx = AuthContext::from_headers(&headers);
        assert!(ctx.token.is_none());
    }
}
