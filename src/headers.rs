//! Trust and identity header names shared by the gateway filter, the
//! inner-call signer, and the auth providers.

/// Verified user id, set only by the gateway identity filter.
pub const HEADER_USER_ID: &str = "x-user-id";

/// Verified username, set only by the gateway identity filter.
pub const HEADER_USERNAME: &str = "x-username";

/// Verified tenant id, set only by the gateway identity filter.
pub const HEADER_TENANT_ID: &str = "x-tenant-id";

/// Marker for service-to-service calls.
pub const HEADER_FROM_SOURCE: &str = "x-from-source";

/// HMAC signature over the call timestamp.
pub const HEADER_INNER_AUTH_SIGN: &str = "x-inner-auth-sign";

/// Timestamp (unix millis) the signature covers.
pub const HEADER_INNER_AUTH_TIMESTAMP: &str = "x-inner-auth-timestamp";

/// Value of [`HEADER_FROM_SOURCE`] for trusted internal calls.
pub const INNER: &str = "inner";

/// Extract a bearer token from an `Authorization` header value.
#[must_use]
pub fn bearer_token(value: &str) -> Option<String> {
    let trimmed = value.trim();
    let token = trimmed
        .strip_prefix("Bearer ")
        .or_else(|| trimmed.strip_prefix("bearer "))?
        .trim();
    if token.is_empty() {
        None
    } else {
        Some(token.to_string())
    }
}

/// Extract a client IP for rate limiting from common proxy headers.
#[must_use]
pub fn extract_client_ip(headers: &axum::http::HeaderMap) -> Option<String> {
    let forwarded = headers
        .get("x-forwarded-for")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(',').next())
        .map(str::trim)
        .filter(|value| !value.is_empty());
    if forwarded.is_some() {
        return forwarded.map(str::to_string);
    }
    headers
        .get("x-real-ip")
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::{HeaderMap, HeaderValue};

    #[test]
    fn bearer_token_strips_prefix_and_whitespace() {
        assert_eq!(bearer_token("Bearer abc"), Some("abc".to_string()));
        assert_eq!(bearer_token("bearer  abc "), Some("abc".to_string()));
        assert_eq!(bearer_token("Bearer "), None);
        assert_eq!(bearer_token("Basic abc"), None);
    }

    #[test]
    fn extract_client_ip_prefers_forwarded() {
        let mut headers = HeaderMap::new();
        headers.insert(
            "x-forwarded-for",
            HeaderValue::from_static("1.2.3.4, 5.6.7.8"),
        );
        headers.insert("x-real-ip", HeaderValue::from_static("9.9.9.9"));
        assert_eq!(extract_client_ip(&headers), Some("1.2.3.4".to_string()));
    }

    #[test]
    fn extract_client_ip_falls_back_to_real_ip() {
        let mut headers = HeaderMap::new();
        headers.insert("x-real-ip", HeaderValue::from_static("9.9.9.9"));
        assert_eq!(extract_client_ip(&headers), Some("9.9.9.9".to_string()));
    }

    #[test]
    fn extract_client_ip_none_when_missing() {
        assert_eq!(extract_client_ip(&HeaderMap::new()), None);
    }
}
