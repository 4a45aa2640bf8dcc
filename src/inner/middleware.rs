//! Verification side of inner-call signing, mounted by callee services in
//! front of internal-only routes.

use axum::{
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use std::sync::Arc;
use tracing::warn;

use super::InnerSigner;
use crate::api::types::ApiResult;
use crate::headers::{
    HEADER_FROM_SOURCE, HEADER_INNER_AUTH_SIGN, HEADER_INNER_AUTH_TIMESTAMP, INNER,
};

/// Reject any request that does not carry the inner marker plus a valid,
/// fresh signature. Failures are security events for service-to-service
/// callers only, never surfaced to end users.
pub async fn require_inner_auth(
    State(signer): State<Arc<InnerSigner>>,
    request: Request,
    next: Next,
) -> Response {
    let headers = request.headers();

    let source = headers
        .get(HEADER_FROM_SOURCE)
        .and_then(|value| value.to_str().ok());
    if source != Some(INNER) {
        warn!("rejected non-internal call to internal route");
        return reject();
    }

    let signature = headers
        .get(HEADER_INNER_AUTH_SIGN)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default();
    let timestamp = headers
        .get(HEADER_INNER_AUTH_TIMESTAMP)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default();

    if !signer.verify(signature, timestamp) {
        warn!("rejected internal call with invalid signature");
        return reject();
    }

    next.run(request).await
}

fn reject() -> Response {
    (
        StatusCode::FORBIDDEN,
        Json(ApiResult::<()>::fail(403, "inner call authentication failed")),
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use axum::{body::Body, http::Request as HttpRequest, routing::get, Router};
    use secrecy::SecretString;
    use tower::ServiceExt;

    fn protected_router() -> (Router, Arc<InnerSigner>) {
        let signer = Arc::new(InnerSigner::new(SecretString::from("shared")).unwrap());
        let router = Router::new()
            .route("/user/credentials/:username", get(|| async { "hash" }))
            .layer(axum::middleware::from_fn_with_state(
                signer.clone(),
                require_inner_auth,
            ));
        (router, signer)
    }

    #[tokio::test]
    async fn signed_internal_call_passes() -> Result<()> {
        let (router, signer) = protected_router();
        let timestamp = InnerSigner::now_millis();
        let request = HttpRequest::builder()
            .uri("/user/credentials/admin")
            .header(HEADER_FROM_SOURCE, INNER)
            .header(HEADER_INNER_AUTH_SIGN, signer.sign(timestamp))
            .header(HEADER_INNER_AUTH_TIMESTAMP, timestamp.to_string())
            .body(Body::empty())?;
        let response = router.oneshot(request).await?;
        assert_eq!(response.status(), StatusCode::OK);
        Ok(())
    }

    #[tokio::test]
    async fn missing_marker_is_forbidden() -> Result<()> {
        let (router, signer) = protected_router();
        let timestamp = InnerSigner::now_millis();
        let request = HttpRequest::builder()
            .uri("/user/credentials/admin")
            .header(HEADER_INNER_AUTH_SIGN, signer.sign(timestamp))
            .header(HEADER_INNER_AUTH_TIMESTAMP, timestamp.to_string())
            .body(Body::empty())?;
        let response = router.oneshot(request).await?;
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        Ok(())
    }

    #[tokio::test]
    async fn marker_without_signature_is_forbidden() -> Result<()> {
        let (router, _signer) = protected_router();
        let request = HttpRequest::builder()
            .uri("/user/credentials/admin")
            .header(HEADER_FROM_SOURCE, INNER)
            .body(Body::empty())?;
        let response = router.oneshot(request).await?;
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        Ok(())
    }

    #[tokio::test]
    async fn wrong_secret_is_forbidden() -> Result<()> {
        let (router, _signer) = protected_router();
        let outsider = InnerSigner::new(SecretString::from("not-the-secret"))?;
        let timestamp = InnerSigner::now_millis();
        let request = HttpRequest::builder()
            .uri("/user/credentials/admin")
            .header(HEADER_FROM_SOURCE, INNER)
            .header(HEADER_INNER_AUTH_SIGN, outsider.sign(timestamp))
            .header(HEADER_INNER_AUTH_TIMESTAMP, timestamp.to_string())
            .body(Body::empty())?;
        let response = router.oneshot(request).await?;
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        Ok(())
    }
}
