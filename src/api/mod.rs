//! HTTP surface: router assembly, shared state, and the OpenAPI document.

use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use url::Url;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::auth::{AuthProvider, ExchangeCodes, LoginService};
use crate::gateway::identity_filter;
use crate::remote::CredentialSource;

pub mod handlers;
pub mod types;

#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::health::health,
        handlers::auth::login,
        handlers::auth::logout,
        handlers::auth::user_info,
        handlers::auth::refresh,
        handlers::oauth2::callback,
        handlers::oauth2::exchange,
    ),
    components(schemas(
        types::LoginRequest,
        types::LoginResponse,
        types::UserInfoResponse,
        crate::auth::user::LoginUser,
    )),
    tags(
        (name = "auth", description = "Login, logout, session info"),
        (name = "oauth2", description = "OIDC callback and code exchange"),
        (name = "health", description = "Service health")
    )
)]
pub struct ApiDoc;

#[derive(Clone)]
pub struct AppState {
    pub login: Arc<LoginService>,
    pub provider: Arc<AuthProvider>,
    pub exchange: ExchangeCodes,
    pub users: Arc<dyn CredentialSource>,
    /// Frontend target for the OIDC callback redirect; when absent the
    /// exchange code is returned in the response body instead.
    pub frontend_redirect_uri: Option<Url>,
}

/// Assemble the full application router.
///
/// The identity filter wraps every route, so even the login endpoint sees
/// requests with forged trust headers already removed.
pub fn router(state: AppState) -> Router {
    let provider = state.provider.clone();
    Router::new()
        .route("/health", get(handlers::health::health))
        .route("/auth/login", post(handlers::auth::login))
        .route("/auth/logout", post(handlers::auth::logout))
        .route("/auth/info", get(handlers::auth::user_info))
        .route("/auth/refresh", post(handlers::auth::refresh))
        .route("/auth/callback", get(handlers::oauth2::callback))
        .route("/auth/exchange", get(handlers::oauth2::exchange))
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .layer(middleware::from_fn_with_state(provider, identity_filter))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::guard::BruteForceGuard;
    use crate::auth::password::hash_password;
    use crate::auth::provider::SessionProvider;
    use crate::auth::user::Credentials;
    use crate::auth::{LoginPolicy, LoginUser};
    use crate::remote::{NewUser, RemoteError};
    use crate::store::MemoryCounterStore;
    use anyhow::Result;
    use async_trait::async_trait;
    use axum::body::Body;
    use axum::extract::ConnectInfo;
    use axum::http::{header::AUTHORIZATION, header::CONTENT_TYPE, Request, StatusCode};
    use std::net::SocketAddr;
    use http_body_util::BodyExt;
    use secrecy::SecretString;
    use std::collections::HashSet;
    use tower::ServiceExt;

    struct StubUsers {
        hash: String,
    }

    #[async_trait]
    impl crate::remote::CredentialSource for StubUsers {
        async fn get_credentials(
            &self,
            username: &str,
        ) -> Result<Option<Credentials>, RemoteError> {
            if username != "admin" {
                return Ok(None);
            }
            Ok(Some(Credentials {
                user_id: 1,
                username: "admin".to_string(),
                nickname: Some("Administrator".to_string()),
                password_hash: SecretString::from(self.hash.clone()),
                status: Some(1),
                dept_id: None,
                roles: HashSet::from(["admin".to_string()]),
                permissions: HashSet::from(["*:*:*".to_string()]),
            }))
        }

        async fn get_login_user_by_username(
            &self,
            _username: &str,
        ) -> Result<Option<LoginUser>, RemoteError> {
            Ok(None)
        }

        async fn get_login_user_by_id(
            &self,
            _user_id: i64,
        ) -> Result<Option<LoginUser>, RemoteError> {
            Ok(None)
        }

        async fn create_user(&self, _user: &NewUser) -> Result<(), RemoteError> {
            Ok(())
        }

        async fn create_oauth2_user(&self, _user: &NewUser) -> Result<(), RemoteError> {
            Ok(())
        }
    }

    fn app(policy: LoginPolicy) -> Result<(Router, AppState)> {
        let store = Arc::new(MemoryCounterStore::new());
        let users = Arc::new(StubUsers {
            hash: hash_password("admin123")?,
        });
        let provider = Arc::new(AuthProvider::Session(SessionProvider::new(
            store.clone(),
            policy.session_timeout(),
        )));
        let login = Arc::new(LoginService::new(
            users.clone(),
            BruteForceGuard::new(store.clone(), policy.clone()),
            provider.clone(),
            policy,
        ));
        let state = AppState {
            login,
            provider,
            exchange: ExchangeCodes::new(store),
            users,
            frontend_redirect_uri: None,
        };
        Ok((router(state.clone()), state))
    }

    fn login_request(username: &str, password: &str) -> Result<Request<Body>> {
        Ok(Request::builder()
            .method("POST")
            .uri("/auth/login")
            .header(CONTENT_TYPE, "application/json")
            .body(Body::from(serde_json::to_vec(&serde_json::json!({
                "username": username,
                "password": password,
            }))?))?)
    }

    async fn body_json(response: axum::response::Response) -> Result<serde_json::Value> {
        let bytes = response.into_body().collect().await?.to_bytes();
        Ok(serde_json::from_slice(&bytes)?)
    }

    #[tokio::test]
    async fn login_then_info_round_trip() -> Result<()> {
        let (app, _) = app(LoginPolicy::new())?;

        let response = app
            .clone()
            .oneshot(login_request("admin", "admin123")?)
            .await?;
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await?;
        assert_eq!(body["code"], 200);
        assert_eq!(body["data"]["tokenName"], "Authorization");
        let token = body["data"]["token"].as_str().expect("token").to_string();
        assert_eq!(body["data"]["user"]["username"], "admin");
        assert!(body["data"]["user"].get("passwordHash").is_none());

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/auth/info")
                    .header(AUTHORIZATION, format!("Bearer {token}"))
                    .body(Body::empty())?,
            )
            .await?;
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await?;
        assert_eq!(body["data"]["user"]["username"], "admin");
        assert_eq!(body["data"]["permissions"][0], "*:*:*");
        Ok(())
    }

    #[tokio::test]
    async fn wrong_username_and_password_yield_identical_bodies() -> Result<()> {
        let (app, _) = app(LoginPolicy::new())?;

        let wrong_user = app
            .clone()
            .oneshot(login_request("nobody", "admin123")?)
            .await?;
        let wrong_password = app
            .clone()
            .oneshot(login_request("admin", "oops")?)
            .await?;
        assert_eq!(wrong_user.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(wrong_password.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            body_json(wrong_user).await?,
            body_json(wrong_password).await?
        );
        Ok(())
    }

    #[tokio::test]
    async fn lockout_maps_to_http_423() -> Result<()> {
        let (app, _) = app(LoginPolicy::new().with_max_fail_attempts(2))?;

        let first = app.clone().oneshot(login_request("admin", "bad")?).await?;
        assert_eq!(first.status(), StatusCode::UNAUTHORIZED);
        let second = app.clone().oneshot(login_request("admin", "bad")?).await?;
        assert_eq!(second.status(), StatusCode::LOCKED);

        // Locked even with the right password.
        let third = app.oneshot(login_request("admin", "admin123")?).await?;
        assert_eq!(third.status(), StatusCode::LOCKED);
        Ok(())
    }

    fn login_request_from(
        username: &str,
        password: &str,
        peer: SocketAddr,
    ) -> Result<Request<Body>> {
        Ok(Request::builder()
            .method("POST")
            .uri("/auth/login")
            .header(CONTENT_TYPE, "application/json")
            .extension(ConnectInfo(peer))
            .body(Body::from(serde_json::to_vec(&serde_json::json!({
                "username": username,
                "password": password,
            }))?))?)
    }

    #[tokio::test]
    async fn peer_address_backs_rate_limiting_without_proxy_headers() -> Result<()> {
        let (app, _) = app(LoginPolicy::new().with_ip_max_requests(1))?;
        let peer = SocketAddr::from(([192, 0, 2, 7], 51000));

        let first = app
            .clone()
            .oneshot(login_request_from("admin", "bad", peer)?)
            .await?;
        assert_eq!(first.status(), StatusCode::UNAUTHORIZED);

        // No x-forwarded-for / x-real-ip in sight; the peer address alone
        // must trip the limiter.
        let second = app
            .clone()
            .oneshot(login_request_from("admin", "admin123", peer)?)
            .await?;
        assert_eq!(second.status(), StatusCode::TOO_MANY_REQUESTS);

        // A different peer has its own window.
        let other = SocketAddr::from(([192, 0, 2, 8], 51000));
        let third = app
            .oneshot(login_request_from("admin", "admin123", other)?)
            .await?;
        assert_eq!(third.status(), StatusCode::OK);
        Ok(())
    }

    #[tokio::test]
    async fn proxy_header_wins_over_the_peer_address() -> Result<()> {
        let (app, _) = app(LoginPolicy::new().with_ip_max_requests(1))?;
        let peer = SocketAddr::from(([10, 0, 0, 1], 51000));

        let mut first = login_request_from("admin", "bad", peer)?;
        first
            .headers_mut()
            .insert("x-forwarded-for", "198.51.100.9".parse()?);
        assert_eq!(
            app.clone().oneshot(first).await?.status(),
            StatusCode::UNAUTHORIZED
        );

        // Same forwarded address from another peer: still one window.
        let other = SocketAddr::from(([10, 0, 0, 2], 51000));
        let mut second = login_request_from("admin", "admin123", other)?;
        second
            .headers_mut()
            .insert("x-forwarded-for", "198.51.100.9".parse()?);
        assert_eq!(
            app.oneshot(second).await?.status(),
            StatusCode::TOO_MANY_REQUESTS
        );
        Ok(())
    }

    #[tokio::test]
    async fn callback_ignores_tokens_in_the_query_string() -> Result<()> {
        let (app, _) = app(LoginPolicy::new())?;
        let response = app
            .clone()
            .oneshot(login_request("admin", "admin123")?)
            .await?;
        let body = body_json(response).await?;
        let token = body["data"]["token"].as_str().expect("token").to_string();

        // The session is real, but a query-borne token must not be honored.
        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .uri(format!("/auth/callback?token={token}"))
                    .body(Body::empty())?,
            )
            .await?;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        // Header delivery works and yields a redeemable one-time code.
        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .uri("/auth/callback")
                    .header(AUTHORIZATION, format!("Bearer {token}"))
                    .body(Body::empty())?,
            )
            .await?;
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await?;
        let code = body["data"]["code"].as_str().expect("code");

        let response = app
            .oneshot(
                Request::builder()
                    .uri(format!("/auth/exchange?code={code}"))
                    .body(Body::empty())?,
            )
            .await?;
        assert_eq!(response.status(), StatusCode::OK);
        Ok(())
    }

    #[tokio::test]
    async fn info_without_token_is_unauthorized() -> Result<()> {
        let (app, _) = app(LoginPolicy::new())?;
        // A forged identity header must not help.
        let response = app
            .oneshot(
                Request::builder()
                    .uri("/auth/info")
                    .header(crate::headers::HEADER_USER_ID, "1")
                    .header(crate::headers::HEADER_USERNAME, "admin")
                    .body(Body::empty())?,
            )
            .await?;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        Ok(())
    }

    #[tokio::test]
    async fn exchange_redeems_a_code_exactly_once() -> Result<()> {
        let (app, state) = app(LoginPolicy::new())?;
        let code = state.exchange.issue("the-token").await?;

        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .uri(format!("/auth/exchange?code={code}"))
                    .body(Body::empty())?,
            )
            .await?;
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await?;
        assert_eq!(body["data"]["token"], "the-token");

        let replay = app
            .oneshot(
                Request::builder()
                    .uri(format!("/auth/exchange?code={code}"))
                    .body(Body::empty())?,
            )
            .await?;
        assert_eq!(replay.status(), StatusCode::UNAUTHORIZED);
        Ok(())
    }

    #[tokio::test]
    async fn logout_invalidates_the_session() -> Result<()> {
        let (app, _) = app(LoginPolicy::new())?;
        let response = app
            .clone()
            .oneshot(login_request("admin", "admin123")?)
            .await?;
        let body = body_json(response).await?;
        let token = body["data"]["token"].as_str().expect("token").to_string();

        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/auth/logout")
                    .header(AUTHORIZATION, format!("Bearer {token}"))
                    .body(Body::empty())?,
            )
            .await?;
        assert_eq!(response.status(), StatusCode::OK);

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/auth/info")
                    .header(AUTHORIZATION, format!("Bearer {token}"))
                    .body(Body::empty())?,
            )
            .await?;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        Ok(())
    }

    #[tokio::test]
    async fn health_reports_name_and_version() -> Result<()> {
        let (app, _) = app(LoginPolicy::new())?;
        let response = app
            .oneshot(Request::builder().uri("/health").body(Body::empty())?)
            .await?;
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await?;
        assert_eq!(body["name"], env!("CARGO_PKG_NAME"));
        Ok(())
    }
}
