//! The login pipeline.
//!
//! Checks run in a fixed order: validation, IP rate limit, account lock,
//! credential fetch, password verification. Anything that fails before
//! verification completes counts as a failed attempt against the
//! username, and wrong-username is indistinguishable from wrong-password
//! at the boundary.

use std::sync::Arc;
use tracing::{error, info, warn};

use super::config::LoginPolicy;
use super::context::AuthContext;
use super::error::AuthError;
use super::guard::BruteForceGuard;
use super::password::verify_password;
use super::provider::AuthProvider;
use super::user::LoginUser;
use crate::api::types::TOKEN_NAME;
use crate::remote::{CredentialSource, RemoteError};
use secrecy::ExposeSecret;

/// A completed login: token (absent in OIDC mode) plus the principal.
#[derive(Debug)]
pub struct LoginOutcome {
    pub token: Option<String>,
    pub token_name: &'static str,
    pub user: LoginUser,
}

pub struct LoginService {
    users: Arc<dyn CredentialSource>,
    guard: BruteForceGuard,
    provider: Arc<AuthProvider>,
    policy: LoginPolicy,
}

impl LoginService {
    #[must_use]
    pub fn new(
        users: Arc<dyn CredentialSource>,
        guard: BruteForceGuard,
        provider: Arc<AuthProvider>,
        policy: LoginPolicy,
    ) -> Self {
        Self {
            users,
            guard,
            provider,
            policy,
        }
    }

    /// Count a failed attempt and collapse the outcome to the generic
    /// credential error, unless this attempt tripped the lockout.
    async fn register_failure(&self, username: &str) -> AuthError {
        match self.guard.record_failure(username).await {
            Ok(()) => AuthError::InvalidCredentials,
            Err(err) => err,
        }
    }

    /// Run a full login attempt.
    ///
    /// # Errors
    /// `Validation` for blank input, `RateLimited`/`AccountLocked` from the
    /// guard, `InvalidCredentials` for every unverifiable attempt, and
    /// `Unavailable` when a backing service cannot be reached.
    pub async fn login(
        &self,
        ctx: &AuthContext,
        username: &str,
        password: &str,
        client_ip: Option<&str>,
    ) -> Result<LoginOutcome, AuthError> {
        let username = username.trim();
        if username.is_empty() || password.is_empty() {
            return Err(AuthError::Validation(
                "username and password must not be blank".to_string(),
            ));
        }

        if let Some(ip) = client_ip {
            self.guard.check_ip_rate_limit(ip).await?;
        }
        self.guard.check_account_locked(username).await?;

        let credentials = match self.users.get_credentials(username).await {
            Ok(Some(credentials)) => credentials,
            Ok(None) => return Err(self.register_failure(username).await),
            Err(RemoteError::Rejected { code, message }) => {
                warn!("user service rejected credential lookup ({code}): {message}");
                return Err(self.register_failure(username).await);
            }
            // An unreachable user service says nothing about the password;
            // fail closed without charging the account.
            Err(RemoteError::Unavailable) => return Err(AuthError::Unavailable),
        };

        if !credentials.enabled() {
            warn!("login attempt against disabled account {username}");
            return Err(self.register_failure(username).await);
        }

        if !verify_password(password, credentials.password_hash.expose_secret()) {
            return Err(self.register_failure(username).await);
        }

        self.guard.clear_failure(username).await;

        let mut user = credentials.into_login_user();
        let token = self.provider.login(ctx, &user).await.map_err(|err| {
            error!("failed to establish session for {username}: {err}");
            AuthError::Unavailable
        })?;
        user.token = token.clone();

        if self.policy.login_log_enabled() {
            info!(
                username,
                client_ip = client_ip.unwrap_or("unknown"),
                provider = self.provider.name(),
                "login succeeded"
            );
        }

        Ok(LoginOutcome {
            token,
            token_name: TOKEN_NAME,
            user,
        })
    }

    /// Resolve the authenticated principal for the current request.
    ///
    /// # Errors
    /// `Unauthorized` when no verified identity is present.
    pub async fn user_info(&self, ctx: &AuthContext) -> Result<LoginUser, AuthError> {
        self.provider
            .get_login_user(ctx)
            .await
            .ok_or(AuthError::Unauthorized)
    }

    /// Terminate the current session; a no-op when none exists.
    pub async fn logout(&self, ctx: &AuthContext) {
        self.provider.logout(ctx).await;
        if self.policy.login_log_enabled() {
            info!(provider = self.provider.name(), "logout");
        }
    }

    /// Extend the current session and return its token.
    ///
    /// # Errors
    /// `Unauthorized` when no live session backs the request.
    pub async fn refresh(&self, ctx: &AuthContext) -> Result<Option<String>, AuthError> {
        if !self.provider.is_login(ctx).await {
            return Err(AuthError::Unauthorized);
        }
        self.provider
            .refresh_token(ctx, self.policy.session_timeout())
            .await;
        Ok(self.provider.get_token(ctx))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::password::hash_password;
    use crate::auth::provider::SessionProvider;
    use crate::auth::user::Credentials;
    use crate::remote::NewUser;
    use crate::store::{CounterStore, MemoryCounterStore};
    use anyhow::Result;
    use async_trait::async_trait;
    use secrecy::SecretString;
    use std::collections::{HashMap, HashSet};
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::time::Duration;

    struct StubUsers {
        hashes: HashMap<String, (String, Option<i32>)>,
        unavailable: AtomicBool,
    }

    impl StubUsers {
        fn with_admin() -> Result<Self> {
            let mut hashes = HashMap::new();
            hashes.insert("admin".to_string(), (hash_password("admin123")?, Some(1)));
            hashes.insert("carol".to_string(), (hash_password("s3cret")?, Some(0)));
            Ok(Self {
                hashes,
                unavailable: AtomicBool::new(false),
            })
        }
    }

    #[async_trait]
    impl CredentialSource for StubUsers {
        async fn get_credentials(
            &self,
            username: &str,
        ) -> Result<Option<Credentials>, RemoteError> {
            if self.unavailable.load(Ordering::SeqCst) {
                return Err(RemoteError::Unavailable);
            }
            Ok(self.hashes.get(username).map(|(hash, status)| Credentials {
                user_id: 1,
                username: username.to_string(),
                nickname: None,
                password_hash: SecretString::from(hash.clone()),
                status: *status,
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

    struct Fixture {
        service: LoginService,
        provider: Arc<AuthProvider>,
        users: Arc<StubUsers>,
        store: Arc<MemoryCounterStore>,
    }

    fn fixture(policy: LoginPolicy) -> Result<Fixture> {
        let store = Arc::new(MemoryCounterStore::new());
        let users = Arc::new(StubUsers::with_admin()?);
        let provider = Arc::new(AuthProvider::Session(SessionProvider::new(
            store.clone(),
            policy.session_timeout(),
        )));
        let service = LoginService::new(
            users.clone(),
            BruteForceGuard::new(store.clone(), policy.clone()),
            provider.clone(),
            policy,
        );
        Ok(Fixture {
            service,
            provider,
            users,
            store,
        })
    }

    fn ctx() -> AuthContext {
        AuthContext::default()
    }

    #[tokio::test]
    async fn successful_login_issues_usable_token() -> Result<()> {
        let f = fixture(LoginPolicy::new())?;
        let outcome = f
            .service
            .login(&ctx(), "admin", "admin123", Some("10.0.0.1"))
            .await
            .expect("login succeeds");

        assert_eq!(outcome.token_name, "Authorization");
        let token = outcome.token.expect("session token");
        assert_eq!(outcome.user.token.as_deref(), Some(token.as_str()));
        assert!(f.provider.validate_token(&token).await);

        let authed = AuthContext {
            token: Some(token),
            ..AuthContext::default()
        };
        let user = f.service.user_info(&authed).await.expect("principal");
        assert_eq!(user.username.as_deref(), Some("admin"));
        assert!(user.has_permission("system:user:list"));
        Ok(())
    }

    #[tokio::test]
    async fn wrong_username_and_wrong_password_are_indistinguishable() -> Result<()> {
        let f = fixture(LoginPolicy::new())?;
        let wrong_user = f
            .service
            .login(&ctx(), "no-such-user", "admin123", None)
            .await
            .unwrap_err();
        let wrong_password = f
            .service
            .login(&ctx(), "admin", "admin124", None)
            .await
            .unwrap_err();
        assert_eq!(wrong_user, wrong_password);
        assert_eq!(wrong_user.to_string(), wrong_password.to_string());
        assert_eq!(
            wrong_user.status_code(),
            wrong_password.status_code()
        );
        Ok(())
    }

    #[tokio::test]
    async fn fifth_wrong_password_locks_until_the_lock_expires() -> Result<()> {
        let f = fixture(
            LoginPolicy::new()
                .with_max_fail_attempts(5)
                .with_lock_duration(Duration::from_millis(80)),
        )?;

        for _ in 0..4 {
            assert_eq!(
                f.service.login(&ctx(), "admin", "wrong", None).await.unwrap_err(),
                AuthError::InvalidCredentials
            );
        }
        assert!(matches!(
            f.service.login(&ctx(), "admin", "wrong", None).await.unwrap_err(),
            AuthError::LockedOut(_)
        ));

        // While locked even the right password is refused.
        assert!(matches!(
            f.service.login(&ctx(), "admin", "admin123", None).await.unwrap_err(),
            AuthError::AccountLocked(_) | AuthError::AccountLockedRetryLater
        ));

        tokio::time::sleep(Duration::from_millis(120)).await;
        assert!(f
            .service
            .login(&ctx(), "admin", "admin123", None)
            .await
            .is_ok());
        Ok(())
    }

    #[tokio::test]
    async fn success_resets_the_failure_counter() -> Result<()> {
        let f = fixture(LoginPolicy::new().with_max_fail_attempts(5))?;

        for _ in 0..4 {
            let _ = f.service.login(&ctx(), "admin", "wrong", None).await;
        }
        assert!(f
            .service
            .login(&ctx(), "admin", "admin123", None)
            .await
            .is_ok());

        // The slate is clean: four more failures fit before the lock.
        for _ in 0..4 {
            assert_eq!(
                f.service.login(&ctx(), "admin", "wrong", None).await.unwrap_err(),
                AuthError::InvalidCredentials
            );
        }
        Ok(())
    }

    #[tokio::test]
    async fn blank_input_is_rejected_before_any_counting() -> Result<()> {
        let f = fixture(LoginPolicy::new())?;
        for (username, password) in [("", "admin123"), ("admin", ""), ("   ", "x")] {
            assert!(matches!(
                f.service.login(&ctx(), username, password, None).await.unwrap_err(),
                AuthError::Validation(_)
            ));
        }
        assert_eq!(f.store.get("pwd_err_cnt:admin").await?, None);
        Ok(())
    }

    #[tokio::test]
    async fn ip_rate_limit_caps_attempts_per_address() -> Result<()> {
        let f = fixture(LoginPolicy::new().with_ip_max_requests(2))?;

        for _ in 0..2 {
            let _ = f
                .service
                .login(&ctx(), "admin", "wrong", Some("203.0.113.9"))
                .await;
        }
        assert_eq!(
            f.service
                .login(&ctx(), "admin", "admin123", Some("203.0.113.9"))
                .await
                .unwrap_err(),
            AuthError::RateLimited
        );
        // Another address is unaffected.
        assert!(f
            .service
            .login(&ctx(), "admin", "admin123", Some("203.0.113.10"))
            .await
            .is_ok());
        Ok(())
    }

    #[tokio::test]
    async fn disabled_account_cannot_log_in() -> Result<()> {
        let f = fixture(LoginPolicy::new())?;
        assert_eq!(
            f.service.login(&ctx(), "carol", "s3cret", None).await.unwrap_err(),
            AuthError::InvalidCredentials
        );
        Ok(())
    }

    #[tokio::test]
    async fn unreachable_user_service_fails_closed_without_counting() -> Result<()> {
        let f = fixture(LoginPolicy::new())?;
        f.users.unavailable.store(true, Ordering::SeqCst);
        assert_eq!(
            f.service.login(&ctx(), "admin", "admin123", None).await.unwrap_err(),
            AuthError::Unavailable
        );
        assert_eq!(f.store.get("pwd_err_cnt:admin").await?, None);
        Ok(())
    }

    #[tokio::test]
    async fn refresh_extends_a_live_session_and_rejects_a_dead_one() -> Result<()> {
        let f = fixture(LoginPolicy::new())?;
        let outcome = f
            .service
            .login(&ctx(), "admin", "admin123", None)
            .await
            .expect("login succeeds");
        let authed = AuthContext {
            token: outcome.token.clone(),
            ..AuthContext::default()
        };
        assert_eq!(f.service.refresh(&authed).await?, outcome.token);

        f.service.logout(&authed).await;
        assert_eq!(
            f.service.refresh(&authed).await.unwrap_err(),
            AuthError::Unauthorized
        );
        assert_eq!(
            f.service.user_info(&authed).await.unwrap_err(),
            AuthError::Unauthorized
        );
        Ok(())
    }
}
