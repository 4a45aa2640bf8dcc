//! Swappable authentication strategy.
//!
//! Exactly two schemes exist and they are mutually exclusive at
//! deployment time, so the strategy is a tagged enum chosen from
//! configuration at process start rather than a trait object discovered
//! at runtime. Methods never fail across this boundary for "not logged
//! in": they answer `None`/`false`.

use axum::http::HeaderMap;
use std::time::Duration;
use tracing::warn;

use super::context::AuthContext;
use super::user::LoginUser;

pub mod oidc;
pub mod session;

pub use oidc::{OidcProvider, OidcVerifier};
pub use session::SessionProvider;

pub enum AuthProvider {
    Session(SessionProvider),
    Oidc(OidcProvider),
}

impl AuthProvider {
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Session(_) => "session",
            Self::Oidc(_) => "oidc",
        }
    }

    /// Build the per-request context. In OIDC mode the bearer token is
    /// verified here so claims are either trustworthy or absent.
    #[must_use]
    pub fn context(&self, headers: &HeaderMap) -> AuthContext {
        match self {
            Self::Session(_) => AuthContext::from_headers(headers),
            Self::Oidc(provider) => provider.context(headers),
        }
    }

    /// Issue a token for a verified principal.
    ///
    /// OIDC mode does not support direct login; it warns and returns the
    /// current token when one exists instead of failing, preserving
    /// substitutability between the two variants.
    ///
    /// # Errors
    /// Session-mode store failures; the session does not exist then.
    pub async fn login(
        &self,
        ctx: &AuthContext,
        user: &LoginUser,
    ) -> anyhow::Result<Option<String>> {
        match self {
            Self::Session(provider) => provider.login(user).await.map(Some),
            Self::Oidc(provider) => Ok(provider.login(ctx)),
        }
    }

    pub async fn logout(&self, ctx: &AuthContext) {
        match self {
            Self::Session(provider) => provider.logout(ctx).await,
            Self::Oidc(provider) => provider.logout(),
        }
    }

    pub async fn is_login(&self, ctx: &AuthContext) -> bool {
        match self {
            Self::Session(provider) => provider.is_login(ctx).await,
            Self::Oidc(provider) => provider.is_login(ctx),
        }
    }

    pub async fn get_login_user(&self, ctx: &AuthContext) -> Option<LoginUser> {
        match self {
            Self::Session(provider) => provider.get_login_user(ctx).await,
            Self::Oidc(provider) => provider.get_login_user(ctx),
        }
    }

    #[must_use]
    pub fn get_token(&self, ctx: &AuthContext) -> Option<String> {
        match self {
            Self::Session(_) => ctx.token.clone(),
            Self::Oidc(provider) => provider.get_token(ctx),
        }
    }

    pub async fn validate_token(&self, token: &str) -> bool {
        match self {
            Self::Session(provider) => provider.validate_token(token).await,
            Self::Oidc(provider) => provider.validate_token(token),
        }
    }

    pub async fn refresh_token(&self, ctx: &AuthContext, timeout: Duration) {
        match self {
            Self::Session(provider) => provider.refresh_token(ctx, timeout).await,
            Self::Oidc(provider) => provider.refresh_token(timeout),
        }
    }

    pub async fn has_permission(&self, ctx: &AuthContext, permission: &str) -> bool {
        match self.get_login_user(ctx).await {
            Some(user) => user.has_permission(permission),
            None => {
                warn!("permission check without an authenticated user");
                false
            }
        }
    }

    pub async fn has_role(&self, ctx: &AuthContext, role: &str) -> bool {
        self.get_login_user(ctx)
            .await
            .is_some_and(|user| user.has_role(role))
    }
}
