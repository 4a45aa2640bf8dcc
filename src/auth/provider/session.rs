//! Self-issued session tokens backed by the counter store.
//!
//! Sessions are opaque: the token is 32 random bytes, and the LoginUser
//! lives server-side under `login_session:{token}` with a sliding expiry.

use anyhow::{Context, Result};
use base64::Engine;
use rand::{rngs::OsRng, RngCore};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use crate::auth::context::AuthContext;
use crate::auth::user::LoginUser;
use crate::store::CounterStore;

const SESSION_KEY: &str = "login_session:";

/// Mint an opaque session token. The raw value is only ever returned to
/// the client; the store keys on it directly.
fn generate_session_token() -> Result<String> {
    let mut bytes = [0u8; 32];
    OsRng
        .try_fill_bytes(&mut bytes)
        .context("failed to generate session token")?;
    Ok(base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(bytes))
}

pub struct SessionProvider {
    store: Arc<dyn CounterStore>,
    timeout: Duration,
}

impl SessionProvider {
    #[must_use]
    pub fn new(store: Arc<dyn CounterStore>, timeout: Duration) -> Self {
        Self { store, timeout }
    }

    fn session_key(token: &str) -> String {
        format!("{SESSION_KEY}{token}")
    }

    /// Create a server-side session and return its token.
    ///
    /// # Errors
    /// Fails when the token cannot be minted or the store write fails; no
    /// session exists in that case.
    pub async fn login(&self, user: &LoginUser) -> Result<String> {
        let token = generate_session_token()?;
        let mut stored = user.clone();
        stored.token = Some(token.clone());
        let payload = serde_json::to_string(&stored).context("failed to encode session user")?;
        self.store
            .set(&Self::session_key(&token), &payload, Some(self.timeout))
            .await
            .context("failed to store session")?;
        debug!("session created for user_id={:?}", user.user_id);
        Ok(token)
    }

    pub async fn logout(&self, ctx: &AuthContext) {
        let Some(token) = &ctx.token else {
            return;
        };
        if let Err(err) = self.store.delete(&Self::session_key(token)).await {
            warn!("failed to delete session: {err}");
        }
    }

    /// Read the stored principal back; renews the sliding expiry on every
    /// successful read. Absence or any read error yields `None`.
    pub async fn get_login_user(&self, ctx: &AuthContext) -> Option<LoginUser> {
        let token = ctx.token.as_ref()?;
        let key = Self::session_key(token);
        match self.store.get(&key).await {
            Ok(Some(payload)) => {
                if let Err(err) = self.store.expire(&key, self.timeout).await {
                    debug!("failed to renew session expiry: {err}");
                }
                match serde_json::from_str(&payload) {
                    Ok(user) => Some(user),
                    Err(err) => {
                        warn!("stored session is not decodable: {err}");
                        None
                    }
                }
            }
            Ok(None) => None,
            Err(err) => {
                debug!("failed to read session: {err}");
                None
            }
        }
    }

    pub async fn is_login(&self, ctx: &AuthContext) -> bool {
        let Some(token) = &ctx.token else {
            return false;
        };
        self.store
            .exists(&Self::session_key(token))
            .await
            .unwrap_or(false)
    }

    pub async fn validate_token(&self, token: &str) -> bool {
        self.store
            .exists(&Self::session_key(token))
            .await
            .unwrap_or(false)
    }

    /// Extend the session's sliding expiration; a no-op when not logged in.
    pub async fn refresh_token(&self, ctx: &AuthContext, timeout: Duration) {
        let Some(token) = &ctx.token else {
            return;
        };
        match self.store.expire(&Self::session_key(token), timeout).await {
            Ok(true) => debug!("session expiry extended"),
            Ok(false) => {}
            Err(err) => warn!("failed to extend session expiry: {err}"),
        }
    }
}
