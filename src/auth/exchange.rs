//! One-time exchange codes: a short-lived code-for-token swap so bearer
//! tokens never appear in redirect URLs.

use anyhow::{Context, Result};
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

use crate::store::CounterStore;

const AUTH_CODE_KEY: &str = "oauth2:auth_code:";

/// Codes live just long enough for the frontend to redeem them.
pub const CODE_TTL: Duration = Duration::from_secs(60);

#[derive(Clone)]
pub struct ExchangeCodes {
    store: Arc<dyn CounterStore>,
}

impl ExchangeCodes {
    #[must_use]
    pub fn new(store: Arc<dyn CounterStore>) -> Self {
        Self { store }
    }

    fn key(code: &str) -> String {
        format!("{AUTH_CODE_KEY}{code}")
    }

    /// Map a fresh random code to the token.
    ///
    /// # Errors
    /// Store write failures; no code exists in that case.
    pub async fn issue(&self, token: &str) -> Result<String> {
        let code = Uuid::new_v4().to_string();
        self.store
            .set(&Self::key(&code), token, Some(CODE_TTL))
            .await
            .context("failed to store exchange code")?;
        Ok(code)
    }

    /// Redeem a code, consuming it. Atomic get-and-delete: at most one
    /// caller ever sees the token.
    ///
    /// # Errors
    /// Store failures only; an unknown or already-redeemed code is `None`.
    pub async fn redeem(&self, code: &str) -> Result<Option<String>> {
        self.store
            .get_and_delete(&Self::key(code))
            .await
            .context("failed to redeem exchange code")
    }
}
