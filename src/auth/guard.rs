//! IP rate limiting and account lockout on shared counters.
//!
//! Failure counters and lock markers live under separate keys: "currently
//! locked" stays a single existence check independent of the counter's
//! TTL churn, and clearing on success only ever touches the counter key,
//! so it cannot race away a lock that was just set.

use std::sync::Arc;
use tracing::{error, warn};

use super::config::LoginPolicy;
use super::error::AuthError;
use crate::store::CounterStore;

const PWD_ERR_CNT_KEY: &str = "pwd_err_cnt:";
const LOGIN_ERROR_KEY: &str = "login_error:";

#[derive(Clone)]
pub struct BruteForceGuard {
    store: Arc<dyn CounterStore>,
    policy: LoginPolicy,
}

impl BruteForceGuard {
    #[must_use]
    pub fn new(store: Arc<dyn CounterStore>, policy: LoginPolicy) -> Self {
        Self { store, policy }
    }

    fn counter_key(username: &str) -> String {
        format!("{PWD_ERR_CNT_KEY}{username}")
    }

    fn lock_key(username: &str) -> String {
        format!("{PWD_ERR_CNT_KEY}lock:{username}")
    }

    fn ip_key(ip: &str) -> String {
        format!("{LOGIN_ERROR_KEY}ip:{ip}")
    }

    /// Count this request against the caller's IP window.
    ///
    /// The increment is atomic in the store; only the caller that observes
    /// count == 1 sets the window TTL, so racing callers can neither lose
    /// an increment nor leave the key capped forever.
    ///
    /// # Errors
    /// `RateLimited` when the window max is exceeded; `Unavailable` when
    /// the store cannot be reached (fail closed).
    pub async fn check_ip_rate_limit(&self, ip: &str) -> Result<(), AuthError> {
        if !self.policy.ip_rate_limit_enabled() {
            return Ok(());
        }

        let key = Self::ip_key(ip);
        let count = self.store.incr(&key).await.map_err(|err| {
            error!("counter store unreachable during rate limit check: {err}");
            AuthError::Unavailable
        })?;

        if count == 1 {
            if let Err(err) = self.store.expire(&key, self.policy.ip_window()).await {
                warn!("failed to set rate limit window on {key}: {err}");
            }
        }

        if count > self.policy.ip_max_requests() {
            warn!("login requests from {ip} exceeded the rate limit");
            return Err(AuthError::RateLimited);
        }

        Ok(())
    }

    /// # Errors
    /// `AccountLocked` with remaining minutes while the lock marker lives;
    /// `Unavailable` when the store cannot be reached (fail closed).
    pub async fn check_account_locked(&self, username: &str) -> Result<(), AuthError> {
        let lock_key = Self::lock_key(username);
        let locked = self.store.exists(&lock_key).await.map_err(|err| {
            error!("counter store unreachable during lock check: {err}");
            AuthError::Unavailable
        })?;
        if !locked {
            return Ok(());
        }

        match self.store.ttl(&lock_key).await {
            Ok(Some(remaining)) if remaining.as_secs() > 0 => {
                let minutes = (remaining.as_secs() / 60).max(1);
                Err(AuthError::AccountLocked(minutes))
            }
            // Unreadable or absent TTL: report the lock without inventing
            // a duration.
            _ => Err(AuthError::AccountLockedRetryLater),
        }
    }

    /// Record a failed attempt; trips the lockout edge at the threshold.
    ///
    /// This is the only path that sets the lock marker. Store failures on
    /// this path are logged and swallowed: the attempt already failed, and
    /// a missed increment only delays lockout.
    ///
    /// # Errors
    /// `LockedOut` when this failure reached the configured maximum.
    pub async fn record_failure(&self, username: &str) -> Result<(), AuthError> {
        let counter_key = Self::counter_key(username);

        let count = match self.store.incr(&counter_key).await {
            Ok(count) => count,
            Err(err) => {
                error!("failed to record login failure for {username}: {err}");
                return Ok(());
            }
        };

        if count == 1 {
            if let Err(err) = self
                .store
                .expire(&counter_key, self.policy.fail_reset_duration())
                .await
            {
                warn!("failed to set failure counter TTL for {username}: {err}");
            }
        }

        if count >= self.policy.max_fail_attempts() {
            let lock_key = Self::lock_key(username);
            if let Err(err) = self
                .store
                .set(&lock_key, "1", Some(self.policy.lock_duration()))
                .await
            {
                error!("failed to set lock marker for {username}: {err}");
                return Ok(());
            }
            if let Err(err) = self.store.delete(&counter_key).await {
                warn!("failed to clear failure counter for {username}: {err}");
            }
            let minutes = self.policy.lock_duration_minutes();
            warn!("account {username} locked for {minutes} minute(s) after repeated failures");
            return Err(AuthError::LockedOut(minutes));
        }

        let remaining = self.policy.max_fail_attempts() - count;
        warn!("login failed for {username}, {remaining} attempt(s) remaining");
        Ok(())
    }

    /// Forget failures after a verified successful login. Leaves any lock
    /// marker untouched.
    pub async fn clear_failure(&self, username: &str) {
        let counter_key = Self::counter_key(username);
        if let Err(err) = self.store.delete(&counter_key).await {
            warn!("failed to clear failure counter for {username}: {err}");
        }
    }
}
