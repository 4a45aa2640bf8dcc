//! Login security policy, read-only after startup.

use std::time::Duration;

const DEFAULT_MAX_FAIL_ATTEMPTS: i64 = 5;
const DEFAULT_LOCK_DURATION_MINUTES: u64 = 30;
const DEFAULT_FAIL_RESET_MINUTES: u64 = 10;
const DEFAULT_IP_WINDOW_SECONDS: u64 = 60;
const DEFAULT_IP_MAX_REQUESTS: i64 = 10;
const DEFAULT_SESSION_TIMEOUT_SECONDS: u64 = 86_400;

#[derive(Clone, Debug)]
pub struct LoginPolicy {
    max_fail_attempts: i64,
    lock_duration: Duration,
    fail_reset_duration: Duration,
    ip_rate_limit_enabled: bool,
    ip_window: Duration,
    ip_max_requests: i64,
    login_log_enabled: bool,
    session_timeout: Duration,
}

impl Default for LoginPolicy {
    fn default() -> Self {
        Self {
            max_fail_attempts: DEFAULT_MAX_FAIL_ATTEMPTS,
            lock_duration: Duration::from_secs(DEFAULT_LOCK_DURATION_MINUTES * 60),
            fail_reset_duration: Duration::from_secs(DEFAULT_FAIL_RESET_MINUTES * 60),
            ip_rate_limit_enabled: true,
            ip_window: Duration::from_secs(DEFAULT_IP_WINDOW_SECONDS),
            ip_max_requests: DEFAULT_IP_MAX_REQUESTS,
            login_log_enabled: true,
            session_timeout: Duration::from_secs(DEFAULT_SESSION_TIMEOUT_SECONDS),
        }
    }
}

impl LoginPolicy {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_max_fail_attempts(mut self, attempts: i64) -> Self {
        self.max_fail_attempts = attempts;
        self
    }

    #[must_use]
    pub fn with_lock_duration(mut self, duration: Duration) -> Self {
        self.lock_duration = duration;
        self
    }

    #[must_use]
    pub fn with_fail_reset_duration(mut self, duration: Duration) -> Self {
        self.fail_reset_duration = duration;
        self
    }

    #[must_use]
    pub fn with_ip_rate_limit_enabled(mut self, enabled: bool) -> Self {
        self.ip_rate_limit_enabled = enabled;
        self
    }

    #[must_use]
    pub fn with_ip_window(mut self, window: Duration) -> Self {
        self.ip_window = window;
        self
    }

    #[must_use]
    pub fn with_ip_max_requests(mut self, max: i64) -> Self {
        self.ip_max_requests = max;
        self
    }

    #[must_use]
    pub fn with_login_log_enabled(mut self, enabled: bool) -> Self {
        self.login_log_enabled = enabled;
        self
    }

    #[must_use]
    pub fn with_session_timeout(mut self, timeout: Duration) -> Self {
        self.session_timeout = timeout;
        self
    }

    #[must_use]
    pub fn max_fail_attempts(&self) -> i64 {
        self.max_fail_attempts
    }

    #[must_use]
    pub fn lock_duration(&self) -> Duration {
        self.lock_duration
    }

    #[must_use]
    pub fn lock_duration_minutes(&self) -> u64 {
        (self.lock_duration.as_secs() / 60).max(1)
    }

    #[must_use]
    pub fn fail_reset_duration(&self) -> Duration {
        self.fail_reset_duration
    }

    #[must_use]
    pub fn ip_rate_limit_enabled(&self) -> bool {
        self.ip_rate_limit_enabled
    }

    #[must_use]
    pub fn ip_window(&self) -> Duration {
        self.ip_window
    }

    #[must_use]
    pub fn ip_max_requests(&self) -> i64 {
        self.ip_max_requests
    }

    #[must_use]
    pub fn login_log_enabled(&self) -> bool {
        self.login_log_enabled
    }

    #[must_use]
    pub fn session_timeout(&self) -> Duration {
        self.session_timeout
    }
}
