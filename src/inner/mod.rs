//! HMAC signing for service-to-service calls.
//!
//! The gateway strips the `X-From-Source` marker from anything arriving
//! from outside, and callee services additionally demand a fresh
//! HMAC-SHA256 signature over a timestamp. Even with a service port
//! exposed, a caller without the shared secret cannot forge a valid
//! signature, and replayed signatures die with the freshness window.

use chrono::Utc;
use hmac::{Hmac, Mac};
use secrecy::{ExposeSecret, SecretString};
use sha2::Sha256;
use std::time::Duration;
use tracing::warn;

use crate::headers::INNER;

pub mod middleware;

pub use middleware::require_inner_auth;

type HmacSha256 = Hmac<Sha256>;

/// How long a signed timestamp stays acceptable.
pub const SIGNATURE_TTL: Duration = Duration::from_secs(5 * 60);

/// Signs and verifies inner-call signatures with a shared secret.
///
/// Signature = hex(HMAC-SHA256(secret, "inner:{timestamp}")).
pub struct InnerSigner {
    secret: SecretString,
}

impl InnerSigner {
    /// # Errors
    /// Fails when the shared secret is blank.
    pub fn new(secret: SecretString) -> anyhow::Result<Self> {
        if secret.expose_secret().trim().is_empty() {
            anyhow::bail!("inner auth secret must not be blank");
        }
        Ok(Self { secret })
    }

    fn mac(&self) -> HmacSha256 {
        HmacSha256::new_from_slice(self.secret.expose_secret().as_bytes())
            .expect("hmac accepts keys of any length")
    }

    /// Current unix time in milliseconds, the value callers sign.
    #[must_use]
    pub fn now_millis() -> i64 {
        Utc::now().timestamp_millis()
    }

    #[must_use]
    pub fn sign(&self, timestamp_millis: i64) -> String {
        let mut mac = self.mac();
        mac.update(format!("{INNER}:{timestamp_millis}").as_bytes());
        hex::encode(mac.finalize().into_bytes())
    }

    /// Verify a signature against its timestamp.
    ///
    /// Rejects timestamps outside the freshness window and compares the
    /// signature in constant time. Any failure means the caller is treated
    /// as not internal.
    #[must_use]
    pub fn verify(&self, signature: &str, timestamp: &str) -> bool {
        let Ok(timestamp_millis) = timestamp.parse::<i64>() else {
            warn!("inner auth timestamp is not numeric: {timestamp}");
            return false;
        };

        let now = Self::now_millis();
        let ttl_millis = i64::try_from(SIGNATURE_TTL.as_millis()).unwrap_or(i64::MAX);
        if (now - timestamp_millis).abs() > ttl_millis {
            warn!(
                "inner auth signature expired, timestamp={timestamp_millis}, now={now}, \
                 diff={}ms",
                now - timestamp_millis
            );
            return false;
        }

        let Ok(signature_bytes) = hex::decode(signature) else {
            return false;
        };

        let mut mac = self.mac();
        mac.update(format!("{INNER}:{timestamp_millis}").as_bytes());
        mac.verify_slice(&signature_bytes).is_ok()
    }
}
