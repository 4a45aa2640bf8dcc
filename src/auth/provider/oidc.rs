//! Externally issued OIDC/JWT tokens.
//!
//! The authorization-code dance is owned by the external identity
//! provider; this side only verifies tokens (signature + expiry) and
//! decides what to do with the verified claims. No state is kept locally.

use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

use crate::auth::context::AuthContext;
use crate::auth::user::LoginUser;

/// Claims the login flow cares about; everything else is ignored.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OidcClaims {
    pub sub: String,
    #[serde(default)]
    pub preferred_username: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub tenant_id: Option<String>,
    pub exp: u64,
}

impl OidcClaims {
    /// Map verified claims onto the common principal shape.
    #[must_use]
    pub fn login_user(&self, token: Option<String>) -> LoginUser {
        LoginUser {
            // Subjects issued by external providers are not always numeric.
            user_id: self.sub.parse().ok(),
            username: self
                .preferred_username
                .clone()
                .or_else(|| self.username.clone()),
            nickname: self.name.clone(),
            tenant_id: self.tenant_id.clone(),
            token,
            ..LoginUser::default()
        }
    }
}

/// Token verification settings: key, algorithm, expected issuer/audience.
pub struct OidcVerifier {
    decoding_key: DecodingKey,
    validation: Validation,
}

impl OidcVerifier {
    /// Shared-secret verification (HS256).
    #[must_use]
    pub fn hs256(secret: &SecretString, issuer: Option<&str>, audience: Option<&str>) -> Self {
        Self {
            decoding_key: DecodingKey::from_secret(secret.expose_secret().as_bytes()),
            validation: Self::validation(Algorithm::HS256, issuer, audience),
        }
    }

    /// Public-key verification (RS256) from a PEM-encoded key.
    ///
    /// # Errors
    /// Fails when the PEM is not a valid RSA public key.
    pub fn rs256_pem(
        pem: &[u8],
        issuer: Option<&str>,
        audience: Option<&str>,
    ) -> anyhow::Result<Self> {
        Ok(Self {
            decoding_key: DecodingKey::from_rsa_pem(pem)?,
            validation: Self::validation(Algorithm::RS256, issuer, audience),
        })
    }

    fn validation(
        algorithm: Algorithm,
        issuer: Option<&str>,
        audience: Option<&str>,
    ) -> Validation {
        let mut validation = Validation::new(algorithm);
        if let Some(issuer) = issuer {
            validation.set_issuer(&[issuer]);
        }
        match audience {
            Some(audience) => validation.set_audience(&[audience]),
            None => validation.validate_aud = false,
        }
        validation
    }

    /// Verify signature and expiry; `None` for anything not provably valid.
    #[must_use]
    pub fn verify(&self, token: &str) -> Option<OidcClaims> {
        match decode::<OidcClaims>(token, &self.decoding_key, &self.validation) {
            Ok(data) => Some(data.claims),
            Err(err) => {
                debug!("token verification failed: {err}");
                None
            }
        }
    }
}

pub struct OidcProvider {
    verifier: OidcVerifier,
}

impl OidcProvider {
    #[must_use]
    pub fn new(verifier: OidcVerifier) -> Self {
        Self { verifier }
    }

    /// Build the request context, verifying any bearer token so that
    /// claims downstream are trustworthy or absent.
    #[must_use]
    pub fn context(&self, headers: &axum::http::HeaderMap) -> AuthContext {
        let mut ctx = AuthContext::from_headers(headers);
        if let Some(token) = &ctx.token {
            ctx.claims = self.verifier.verify(token);
        }
        ctx
    }

    /// Direct login is delegated to the external provider. Kept callable
    /// for substitutability: logs a warning and returns the current token
    /// when one exists.
    #[must_use]
    pub fn login(&self, ctx: &AuthContext) -> Option<String> {
        warn!("direct login is not supported in OIDC mode; use the identity provider flow");
        self.get_token(ctx)
    }

    pub fn logout(&self) {
        // Real logout happens at the identity provider's end-session
        // endpoint; nothing is stored here.
        debug!("OIDC logout delegated to the identity provider");
    }

    #[must_use]
    pub fn is_login(&self, ctx: &AuthContext) -> bool {
        ctx.claims.is_some()
    }

    /// Principal from verified claims, else from gateway-forwarded
    /// identity headers (service-to-service forwarding scenario).
    #[must_use]
    pub fn get_login_user(&self, ctx: &AuthContext) -> Option<LoginUser> {
        if let Some(claims) = &ctx.claims {
            return Some(claims.login_user(ctx.token.clone()));
        }

        let forwarded = &ctx.forwarded;
        let user_id = forwarded.user_id.as_ref()?;
        Some(LoginUser {
            user_id: user_id.parse().ok(),
            username: forwarded.username.clone(),
            tenant_id: forwarded.tenant_id.clone(),
            ..LoginUser::default()
        })
    }

    #[must_use]
    pub fn get_token(&self, ctx: &AuthContext) -> Option<String> {
        if ctx.claims.is_some() {
            ctx.token.clone()
        } else {
            None
        }
    }

    #[must_use]
    pub fn validate_token(&self, token: &str) -> bool {
        self.verifier.verify(token).is_some()
    }

    pub fn refresh_token(&self, _timeout: Duration) {
        debug!("token refresh is owned by the external issuer");
    }
}
