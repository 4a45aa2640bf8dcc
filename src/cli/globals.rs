use secrecy::SecretString;
use url::Url;

use crate::auth::config::LoginPolicy;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderKind {
    Session,
    Oidc,
}

/// Fully parsed server configuration; secrets stay wrapped so they never
/// land in debug output.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub port: u16,
    /// Postgres DSN for the shared counter store; counters are
    /// process-local when absent.
    pub dsn: Option<String>,
    pub user_service_url: Url,
    pub inner_auth_secret: SecretString,
    pub provider: ProviderKind,
    pub oidc_issuer: Option<String>,
    pub oidc_audience: Option<String>,
    pub oidc_hs256_secret: Option<SecretString>,
    /// Path to a PEM-encoded RSA public key for RS256 verification.
    pub oidc_rsa_pem: Option<String>,
    pub frontend_redirect_uri: Option<Url>,
    pub policy: LoginPolicy,
}
