use crate::api::{self, AppState};
use crate::auth::{
    config::LoginPolicy,
    exchange::ExchangeCodes,
    guard::BruteForceGuard,
    login::LoginService,
    provider::{AuthProvider, OidcProvider, OidcVerifier, SessionProvider},
};
use crate::cli::actions::Action;
use crate::cli::globals::{ProviderKind, ServerConfig};
use crate::inner::InnerSigner;
use crate::remote::UserServiceClient;
use crate::store::{CounterStore, MemoryCounterStore, PgCounterStore};
use anyhow::{Context, Result};
use sqlx::postgres::PgPoolOptions;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tracing::{info, warn};

/// Handle the server action
pub async fn handle(action: Action) -> Result<()> {
    match action {
        Action::Server { config } => serve(config).await,
    }
}

async fn counter_store(config: &ServerConfig) -> Result<Arc<dyn CounterStore>> {
    match &config.dsn {
        Some(dsn) => {
            let pool = PgPoolOptions::new()
                .max_connections(10)
                .acquire_timeout(Duration::from_secs(5))
                .connect(dsn)
                .await
                .context("failed to connect to the counter store")?;
            let store = PgCounterStore::new(pool);
            store.ensure_schema().await?;
            Ok(Arc::new(store))
        }
        None => {
            warn!("no DSN configured; login counters are process-local");
            Ok(Arc::new(MemoryCounterStore::new()))
        }
    }
}

fn provider(
    config: &ServerConfig,
    store: Arc<dyn CounterStore>,
    policy: &LoginPolicy,
) -> Result<AuthProvider> {
    match config.provider {
        ProviderKind::Session => Ok(AuthProvider::Session(SessionProvider::new(
            store,
            policy.session_timeout(),
        ))),
        ProviderKind::Oidc => {
            let issuer = config.oidc_issuer.as_deref();
            let audience = config.oidc_audience.as_deref();
            let verifier = match (&config.oidc_hs256_secret, &config.oidc_rsa_pem) {
                (Some(secret), _) => OidcVerifier::hs256(secret, issuer, audience),
                (None, Some(path)) => {
                    let pem = std::fs::read(path)
                        .with_context(|| format!("failed to read RSA key from {path}"))?;
                    OidcVerifier::rs256_pem(&pem, issuer, audience)?
                }
                // Unreachable in practice: dispatch validates this pair.
                (None, None) => anyhow::bail!(
                    "OIDC mode requires --oidc-hs256-secret or --oidc-rsa-pem"
                ),
            };
            Ok(AuthProvider::Oidc(OidcProvider::new(verifier)))
        }
    }
}

async fn serve(config: ServerConfig) -> Result<()> {
    let store = counter_store(&config).await?;
    let policy = config.policy.clone();

    let signer = Arc::new(InnerSigner::new(config.inner_auth_secret.clone())?);
    let provider = Arc::new(provider(&config, store.clone(), &policy)?);
    let users = Arc::new(UserServiceClient::new(
        config.user_service_url.clone(),
        signer,
    )?);

    let guard = BruteForceGuard::new(store.clone(), policy.clone());
    let login = Arc::new(LoginService::new(
        users.clone(),
        guard,
        provider.clone(),
        policy,
    ));
    let exchange = ExchangeCodes::new(store);

    let state = AppState {
        login,
        provider: provider.clone(),
        exchange,
        users,
        frontend_redirect_uri: config.frontend_redirect_uri.clone(),
    };

    let listener = TcpListener::bind(format!("::0:{}", config.port)).await?;
    info!(
        port = config.port,
        provider = provider.name(),
        "starting {}",
        env!("CARGO_PKG_NAME")
    );

    // Connect info feeds the peer-address fallback for IP rate limiting.
    axum::serve(
        listener,
        api::router(state).into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}
