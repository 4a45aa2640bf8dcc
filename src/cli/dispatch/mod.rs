use crate::auth::config::LoginPolicy;
use crate::cli::{
    actions::Action,
    globals::{ProviderKind, ServerConfig},
};
use anyhow::{bail, Context, Result};
use secrecy::SecretString;
use std::time::Duration;
use url::Url;

pub fn handler(matches: &clap::ArgMatches) -> Result<Action> {
    let user_service_url = matches
        .get_one::<String>("user-service-url")
        .context("missing required argument: --user-service-url")?;
    let user_service_url =
        Url::parse(user_service_url).context("invalid --user-service-url")?;

    let inner_auth_secret = matches
        .get_one::<String>("inner-auth-secret")
        .map(|secret| SecretString::from(secret.clone()))
        .context("missing required argument: --inner-auth-secret")?;

    let provider = match matches
        .get_one::<String>("auth-provider")
        .map(String::as_str)
    {
        Some("oidc") => ProviderKind::Oidc,
        _ => ProviderKind::Session,
    };

    let oidc_hs256_secret = matches
        .get_one::<String>("oidc-hs256-secret")
        .map(|secret| SecretString::from(secret.clone()));
    let oidc_rsa_pem = matches.get_one::<String>("oidc-rsa-pem").cloned();
    if provider == ProviderKind::Oidc && oidc_hs256_secret.is_none() && oidc_rsa_pem.is_none() {
        bail!("OIDC mode requires --oidc-hs256-secret or --oidc-rsa-pem");
    }

    let frontend_redirect_uri = matches
        .get_one::<String>("frontend-redirect-uri")
        .map(|uri| Url::parse(uri))
        .transpose()
        .context("invalid --frontend-redirect-uri")?;

    let minutes = |name: &str| {
        matches
            .get_one::<u64>(name)
            .copied()
            .map(|m| Duration::from_secs(m * 60))
    };
    let seconds = |name: &str| matches.get_one::<u64>(name).copied().map(Duration::from_secs);

    let mut policy = LoginPolicy::new()
        .with_ip_rate_limit_enabled(!matches.get_flag("disable-ip-rate-limit"))
        .with_login_log_enabled(!matches.get_flag("disable-login-log"));
    if let Some(attempts) = matches.get_one::<i64>("max-fail-attempts").copied() {
        policy = policy.with_max_fail_attempts(attempts);
    }
    if let Some(duration) = minutes("lock-duration") {
        policy = policy.with_lock_duration(duration);
    }
    if let Some(duration) = minutes("fail-count-reset") {
        policy = policy.with_fail_reset_duration(duration);
    }
    if let Some(window) = seconds("ip-window") {
        policy = policy.with_ip_window(window);
    }
    if let Some(max) = matches.get_one::<i64>("ip-max-requests").copied() {
        policy = policy.with_ip_max_requests(max);
    }
    if let Some(timeout) = seconds("session-timeout") {
        policy = policy.with_session_timeout(timeout);
    }

    Ok(Action::Server {
        config: ServerConfig {
            port: matches.get_one::<u16>("port").copied().unwrap_or(8080),
            dsn: matches.get_one::<String>("dsn").cloned(),
            user_service_url,
            inner_auth_secret,
            provider,
            oidc_issuer: matches.get_one::<String>("oidc-issuer").cloned(),
            oidc_audience: matches.get_one::<String>("oidc-audience").cloned(),
            oidc_hs256_secret,
            oidc_rsa_pem,
            frontend_redirect_uri,
            policy,
        },
    })
}
