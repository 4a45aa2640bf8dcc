//! Signed RPC client for the system-of-record user service.
//!
//! The only path by which password hashes cross the network. Every call
//! carries a freshly computed inner-call signature, and transport
//! failures degrade to a uniform outcome instead of leaking transport
//! errors to the login pipeline.

use async_trait::async_trait;
use reqwest::RequestBuilder;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::error;
use url::Url;

use crate::api::types::ApiResult;
use crate::auth::user::{Credentials, LoginUser, STATUS_ENABLED};
use crate::headers::{
    HEADER_FROM_SOURCE, HEADER_INNER_AUTH_SIGN, HEADER_INNER_AUTH_TIMESTAMP, INNER,
};
use crate::inner::InnerSigner;
use crate::APP_USER_AGENT;

const CALL_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, thiserror::Error)]
pub enum RemoteError {
    /// Transport failed or the response was not decodable. Deliberately
    /// carries no detail: the orchestrator applies its own failure policy.
    #[error("user service unavailable")]
    Unavailable,

    #[error("{message}")]
    Rejected { code: u16, message: String },
}

/// User provisioning payload; `password` stays `None` for externally
/// authenticated users.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewUser {
    pub username: String,
    pub password: Option<String>,
    pub nickname: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub sex: Option<i32>,
    pub avatar: Option<String>,
    pub dept_id: Option<i64>,
    pub status: i32,
    pub remark: Option<String>,
}

impl NewUser {
    /// Provisioning payload for a user first seen via an OIDC login.
    #[must_use]
    pub fn oauth2(
        username: String,
        nickname: Option<String>,
        email: Option<String>,
        avatar: Option<String>,
    ) -> Self {
        Self {
            username,
            password: None,
            nickname,
            email,
            phone: None,
            sex: None,
            avatar,
            dept_id: None,
            status: STATUS_ENABLED,
            remark: Some("provisioned from OIDC login".to_string()),
        }
    }
}

/// Load/create contract against the system of record, kept behind a trait
/// so the login pipeline is testable without the network.
#[async_trait]
pub trait CredentialSource: Send + Sync {
    async fn get_credentials(&self, username: &str)
        -> Result<Option<Credentials>, RemoteError>;

    async fn get_login_user_by_username(
        &self,
        username: &str,
    ) -> Result<Option<LoginUser>, RemoteError>;

    async fn get_login_user_by_id(&self, user_id: i64)
        -> Result<Option<LoginUser>, RemoteError>;

    async fn create_user(&self, user: &NewUser) -> Result<(), RemoteError>;

    async fn create_oauth2_user(&self, user: &NewUser) -> Result<(), RemoteError>;
}

pub struct UserServiceClient {
    http: reqwest::Client,
    base_url: Url,
    signer: Arc<InnerSigner>,
}

impl UserServiceClient {
    /// # Errors
    /// Fails when the HTTP client cannot be constructed.
    pub fn new(base_url: Url, signer: Arc<InnerSigner>) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent(APP_USER_AGENT)
            .timeout(CALL_TIMEOUT)
            .build()?;
        Ok(Self {
            http,
            base_url,
            signer,
        })
    }

    fn endpoint(&self, path: &str) -> Result<Url, RemoteError> {
        self.base_url.join(path).map_err(|err| {
            error!("invalid user service endpoint {path}: {err}");
            RemoteError::Unavailable
        })
    }

    /// Signature and timestamp are generated per call, never cached, so
    /// the replay window stays as tight as the signer's freshness check.
    fn signed(&self, request: RequestBuilder) -> RequestBuilder {
        let timestamp = InnerSigner::now_millis();
        request
            .header(HEADER_FROM_SOURCE, INNER)
            .header(HEADER_INNER_AUTH_SIGN, self.signer.sign(timestamp))
            .header(HEADER_INNER_AUTH_TIMESTAMP, timestamp.to_string())
    }

    async fn fetch<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
    ) -> Result<ApiResult<T>, RemoteError> {
        let response = self.signed(request).send().await.map_err(|err| {
            error!("user service call failed: {err}");
            RemoteError::Unavailable
        })?;
        response.json::<ApiResult<T>>().await.map_err(|err| {
            error!("user service response not decodable: {err}");
            RemoteError::Unavailable
        })
    }

    fn unwrap_data<T>(envelope: ApiResult<T>) -> Result<Option<T>, RemoteError> {
        if envelope.code == 200 {
            Ok(envelope.data)
        } else {
            Err(RemoteError::Rejected {
                code: envelope.code,
                message: envelope.message,
            })
        }
    }

    fn unwrap_empty<T>(envelope: ApiResult<T>) -> Result<(), RemoteError> {
        if envelope.code == 200 {
            Ok(())
        } else {
            Err(RemoteError::Rejected {
                code: envelope.code,
                message: envelope.message,
            })
        }
    }
}

#[async_trait]
impl CredentialSource for UserServiceClient {
    async fn get_credentials(
        &self,
        username: &str,
    ) -> Result<Option<Credentials>, RemoteError> {
        let url = self.endpoint(&format!("user/credentials/{username}"))?;
        let envelope = self.fetch::<Credentials>(self.http.get(url)).await?;
        Self::unwrap_data(envelope)
    }

    async fn get_login_user_by_username(
        &self,
        username: &str,
    ) -> Result<Option<LoginUser>, RemoteError> {
        let url = self.endpoint(&format!("user/info/{username}"))?;
        let envelope = self.fetch::<LoginUser>(self.http.get(url)).await?;
        Self::unwrap_data(envelope)
    }

    async fn get_login_user_by_id(
        &self,
        user_id: i64,
    ) -> Result<Option<LoginUser>, RemoteError> {
        let url = self.endpoint(&format!("user/info/id/{user_id}"))?;
        let envelope = self.fetch::<LoginUser>(self.http.get(url)).await?;
        Self::unwrap_data(envelope)
    }

    async fn create_user(&self, user: &NewUser) -> Result<(), RemoteError> {
        let url = self.endpoint("user")?;
        let envelope = self
            .fetch::<serde_json::Value>(self.http.post(url).json(user))
            .await?;
        Self::unwrap_empty(envelope)
    }

    async fn create_oauth2_user(&self, user: &NewUser) -> Result<(), RemoteError> {
        let url = self.endpoint("user/oauth2")?;
        let envelope = self
            .fetch::<serde_json::Value>(self.http.post(url).json(user))
            .await?;
        Self::unwrap_empty(envelope)
    }
}
