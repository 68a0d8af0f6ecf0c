//! `reqwest` implementation of [`IdentityBackend`].

use std::time::Duration;

use axum::http::StatusCode;
use serde::de::DeserializeOwned;
use url::Url;

use super::{
    AuthContext, BackendError, BackendResponse, IdentityBackend, LoginCredentials, RefreshGrant,
};
use crate::auth::{Identity, TokenPair};

/// Default per-request timeout for backend calls.
pub const DEFAULT_BACKEND_TIMEOUT: Duration = Duration::from_secs(10);

/// Where the identity endpoints live.
#[derive(Debug, Clone)]
pub struct BackendConfig {
    pub base_url: Url,
    pub me_path: String,
    pub refresh_path: String,
    pub revoke_path: String,
    pub login_path: String,
    pub timeout: Duration,
}

impl BackendConfig {
    pub fn new(base_url: Url) -> Self {
        Self {
            base_url,
            me_path: "/api/v1/auth/me".into(),
            refresh_path: "/api/v1/auth/refresh_token".into(),
            revoke_path: "/api/v1/auth/logout".into(),
            login_path: "/api/v1/auth/login".into(),
            timeout: DEFAULT_BACKEND_TIMEOUT,
        }
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn endpoint(&self, path: &str) -> Result<Url, BackendError> {
        Ok(self.base_url.join(path)?)
    }
}

/// HTTP client for the identity backend. Cheap to clone; holds no per-user state.
#[derive(Debug, Clone)]
pub struct HttpIdentityBackend {
    config: BackendConfig,
    http: reqwest::Client,
}

impl HttpIdentityBackend {
    pub fn new(config: BackendConfig) -> Result<Self, BackendError> {
        let http = reqwest::Client::builder().timeout(config.timeout).build()?;
        Ok(Self { config, http })
    }

    pub fn config(&self) -> &BackendConfig {
        &self.config
    }

    fn with_auth(
        &self,
        request: reqwest::RequestBuilder,
        auth: &AuthContext,
    ) -> reqwest::RequestBuilder {
        match auth.token() {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }
}

/// Decode a 2xx body; anything else is returned as a bare status.
async fn read_response<T: DeserializeOwned>(
    response: reqwest::Response,
) -> Result<BackendResponse<T>, BackendError> {
    let status = response.status();
    if !status.is_success() {
        return Ok(BackendResponse::status(status));
    }
    let body = response
        .json::<T>()
        .await
        .map_err(|e| BackendError::Decode(e.to_string()))?;
    Ok(BackendResponse {
        status,
        body: Some(body),
    })
}

impl IdentityBackend for HttpIdentityBackend {
    async fn fetch_current_identity(
        &self,
        auth: &AuthContext,
    ) -> Result<BackendResponse<Identity>, BackendError> {
        let url = self.config.endpoint(&self.config.me_path)?;
        let response = self.with_auth(self.http.get(url), auth).send().await?;
        read_response(response).await
    }

    async fn refresh(
        &self,
        refresh_token: &str,
    ) -> Result<BackendResponse<RefreshGrant>, BackendError> {
        let url = self.config.endpoint(&self.config.refresh_path)?;
        let body = serde_json::json!({
            "grant_type": "refresh_token",
            "refresh_token": refresh_token,
        });
        let response = self
            .http
            .post(url)
            .bearer_auth(refresh_token)
            .json(&body)
            .send()
            .await?;
        read_response(response).await
    }

    async fn revoke(
        &self,
        auth: &AuthContext,
        refresh_token: &str,
    ) -> Result<StatusCode, BackendError> {
        let url = self.config.endpoint(&self.config.revoke_path)?;
        let body = serde_json::json!({ "refresh_token": refresh_token });
        let response = self
            .with_auth(self.http.post(url), auth)
            .json(&body)
            .send()
            .await?;
        Ok(response.status())
    }

    async fn login(
        &self,
        credentials: &LoginCredentials,
    ) -> Result<BackendResponse<TokenPair>, BackendError> {
        let url = self.config.endpoint(&self.config.login_path)?;
        let response = self.http.post(url).json(credentials).send().await?;
        read_response(response).await
    }
}
