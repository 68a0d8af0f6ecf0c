//! Identity backend contract.
//!
//! The backend owns users and tokens. The gateway only asks it three
//! questions per request (who is this, give me a fresh token, forget this
//! token) plus the login exchange. Every call carries its credentials
//! explicitly; no client is ever mutated to hold a bearer token.

mod http;

use std::future::Future;

use axum::http::StatusCode;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::auth::{Identity, TokenPair};

pub use http::{BackendConfig, HttpIdentityBackend};

/// Per-request credentials handed to every backend call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuthContext {
    bearer: Option<String>,
}

impl AuthContext {
    pub fn anonymous() -> Self {
        Self { bearer: None }
    }

    pub fn bearer(token: impl Into<String>) -> Self {
        Self {
            bearer: Some(token.into()),
        }
    }

    pub fn token(&self) -> Option<&str> {
        self.bearer.as_deref()
    }
}

/// Status plus an optional decoded body, mirroring a raw HTTP exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendResponse<T> {
    pub status: StatusCode,
    pub body: Option<T>,
}

impl<T> BackendResponse<T> {
    pub fn ok(body: T) -> Self {
        Self {
            status: StatusCode::OK,
            body: Some(body),
        }
    }

    pub fn status(status: StatusCode) -> Self {
        Self { status, body: None }
    }

    /// The body, if the status is 2xx.
    pub fn into_success(self) -> Option<T> {
        if self.status.is_success() {
            self.body
        } else {
            None
        }
    }
}

/// Result of exchanging a refresh token. Any field may be missing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefreshGrant {
    #[serde(default)]
    pub access_token: Option<String>,
    #[serde(default, rename = "access_token_expires")]
    pub access_token_expiry: Option<DateTime<Utc>>,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default, rename = "refresh_token_expires")]
    pub refresh_token_expiry: Option<DateTime<Utc>>,
}

/// Username/password submitted through the login form.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginCredentials {
    pub username: String,
    pub password: String,
}

/// Errors talking to the identity backend.
#[derive(Debug)]
pub enum BackendError {
    /// Connection, timeout or other transport failure
    Transport(reqwest::Error),
    /// The backend answered with a body we could not decode
    Decode(String),
    /// The configured endpoint could not be joined onto the base URL
    Url(url::ParseError),
}

impl std::fmt::Display for BackendError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BackendError::Transport(e) => write!(f, "Backend request failed: {}", e),
            BackendError::Decode(e) => write!(f, "Failed to decode backend response: {}", e),
            BackendError::Url(e) => write!(f, "Invalid backend URL: {}", e),
        }
    }
}

impl std::error::Error for BackendError {}

impl From<reqwest::Error> for BackendError {
    fn from(e: reqwest::Error) -> Self {
        BackendError::Transport(e)
    }
}

impl From<url::ParseError> for BackendError {
    fn from(e: url::ParseError) -> Self {
        BackendError::Url(e)
    }
}

/// Remote identity service consulted by the session middleware.
pub trait IdentityBackend: Send + Sync + 'static {
    /// Who does the bearer in `auth` belong to?
    fn fetch_current_identity(
        &self,
        auth: &AuthContext,
    ) -> impl Future<Output = Result<BackendResponse<Identity>, BackendError>> + Send;

    /// Exchange a refresh token for a new access token (and maybe a new refresh token).
    fn refresh(
        &self,
        refresh_token: &str,
    ) -> impl Future<Output = Result<BackendResponse<RefreshGrant>, BackendError>> + Send;

    /// Invalidate a refresh token server-side.
    fn revoke(
        &self,
        auth: &AuthContext,
        refresh_token: &str,
    ) -> impl Future<Output = Result<StatusCode, BackendError>> + Send;

    /// Exchange user credentials for a token pair.
    fn login(
        &self,
        credentials: &LoginCredentials,
    ) -> impl Future<Output = Result<BackendResponse<TokenPair>, BackendError>> + Send;
}
