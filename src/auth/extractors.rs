//! Axum extractors for the identity attached by the session middleware.

use axum::{extract::FromRequestParts, http::request::Parts};

use super::cookie::{REFRESH_COOKIE_NAME, get_cookie};
use super::errors::ApiAuthError;
use super::types::Identity;
use crate::backend::AuthContext;

/// Request extension holding the resolved identity, if any.
#[derive(Debug, Clone, Default)]
pub struct CurrentIdentity(pub Option<Identity>);

/// Extractor that requires an identity. Rejects with JSON 401 otherwise.
#[derive(Debug, Clone)]
pub struct CurrentUser(pub Identity);

impl<S> FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
{
    type Rejection = ApiAuthError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<CurrentIdentity>()
            .and_then(|current| current.0.clone())
            .map(CurrentUser)
            .ok_or_else(ApiAuthError::unauthorized)
    }
}

/// Extractor for optional identity. Never rejects.
#[derive(Debug, Clone)]
pub struct MaybeUser(pub Option<Identity>);

impl<S> FromRequestParts<S> for MaybeUser
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(MaybeUser(
            parts
                .extensions
                .get::<CurrentIdentity>()
                .and_then(|current| current.0.clone()),
        ))
    }
}

/// The per-request backend credentials (possibly just refreshed).
/// Anonymous when the middleware did not run or found no session.
impl<S> FromRequestParts<S> for AuthContext
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(parts
            .extensions
            .get::<AuthContext>()
            .cloned()
            .unwrap_or_default())
    }
}

/// Refresh token held for this request, after any rotation by the middleware.
///
/// Falls back to the incoming cookie when the middleware did not run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CurrentRefreshToken(pub Option<String>);

impl<S> FromRequestParts<S> for CurrentRefreshToken
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        if let Some(current) = parts.extensions.get::<CurrentRefreshToken>() {
            return Ok(current.clone());
        }
        Ok(CurrentRefreshToken(
            get_cookie(&parts.headers, REFRESH_COOKIE_NAME)
                .filter(|v| !v.is_empty())
                .map(str::to_string),
        ))
    }
}
