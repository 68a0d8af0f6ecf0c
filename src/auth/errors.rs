//! Authentication error types.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;

/// Why a request to an API route was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthErrorKind {
    /// No identity could be established
    Unauthorized,
    /// Identity lacks the role the route needs
    Forbidden,
    /// Identity must choose a password before using the API
    PasswordSetupRequired,
}

/// Structured rejection for API routes: JSON `{"error": ...}` with 401 or 403.
///
/// Never redirects. Cookie clearing is handled by the credential store, not here.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ApiAuthError {
    kind: AuthErrorKind,
}

impl ApiAuthError {
    pub fn new(kind: AuthErrorKind) -> Self {
        Self { kind }
    }

    pub fn unauthorized() -> Self {
        Self::new(AuthErrorKind::Unauthorized)
    }

    pub fn forbidden() -> Self {
        Self::new(AuthErrorKind::Forbidden)
    }

    pub fn kind(&self) -> AuthErrorKind {
        self.kind
    }

    pub fn status_code(&self) -> StatusCode {
        match self.kind {
            AuthErrorKind::Unauthorized => StatusCode::UNAUTHORIZED,
            AuthErrorKind::Forbidden | AuthErrorKind::PasswordSetupRequired => {
                StatusCode::FORBIDDEN
            }
        }
    }

    pub fn message(&self) -> &'static str {
        match self.kind {
            AuthErrorKind::Unauthorized => "Unauthorized",
            AuthErrorKind::Forbidden => "Forbidden",
            AuthErrorKind::PasswordSetupRequired => "Password setup required",
        }
    }
}

impl std::fmt::Display for ApiAuthError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.message(), self.status_code())
    }
}

impl std::error::Error for ApiAuthError {}

#[derive(Serialize)]
struct ErrorResponse {
    error: &'static str,
}

impl IntoResponse for ApiAuthError {
    fn into_response(self) -> Response {
        (
            self.status_code(),
            Json(ErrorResponse {
                error: self.message(),
            }),
        )
            .into_response()
    }
}
