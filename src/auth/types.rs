//! Session data types.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The user behind a request, as reported by the identity backend.
///
/// Lives only for the duration of one request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub id: String,
    pub username: String,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    #[serde(default)]
    pub roles: BTreeSet<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    /// Back-office accounts report whether an initial password was chosen.
    #[serde(
        default,
        rename = "is_password_setup",
        skip_serializing_if = "Option::is_none"
    )]
    pub password_setup: Option<bool>,
}

impl Identity {
    pub fn has_role(&self, role: &str) -> bool {
        self.roles.contains(role)
    }

    /// True only when the backend explicitly says setup is pending.
    pub fn needs_password_setup(&self) -> bool {
        self.password_setup == Some(false)
    }
}

/// Access and refresh tokens with their expiry metadata.
///
/// `refresh_token_expiry >= access_token_expiry` is expected but not checked.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenPair {
    pub access_token: String,
    #[serde(default, rename = "access_token_expires")]
    pub access_token_expiry: Option<DateTime<Utc>>,
    pub refresh_token: String,
    #[serde(default, rename = "refresh_token_expires")]
    pub refresh_token_expiry: Option<DateTime<Utc>>,
}

/// Access requirement computed for a request path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteClassification {
    pub requires_auth: bool,
    pub required_role: Option<String>,
    pub is_api_route: bool,
    /// Where page routes send identities that lack `required_role`.
    pub forbidden_redirect: ForbiddenRedirect,
}

impl RouteClassification {
    pub fn public() -> Self {
        Self {
            requires_auth: false,
            required_role: None,
            is_api_route: false,
            forbidden_redirect: ForbiddenRedirect::Landing,
        }
    }
}

/// Target for page requests that are authenticated but lack the required role.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ForbiddenRedirect {
    /// The configured neutral landing path
    Landing,
    /// The same path with one segment swapped (e.g. `owner` -> `staff`)
    SwapSegment { from: String, to: String },
}

/// Why a session on an enforced route was dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    /// No usable access or refresh token
    NoCredentials,
    /// The refresh call failed or returned no token
    RefreshFailed,
    /// The identity fetch failed or returned garbage
    IdentityUnavailable,
}

impl RejectReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            RejectReason::NoCredentials => "no_credentials",
            RejectReason::RefreshFailed => "refresh_failed",
            RejectReason::IdentityUnavailable => "identity_unavailable",
        }
    }
}

/// Result of resolving the session for one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionOutcome {
    Authenticated(Identity),
    Anonymous,
    Rejected(RejectReason),
    /// The identity is valid but must visit `target` before anything else.
    RedirectRequired(String),
}

impl SessionOutcome {
    pub fn identity(&self) -> Option<&Identity> {
        match self {
            SessionOutcome::Authenticated(identity) => Some(identity),
            _ => None,
        }
    }
}
