//! Cookie-backed credential store.
//!
//! Every `Set-Cookie` for the token cookies is produced by [`build_cookie`],
//! so a deletion always carries the same attributes as the original write.

use axum::{
    http::{HeaderMap, HeaderValue, header},
    response::Response,
};
use chrono::{DateTime, Utc};

use super::types::TokenPair;

/// Cookie name for the access token (short-lived).
pub const ACCESS_COOKIE_NAME: &str = "access_token";

/// Cookie name for the refresh token (long-lived).
pub const REFRESH_COOKIE_NAME: &str = "refresh_token";

/// Cookies expire this many seconds before the token itself.
pub const EXPIRY_MARGIN_SECS: i64 = 60;

/// Access cookie lifetime when the backend does not report an expiry.
pub const DEFAULT_ACCESS_MAX_AGE_SECS: i64 = 30 * 60;

/// Refresh cookie lifetime when the backend does not report an expiry.
pub const DEFAULT_REFRESH_MAX_AGE_SECS: i64 = 10 * 24 * 60 * 60;

#[derive(clap::ValueEnum, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SameSite {
    Strict,
    #[default]
    Lax,
}

impl SameSite {
    fn as_str(&self) -> &'static str {
        match self {
            SameSite::Strict => "Strict",
            SameSite::Lax => "Lax",
        }
    }
}

/// Attributes shared by both token cookies.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CookieAttributes {
    pub secure: bool,
    pub same_site: SameSite,
}

impl Default for CookieAttributes {
    fn default() -> Self {
        Self {
            secure: false,
            same_site: SameSite::Lax,
        }
    }
}

/// Extract a cookie value from the Cookie header.
pub fn get_cookie<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    for cookie_header in headers.get_all(header::COOKIE) {
        let Ok(cookie_header) = cookie_header.to_str() else {
            continue;
        };
        for part in cookie_header.split(';') {
            let part = part.trim();
            if let Some((key, value)) = part.split_once('=') {
                if key.trim() == name {
                    return Some(value.trim());
                }
            }
        }
    }
    None
}

/// Build a `Set-Cookie` value. `max_age` of zero deletes the cookie.
pub fn build_cookie(name: &str, value: &str, max_age: i64, attributes: CookieAttributes) -> String {
    let secure = if attributes.secure { "; Secure" } else { "" };
    format!(
        "{}={}; HttpOnly; SameSite={}; Path=/; Max-Age={}{}",
        name,
        value,
        attributes.same_site.as_str(),
        max_age.max(0),
        secure
    )
}

/// Seconds a cookie should live for a token expiring at `expiry`.
pub fn max_age_until(expiry: Option<DateTime<Utc>>, fallback: i64, now: DateTime<Utc>) -> i64 {
    match expiry {
        Some(expiry) => ((expiry - now).num_seconds() - EXPIRY_MARGIN_SECS).max(0),
        None => fallback,
    }
}

/// Per-request view of the token cookies plus the writes queued for the response.
#[derive(Debug, Clone)]
pub struct CredentialStore {
    access_token: Option<String>,
    refresh_token: Option<String>,
    attributes: CookieAttributes,
    pending: Vec<(&'static str, String)>,
    generation: u64,
}

impl CredentialStore {
    /// Store with no incoming cookies.
    pub fn empty(attributes: CookieAttributes) -> Self {
        Self {
            access_token: None,
            refresh_token: None,
            attributes,
            pending: Vec::new(),
            generation: 0,
        }
    }

    /// Read the token cookies from the request headers. Empty values count as absent.
    pub fn from_headers(headers: &HeaderMap, attributes: CookieAttributes) -> Self {
        let read = |name| {
            get_cookie(headers, name)
                .filter(|v| !v.is_empty())
                .map(str::to_string)
        };
        Self {
            access_token: read(ACCESS_COOKIE_NAME),
            refresh_token: read(REFRESH_COOKIE_NAME),
            ..Self::empty(attributes)
        }
    }

    pub fn access_token(&self) -> Option<&str> {
        self.access_token.as_deref()
    }

    pub fn refresh_token(&self) -> Option<&str> {
        self.refresh_token.as_deref()
    }

    pub fn attributes(&self) -> CookieAttributes {
        self.attributes
    }

    /// Bumped on every mutation; lets callers detect token changes.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Whether any cookie write is queued for the response.
    pub fn is_modified(&self) -> bool {
        !self.pending.is_empty()
    }

    pub fn set_access_token(&mut self, token: &str, max_age: i64) {
        self.access_token = Some(token.to_string());
        self.queue(ACCESS_COOKIE_NAME, token, max_age);
    }

    pub fn set_refresh_token(&mut self, token: &str, max_age: i64) {
        self.refresh_token = Some(token.to_string());
        self.queue(REFRESH_COOKIE_NAME, token, max_age);
    }

    /// Store a freshly issued pair, expiring each cookie a little before its token.
    pub fn store_pair(&mut self, pair: &TokenPair, now: DateTime<Utc>) {
        let access_max_age =
            max_age_until(pair.access_token_expiry, DEFAULT_ACCESS_MAX_AGE_SECS, now);
        let refresh_max_age =
            max_age_until(pair.refresh_token_expiry, DEFAULT_REFRESH_MAX_AGE_SECS, now);
        self.set_access_token(&pair.access_token, access_max_age);
        self.set_refresh_token(&pair.refresh_token, refresh_max_age);
    }

    /// Drop both tokens. Queues one deletion per cookie, even if it was never sent.
    pub fn clear(&mut self) {
        self.access_token = None;
        self.refresh_token = None;
        self.queue(ACCESS_COOKIE_NAME, "", 0);
        self.queue(REFRESH_COOKIE_NAME, "", 0);
    }

    /// Queued `Set-Cookie` values, at most one per cookie name.
    pub fn pending_cookies(&self) -> impl Iterator<Item = &str> {
        self.pending.iter().map(|(_, value)| value.as_str())
    }

    /// Append queued writes to `response`.
    ///
    /// A cookie the downstream handler already set on the response is left
    /// alone: the handler ran later and its write wins.
    pub fn apply(&self, response: &mut Response) {
        let headers = response.headers_mut();
        let already_set: Vec<String> = headers
            .get_all(header::SET_COOKIE)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .filter_map(|v| v.split_once('=').map(|(name, _)| name.trim().to_string()))
            .collect();

        for (name, value) in &self.pending {
            if already_set.iter().any(|n| n == name) {
                continue;
            }
            match HeaderValue::from_str(value) {
                Ok(value) => {
                    headers.append(header::SET_COOKIE, value);
                }
                Err(e) => tracing::warn!(cookie = %name, error = %e, "Dropping invalid cookie"),
            }
        }
    }

    fn queue(&mut self, name: &'static str, value: &str, max_age: i64) {
        let cookie = build_cookie(name, value, max_age, self.attributes);
        self.pending.retain(|(n, _)| *n != name);
        self.pending.push((name, cookie));
        self.generation += 1;
    }
}
