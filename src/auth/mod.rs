//! Cookie-based session handling against a remote identity backend.
//!
//! Two cookies: a short-lived access token and a long-lived refresh token,
//! both issued by the backend. On every request the middleware reads them,
//! refreshes the access token when it is about to expire, fetches the
//! identity, and applies the route policy before the handler runs.

mod cookie;
mod enforcer;
mod errors;
mod extractors;
mod ip;
mod resolver;
mod routes;
mod state;
mod types;

pub use cookie::{
    ACCESS_COOKIE_NAME, CookieAttributes, CredentialStore, DEFAULT_ACCESS_MAX_AGE_SECS,
    DEFAULT_REFRESH_MAX_AGE_SECS, EXPIRY_MARGIN_SECS, REFRESH_COOKIE_NAME, SameSite, build_cookie,
    get_cookie, max_age_until,
};
pub use enforcer::{Decision, decide, login_redirect};
pub use errors::{ApiAuthError, AuthErrorKind};
pub use extractors::{CurrentIdentity, CurrentRefreshToken, CurrentUser, MaybeUser};
pub use ip::{ClientIpHeader, extract_client_ip};
pub use resolver::SessionResolver;
pub use routes::{Access, MatchOn, RouteMatcher, RoutePolicy, RouteRule};
pub use state::{AuthSettings, AuthState, DEFAULT_FORWARDED_HEADERS};
pub use types::{
    ForbiddenRedirect, Identity, RejectReason, RouteClassification, SessionOutcome, TokenPair,
};
