//! Session resolution: cookies in, identity out.
//!
//! 1. No tokens at all: anonymous, no backend calls.
//! 2. Live access token: fetch the identity with it.
//! 3. Dead or missing access token: exchange a live refresh token first.
//! 4. Any failure on the way clears both cookies.
//!
//! Backend failures never escape; they turn into an anonymous (or, on
//! enforced routes, rejected) outcome.

use chrono::Utc;
use tracing::debug;

use super::cookie::{
    CredentialStore, DEFAULT_ACCESS_MAX_AGE_SECS, DEFAULT_REFRESH_MAX_AGE_SECS, max_age_until,
};
use super::state::AuthSettings;
use super::types::{Identity, RejectReason, SessionOutcome};
use crate::backend::{AuthContext, IdentityBackend};
use crate::token::is_expired;

/// What the last resolution found, before `enforce` is applied.
#[derive(Debug, Clone)]
enum Resolved {
    NoSession,
    Identity(Identity),
    Failed(RejectReason),
}

/// Resolves the session for a single request.
///
/// Holds the result of the last run keyed on the store's generation, so a
/// second call with untouched tokens makes no backend calls.
pub struct SessionResolver<'a, B> {
    backend: &'a B,
    settings: &'a AuthSettings,
    cached: Option<(u64, Resolved)>,
    bearer: Option<String>,
}

impl<'a, B: IdentityBackend> SessionResolver<'a, B> {
    pub fn new(backend: &'a B, settings: &'a AuthSettings) -> Self {
        Self {
            backend,
            settings,
            cached: None,
            bearer: None,
        }
    }

    /// Credentials for further backend calls made on behalf of this request.
    pub fn auth_context(&self) -> AuthContext {
        match &self.bearer {
            Some(token) => AuthContext::bearer(token.clone()),
            None => AuthContext::anonymous(),
        }
    }

    /// Resolve the session. `enforce` selects between best-effort population
    /// (failures are [`SessionOutcome::Anonymous`]) and enforced population
    /// (failures are [`SessionOutcome::Rejected`], pending password setup is
    /// [`SessionOutcome::RedirectRequired`]).
    pub async fn resolve(&mut self, store: &mut CredentialStore, enforce: bool) -> SessionOutcome {
        if let Some((generation, resolved)) = &self.cached {
            if *generation == store.generation() {
                return self.outcome(resolved.clone(), enforce);
            }
        }

        let resolved = self.run(store).await;
        self.cached = Some((store.generation(), resolved.clone()));
        self.outcome(resolved, enforce)
    }

    fn outcome(&self, resolved: Resolved, enforce: bool) -> SessionOutcome {
        match resolved {
            Resolved::NoSession => SessionOutcome::Anonymous,
            Resolved::Failed(reason) if enforce => SessionOutcome::Rejected(reason),
            Resolved::Failed(_) => SessionOutcome::Anonymous,
            Resolved::Identity(identity) if enforce && identity.needs_password_setup() => {
                SessionOutcome::RedirectRequired(self.settings.setup_path.clone())
            }
            Resolved::Identity(identity) => SessionOutcome::Authenticated(identity),
        }
    }

    async fn run(&mut self, store: &mut CredentialStore) -> Resolved {
        self.bearer = None;

        if store.access_token().is_none() && store.refresh_token().is_none() {
            return Resolved::NoSession;
        }

        let buffer = self.settings.expiry_buffer_secs;
        let access_token = match store.access_token() {
            Some(token) if !is_expired(Some(token), buffer) => token.to_string(),
            _ => match store.refresh_token() {
                Some(refresh) if !is_expired(Some(refresh), buffer) => {
                    let refresh = refresh.to_string();
                    match self.refresh(store, &refresh).await {
                        Some(token) => token,
                        None => return self.fail(store, RejectReason::RefreshFailed),
                    }
                }
                _ => return self.fail(store, RejectReason::NoCredentials),
            },
        };

        let auth = AuthContext::bearer(access_token.as_str());
        let identity = match self.backend.fetch_current_identity(&auth).await {
            Ok(response) => {
                let status = response.status;
                match response.into_success() {
                    Some(identity) => Some(identity),
                    None => {
                        debug!(status = %status, "Identity fetch rejected");
                        None
                    }
                }
            }
            Err(e) => {
                debug!(error = %e, "Identity fetch failed");
                None
            }
        };

        match identity {
            Some(identity) => {
                self.bearer = Some(access_token);
                Resolved::Identity(identity)
            }
            None => self.fail(store, RejectReason::IdentityUnavailable),
        }
    }

    /// Exchange `refresh_token`; on success the store holds the new tokens.
    async fn refresh(&self, store: &mut CredentialStore, refresh_token: &str) -> Option<String> {
        let grant = match self.backend.refresh(refresh_token).await {
            Ok(response) => {
                let status = response.status;
                match response.into_success() {
                    Some(grant) => grant,
                    None => {
                        debug!(status = %status, "Token refresh rejected");
                        return None;
                    }
                }
            }
            Err(e) => {
                debug!(error = %e, "Token refresh failed");
                return None;
            }
        };

        let Some(access_token) = grant.access_token.filter(|t| !t.is_empty()) else {
            debug!("Token refresh returned no access token");
            return None;
        };

        let now = Utc::now();
        store.set_access_token(
            &access_token,
            max_age_until(grant.access_token_expiry, DEFAULT_ACCESS_MAX_AGE_SECS, now),
        );
        if let Some(rotated) = grant.refresh_token.filter(|t| !t.is_empty()) {
            store.set_refresh_token(
                &rotated,
                max_age_until(grant.refresh_token_expiry, DEFAULT_REFRESH_MAX_AGE_SECS, now),
            );
        }
        debug!("Access token refreshed");
        Some(access_token)
    }

    fn fail(&mut self, store: &mut CredentialStore, reason: RejectReason) -> Resolved {
        debug!(reason = reason.as_str(), "Clearing session");
        store.clear();
        self.bearer = None;
        Resolved::Failed(reason)
    }
}
