//! Access decisions.
//!
//! Combines a [`RouteClassification`] with a [`SessionOutcome`]. Pure: no
//! I/O and no cookie writes; the caller turns the [`Decision`] into a
//! response.

use super::errors::{ApiAuthError, AuthErrorKind};
use super::state::AuthSettings;
use super::types::{ForbiddenRedirect, RouteClassification, SessionOutcome};

/// What to do with a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    /// Run the downstream handler
    Allow,
    /// Send the client elsewhere (302)
    Redirect(String),
    /// Structured JSON failure for API routes
    Reject(ApiAuthError),
}

/// Decide whether `path` may proceed.
pub fn decide(
    classification: &RouteClassification,
    outcome: &SessionOutcome,
    path: &str,
    settings: &AuthSettings,
) -> Decision {
    if !classification.requires_auth {
        return Decision::Allow;
    }

    match outcome {
        SessionOutcome::Authenticated(identity) => match &classification.required_role {
            Some(role) if !identity.has_role(role) => {
                if classification.is_api_route {
                    Decision::Reject(ApiAuthError::forbidden())
                } else {
                    Decision::Redirect(forbidden_target(
                        &classification.forbidden_redirect,
                        path,
                        &settings.landing_path,
                    ))
                }
            }
            _ => Decision::Allow,
        },
        SessionOutcome::RedirectRequired(target) => {
            if classification.is_api_route {
                Decision::Reject(ApiAuthError::new(AuthErrorKind::PasswordSetupRequired))
            } else if is_under(path, target) {
                Decision::Allow
            } else {
                Decision::Redirect(with_return(target, "redirect_from", path))
            }
        }
        SessionOutcome::Anonymous | SessionOutcome::Rejected(_) => {
            if classification.is_api_route {
                Decision::Reject(ApiAuthError::unauthorized())
            } else if is_under(path, &settings.login_path) {
                Decision::Allow
            } else {
                Decision::Redirect(login_redirect(&settings.login_path, path))
            }
        }
    }
}

/// `login_path?redirect=<path>`, with `path` URL-encoded.
pub fn login_redirect(login_path: &str, path: &str) -> String {
    with_return(login_path, "redirect", path)
}

fn with_return(target: &str, param: &str, path: &str) -> String {
    format!("{}?{}={}", target, param, urlencoding::encode(path))
}

fn is_under(path: &str, base: &str) -> bool {
    path == base
        || path
            .strip_prefix(base)
            .is_some_and(|rest| rest.starts_with('/'))
}

fn forbidden_target(redirect: &ForbiddenRedirect, path: &str, landing: &str) -> String {
    match redirect {
        ForbiddenRedirect::Landing => landing.to_string(),
        ForbiddenRedirect::SwapSegment { from, to } => {
            let mut swapped = false;
            let segments: Vec<&str> = path
                .split('/')
                .map(|seg| {
                    if !swapped && seg == from {
                        swapped = true;
                        to.as_str()
                    } else {
                        seg
                    }
                })
                .collect();
            if swapped {
                segments.join("/")
            } else {
                landing.to_string()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::routes::RoutePolicy;
    use crate::auth::types::{Identity, RejectReason};

    fn user(roles: &[&str]) -> SessionOutcome {
        SessionOutcome::Authenticated(Identity {
            id: "u1".into(),
            username: "ada".into(),
            first_name: String::new(),
            last_name: String::new(),
            roles: roles.iter().map(|r| r.to_string()).collect(),
            email: None,
            password_setup: None,
        })
    }

    fn decide_platform(path: &str, outcome: &SessionOutcome) -> Decision {
        let policy = RoutePolicy::platform();
        decide(
            &policy.classify(path, None),
            outcome,
            path,
            &AuthSettings::default(),
        )
    }

    #[test]
    fn test_public_always_allows() {
        for outcome in [
            SessionOutcome::Anonymous,
            SessionOutcome::Rejected(RejectReason::RefreshFailed),
            user(&[]),
        ] {
            assert_eq!(decide_platform("/events/1", &outcome), Decision::Allow);
        }
    }

    #[test]
    fn test_anonymous_page_redirects_to_login() {
        assert_eq!(
            decide_platform("/admin/events", &SessionOutcome::Anonymous),
            Decision::Redirect("/account/login?redirect=%2Fadmin%2Fevents".into())
        );
        assert_eq!(
            decide_platform(
                "/menu/profile",
                &SessionOutcome::Rejected(RejectReason::NoCredentials)
            ),
            Decision::Redirect("/account/login?redirect=%2Fmenu%2Fprofile".into())
        );
    }

    #[test]
    fn test_login_page_never_redirects_to_itself() {
        let policy = RoutePolicy::deny_by_default();
        let settings = AuthSettings::default();
        let c = policy.classify("/account/login", None);
        assert!(c.requires_auth);
        assert_eq!(
            decide(&c, &SessionOutcome::Anonymous, "/account/login", &settings),
            Decision::Allow
        );
    }

    #[test]
    fn test_anonymous_api_is_unauthorized() {
        assert_eq!(
            decide_platform("/api/(protected)/orders", &SessionOutcome::Anonymous),
            Decision::Reject(ApiAuthError::unauthorized())
        );
    }

    #[test]
    fn test_missing_role() {
        assert_eq!(
            decide_platform("/admin", &user(&["user"])),
            Decision::Redirect("/".into())
        );
        assert_eq!(decide_platform("/admin", &user(&["admin"])), Decision::Allow);
    }

    #[test]
    fn test_missing_role_on_api_is_forbidden() {
        let c = RouteClassification {
            requires_auth: true,
            required_role: Some("admin".into()),
            is_api_route: true,
            forbidden_redirect: ForbiddenRedirect::Landing,
        };
        assert_eq!(
            decide(&c, &user(&[]), "/api/admin/x", &AuthSettings::default()),
            Decision::Reject(ApiAuthError::forbidden())
        );
    }

    #[test]
    fn test_owner_falls_back_to_staff() {
        assert_eq!(
            decide_platform("/manager/org-1/owner/view-events", &user(&["staff"])),
            Decision::Redirect("/manager/org-1/staff/view-events".into())
        );
        assert_eq!(
            decide_platform("/manager/org-1/owner/view-events", &user(&["owner"])),
            Decision::Allow
        );
    }

    #[test]
    fn test_role_required_anonymous_goes_to_login_first() {
        assert_eq!(
            decide_platform("/manager/org-1/owner", &SessionOutcome::Anonymous),
            Decision::Redirect("/account/login?redirect=%2Fmanager%2Forg-1%2Fowner".into())
        );
    }

    #[test]
    fn test_password_setup_redirect() {
        let outcome = SessionOutcome::RedirectRequired("/account/setup-password".into());
        assert_eq!(
            decide_platform("/menu/profile", &outcome),
            Decision::Redirect("/account/setup-password?redirect_from=%2Fmenu%2Fprofile".into())
        );
        assert_eq!(
            decide_platform("/api/(protected)/orders", &outcome),
            Decision::Reject(ApiAuthError::new(AuthErrorKind::PasswordSetupRequired))
        );
    }

    #[test]
    fn test_swap_without_segment_uses_landing() {
        let redirect = ForbiddenRedirect::SwapSegment {
            from: "owner".into(),
            to: "staff".into(),
        };
        assert_eq!(forbidden_target(&redirect, "/manager/x", "/home"), "/home");
    }
}
