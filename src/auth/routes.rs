//! Route classification.
//!
//! A [`RoutePolicy`] is a table of rules matched against the request path
//! and, when available, the route id (the axum route template, e.g.
//! `/manager/{org}/owner/orders`). Evaluation order: public allow-list,
//! then rules in declaration order, then the fallback.

use super::state::AuthSettings;
use super::types::{ForbiddenRedirect, RouteClassification};

/// Which request attribute a matcher looks at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchOn {
    Path,
    RouteId,
    /// Either the path or the route id
    Any,
}

/// A single path pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteMatcher {
    /// Exact string equality
    Exact(String),
    /// `p` itself or anything below `p/`
    Prefix(String),
    /// Any `/`-separated segment equal to the value
    Segment(String),
    /// Substring anywhere (route-group markers such as `/api/(protected)`)
    Contains(String),
    /// Every inner matcher must match
    All(Vec<RouteMatcher>),
}

impl RouteMatcher {
    pub fn exact(s: impl Into<String>) -> Self {
        Self::Exact(s.into())
    }

    pub fn prefix(s: impl Into<String>) -> Self {
        Self::Prefix(s.into())
    }

    pub fn segment(s: impl Into<String>) -> Self {
        Self::Segment(s.into())
    }

    pub fn contains(s: impl Into<String>) -> Self {
        Self::Contains(s.into())
    }

    pub fn all(matchers: impl IntoIterator<Item = RouteMatcher>) -> Self {
        Self::All(matchers.into_iter().collect())
    }

    pub fn matches(&self, value: &str) -> bool {
        match self {
            RouteMatcher::Exact(p) => value == p,
            RouteMatcher::Prefix(p) => {
                let p = p.trim_end_matches('/');
                value == p
                    || value
                        .strip_prefix(p)
                        .is_some_and(|rest| rest.starts_with('/'))
            }
            RouteMatcher::Segment(s) => value.split('/').any(|seg| seg == s),
            RouteMatcher::Contains(s) => value.contains(s.as_str()),
            RouteMatcher::All(all) => !all.is_empty() && all.iter().all(|m| m.matches(value)),
        }
    }
}

/// Access level granted by a rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Access {
    Public,
    Authenticated,
    Role(String),
}

/// One row of a policy table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteRule {
    matchers: Vec<RouteMatcher>,
    match_on: MatchOn,
    access: Access,
    api: bool,
    forbidden: ForbiddenRedirect,
}

impl RouteRule {
    pub fn new(matcher: RouteMatcher, access: Access) -> Self {
        Self {
            matchers: vec![matcher],
            match_on: MatchOn::Any,
            access,
            api: false,
            forbidden: ForbiddenRedirect::Landing,
        }
    }

    /// Also match `matcher` (rules match if any of their matchers do).
    #[must_use]
    pub fn or(mut self, matcher: RouteMatcher) -> Self {
        self.matchers.push(matcher);
        self
    }

    #[must_use]
    pub fn on(mut self, match_on: MatchOn) -> Self {
        self.match_on = match_on;
        self
    }

    /// Failures on this subtree are JSON errors instead of redirects.
    #[must_use]
    pub fn api(mut self) -> Self {
        self.api = true;
        self
    }

    #[must_use]
    pub fn forbidden(mut self, target: ForbiddenRedirect) -> Self {
        self.forbidden = target;
        self
    }

    fn matches(&self, path: &str, route_id: Option<&str>) -> bool {
        let check = |value: &str| self.matchers.iter().any(|m| m.matches(value));
        match self.match_on {
            MatchOn::Path => check(path),
            MatchOn::RouteId => route_id.is_some_and(check),
            MatchOn::Any => check(path) || route_id.is_some_and(check),
        }
    }

    fn classification(&self) -> RouteClassification {
        classification_for(&self.access, self.api, &self.forbidden)
    }
}

fn classification_for(
    access: &Access,
    api: bool,
    forbidden: &ForbiddenRedirect,
) -> RouteClassification {
    let (requires_auth, required_role) = match access {
        Access::Public => (false, None),
        Access::Authenticated => (true, None),
        Access::Role(role) => (true, Some(role.clone())),
    };
    RouteClassification {
        requires_auth,
        required_role,
        is_api_route: api,
        forbidden_redirect: forbidden.clone(),
    }
}

/// A complete, pluggable classification table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoutePolicy {
    public: Vec<RouteMatcher>,
    rules: Vec<RouteRule>,
    fallback: Access,
}

impl RoutePolicy {
    /// Empty policy: everything is public.
    pub fn new() -> Self {
        Self {
            public: Vec::new(),
            rules: Vec::new(),
            fallback: Access::Public,
        }
    }

    /// Empty policy where unmatched paths need an identity.
    pub fn deny_by_default() -> Self {
        Self {
            fallback: Access::Authenticated,
            ..Self::new()
        }
    }

    /// Paths that are always public, whatever the rules say. Matched on the path only.
    #[must_use]
    pub fn allow(mut self, matcher: RouteMatcher) -> Self {
        self.public.push(matcher);
        self
    }

    #[must_use]
    pub fn rule(mut self, rule: RouteRule) -> Self {
        self.rules.push(rule);
        self
    }

    /// The events platform layout with the default account paths.
    pub fn platform() -> Self {
        Self::platform_for(&AuthSettings::default())
    }

    /// The events platform layout. The login and password setup pages come
    /// from `settings`, so they stay public when configured elsewhere.
    ///
    /// - `/api/(protected)/...`: any identity, JSON errors
    /// - `/admin/...` or `(admin)` route groups: `admin` role
    /// - `/manager/<org>/owner/...`: `owner` role, non-owners sent to `.../staff/...`
    /// - `(protected)` route groups, `/menu/...`, `/manager/...`: any identity
    /// - everything else: public, identity attached when available
    pub fn platform_for(settings: &AuthSettings) -> Self {
        Self::new()
            .allow(RouteMatcher::exact("/"))
            .allow(RouteMatcher::prefix(settings.login_path.as_str()))
            .allow(RouteMatcher::prefix("/account/signup"))
            .allow(RouteMatcher::prefix("/account/logout"))
            .allow(RouteMatcher::prefix(settings.setup_path.as_str()))
            .rule(
                RouteRule::new(RouteMatcher::contains("/api/(protected)"), Access::Authenticated)
                    .api(),
            )
            .rule(
                RouteRule::new(RouteMatcher::prefix("/admin"), Access::Role("admin".into()))
                    .or(RouteMatcher::segment("(admin)")),
            )
            .rule(
                RouteRule::new(
                    RouteMatcher::all([
                        RouteMatcher::prefix("/manager"),
                        RouteMatcher::segment("owner"),
                    ]),
                    Access::Role("owner".into()),
                )
                .on(MatchOn::Path)
                .forbidden(ForbiddenRedirect::SwapSegment {
                    from: "owner".into(),
                    to: "staff".into(),
                }),
            )
            .rule(
                RouteRule::new(RouteMatcher::segment("(protected)"), Access::Authenticated)
                    .or(RouteMatcher::prefix("/menu"))
                    .or(RouteMatcher::prefix("/manager")),
            )
    }

    /// Classify a request. Pure: the same inputs always give the same answer.
    pub fn classify(&self, path: &str, route_id: Option<&str>) -> RouteClassification {
        if self.public.iter().any(|m| m.matches(path)) {
            return RouteClassification::public();
        }

        if let Some(rule) = self.rules.iter().find(|r| r.matches(path, route_id)) {
            return rule.classification();
        }

        classification_for(&self.fallback, false, &ForbiddenRedirect::Landing)
    }
}

impl Default for RoutePolicy {
    fn default() -> Self {
        Self::platform()
    }
}
