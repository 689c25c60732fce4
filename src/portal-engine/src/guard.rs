//! Per-view access gate: resolves identity and role, decides between
//! allowing the view and redirecting to login or the forbidden page.

use crate::identity::IdentityGateway;
use db::repo::ProfilesRepo;
use db::schema::Role;
use log::warn;
use std::{sync::Arc, time::Duration};

/// Paths reachable with no identity check at all.
const PUBLIC_ROUTES: &[&str] = &["/", "/login", "/signup", "/auth/callback", "/not-authorized"];

pub const EVALUATE_DASHBOARD: &str = "/dashboard/evaluate";
pub const SUBMIT_DASHBOARD: &str = "/dashboard/submit";
const LOGIN_ROUTE: &str = "/login";
const FORBIDDEN_ROUTE: &str = "/not-authorized";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuardState {
    Checking,
    Allowed,
    /// Carries the originally requested path so login can return there.
    RedirectLogin { next: String },
    RedirectForbidden,
}

impl GuardState {
    /// Where the UI should send the user, if anywhere.
    pub fn redirect_target(&self) -> Option<String> {
        match self {
            GuardState::Checking | GuardState::Allowed => None,
            GuardState::RedirectLogin { next } => Some(login_url(next)),
            GuardState::RedirectForbidden => Some(FORBIDDEN_ROUTE.to_string()),
        }
    }
}

pub fn login_url(next: &str) -> String {
    let encoded: String = url::form_urlencoded::byte_serialize(next.as_bytes()).collect();
    format!("{}?next={}", LOGIN_ROUTE, encoded)
}

/// A continuation target is trusted only if it is an absolute site-local
/// path: no protocol-relative `//`, no smuggled scheme behind the slash.
pub fn is_safe_next(next: &str) -> bool {
    !next.is_empty()
        && next.starts_with('/')
        && !next.starts_with("//")
        && !next.starts_with("/http")
}

/// Post-login destination: the continuation if it is safe, otherwise the
/// role's own dashboard.
pub fn destination_for(role: Role, next: Option<&str>) -> String {
    match next {
        Some(n) if is_safe_next(n) => n.to_string(),
        _ => match role {
            Role::Evaluator => EVALUATE_DASHBOARD.to_string(),
            Role::Developer => SUBMIT_DASHBOARD.to_string(),
        },
    }
}

#[derive(Clone)]
pub struct RouteGuard {
    identity: Arc<dyn IdentityGateway>,
    profiles: Arc<dyn ProfilesRepo>,
    lookup_limit: Duration,
}

impl RouteGuard {
    pub fn new(
        identity: Arc<dyn IdentityGateway>,
        profiles: Arc<dyn ProfilesRepo>,
        lookup_limit: Duration,
    ) -> RouteGuard {
        RouteGuard {
            identity,
            profiles,
            lookup_limit,
        }
    }

    /// One full check: identity, then (when a role is required) the profile
    /// role. Public paths skip both lookups.
    pub async fn resolve(&self, path: &str, required: Option<Role>) -> GuardState {
        if PUBLIC_ROUTES.contains(&path) {
            return GuardState::Allowed;
        }

        let user = match crate::with_deadline(
            self.lookup_limit,
            "identity lookup",
            self.identity.current_user(),
        )
        .await
        {
            Ok(user) => user,
            Err(err) => {
                warn!("identity lookup failed, treating as signed out: {:#}", err);
                None
            }
        };
        let user = match user {
            Some(user) => user,
            None => {
                return GuardState::RedirectLogin {
                    next: path.to_string(),
                }
            }
        };

        let required = match required {
            Some(required) => required,
            None => return GuardState::Allowed,
        };

        let role = match crate::with_deadline(
            self.lookup_limit,
            "role lookup",
            self.profiles.profile_try_load(user.id),
        )
        .await
        {
            Ok(Some(profile)) => profile.role,
            // permissive fallback: a user without a profile row acts as the
            // lowest-privilege role
            Ok(None) => Role::Developer,
            Err(err) => {
                warn!("role lookup failed for {}: {:#}", user.id, err);
                Role::Developer
            }
        };

        if role == required {
            GuardState::Allowed
        } else {
            GuardState::RedirectForbidden
        }
    }
}

/// A check started by [`Gate::begin`]; applying it is gated on the mount
/// still being current.
pub struct Pending {
    epoch: u64,
    path: String,
    required: Option<Role>,
}

/// Mount-scoped guard state machine.
///
/// One evaluation per navigation, not per render; a resolution that
/// completes after the view navigated away or was retired is discarded.
pub struct Gate {
    state: GuardState,
    key: Option<(String, Option<Role>)>,
    epoch: u64,
}

impl Gate {
    pub fn new() -> Gate {
        Gate {
            state: GuardState::Checking,
            key: None,
            epoch: 0,
        }
    }

    pub fn state(&self) -> &GuardState {
        &self.state
    }

    /// Starts a check for this navigation. `None` means the location did
    /// not change, so the previous outcome stands.
    pub fn begin(&mut self, path: &str, required: Option<Role>) -> Option<Pending> {
        let key = (path.to_string(), required);
        if self.key.as_ref() == Some(&key) {
            return None;
        }
        self.key = Some(key);
        self.epoch += 1;
        self.state = GuardState::Checking;
        Some(Pending {
            epoch: self.epoch,
            path: path.to_string(),
            required,
        })
    }

    /// Applies a finished check unless the gate moved on meanwhile.
    pub fn finish(&mut self, pending: Pending, outcome: GuardState) -> bool {
        if pending.epoch != self.epoch {
            return false;
        }
        self.state = outcome;
        true
    }

    /// Invalidates any in-flight check (view teardown).
    pub fn retire(&mut self) {
        self.epoch += 1;
        self.key = None;
        self.state = GuardState::Checking;
    }

    /// `begin` + resolve + `finish` in one step, for the common case where
    /// nothing can interleave.
    pub async fn navigate(
        &mut self,
        guard: &RouteGuard,
        path: &str,
        required: Option<Role>,
    ) -> &GuardState {
        if let Some(pending) = self.begin(path, required) {
            let outcome = guard.resolve(&pending.path, pending.required).await;
            self.finish(pending, outcome);
        }
        &self.state
    }
}

impl Default for Gate {
    fn default() -> Gate {
        Gate::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_safe_next() {
        assert!(is_safe_next("/dashboard/evaluate"));
        assert!(is_safe_next("/a/b?c=d"));
        assert!(!is_safe_next(""));
        assert!(!is_safe_next("//evil.example.com"));
        assert!(!is_safe_next("/http://evil.example.com"));
        assert!(!is_safe_next("/https://evil.example.com"));
        assert!(!is_safe_next("https://evil.example.com"));
        assert!(!is_safe_next("relative/path"));
    }

    #[test]
    fn test_destination_fallbacks() {
        assert_eq!(
            destination_for(Role::Evaluator, Some("/dashboard/evaluate")),
            "/dashboard/evaluate"
        );
        assert_eq!(
            destination_for(Role::Evaluator, Some("//evil.example.com")),
            EVALUATE_DASHBOARD
        );
        assert_eq!(destination_for(Role::Developer, None), SUBMIT_DASHBOARD);
    }

    #[test]
    fn test_login_url_encodes_continuation() {
        assert_eq!(
            login_url("/dashboard/evaluate"),
            "/login?next=%2Fdashboard%2Fevaluate"
        );
    }

    #[test]
    fn test_gate_runs_once_per_navigation() {
        let mut gate = Gate::new();
        let pending = gate.begin("/dashboard/submit", Some(Role::Developer)).unwrap();
        assert_eq!(gate.state(), &GuardState::Checking);
        assert!(gate.finish(pending, GuardState::Allowed));
        assert_eq!(gate.state(), &GuardState::Allowed);

        // same location again: no new check, outcome stands
        assert!(gate.begin("/dashboard/submit", Some(Role::Developer)).is_none());
        assert_eq!(gate.state(), &GuardState::Allowed);

        // different location: fresh check
        assert!(gate.begin("/dashboard/view", Some(Role::Developer)).is_some());
        assert_eq!(gate.state(), &GuardState::Checking);
    }

    #[test]
    fn test_gate_discards_stale_resolution() {
        let mut gate = Gate::new();
        let stale = gate.begin("/dashboard/submit", None).unwrap();
        gate.retire();
        assert!(!gate.finish(stale, GuardState::Allowed));
        assert_eq!(gate.state(), &GuardState::Checking);

        // a resolution from a superseded navigation is dropped too
        let old = gate.begin("/a", None).unwrap();
        let new = gate.begin("/b", None).unwrap();
        assert!(!gate.finish(old, GuardState::Allowed));
        assert!(gate.finish(new, GuardState::RedirectForbidden));
        assert_eq!(gate.state(), &GuardState::RedirectForbidden);
    }
}
