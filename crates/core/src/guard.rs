//! The route-guard state machine.
//!
//! The guard decides whether a protected page may render or must redirect,
//! based purely on the current auth snapshot and page path. Keeping the
//! machine pure (no channels, no async) means the same transitions back
//! both the client SDK's reactive guard and any test that wants to table
//! them.
//!
//! # Transitions
//!
//! Evaluated in order, the first match wins:
//!
//! 1. Still loading -> [`GuardDecision::Resolving`] (render a loading
//!    indicator; never redirect on unresolved state).
//! 2. No identity -> redirect to login.
//! 3. Identity present, the guard requires a complete profile, the current
//!    page is not the completion page, and the profile is incomplete ->
//!    redirect to the completion page.
//! 4. Identity present, the current page IS the completion page, and the
//!    profile is complete -> redirect to the dashboard (onboarding is
//!    finished; don't let the user revisit it).
//! 5. Otherwise -> allow.

use crate::types::{CompletenessPolicy, Identity, ProfileRecord};

/// The process-wide auth session state, as seen by guard consumers.
///
/// The session bootstrapper is the single writer; everything else reads.
/// While `loading` is true the snapshot is unresolved and no routing
/// decision may be derived from it.
#[derive(Debug, Clone, Default)]
pub struct AuthSnapshot {
    /// The current identity, if signed in.
    pub identity: Option<Identity>,
    /// The profile record for the current identity.
    pub profile: Option<ProfileRecord>,
    /// Whether auth state is still resolving.
    pub loading: bool,
}

impl AuthSnapshot {
    /// The initial, unresolved state.
    #[must_use]
    pub const fn resolving() -> Self {
        Self {
            identity: None,
            profile: None,
            loading: true,
        }
    }

    /// A resolved, signed-out state.
    #[must_use]
    pub const fn signed_out() -> Self {
        Self {
            identity: None,
            profile: None,
            loading: false,
        }
    }

    /// A resolved, signed-in state.
    #[must_use]
    pub const fn signed_in(identity: Identity, profile: Option<ProfileRecord>) -> Self {
        Self {
            identity: Some(identity),
            profile,
            loading: false,
        }
    }
}

/// Outcome of a guard evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuardDecision {
    /// Auth state is unresolved; render a loading indicator only.
    Resolving,
    /// Not signed in; go to the login page.
    RedirectToLogin,
    /// Signed in but onboarding is unfinished; go to the completion page.
    RedirectToCompleteProfile,
    /// Onboarding already finished; leave the completion page.
    RedirectToDashboard,
    /// Render the protected content.
    Allow,
}

impl GuardDecision {
    /// Whether this decision navigates away from the current page.
    #[must_use]
    pub const fn is_redirect(self) -> bool {
        matches!(
            self,
            Self::RedirectToLogin | Self::RedirectToCompleteProfile | Self::RedirectToDashboard
        )
    }

    /// The redirect target under `policy`, if this decision is a redirect.
    #[must_use]
    pub fn target(self, policy: &GuardPolicy) -> Option<&str> {
        match self {
            Self::RedirectToLogin => Some(&policy.login_path),
            Self::RedirectToCompleteProfile => Some(&policy.complete_profile_path),
            Self::RedirectToDashboard => Some(&policy.dashboard_path),
            Self::Resolving | Self::Allow => None,
        }
    }
}

/// Configuration for the route guard.
#[derive(Debug, Clone)]
pub struct GuardPolicy {
    /// Whether guarded pages require a complete profile.
    pub require_complete_profile: bool,
    /// Where unauthenticated users are sent.
    pub login_path: String,
    /// The onboarding completion page.
    pub complete_profile_path: String,
    /// Where fully onboarded users land.
    pub dashboard_path: String,
    /// What "complete" means for a profile.
    pub completeness: CompletenessPolicy,
}

impl Default for GuardPolicy {
    fn default() -> Self {
        Self {
            require_complete_profile: true,
            login_path: "/login".to_owned(),
            complete_profile_path: "/complete-profile".to_owned(),
            dashboard_path: "/dashboard".to_owned(),
            completeness: CompletenessPolicy::default(),
        }
    }
}

impl GuardPolicy {
    /// Evaluate the guard for `snapshot` at `current_path`.
    #[must_use]
    pub fn evaluate(&self, snapshot: &AuthSnapshot, current_path: &str) -> GuardDecision {
        if snapshot.loading {
            return GuardDecision::Resolving;
        }

        if snapshot.identity.is_none() {
            return GuardDecision::RedirectToLogin;
        }

        let complete = self.completeness.is_complete(snapshot.profile.as_ref());
        let on_completion_page = current_path == self.complete_profile_path;

        if self.require_complete_profile && !on_completion_page && !complete {
            return GuardDecision::RedirectToCompleteProfile;
        }

        if on_completion_page && complete {
            return GuardDecision::RedirectToDashboard;
        }

        GuardDecision::Allow
    }
}
