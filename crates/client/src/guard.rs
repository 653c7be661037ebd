//! The reactive route guard.
//!
//! Wraps the pure state machine from `prysm_core::guard` around the auth
//! snapshot channel. The guard re-evaluates on every snapshot change and
//! every navigation - profile completion in another tab flows through the
//! snapshot and flips the decision without a reload.

use tokio::sync::watch;

use prysm_core::{AuthSnapshot, GuardDecision, GuardPolicy};

/// Reactive gate deciding whether a protected page may render.
pub struct RouteGuard {
    state: watch::Receiver<AuthSnapshot>,
    policy: GuardPolicy,
}

impl RouteGuard {
    /// Create a guard over the auth snapshot channel.
    #[must_use]
    pub const fn new(state: watch::Receiver<AuthSnapshot>, policy: GuardPolicy) -> Self {
        Self { state, policy }
    }

    /// The policy this guard enforces.
    #[must_use]
    pub const fn policy(&self) -> &GuardPolicy {
        &self.policy
    }

    /// Evaluate the guard against the current snapshot, without waiting.
    ///
    /// While the snapshot is loading this yields
    /// [`GuardDecision::Resolving`] - render a loading indicator, never a
    /// redirect.
    #[must_use]
    pub fn decide(&self, current_path: &str) -> GuardDecision {
        self.policy.evaluate(&self.state.borrow(), current_path)
    }

    /// Wait for auth state to resolve, then evaluate.
    ///
    /// This is the ordering invariant of the whole core: no redirect
    /// decision before `loading` is false. A guard that doesn't wait
    /// flash-redirects authenticated users to login.
    ///
    /// If the snapshot writer is gone the state can never resolve; the
    /// guard fails closed and sends the user to login.
    pub async fn resolve(&mut self, current_path: &str) -> GuardDecision {
        match self.state.wait_for(|snapshot| !snapshot.loading).await {
            Ok(snapshot) => self.policy.evaluate(&snapshot, current_path),
            Err(_) => GuardDecision::RedirectToLogin,
        }
    }

    /// Wait for the next snapshot change and re-evaluate.
    ///
    /// Drives continuous re-evaluation: loop over this with the current
    /// path to keep a mounted page guarded as identity, profile, or
    /// loading state move underneath it.
    pub async fn next(&mut self, current_path: &str) -> GuardDecision {
        if self.state.changed().await.is_err() {
            return GuardDecision::RedirectToLogin;
        }
        self.decide(current_path)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::time::Duration;

    use chrono::Utc;
    use tokio::time::timeout;

    use prysm_core::{Email, Identity, ProfileRecord, Uid};

    use super::*;

    fn identity() -> Identity {
        Identity::new(
            Uid::parse("k9GhT2pQxYw5").unwrap(),
            Email::parse("ada@example.com").unwrap(),
            true,
        )
    }

    fn complete_profile() -> ProfileRecord {
        let mut profile = ProfileRecord::new(Uid::parse("k9GhT2pQxYw5").unwrap(), "Ada", Utc::now());
        profile.academic.country = "United Kingdom".into();
        profile.academic.school = "St. Mary's".into();
        profile.academic.grade_level = "Year 12".into();
        profile.accepted_terms = true;
        profile
    }

    fn guard_pair() -> (watch::Sender<AuthSnapshot>, RouteGuard) {
        let (tx, rx) = watch::channel(AuthSnapshot::resolving());
        (tx, RouteGuard::new(rx, GuardPolicy::default()))
    }

    #[tokio::test]
    async fn decide_is_resolving_while_loading() {
        let (tx, guard) = guard_pair();
        assert_eq!(guard.decide("/dashboard"), GuardDecision::Resolving);

        // Even a signed-in-looking snapshot must not route while loading.
        tx.send_replace(AuthSnapshot {
            identity: Some(identity()),
            profile: Some(complete_profile()),
            loading: true,
        });
        assert_eq!(guard.decide("/dashboard"), GuardDecision::Resolving);
    }

    #[tokio::test]
    async fn resolve_waits_for_loading_to_clear() {
        let (tx, mut guard) = guard_pair();

        // While loading, resolve must not produce a decision.
        let pending = timeout(Duration::from_millis(50), guard.resolve("/dashboard")).await;
        assert!(pending.is_err(), "resolve decided on unresolved state");

        // Once resolved, the decision lands.
        tx.send_replace(AuthSnapshot::signed_out());
        let decision = timeout(Duration::from_secs(1), guard.resolve("/dashboard"))
            .await
            .unwrap();
        assert_eq!(decision, GuardDecision::RedirectToLogin);
    }

    #[tokio::test]
    async fn resolve_routes_incomplete_profiles_to_onboarding() {
        let (tx, mut guard) = guard_pair();
        tx.send_replace(AuthSnapshot::signed_in(identity(), None));

        assert_eq!(
            guard.resolve("/dashboard").await,
            GuardDecision::RedirectToCompleteProfile
        );
        assert_eq!(guard.resolve("/complete-profile").await, GuardDecision::Allow);
    }

    #[tokio::test]
    async fn resolve_routes_finished_users_off_onboarding() {
        let (tx, mut guard) = guard_pair();
        tx.send_replace(AuthSnapshot::signed_in(identity(), Some(complete_profile())));

        assert_eq!(
            guard.resolve("/complete-profile").await,
            GuardDecision::RedirectToDashboard
        );
        assert_eq!(guard.resolve("/dashboard").await, GuardDecision::Allow);
    }

    #[tokio::test]
    async fn next_reacts_to_profile_completion() {
        let (tx, mut guard) = guard_pair();
        tx.send_replace(AuthSnapshot::signed_in(identity(), None));
        assert_eq!(
            guard.resolve("/dashboard").await,
            GuardDecision::RedirectToCompleteProfile
        );

        // Profile completed elsewhere (another tab, the onboarding form):
        // the mounted guard sees the change and flips.
        let updated = AuthSnapshot::signed_in(identity(), Some(complete_profile()));
        tx.send_replace(updated);
        assert_eq!(guard.next("/dashboard").await, GuardDecision::Allow);
    }

    #[tokio::test]
    async fn dropped_writer_fails_closed() {
        let (tx, mut guard) = guard_pair();
        drop(tx);

        assert_eq!(
            guard.resolve("/dashboard").await,
            GuardDecision::RedirectToLogin
        );
        assert_eq!(
            guard.next("/dashboard").await,
            GuardDecision::RedirectToLogin
        );
    }
}
