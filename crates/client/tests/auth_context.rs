//! Behavioral tests for the session bootstrapper.
//!
//! A scripted provider and profile store stand in for the real services.
//! Tests run on the single-threaded runtime, so mock operations (which
//! never await) complete atomically between yield points - the
//! interleavings below are deterministic.

#![allow(clippy::unwrap_used)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::Utc;
use serde_json::Value;
use tokio::sync::{Notify, broadcast, watch};
use tokio::time::timeout;

use prysm_client::storage::keys;
use prysm_client::{
    AuthChange, AuthContext, AuthError, IdentityProvider, MemoryStorage, NewProfile,
    ProfileSource, Storage,
};
use prysm_core::{AuthSnapshot, Email, Identity, ProfileRecord, Uid};

const WAIT: Duration = Duration::from_secs(2);

fn identity_for(email: &str) -> Identity {
    let uid = email.split('@').next().unwrap();
    Identity::new(
        Uid::parse(uid).unwrap(),
        Email::parse(email).unwrap(),
        false,
    )
}

fn profile_for(identity: &Identity, display_name: &str) -> ProfileRecord {
    ProfileRecord::new(identity.uid.clone(), display_name, Utc::now())
}

// =============================================================================
// Mocks
// =============================================================================

struct MockProvider {
    events: broadcast::Sender<AuthChange>,
    restored: Mutex<Option<Identity>>,
    reset_error: Mutex<Option<AuthError>>,
    sent_links: Mutex<Vec<String>>,
    sign_outs: AtomicUsize,
}

impl MockProvider {
    fn new() -> Self {
        let (events, _) = broadcast::channel(16);
        Self {
            events,
            restored: Mutex::new(None),
            reset_error: Mutex::new(None),
            sent_links: Mutex::new(Vec::new()),
            sign_outs: AtomicUsize::new(0),
        }
    }

    fn with_restored(identity: Identity) -> Self {
        let provider = Self::new();
        *provider.restored.lock().unwrap() = Some(identity);
        provider
    }

    fn emit(&self, change: AuthChange) {
        let _ = self.events.send(change);
    }
}

impl IdentityProvider for MockProvider {
    async fn sign_up(&self, email: &Email, _password: &str) -> Result<Identity, AuthError> {
        let identity = identity_for(email.as_str());
        self.emit(AuthChange::SignedIn(identity.clone()));
        Ok(identity)
    }

    async fn sign_in_with_password(
        &self,
        email: &Email,
        _password: &str,
    ) -> Result<Identity, AuthError> {
        let identity = identity_for(email.as_str());
        self.emit(AuthChange::SignedIn(identity.clone()));
        Ok(identity)
    }

    async fn send_sign_in_link(&self, email: &Email) -> Result<(), AuthError> {
        self.sent_links
            .lock()
            .unwrap()
            .push(email.as_str().to_owned());
        Ok(())
    }

    async fn sign_in_with_email_link(
        &self,
        email: &Email,
        link: &str,
    ) -> Result<Identity, AuthError> {
        if !link.contains("oobCode=") {
            return Err(AuthError::Validation("sign-in link has no oobCode".into()));
        }
        let identity = identity_for(email.as_str());
        self.emit(AuthChange::SignedIn(identity.clone()));
        Ok(identity)
    }

    async fn sign_out(&self) {
        self.sign_outs.fetch_add(1, Ordering::SeqCst);
        self.emit(AuthChange::SignedOut);
    }

    async fn send_password_reset_email(&self, _email: &Email) -> Result<(), AuthError> {
        match self.reset_error.lock().unwrap().take() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    async fn send_verification_email(&self) -> Result<(), AuthError> {
        Ok(())
    }

    async fn reload(&self) -> Result<Identity, AuthError> {
        self.restored
            .lock()
            .unwrap()
            .clone()
            .ok_or(AuthError::NotSignedIn)
    }

    async fn restore(&self) -> Result<Option<Identity>, AuthError> {
        Ok(self.restored.lock().unwrap().clone())
    }

    async fn id_token(&self) -> Option<String> {
        Some("mock-id-token".to_owned())
    }

    fn subscribe(&self) -> broadcast::Receiver<AuthChange> {
        self.events.subscribe()
    }
}

#[derive(Default)]
struct MockProfiles {
    records: Mutex<HashMap<String, ProfileRecord>>,
    gate: Mutex<Option<Arc<Notify>>>,
    transient_get_failures: AtomicUsize,
    transient_create_failures: AtomicUsize,
    creates: AtomicUsize,
}

impl MockProfiles {
    fn insert(&self, record: ProfileRecord) {
        self.records
            .lock()
            .unwrap()
            .insert(record.uid.as_str().to_owned(), record);
    }

    /// Make the next `get` calls block until the returned gate is notified.
    fn gate(&self) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        *self.gate.lock().unwrap() = Some(gate.clone());
        gate
    }
}

impl ProfileSource for MockProfiles {
    async fn get(&self, uid: &Uid) -> Result<Option<ProfileRecord>, AuthError> {
        let gate = self.gate.lock().unwrap().clone();
        if let Some(gate) = gate {
            gate.notified().await;
        }
        if self.transient_get_failures.load(Ordering::SeqCst) > 0 {
            self.transient_get_failures.fetch_sub(1, Ordering::SeqCst);
            return Err(AuthError::Transient("socket closed".into()));
        }
        Ok(self.records.lock().unwrap().get(uid.as_str()).cloned())
    }

    async fn create(&self, record: &ProfileRecord) -> Result<(), AuthError> {
        if self.transient_create_failures.load(Ordering::SeqCst) > 0 {
            self.transient_create_failures.fetch_sub(1, Ordering::SeqCst);
            return Err(AuthError::Transient("socket closed".into()));
        }
        self.creates.fetch_add(1, Ordering::SeqCst);
        self.insert(record.clone());
        Ok(())
    }

    async fn merge(&self, uid: &Uid, patch: &Value) -> Result<ProfileRecord, AuthError> {
        let mut records = self.records.lock().unwrap();
        let record = records
            .get(uid.as_str())
            .ok_or_else(|| AuthError::provider("PROFILE_NOT_FOUND"))?;

        let mut doc = serde_json::to_value(record).unwrap();
        if let (Some(doc_map), Some(patch_map)) = (doc.as_object_mut(), patch.as_object()) {
            for (key, value) in patch_map {
                doc_map.insert(key.clone(), value.clone());
            }
        }
        let updated: ProfileRecord = serde_json::from_value(doc).unwrap();
        records.insert(uid.as_str().to_owned(), updated.clone());
        Ok(updated)
    }
}

// =============================================================================
// Harness
// =============================================================================

struct Harness {
    ctx: Arc<AuthContext<MockProvider, MockProfiles, MemoryStorage>>,
    provider: Arc<MockProvider>,
    profiles: Arc<MockProfiles>,
    storage: Arc<MemoryStorage>,
    state: watch::Receiver<AuthSnapshot>,
}

fn harness(provider: MockProvider, profiles: MockProfiles) -> Harness {
    let provider = Arc::new(provider);
    let profiles = Arc::new(profiles);
    let storage = Arc::new(MemoryStorage::new());
    let ctx = Arc::new(AuthContext::new(
        provider.clone(),
        profiles.clone(),
        storage.clone(),
    ));
    let state = ctx.subscribe();

    tokio::spawn({
        let ctx = ctx.clone();
        async move { ctx.run().await }
    });

    Harness {
        ctx,
        provider,
        profiles,
        storage,
        state,
    }
}

async fn wait_for(
    state: &mut watch::Receiver<AuthSnapshot>,
    condition: impl FnMut(&AuthSnapshot) -> bool,
) -> AuthSnapshot {
    timeout(WAIT, state.wait_for(condition))
        .await
        .expect("timed out waiting for snapshot")
        .expect("snapshot writer gone")
        .clone()
}

// =============================================================================
// Tests
// =============================================================================

#[tokio::test]
async fn starts_signed_out_when_nothing_is_restored() {
    let mut h = harness(MockProvider::new(), MockProfiles::default());

    let snapshot = wait_for(&mut h.state, |s| !s.loading).await;
    assert!(snapshot.identity.is_none());
    assert!(snapshot.profile.is_none());
}

#[tokio::test]
async fn restores_identity_and_profile() {
    let identity = identity_for("ada@example.com");
    let profiles = MockProfiles::default();
    profiles.insert(profile_for(&identity, "Ada"));

    let mut h = harness(MockProvider::with_restored(identity.clone()), profiles);

    let snapshot = wait_for(&mut h.state, |s| !s.loading).await;
    assert_eq!(snapshot.identity, Some(identity));
    assert_eq!(
        snapshot.profile.map(|p| p.display_name),
        Some("Ada".to_owned())
    );
}

#[tokio::test]
async fn profile_fetch_retries_transient_failures() {
    let identity = identity_for("ada@example.com");
    let profiles = MockProfiles::default();
    profiles.insert(profile_for(&identity, "Ada"));
    profiles.transient_get_failures.store(2, Ordering::SeqCst);

    let mut h = harness(MockProvider::with_restored(identity), profiles);

    let snapshot = wait_for(&mut h.state, |s| !s.loading).await;
    assert!(snapshot.profile.is_some(), "retries should have succeeded");
}

#[tokio::test]
async fn missing_profile_is_repaired() {
    let identity = identity_for("ada@example.com");
    let mut h = harness(
        MockProvider::with_restored(identity.clone()),
        MockProfiles::default(),
    );

    let snapshot = wait_for(&mut h.state, |s| !s.loading).await;
    let profile = snapshot.profile.expect("repaired record");
    assert_eq!(profile.uid, identity.uid);
    assert_eq!(profile.display_name, "");
    assert_eq!(h.profiles.creates.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn register_creates_identity_and_profile() {
    let mut h = harness(MockProvider::new(), MockProfiles::default());
    wait_for(&mut h.state, |s| !s.loading).await;

    let identity = h
        .ctx
        .register(
            "ada@example.com",
            "correct-horse",
            NewProfile {
                display_name: "Ada".to_owned(),
                accepted_terms: true,
                ..NewProfile::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(identity.email.as_str(), "ada@example.com");

    let snapshot = wait_for(&mut h.state, |s| !s.loading && s.identity.is_some()).await;
    let profile = snapshot.profile.expect("registered profile");
    assert_eq!(profile.display_name, "Ada");
    assert!(profile.accepted_terms);
    assert!(profile.accepted_terms_at.is_some());
    assert_eq!(h.profiles.creates.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn register_rejects_weak_passwords_and_bad_emails() {
    let h = harness(MockProvider::new(), MockProfiles::default());

    let err = h
        .ctx
        .register("ada@example.com", "short", NewProfile::default())
        .await
        .unwrap_err();
    assert!(matches!(err, AuthError::Validation(_)));

    let err = h
        .ctx
        .register("not-an-email", "correct-horse", NewProfile::default())
        .await
        .unwrap_err();
    assert!(matches!(err, AuthError::Validation(_)));
}

#[tokio::test]
async fn register_signs_out_when_profile_creation_fails() {
    let profiles = MockProfiles::default();
    // First attempt and its one retry both fail.
    profiles.transient_create_failures.store(2, Ordering::SeqCst);

    let mut h = harness(MockProvider::new(), profiles);
    wait_for(&mut h.state, |s| !s.loading).await;

    let err = h
        .ctx
        .register(
            "ada@example.com",
            "correct-horse",
            NewProfile {
                display_name: "Ada".to_owned(),
                ..NewProfile::default()
            },
        )
        .await
        .unwrap_err();
    assert!(err.is_transient());

    // The compensating sign-out ran and the ambient state settles signed
    // out; the record gets repaired on the next login instead.
    assert_eq!(h.provider.sign_outs.load(Ordering::SeqCst), 1);
    wait_for(&mut h.state, |s| !s.loading && s.identity.is_none()).await;
}

#[tokio::test]
async fn email_link_round_trip_uses_persisted_email() {
    let mut h = harness(MockProvider::new(), MockProfiles::default());
    wait_for(&mut h.state, |s| !s.loading).await;

    h.ctx.request_email_link("ada@example.com").await.unwrap();
    assert_eq!(
        h.storage.get(keys::PENDING_EMAIL).as_deref(),
        Some("ada@example.com")
    );
    assert_eq!(
        h.provider.sent_links.lock().unwrap().as_slice(),
        ["ada@example.com"]
    );

    let identity = h
        .ctx
        .complete_email_link("https://prysm.app/auth/email-link?oobCode=abc", None)
        .await
        .unwrap();
    assert_eq!(identity.email.as_str(), "ada@example.com");
    assert_eq!(h.storage.get(keys::PENDING_EMAIL), None);
}

#[tokio::test]
async fn email_link_falls_back_to_explicit_email() {
    let h = harness(MockProvider::new(), MockProfiles::default());

    // Nothing persisted (link opened on another device): the redirect's
    // email parameter is the required fallback.
    let identity = h
        .ctx
        .complete_email_link(
            "https://prysm.app/auth/email-link?oobCode=abc",
            Some("ada@example.com"),
        )
        .await
        .unwrap();
    assert_eq!(identity.email.as_str(), "ada@example.com");

    let err = h
        .ctx
        .complete_email_link("https://prysm.app/auth/email-link?oobCode=abc", None)
        .await
        .unwrap_err();
    assert!(matches!(err, AuthError::Validation(_)));
}

#[tokio::test]
async fn reset_password_masks_unknown_accounts() {
    let h = harness(MockProvider::new(), MockProfiles::default());

    *h.provider.reset_error.lock().unwrap() = Some(AuthError::provider("EMAIL_NOT_FOUND"));
    h.ctx.reset_password("ghost@example.com").await.unwrap();

    // Other failures still surface.
    *h.provider.reset_error.lock().unwrap() = Some(AuthError::Transient("socket closed".into()));
    let err = h.ctx.reset_password("ada@example.com").await.unwrap_err();
    assert!(err.is_transient());
}

#[tokio::test]
async fn verification_email_requires_an_identity() {
    let mut h = harness(MockProvider::new(), MockProfiles::default());
    wait_for(&mut h.state, |s| !s.loading).await;

    let err = h.ctx.send_verification_email().await.unwrap_err();
    assert!(matches!(err, AuthError::NotSignedIn));
}

#[tokio::test]
async fn sign_out_clears_the_snapshot() {
    let identity = identity_for("ada@example.com");
    let profiles = MockProfiles::default();
    profiles.insert(profile_for(&identity, "Ada"));

    let mut h = harness(MockProvider::with_restored(identity), profiles);
    wait_for(&mut h.state, |s| !s.loading && s.identity.is_some()).await;

    h.ctx.sign_out().await;

    let snapshot = wait_for(&mut h.state, |s| !s.loading && s.identity.is_none()).await;
    assert!(snapshot.profile.is_none());
}

#[tokio::test]
async fn update_profile_refreshes_the_snapshot() {
    let identity = identity_for("ada@example.com");
    let profiles = MockProfiles::default();
    profiles.insert(profile_for(&identity, "Ada"));

    let mut h = harness(MockProvider::with_restored(identity), profiles);
    wait_for(&mut h.state, |s| !s.loading && s.profile.is_some()).await;

    let updated = h
        .ctx
        .update_profile(serde_json::json!({ "displayName": "Ada Lovelace" }))
        .await
        .unwrap();
    assert_eq!(updated.display_name, "Ada Lovelace");

    let snapshot = h.ctx.snapshot();
    assert_eq!(
        snapshot.profile.map(|p| p.display_name),
        Some("Ada Lovelace".to_owned())
    );
}

#[tokio::test]
async fn stale_profile_fetch_is_discarded_after_sign_out() {
    let identity = identity_for("ada@example.com");
    let profiles = MockProfiles::default();
    profiles.insert(profile_for(&identity, "Ada"));

    let mut h = harness(MockProvider::with_restored(identity), profiles);
    wait_for(&mut h.state, |s| !s.loading && s.profile.is_some()).await;

    // A refresh goes in flight and parks on the gated store.
    let gate = h.profiles.gate();
    let refresh = tokio::spawn({
        let ctx = h.ctx.clone();
        async move { ctx.refresh_profile().await }
    });
    tokio::time::sleep(Duration::from_millis(20)).await;

    // The identity changes while the fetch is parked.
    h.provider.emit(AuthChange::SignedOut);
    wait_for(&mut h.state, |s| !s.loading && s.identity.is_none()).await;

    // The parked fetch completes - for the PREVIOUS identity - and must
    // not resurrect its profile into the signed-out snapshot.
    gate.notify_one();
    let result = timeout(WAIT, refresh).await.unwrap().unwrap();
    assert!(matches!(result, Ok(Some(_))));

    let snapshot = h.ctx.snapshot();
    assert!(snapshot.identity.is_none());
    assert!(snapshot.profile.is_none());
}
