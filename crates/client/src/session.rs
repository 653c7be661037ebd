//! The session bootstrapper / auth context.
//!
//! [`AuthContext`] is the single writer of the process-wide auth snapshot.
//! Everything else - the route guard, pages, widgets - holds a
//! `watch::Receiver` and reads. The context owns the provider's ambient
//! event stream: any sign-in or sign-out, from any flow, lands here and
//! nowhere else, so there is exactly one place where the snapshot can
//! change.
//!
//! # Lifecycle
//!
//! The snapshot starts as `loading = true`. [`AuthContext::run`] restores
//! any persisted session, resolves the first snapshot, then consumes
//! ambient events until the provider goes away. Every identity transition
//! re-enters the loading state until the matching profile fetch lands -
//! guards wait it out rather than routing on half-loaded state.
//!
//! # Stale fetches
//!
//! Profile fetches are tagged with a generation counter that bumps on
//! every identity transition. A fetch that completes under a different
//! generation than it started with is discarded: its result belongs to an
//! identity that is no longer current.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use chrono::Utc;
use serde_json::Value;
use tokio::sync::{broadcast, watch};

use prysm_core::{AcademicInfo, AuthSnapshot, Email, Identity, ProfileRecord, Uid};

use crate::error::{AuthError, ProviderErrorCode};
use crate::profiles::ProfileSource;
use crate::provider::{AuthChange, IdentityProvider};
use crate::storage::{Storage, keys};

/// Minimum password length accepted client-side.
const MIN_PASSWORD_LENGTH: usize = 8;

/// Bounded retries for read-only profile fetches.
const PROFILE_FETCH_RETRIES: u32 = 2;

/// Pause between profile fetch retries.
const RETRY_DELAY: Duration = Duration::from_millis(250);

/// Profile fields collected at registration.
#[derive(Debug, Clone, Default)]
pub struct NewProfile {
    /// Name shown across the product.
    pub display_name: String,
    /// Academic background.
    pub academic: AcademicInfo,
    /// Terms of service accepted.
    pub accepted_terms: bool,
    /// Privacy policy accepted.
    pub accepted_privacy: bool,
}

/// The session bootstrapper: owner and single writer of the auth snapshot.
pub struct AuthContext<P, F, S> {
    provider: Arc<P>,
    profiles: Arc<F>,
    storage: Arc<S>,
    state: watch::Sender<AuthSnapshot>,
    generation: AtomicU64,
}

impl<P, F, S> AuthContext<P, F, S>
where
    P: IdentityProvider,
    F: ProfileSource,
    S: Storage,
{
    /// Create a context in the initial (loading) state.
    #[must_use]
    pub fn new(provider: Arc<P>, profiles: Arc<F>, storage: Arc<S>) -> Self {
        let (state, _) = watch::channel(AuthSnapshot::resolving());
        Self {
            provider,
            profiles,
            storage,
            state,
            generation: AtomicU64::new(0),
        }
    }

    /// Subscribe to snapshot changes.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<AuthSnapshot> {
        self.state.subscribe()
    }

    /// The current snapshot.
    #[must_use]
    pub fn snapshot(&self) -> AuthSnapshot {
        self.state.borrow().clone()
    }

    /// Drive the context: restore, then follow ambient events.
    ///
    /// Runs until the provider's event stream closes (application
    /// shutdown). Spawn this once, next to the UI loop.
    pub async fn run(&self) {
        // Subscribe before restoring so no event can fall in the gap.
        let mut events = self.provider.subscribe();

        match self.provider.restore().await {
            Ok(Some(identity)) => self.resolve_identity(identity).await,
            Ok(None) => {
                self.state.send_replace(AuthSnapshot::signed_out());
            }
            Err(err) => {
                // Unresolvable auth state is signed-out state; the guard
                // fails closed the same way.
                tracing::warn!(%err, "session restore failed; starting signed out");
                self.state.send_replace(AuthSnapshot::signed_out());
            }
        }

        loop {
            match events.recv().await {
                Ok(AuthChange::SignedIn(identity)) => self.resolve_identity(identity).await,
                Ok(AuthChange::SignedOut) => {
                    self.generation.fetch_add(1, Ordering::SeqCst);
                    self.state.send_replace(AuthSnapshot::signed_out());
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "auth event stream lagged");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    }

    // =========================================================================
    // Operations
    // =========================================================================

    /// Register a new account and create its profile record.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Validation` for a malformed email or short
    /// password, and provider/transient errors otherwise. If the profile
    /// write fails after the identity was created, the identity is signed
    /// out again (compensating action) and the error surfaces; the missing
    /// record is repaired on the next login.
    pub async fn register(
        &self,
        email: &str,
        password: &str,
        profile: NewProfile,
    ) -> Result<Identity, AuthError> {
        let email = Email::parse(email)?;
        validate_password(password)?;

        let identity = self.provider.sign_up(&email, password).await?;

        let now = Utc::now();
        let mut record = ProfileRecord::new(identity.uid.clone(), profile.display_name, now);
        record.academic = profile.academic;
        record.accepted_terms = profile.accepted_terms;
        record.accepted_terms_at = profile.accepted_terms.then_some(now);
        record.accepted_privacy = profile.accepted_privacy;
        record.accepted_privacy_at = profile.accepted_privacy.then_some(now);

        // One retry on transient failure; mutations are otherwise never
        // retried automatically.
        let written = match self.profiles.create(&record).await {
            Err(err) if err.is_transient() => self.profiles.create(&record).await,
            other => other,
        };

        if let Err(err) = written {
            tracing::error!(%err, uid = %identity.uid, "profile creation failed after sign-up; signing out");
            self.provider.sign_out().await;
            return Err(err);
        }

        Ok(identity)
    }

    /// Sign in with email and password.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Validation` for a malformed email and
    /// `AuthError::Provider` for rejected credentials.
    pub async fn sign_in_with_password(
        &self,
        email: &str,
        password: &str,
    ) -> Result<Identity, AuthError> {
        let email = Email::parse(email)?;
        self.provider.sign_in_with_password(&email, password).await
    }

    /// Request an email-link sign-in.
    ///
    /// Persists the email locally so that opening the link on this device
    /// doesn't require retyping it.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Validation` for a malformed email and provider
    /// errors when the link cannot be sent.
    pub async fn request_email_link(&self, email: &str) -> Result<(), AuthError> {
        let email = Email::parse(email)?;
        self.provider.send_sign_in_link(&email).await?;
        self.storage.set(keys::PENDING_EMAIL, email.as_str());
        Ok(())
    }

    /// Complete an email-link sign-in.
    ///
    /// The email comes from local persistence when the link is opened on
    /// the requesting device; `email_override` (carried through the
    /// callback redirect) is the fallback for every other device.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Validation` when no email is available from
    /// either source, and provider errors for expired or used links.
    pub async fn complete_email_link(
        &self,
        link: &str,
        email_override: Option<&str>,
    ) -> Result<Identity, AuthError> {
        let email = self
            .storage
            .get(keys::PENDING_EMAIL)
            .or_else(|| email_override.map(str::to_owned))
            .ok_or_else(|| {
                AuthError::Validation(
                    "no email available to complete the sign-in link".to_owned(),
                )
            })?;
        let email = Email::parse(&email)?;

        let identity = self.provider.sign_in_with_email_link(&email, link).await?;
        self.storage.remove(keys::PENDING_EMAIL);
        Ok(identity)
    }

    /// Sign the current identity out.
    pub async fn sign_out(&self) {
        self.provider.sign_out().await;
    }

    /// Trigger a password-reset email.
    ///
    /// Reports success even when no account exists for the email, so the
    /// endpoint can't be used to enumerate accounts.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Validation` for a malformed email and provider
    /// errors other than "unknown account".
    pub async fn reset_password(&self, email: &str) -> Result<(), AuthError> {
        let email = Email::parse(email)?;
        match self.provider.send_password_reset_email(&email).await {
            Err(AuthError::Provider {
                code: ProviderErrorCode::UserNotFound,
                ..
            }) => {
                tracing::debug!("password reset requested for unknown email; reporting success");
                Ok(())
            }
            other => other,
        }
    }

    /// Send a verification email to the current identity.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::NotSignedIn` without a current identity.
    pub async fn send_verification_email(&self) -> Result<(), AuthError> {
        if self.state.borrow().identity.is_none() {
            return Err(AuthError::NotSignedIn);
        }
        self.provider.send_verification_email().await
    }

    /// Re-fetch the current identity (picks up verification changes).
    ///
    /// # Errors
    ///
    /// Returns `AuthError::NotSignedIn` without a current identity.
    pub async fn refresh_identity(&self) -> Result<Identity, AuthError> {
        let identity = self.provider.reload().await?;

        self.state.send_modify(|snapshot| {
            if let Some(current) = &snapshot.identity
                && current.uid == identity.uid
            {
                snapshot.identity = Some(identity.clone());
            }
        });

        Ok(identity)
    }

    /// Re-read the profile record for the current identity.
    ///
    /// Returns the fetched record (or `None` when the store has none). The
    /// snapshot is only updated when the identity hasn't changed while the
    /// fetch was in flight.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::NotSignedIn` without a current identity, and
    /// transient errors once the bounded retries are exhausted.
    pub async fn refresh_profile(&self) -> Result<Option<ProfileRecord>, AuthError> {
        let Some(identity) = self.state.borrow().identity.clone() else {
            return Err(AuthError::NotSignedIn);
        };
        let generation = self.generation.load(Ordering::SeqCst);

        let profile = self.fetch_profile_with_retry(&identity.uid).await?;

        if self.generation.load(Ordering::SeqCst) == generation {
            let profile = profile.clone();
            self.state.send_modify(move |snapshot| {
                if !snapshot.loading
                    && snapshot
                        .identity
                        .as_ref()
                        .is_some_and(|current| current.uid == identity.uid)
                {
                    snapshot.profile = profile;
                }
            });
        } else {
            tracing::debug!(uid = %identity.uid, "discarding stale profile refresh");
        }

        Ok(profile)
    }

    /// Merge a partial update into the current profile and refresh the
    /// snapshot with the result.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::NotSignedIn` without a current identity, and
    /// provider/transient errors from the store (never auto-retried - this
    /// is a mutation).
    pub async fn update_profile(&self, patch: Value) -> Result<ProfileRecord, AuthError> {
        let Some(identity) = self.state.borrow().identity.clone() else {
            return Err(AuthError::NotSignedIn);
        };
        let generation = self.generation.load(Ordering::SeqCst);

        let record = self.profiles.merge(&identity.uid, &patch).await?;

        if self.generation.load(Ordering::SeqCst) == generation {
            let updated = record.clone();
            self.state.send_modify(move |snapshot| {
                if snapshot
                    .identity
                    .as_ref()
                    .is_some_and(|current| current.uid == updated.uid)
                {
                    snapshot.profile = Some(updated);
                }
            });
        }

        Ok(record)
    }

    // =========================================================================
    // Resolution
    // =========================================================================

    /// Resolve a signed-in identity into a full snapshot.
    async fn resolve_identity(&self, identity: Identity) {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;

        // Re-enter the loading state for the fetch: guards must not route
        // on an identity whose profile hasn't resolved.
        self.state.send_replace(AuthSnapshot {
            identity: Some(identity.clone()),
            profile: None,
            loading: true,
        });

        let profile = self.load_profile(&identity).await;

        if self.generation.load(Ordering::SeqCst) != generation {
            tracing::debug!(uid = %identity.uid, "discarding stale identity resolution");
            return;
        }

        self.state.send_replace(AuthSnapshot {
            identity: Some(identity),
            profile,
            loading: false,
        });
    }

    async fn load_profile(&self, identity: &Identity) -> Option<ProfileRecord> {
        match self.fetch_profile_with_retry(&identity.uid).await {
            Ok(Some(profile)) => Some(profile),
            Ok(None) => self.repair_profile(identity).await,
            Err(err) => {
                tracing::warn!(%err, uid = %identity.uid, "profile fetch failed");
                None
            }
        }
    }

    async fn fetch_profile_with_retry(
        &self,
        uid: &Uid,
    ) -> Result<Option<ProfileRecord>, AuthError> {
        let mut attempt = 0;
        loop {
            match self.profiles.get(uid).await {
                Err(err) if err.is_transient() && attempt < PROFILE_FETCH_RETRIES => {
                    attempt += 1;
                    tracing::debug!(%err, attempt, "retrying profile fetch");
                    tokio::time::sleep(RETRY_DELAY).await;
                }
                other => return other,
            }
        }
    }

    /// Provision the minimal record for an identity that has none.
    ///
    /// Exactly one record exists per identity; a signed-in identity
    /// without one (e.g. registration was interrupted after sign-up) gets
    /// repaired here and stays incomplete until onboarding finishes.
    async fn repair_profile(&self, identity: &Identity) -> Option<ProfileRecord> {
        tracing::info!(uid = %identity.uid, "provisioning missing profile record");
        let record = ProfileRecord::new(identity.uid.clone(), "", Utc::now());

        match self.profiles.create(&record).await {
            Ok(()) => Some(record),
            Err(err) => {
                tracing::warn!(%err, uid = %identity.uid, "profile repair failed");
                None
            }
        }
    }
}

fn validate_password(password: &str) -> Result<(), AuthError> {
    if password.len() < MIN_PASSWORD_LENGTH {
        return Err(AuthError::Validation(format!(
            "password must be at least {MIN_PASSWORD_LENGTH} characters"
        )));
    }
    Ok(())
}
