//! Identity provider interface.
//!
//! Everything this SDK requires from the identity provider, as one trait.
//! The REST implementation in [`rest`] is the production path; tests hand
//! the auth context a scripted mock instead.
//!
//! Providers are push-based: beyond the request/response operations they
//! own a broadcast stream of [`AuthChange`] events, fired after every
//! successful sign-in or sign-out. The session bootstrapper consumes the
//! stream; nothing in the SDK polls.

pub mod rest;

use std::future::Future;

use tokio::sync::broadcast;

use prysm_core::{Email, Identity};

use crate::error::AuthError;

pub use rest::{RestIdentityProvider, RestProviderConfig};

/// An out-of-band change to the ambient auth state.
#[derive(Debug, Clone)]
pub enum AuthChange {
    /// An identity signed in (any flow: password, email link, restore).
    SignedIn(Identity),
    /// The current identity signed out.
    SignedOut,
}

/// The operations Prysm requires from an identity provider.
///
/// Methods return `impl Future + Send` rather than `async fn` so that
/// generic consumers can hold the futures across task boundaries.
pub trait IdentityProvider: Send + Sync + 'static {
    /// Create a new account and sign it in.
    fn sign_up(
        &self,
        email: &Email,
        password: &str,
    ) -> impl Future<Output = Result<Identity, AuthError>> + Send;

    /// Sign in with email and password.
    fn sign_in_with_password(
        &self,
        email: &Email,
        password: &str,
    ) -> impl Future<Output = Result<Identity, AuthError>> + Send;

    /// Email a one-time sign-in link.
    fn send_sign_in_link(
        &self,
        email: &Email,
    ) -> impl Future<Output = Result<(), AuthError>> + Send;

    /// Exchange a sign-in link for an identity.
    fn sign_in_with_email_link(
        &self,
        email: &Email,
        link: &str,
    ) -> impl Future<Output = Result<Identity, AuthError>> + Send;

    /// Sign the current identity out. Never fails.
    fn sign_out(&self) -> impl Future<Output = ()> + Send;

    /// Email a password-reset link.
    fn send_password_reset_email(
        &self,
        email: &Email,
    ) -> impl Future<Output = Result<(), AuthError>> + Send;

    /// Email a verification link to the current identity.
    fn send_verification_email(&self) -> impl Future<Output = Result<(), AuthError>> + Send;

    /// Re-fetch the current identity (picks up verification changes).
    fn reload(&self) -> impl Future<Output = Result<Identity, AuthError>> + Send;

    /// Restore a persisted session at startup, if any.
    fn restore(&self) -> impl Future<Output = Result<Option<Identity>, AuthError>> + Send;

    /// The current provider credential, used to authorize backend calls.
    fn id_token(&self) -> impl Future<Output = Option<String>> + Send;

    /// Subscribe to ambient auth-state changes.
    fn subscribe(&self) -> broadcast::Receiver<AuthChange>;
}
