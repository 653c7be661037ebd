//! Client-side error taxonomy.
//!
//! Three buckets, three policies:
//!
//! - [`AuthError::Validation`] - bad input shape, surfaced immediately,
//!   never retried
//! - [`AuthError::Provider`] - a rejection from the identity provider or
//!   the Prysm backend, surfaced with a readable message, never retried
//!   automatically
//! - [`AuthError::Transient`] - network failure; safe to retry a bounded
//!   number of times for read-only operations only (mutations are never
//!   auto-retried, to avoid duplicate writes)

use thiserror::Error;

use prysm_core::{EmailError, UidError};

/// Classified provider rejection reasons.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderErrorCode {
    /// The email is already registered.
    EmailInUse,
    /// Wrong email/password combination.
    InvalidCredentials,
    /// Password rejected as too weak.
    WeakPassword,
    /// No account for the email.
    UserNotFound,
    /// The sign-in link is malformed or already used.
    InvalidLink,
    /// The sign-in link has expired.
    LinkExpired,
    /// The provider is rate limiting this client.
    TooManyAttempts,
    /// Anything the provider reports that we don't classify.
    Other,
}

impl ProviderErrorCode {
    /// Classify a provider error string (e.g. `WEAK_PASSWORD : ...`).
    #[must_use]
    pub fn from_provider_message(message: &str) -> Self {
        let code = message.split_whitespace().next().unwrap_or_default();
        match code {
            "EMAIL_EXISTS" => Self::EmailInUse,
            "INVALID_PASSWORD" | "INVALID_LOGIN_CREDENTIALS" => Self::InvalidCredentials,
            "WEAK_PASSWORD" => Self::WeakPassword,
            "EMAIL_NOT_FOUND" | "USER_NOT_FOUND" | "USER_DISABLED" => Self::UserNotFound,
            "INVALID_OOB_CODE" => Self::InvalidLink,
            "EXPIRED_OOB_CODE" => Self::LinkExpired,
            "TOO_MANY_ATTEMPTS_TRY_LATER" => Self::TooManyAttempts,
            _ => Self::Other,
        }
    }
}

/// Errors surfaced by client SDK operations.
#[derive(Debug, Error)]
pub enum AuthError {
    /// Bad input shape (malformed email, empty link, short password).
    #[error("invalid input: {0}")]
    Validation(String),

    /// The provider or backend rejected the request.
    #[error("provider rejected the request: {message}")]
    Provider {
        /// Classified rejection reason.
        code: ProviderErrorCode,
        /// Provider-supplied message.
        message: String,
    },

    /// A network failure talking to the provider or backend.
    #[error("transient network failure: {0}")]
    Transient(String),

    /// The operation needs a signed-in identity and there is none.
    #[error("not signed in")]
    NotSignedIn,
}

impl AuthError {
    /// Build a provider rejection, classifying the message.
    #[must_use]
    pub fn provider(message: impl Into<String>) -> Self {
        let message = message.into();
        Self::Provider {
            code: ProviderErrorCode::from_provider_message(&message),
            message,
        }
    }

    /// Whether retrying could help (read-only operations only).
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(self, Self::Transient(_))
    }
}

impl From<reqwest::Error> for AuthError {
    fn from(err: reqwest::Error) -> Self {
        Self::Transient(err.to_string())
    }
}

impl From<EmailError> for AuthError {
    fn from(err: EmailError) -> Self {
        Self::Validation(err.to_string())
    }
}

impl From<UidError> for AuthError {
    fn from(err: UidError) -> Self {
        Self::Validation(err.to_string())
    }
}
