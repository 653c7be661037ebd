//! The authenticated principal as reported by the identity provider.

use serde::{Deserialize, Serialize};

use super::{Email, Uid};

/// A provider-issued identity.
///
/// Created by the identity provider on registration or first successful
/// email-link exchange. This type is read-only from Prysm's perspective:
/// the verification flag changes provider-side and is picked up by
/// re-fetching (`reload`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    /// Provider-issued unique identifier.
    pub uid: Uid,
    /// Email address the identity was registered with.
    pub email: Email,
    /// Whether the provider has verified the email address.
    pub email_verified: bool,
}

impl Identity {
    /// Create an identity from its parts.
    #[must_use]
    pub const fn new(uid: Uid, email: Email, email_verified: bool) -> Self {
        Self {
            uid,
            email,
            email_verified,
        }
    }
}
