//! Session credential issuance and verification.
//!
//! Session credentials are HS256 JWTs binding a uid and email for seven
//! days. Verification is pure and fails closed: anything malformed,
//! expired, signed with a different secret, or missing either identifying
//! claim is simply invalid - there is no partial result and no error to
//! handle.

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use prysm_core::{Email, Uid};

/// How long a session credential stays valid.
pub const SESSION_TTL_DAYS: i64 = 7;

/// Errors that can occur while signing a credential.
///
/// Verification deliberately has no error type; see [`SessionTokens::verify`].
#[derive(Debug, Error)]
pub enum TokenError {
    /// The signing step itself failed.
    #[error("failed to sign session credential: {0}")]
    Sign(#[from] jsonwebtoken::errors::Error),
}

/// Wire-format claims. Both identifying fields are optional on decode so
/// that their absence is detected here rather than as a parse failure.
#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    #[serde(skip_serializing_if = "Option::is_none")]
    sub: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    email: Option<String>,
    iat: i64,
    exp: i64,
}

/// Verified contents of a session credential.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionClaims {
    /// The authenticated uid.
    pub uid: Uid,
    /// The email bound at issuance.
    pub email: Email,
    /// When the credential was issued.
    pub issued_at: DateTime<Utc>,
    /// When the credential expires.
    pub expires_at: DateTime<Utc>,
}

/// A freshly minted credential.
#[derive(Debug, Clone)]
pub struct IssuedToken {
    /// The signed token.
    pub token: String,
    /// When it expires.
    pub expires_at: DateTime<Utc>,
}

/// Issues and verifies session credentials against the process secret.
pub struct SessionTokens {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
}

impl SessionTokens {
    /// Create a token service signing with `secret`.
    #[must_use]
    pub fn new(secret: &SecretString) -> Self {
        let bytes = secret.expose_secret().as_bytes();
        let mut validation = Validation::new(Algorithm::HS256);
        // Expiry means expiry; no grace window.
        validation.leeway = 0;

        Self {
            encoding: EncodingKey::from_secret(bytes),
            decoding: DecodingKey::from_secret(bytes),
            validation,
        }
    }

    /// Issue a credential for `uid`/`email`, expiring in seven days.
    ///
    /// # Errors
    ///
    /// Returns `TokenError::Sign` if the signing step fails. Inputs are
    /// already non-empty by construction of [`Uid`] and [`Email`].
    pub fn issue(&self, uid: &Uid, email: &Email) -> Result<IssuedToken, TokenError> {
        self.issue_at(uid, email, Utc::now())
    }

    /// Issue a credential with an explicit clock. Used by tests to mint
    /// already-expired credentials.
    ///
    /// # Errors
    ///
    /// Returns `TokenError::Sign` if the signing step fails.
    pub fn issue_at(
        &self,
        uid: &Uid,
        email: &Email,
        issued_at: DateTime<Utc>,
    ) -> Result<IssuedToken, TokenError> {
        let expires_at = issued_at + Duration::days(SESSION_TTL_DAYS);
        let claims = Claims {
            sub: Some(uid.as_str().to_owned()),
            email: Some(email.as_str().to_owned()),
            iat: issued_at.timestamp(),
            exp: expires_at.timestamp(),
        };

        let token = encode(&Header::default(), &claims, &self.encoding)?;
        Ok(IssuedToken { token, expires_at })
    }

    /// Verify a credential.
    ///
    /// Returns `None` for any token that is not ours, not intact, not
    /// current, or missing either identifying claim - even when the
    /// signature itself checks out.
    #[must_use]
    pub fn verify(&self, token: &str) -> Option<SessionClaims> {
        let data = decode::<Claims>(token, &self.decoding, &self.validation).ok()?;

        let uid = Uid::parse(data.claims.sub.as_deref()?).ok()?;
        let email = Email::parse(data.claims.email.as_deref()?).ok()?;

        Some(SessionClaims {
            uid,
            email,
            issued_at: DateTime::from_timestamp(data.claims.iat, 0)?,
            expires_at: DateTime::from_timestamp(data.claims.exp, 0)?,
        })
    }
}
