//! Provider-issued user identifier.

use core::fmt;

use serde::{Deserialize, Serialize};

/// Errors that can occur when parsing a [`Uid`].
#[derive(thiserror::Error, Debug, Clone)]
pub enum UidError {
    /// The input string is empty.
    #[error("uid cannot be empty")]
    Empty,
    /// The input string is too long.
    #[error("uid must be at most {max} characters")]
    TooLong {
        /// Maximum allowed length.
        max: usize,
    },
}

/// An identity-provider user identifier.
///
/// Uids are opaque strings minted by the identity provider. The only
/// guarantees this type enforces are that the value is non-empty and of
/// bounded length; everything else is provider territory.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(transparent)]
pub struct Uid(String);

impl Uid {
    /// Maximum length of a uid. Providers issue much shorter values; the
    /// bound exists so a corrupted value cannot balloon storage keys.
    pub const MAX_LENGTH: usize = 128;

    /// Parse a `Uid` from a string.
    ///
    /// # Errors
    ///
    /// Returns an error if the input is empty or longer than 128 characters.
    pub fn parse(s: &str) -> Result<Self, UidError> {
        if s.is_empty() {
            return Err(UidError::Empty);
        }
        if s.len() > Self::MAX_LENGTH {
            return Err(UidError::TooLong {
                max: Self::MAX_LENGTH,
            });
        }
        Ok(Self(s.to_owned()))
    }

    /// Returns the uid as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consumes the `Uid` and returns its inner string.
    #[must_use]
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Display for Uid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for Uid {
    type Err = UidError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl AsRef<str> for Uid {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
