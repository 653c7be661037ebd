//! Backend services: session credentials, identity lookup, seeding.

pub mod early_users;
pub mod identity;
pub mod token;

pub use identity::{IdentityLookup, LookupError};
pub use token::{IssuedToken, SessionClaims, SessionTokens, TokenError};
