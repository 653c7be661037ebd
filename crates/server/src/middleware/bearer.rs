//! Session-credential extractors.
//!
//! Session credentials arrive as `Authorization: Bearer <token>` headers.
//! Absence of the header is not itself an error - some endpoints are
//! anonymous - so there are two extractors: one that rejects and one that
//! yields an `Option`.

use axum::http::{header, request::Parts};
use axum::extract::FromRequestParts;

use crate::error::AppError;
use crate::services::SessionClaims;
use crate::state::AppState;

/// Extractor that requires a valid session credential.
///
/// Rejects with 401 when the header is missing or the credential does not
/// verify. Verification fails closed: an expired, tampered, or
/// foreign-signed token is indistinguishable from no token at all.
///
/// # Example
///
/// ```rust,ignore
/// async fn profile(RequireSession(claims): RequireSession) -> impl IntoResponse {
///     format!("Hello, {}!", claims.email)
/// }
/// ```
pub struct RequireSession(pub SessionClaims);

impl FromRequestParts<AppState> for RequireSession {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token = bearer_token(parts)
            .ok_or_else(|| AppError::Unauthorized("missing bearer credential".to_owned()))?;

        let claims = state.tokens().verify(token).ok_or_else(|| {
            AppError::Unauthorized("invalid or expired session credential".to_owned())
        })?;

        Ok(Self(claims))
    }
}

/// Extractor that optionally reads a session credential.
///
/// Unlike [`RequireSession`], this never rejects; an invalid credential
/// yields `None`, same as an absent one.
pub struct OptionalSession(pub Option<SessionClaims>);

impl FromRequestParts<AppState> for OptionalSession {
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let claims = bearer_token(parts).and_then(|token| state.tokens().verify(token));
        Ok(Self(claims))
    }
}

/// Pull the bearer token out of the Authorization header, if any.
fn bearer_token(parts: &Parts) -> Option<&str> {
    parts
        .headers
        .get(header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
}
