//! Session credential endpoints.
//!
//! After the client SDK completes a provider sign-in it holds a provider
//! ID token. `POST /api/session` confirms that token with the provider
//! and exchanges it for a Prysm session credential; `GET /api/session`
//! echoes the verified claims of a presented credential.

use axum::{Json, extract::State};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};
use crate::middleware::RequireSession;
use crate::state::AppState;

/// Request body for credential exchange.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateSessionRequest {
    /// Provider-issued ID token.
    pub id_token: String,
}

/// A freshly issued session credential.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionResponse {
    /// The bearer token to present on subsequent API calls.
    pub token: String,
    /// When the credential expires.
    pub expires_at: DateTime<Utc>,
}

/// Verified claims of a presented credential.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionInfoResponse {
    /// Authenticated uid.
    pub uid: String,
    /// Email bound at issuance.
    pub email: String,
    /// When the credential expires.
    pub expires_at: DateTime<Utc>,
}

/// Exchange a provider ID token for a session credential.
///
/// # Route
///
/// `POST /api/session`
pub async fn create(
    State(state): State<AppState>,
    Json(body): Json<CreateSessionRequest>,
) -> Result<Json<SessionResponse>> {
    if body.id_token.is_empty() {
        return Err(AppError::BadRequest("idToken is required".to_owned()));
    }

    let identity = state.identity().lookup(&body.id_token).await?;

    let issued = state
        .tokens()
        .issue(&identity.uid, &identity.email)
        .map_err(|e| AppError::Internal(e.to_string()))?;

    tracing::info!(uid = %identity.uid, "session credential issued");

    Ok(Json(SessionResponse {
        token: issued.token,
        expires_at: issued.expires_at,
    }))
}

/// Show the claims of the presented session credential.
///
/// # Route
///
/// `GET /api/session`
pub async fn show(RequireSession(claims): RequireSession) -> Json<SessionInfoResponse> {
    Json(SessionInfoResponse {
        uid: claims.uid.into_inner(),
        email: claims.email.into_inner(),
        expires_at: claims.expires_at,
    })
}
