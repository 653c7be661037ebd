//! Profile API route handlers.
//!
//! All three operations act on the profile belonging to the presented
//! session credential; there is no cross-user access. The uid never comes
//! from the request body - the credential is the authority.

use axum::{Json, extract::State, http::StatusCode};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use prysm_core::{AcademicInfo, NotificationSettings, ProfileRecord, Theme};

use crate::db::{ProfileRepository, RepositoryError};
use crate::error::{AppError, Result};
use crate::middleware::RequireSession;
use crate::state::AppState;

/// Body for profile creation at registration completion.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct NewProfileRequest {
    /// Name shown across the product.
    pub display_name: String,
    /// Optional unique handle.
    pub username: Option<String>,
    /// Free-form bio.
    pub bio: String,
    /// UI theme preference.
    pub theme: Theme,
    /// Email notification opt-ins.
    pub notifications: NotificationSettings,
    /// Terms of service accepted.
    pub accepted_terms: bool,
    /// Privacy policy accepted.
    pub accepted_privacy: bool,
    /// Academic background.
    pub academic: AcademicInfo,
}

/// Partial update; only present fields are merged into the document.
///
/// Deliberately has no uid, `signupNumber`, or `earlyUser` field: those
/// are owned by the credential and the seeding routine respectively.
#[derive(Debug, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ProfileUpdateRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub photo_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bio: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub theme: Option<Theme>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notifications: Option<NotificationSettings>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub accepted_terms: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub accepted_privacy: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub academic: Option<AcademicInfo>,
}

/// Read the caller's profile.
///
/// # Route
///
/// `GET /api/profile`
pub async fn show(
    State(state): State<AppState>,
    RequireSession(claims): RequireSession,
) -> Result<Json<ProfileRecord>> {
    let repo = ProfileRepository::new(state.pool());
    let profile = repo
        .get(&claims.uid)
        .await?
        .ok_or_else(|| AppError::NotFound("profile".to_owned()))?;

    Ok(Json(profile))
}

/// Create the caller's profile.
///
/// # Route
///
/// `POST /api/profile`
pub async fn create(
    State(state): State<AppState>,
    RequireSession(claims): RequireSession,
    Json(body): Json<NewProfileRequest>,
) -> Result<(StatusCode, Json<ProfileRecord>)> {
    if body.display_name.trim().is_empty() {
        return Err(AppError::BadRequest("displayName is required".to_owned()));
    }

    let now = Utc::now();
    let mut record = ProfileRecord::new(claims.uid.clone(), body.display_name, now);
    record.username = body.username;
    record.bio = body.bio;
    record.theme = body.theme;
    record.notifications = body.notifications;
    record.accepted_terms = body.accepted_terms;
    record.accepted_terms_at = body.accepted_terms.then_some(now);
    record.accepted_privacy = body.accepted_privacy;
    record.accepted_privacy_at = body.accepted_privacy.then_some(now);
    record.academic = body.academic;

    let repo = ProfileRepository::new(state.pool());
    repo.create(&record).await.map_err(|e| match e {
        RepositoryError::Conflict(msg) => AppError::Conflict(msg),
        other => AppError::Database(other),
    })?;

    tracing::info!(uid = %record.uid, "profile created");

    Ok((StatusCode::CREATED, Json(record)))
}

/// Merge a partial update into the caller's profile.
///
/// # Route
///
/// `PATCH /api/profile`
pub async fn update(
    State(state): State<AppState>,
    RequireSession(claims): RequireSession,
    Json(body): Json<ProfileUpdateRequest>,
) -> Result<Json<ProfileRecord>> {
    let mut patch =
        serde_json::to_value(&body).map_err(|e| AppError::Internal(e.to_string()))?;
    let Value::Object(map) = &mut patch else {
        return Err(AppError::BadRequest("patch must be an object".to_owned()));
    };
    if map.is_empty() {
        return Err(AppError::BadRequest("no fields to update".to_owned()));
    }

    let now = Utc::now();
    if body.accepted_terms == Some(true) {
        map.insert("acceptedTermsAt".to_owned(), serde_json::json!(now));
    }
    if body.accepted_privacy == Some(true) {
        map.insert("acceptedPrivacyAt".to_owned(), serde_json::json!(now));
    }
    map.insert("updatedAt".to_owned(), serde_json::json!(now));

    let repo = ProfileRepository::new(state.pool());
    let profile = repo.merge(&claims.uid, &patch).await.map_err(|e| match e {
        RepositoryError::NotFound => AppError::NotFound("profile".to_owned()),
        other => AppError::Database(other),
    })?;

    Ok(Json(profile))
}
