//! Profile record and the completeness predicate.
//!
//! Profile records are application-owned documents keyed by the identity's
//! uid, stored as camelCase JSON. They are distinct from the provider's
//! identity: the provider knows who a user is, the profile knows who they
//! are to Prysm.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::Uid;

/// UI theme preference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    /// Light theme.
    Light,
    /// Dark theme.
    Dark,
    /// Follow the OS preference.
    #[default]
    System,
}

/// Email notification opt-ins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct NotificationSettings {
    /// Service and account updates.
    pub email_updates: bool,
    /// Product news and announcements.
    pub product_news: bool,
}

/// Academic background collected during onboarding.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AcademicInfo {
    /// Country of study.
    pub country: String,
    /// State/province/region within the country.
    pub region: String,
    /// School name.
    pub school: String,
    /// Grade or year level.
    pub grade_level: String,
    /// Curriculum/syllabus followed (e.g. IB, A-Levels).
    pub syllabus: String,
    /// University, for university students.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub university: Option<String>,
    /// Whether the user is a university student.
    pub is_university_student: bool,
}

/// Application-level user data, 1:1 with an identity.
///
/// Exactly one record exists per identity uid. It is created at
/// registration completion; a record found missing at sign-in is repaired
/// by provisioning a minimal (and therefore incomplete) one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileRecord {
    /// Identity uid this record belongs to.
    pub uid: Uid,
    /// Name shown across the product.
    #[serde(default)]
    pub display_name: String,
    /// Optional unique handle.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    /// Optional avatar reference.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub photo_url: Option<String>,
    /// Free-form bio.
    #[serde(default)]
    pub bio: String,
    /// UI theme preference.
    #[serde(default)]
    pub theme: Theme,
    /// Email notification opt-ins.
    #[serde(default)]
    pub notifications: NotificationSettings,
    /// Among the first registrants, eligible for a signup number.
    #[serde(default)]
    pub early_user: bool,
    /// Dense 1-based rank within the ordered early-user list.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signup_number: Option<u32>,
    /// Terms of service accepted.
    #[serde(default)]
    pub accepted_terms: bool,
    /// When the terms were accepted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub accepted_terms_at: Option<DateTime<Utc>>,
    /// Privacy policy accepted.
    #[serde(default)]
    pub accepted_privacy: bool,
    /// When the privacy policy was accepted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub accepted_privacy_at: Option<DateTime<Utc>>,
    /// Academic background.
    #[serde(default)]
    pub academic: AcademicInfo,
    /// When the record was created.
    pub created_at: DateTime<Utc>,
    /// When the record was last updated.
    pub updated_at: DateTime<Utc>,
}

impl ProfileRecord {
    /// Create a minimal record for `uid`.
    ///
    /// Everything beyond the display name starts at its default, which
    /// leaves the record incomplete under any non-trivial
    /// [`CompletenessPolicy`]. The caller supplies the clock.
    #[must_use]
    pub fn new(uid: Uid, display_name: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            uid,
            display_name: display_name.into(),
            username: None,
            photo_url: None,
            bio: String::new(),
            theme: Theme::default(),
            notifications: NotificationSettings::default(),
            early_user: false,
            signup_number: None,
            accepted_terms: false,
            accepted_terms_at: None,
            accepted_privacy: false,
            accepted_privacy_at: None,
            academic: AcademicInfo::default(),
            created_at: now,
            updated_at: now,
        }
    }
}

/// A profile field the completeness policy can require.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProfileField {
    /// `display_name` is non-blank.
    DisplayName,
    /// `username` is present and non-blank.
    Username,
    /// `bio` is non-blank.
    Bio,
    /// `academic.country` is non-blank.
    Country,
    /// `academic.region` is non-blank.
    Region,
    /// `academic.school` is non-blank.
    School,
    /// `academic.grade_level` is non-blank.
    GradeLevel,
    /// `academic.syllabus` is non-blank.
    Syllabus,
    /// Terms of service accepted.
    AcceptedTerms,
}

/// Which fields a profile needs before onboarding counts as finished.
///
/// The field set is configuration, not a constant: different deployments
/// onboard with different forms. The predicate itself is total and cheap -
/// it runs on every guard re-evaluation.
#[derive(Debug, Clone)]
pub struct CompletenessPolicy {
    required: Vec<ProfileField>,
}

impl Default for CompletenessPolicy {
    fn default() -> Self {
        Self {
            required: vec![
                ProfileField::DisplayName,
                ProfileField::Country,
                ProfileField::School,
                ProfileField::GradeLevel,
                ProfileField::AcceptedTerms,
            ],
        }
    }
}

impl CompletenessPolicy {
    /// Create a policy requiring exactly `required`.
    #[must_use]
    pub const fn new(required: Vec<ProfileField>) -> Self {
        Self { required }
    }

    /// Whether `profile` satisfies every required field.
    ///
    /// An absent record is always incomplete.
    #[must_use]
    pub fn is_complete(&self, profile: Option<&ProfileRecord>) -> bool {
        let Some(profile) = profile else {
            return false;
        };
        self.required.iter().all(|field| filled(profile, *field))
    }
}

fn filled(profile: &ProfileRecord, field: ProfileField) -> bool {
    fn non_blank(s: &str) -> bool {
        !s.trim().is_empty()
    }

    match field {
        ProfileField::DisplayName => non_blank(&profile.display_name),
        ProfileField::Username => profile.username.as_deref().is_some_and(non_blank),
        ProfileField::Bio => non_blank(&profile.bio),
        ProfileField::Country => non_blank(&profile.academic.country),
        ProfileField::Region => non_blank(&profile.academic.region),
        ProfileField::School => non_blank(&profile.academic.school),
        ProfileField::GradeLevel => non_blank(&profile.academic.grade_level),
        ProfileField::Syllabus => non_blank(&profile.academic.syllabus),
        ProfileField::AcceptedTerms => profile.accepted_terms,
    }
}
