//! Server-rendered page handlers.
//!
//! Pages carry no auth state of their own: protected pages render a shell
//! and the client SDK's route guard decides whether the shell may stay or
//! must navigate away. The two email-link callback pages receive the
//! normalized `email`/`link` parameters produced by the redirect
//! normalizer and hand them to the client script via data attributes.

use askama::Template;
use askama_web::WebTemplate;
use axum::extract::Query;
use axum::response::IntoResponse;
use serde::Deserialize;

// =============================================================================
// Query Types
// =============================================================================

/// Query parameters for error/success display.
#[derive(Debug, Deserialize)]
pub struct MessageQuery {
    #[serde(default)]
    pub error: String,
    #[serde(default)]
    pub success: String,
}

/// Normalized parameters arriving at the email-link callback pages.
#[derive(Debug, Deserialize)]
pub struct EmailLinkQuery {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub link: String,
}

// =============================================================================
// Templates
// =============================================================================

/// Home / marketing page.
#[derive(Template, WebTemplate)]
#[template(path = "home.html")]
pub struct HomeTemplate;

/// Login page.
#[derive(Template, WebTemplate)]
#[template(path = "auth/login.html")]
pub struct LoginTemplate {
    pub error: String,
    pub success: String,
}

/// Registration page.
#[derive(Template, WebTemplate)]
#[template(path = "auth/register.html")]
pub struct RegisterTemplate {
    pub error: String,
}

/// Forgot-password page.
#[derive(Template, WebTemplate)]
#[template(path = "auth/forgot_password.html")]
pub struct ForgotPasswordTemplate {
    pub success: String,
}

/// Email-link completion page (served for both callback routes).
#[derive(Template, WebTemplate)]
#[template(path = "auth/email_link.html")]
pub struct EmailLinkTemplate {
    pub email: String,
    pub link: String,
}

/// Onboarding completion page.
#[derive(Template, WebTemplate)]
#[template(path = "complete_profile.html")]
pub struct CompleteProfileTemplate;

/// Dashboard shell.
#[derive(Template, WebTemplate)]
#[template(path = "dashboard.html")]
pub struct DashboardTemplate;

// =============================================================================
// Handlers
// =============================================================================

/// Display the home page.
pub async fn home() -> impl IntoResponse {
    HomeTemplate
}

/// Display the login page.
pub async fn login(Query(query): Query<MessageQuery>) -> impl IntoResponse {
    LoginTemplate {
        error: query.error,
        success: query.success,
    }
}

/// Display the registration page.
pub async fn register(Query(query): Query<MessageQuery>) -> impl IntoResponse {
    RegisterTemplate { error: query.error }
}

/// Display the forgot-password page.
pub async fn forgot_password(Query(query): Query<MessageQuery>) -> impl IntoResponse {
    ForgotPasswordTemplate {
        success: query.success,
    }
}

/// Display the email-link completion page.
pub async fn email_link(Query(query): Query<EmailLinkQuery>) -> impl IntoResponse {
    EmailLinkTemplate {
        email: query.email,
        link: query.link,
    }
}

/// Display the onboarding completion page.
pub async fn complete_profile() -> impl IntoResponse {
    CompleteProfileTemplate
}

/// Display the dashboard shell.
pub async fn dashboard() -> impl IntoResponse {
    DashboardTemplate
}
