//! HTTP route handlers.
//!
//! # Route Structure
//!
//! ```text
//! GET  /                       - Home page
//! GET  /health                 - Liveness check
//! GET  /health/ready           - Readiness check (database)
//!
//! # Pages
//! GET  /login                  - Login page
//! GET  /register               - Registration page
//! GET  /forgot-password        - Password reset request page
//! GET  /auth/action            - Email-link completion page (legacy destination)
//! GET  /auth/email-link        - Email-link completion page
//! GET  /complete-profile       - Onboarding completion page
//! GET  /dashboard              - Dashboard shell
//!
//! # Auth callback normalizer
//! GET|POST /api/auth/action      - Legacy provider callback (retired path)
//! GET|POST /api/auth/email-link  - Legacy provider callback (current path)
//!
//! # Session
//! POST /api/session            - Exchange provider ID token for a session credential
//! GET  /api/session            - Show verified credential claims
//!
//! # Profile (bearer credential required)
//! GET   /api/profile           - Read own profile
//! POST  /api/profile           - Create own profile
//! PATCH /api/profile           - Merge a partial update
//! ```

pub mod auth_redirect;
pub mod pages;
pub mod profile;
pub mod session;

use axum::{
    Router,
    routing::{get, post},
};

use crate::state::AppState;

/// Create the page routes router.
pub fn page_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(pages::home))
        .route("/login", get(pages::login))
        .route("/register", get(pages::register))
        .route("/forgot-password", get(pages::forgot_password))
        .route("/auth/action", get(pages::email_link))
        .route("/auth/email-link", get(pages::email_link))
        .route("/complete-profile", get(pages::complete_profile))
        .route("/dashboard", get(pages::dashboard))
}

/// Create the auth/session API router.
pub fn auth_api_routes() -> Router<AppState> {
    Router::new()
        // Provider callbacks: POST is handled exactly as GET.
        .route(
            "/auth/action",
            get(auth_redirect::action).post(auth_redirect::action),
        )
        .route(
            "/auth/email-link",
            get(auth_redirect::email_link).post(auth_redirect::email_link),
        )
        .route("/session", post(session::create).get(session::show))
}

/// Create the profile API router.
pub fn profile_api_routes() -> Router<AppState> {
    Router::new().route(
        "/",
        get(profile::show)
            .post(profile::create)
            .patch(profile::update),
    )
}

/// Create all routes for the server.
pub fn routes() -> Router<AppState> {
    Router::new()
        .merge(page_routes())
        .nest("/api", auth_api_routes())
        .nest("/api/profile", profile_api_routes())
}
