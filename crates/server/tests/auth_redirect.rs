//! Router-level tests for the legacy auth-callback normalizer.
//!
//! These drive the real router with `tower::ServiceExt::oneshot`; no
//! database or network is touched (the pool is lazy and the normalizer
//! never queries).

use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use secrecy::SecretString;
use sqlx::postgres::PgPoolOptions;
use tower::ServiceExt;
use url::Url;

use prysm_server::config::{IdentityProviderConfig, ServerConfig};
use prysm_server::routes;
use prysm_server::state::AppState;

const BASE_URL: &str = "http://localhost:3000";

fn test_state() -> AppState {
    let config = ServerConfig {
        database_url: SecretString::from("postgres://localhost/prysm_test"),
        host: "127.0.0.1".parse().expect("valid host"),
        port: 3000,
        base_url: BASE_URL.to_owned(),
        session_secret: SecretString::from("kQ4vLx8nRm2pWj6tZc9bYf3hGd7sAu1e"),
        identity: IdentityProviderConfig {
            api_base: "https://identitytoolkit.googleapis.com".to_owned(),
            api_key: SecretString::from("test-api-key"),
        },
        sentry_dsn: None,
        sentry_environment: None,
    };
    let pool = PgPoolOptions::new()
        .connect_lazy("postgres://localhost/prysm_test")
        .expect("lazy pool");
    AppState::new(config, pool)
}

fn app() -> axum::Router {
    routes::routes().with_state(test_state())
}

/// Send a request and return the parsed redirect location.
async fn redirect_location(request: Request<Body>) -> Url {
    let response = app().oneshot(request).await.expect("request");
    assert!(
        response.status().is_redirection(),
        "expected redirect, got {}",
        response.status()
    );

    let location = response
        .headers()
        .get(header::LOCATION)
        .expect("Location header")
        .to_str()
        .expect("utf-8 location");
    Url::parse(BASE_URL)
        .expect("base url")
        .join(location)
        .expect("resolvable location")
}

fn query_param(url: &Url, name: &str) -> Option<String> {
    url.query_pairs()
        .find(|(key, _)| key == name)
        .map(|(_, value)| value.into_owned())
}

#[tokio::test]
async fn bare_callback_redirects_with_link_and_no_email() {
    for (path, destination) in [
        ("/api/auth/action", "/auth/action"),
        ("/api/auth/email-link", "/auth/email-link"),
    ] {
        let request = Request::get(path).body(Body::empty()).expect("request");
        let location = redirect_location(request).await;

        assert_eq!(location.path(), destination);
        assert_eq!(
            query_param(&location, "link").as_deref(),
            Some(format!("{BASE_URL}{path}").as_str())
        );
        assert_eq!(query_param(&location, "email"), None);
    }
}

#[tokio::test]
async fn link_parameter_carries_full_original_url() {
    let path = "/api/auth/email-link?mode=signIn&oobCode=XYZ123&apiKey=k";
    let request = Request::get(path).body(Body::empty()).expect("request");
    let location = redirect_location(request).await;

    assert_eq!(
        query_param(&location, "link").as_deref(),
        Some(format!("{BASE_URL}{path}").as_str())
    );
}

#[tokio::test]
async fn email_nested_in_continue_url_is_extracted() {
    // continueUrl=http://localhost:3000/login?email=a%40b.com, fully encoded.
    let path = "/api/auth/action?continueUrl=http%3A%2F%2Flocalhost%3A3000%2Flogin%3Femail%3Da%2540b.com";
    let request = Request::get(path).body(Body::empty()).expect("request");
    let location = redirect_location(request).await;

    assert_eq!(query_param(&location, "email").as_deref(), Some("a@b.com"));
}

#[tokio::test]
async fn top_level_email_is_extracted() {
    let request = Request::get("/api/auth/email-link?email=a%40b.com")
        .body(Body::empty())
        .expect("request");
    let location = redirect_location(request).await;

    assert_eq!(query_param(&location, "email").as_deref(), Some("a@b.com"));
}

#[tokio::test]
async fn malformed_continue_url_still_redirects_without_email() {
    let request = Request::get("/api/auth/action?continueUrl=%25%25not-a-url")
        .body(Body::empty())
        .expect("request");
    let location = redirect_location(request).await;

    assert_eq!(location.path(), "/auth/action");
    assert_eq!(query_param(&location, "email"), None);
    assert!(query_param(&location, "link").is_some());
}

#[tokio::test]
async fn post_is_handled_as_get() {
    let request = Request::post("/api/auth/email-link?email=a%40b.com")
        .body(Body::empty())
        .expect("request");
    let location = redirect_location(request).await;

    assert_eq!(location.path(), "/auth/email-link");
    assert_eq!(query_param(&location, "email").as_deref(), Some("a@b.com"));
}

#[tokio::test]
async fn callback_pages_render() {
    for path in ["/auth/action?email=a%40b.com&link=x", "/auth/email-link"] {
        let request = Request::get(path).body(Body::empty()).expect("request");
        let response = app().oneshot(request).await.expect("request");
        assert_eq!(response.status(), StatusCode::OK);
    }
}
