//! Legacy auth-callback normalizer.
//!
//! The identity provider has been configured with two different callback
//! paths over the product's lifetime, and sign-in emails older than a
//! config change still point at the retired one. Both endpoints accept
//! whatever the provider appends (GET or POST - POST is handled as GET,
//! the body is ignored), pull the signing email out of the query string,
//! and forward to their own internal callback page with normalized
//! parameters:
//!
//! - `link`  - the entire original request URL, so the callback page can
//!   re-parse provider token parameters this endpoint never needed to
//!   understand
//! - `email` - the extracted email, when one was found
//!
//! Email extraction order: a top-level `email` parameter; failing that, a
//! `continueUrl` parameter parsed as a URL and searched for its own
//! `email` parameter. Any parse failure along the way just means "no
//! email" - a malformed provider callback must never dead-end the user,
//! so the only failure mode here is a redirect to the login page.

use axum::extract::{OriginalUri, State};
use axum::http::Uri;
use axum::response::Redirect;
use url::Url;

use crate::state::AppState;

/// Internal callback page for the retired `/api/auth/action` path.
pub const ACTION_CALLBACK_ROUTE: &str = "/auth/action";

/// Internal callback page for the current `/api/auth/email-link` path.
pub const EMAIL_LINK_CALLBACK_ROUTE: &str = "/auth/email-link";

/// Where to send the user when normalization itself fails.
pub const LOGIN_ROUTE: &str = "/login";

/// Normalize callbacks hitting the retired provider path.
///
/// # Route
///
/// `GET/POST /api/auth/action`
pub async fn action(State(state): State<AppState>, OriginalUri(uri): OriginalUri) -> Redirect {
    normalize(&state, &uri, ACTION_CALLBACK_ROUTE)
}

/// Normalize callbacks hitting the current provider path.
///
/// # Route
///
/// `GET/POST /api/auth/email-link`
pub async fn email_link(State(state): State<AppState>, OriginalUri(uri): OriginalUri) -> Redirect {
    normalize(&state, &uri, EMAIL_LINK_CALLBACK_ROUTE)
}

fn normalize(state: &AppState, uri: &Uri, destination: &str) -> Redirect {
    let original_url = format!("{}{}", state.config().base_url, uri);

    match callback_location(&original_url, destination) {
        Ok(location) => Redirect::to(&location),
        Err(err) => {
            tracing::warn!(
                error = %err,
                destination,
                "provider callback could not be normalized; falling back to login"
            );
            Redirect::to(LOGIN_ROUTE)
        }
    }
}

/// Build the internal callback location for an original request URL.
fn callback_location(original_url: &str, destination: &str) -> Result<String, url::ParseError> {
    let parsed = Url::parse(original_url)?;

    let mut location = format!(
        "{}?link={}",
        destination,
        urlencoding::encode(original_url)
    );
    if let Some(email) = extract_email(&parsed) {
        location.push_str("&email=");
        location.push_str(&urlencoding::encode(&email));
    }

    Ok(location)
}

/// Extract the signing email from a provider callback URL.
///
/// Yields `None` rather than an error on anything unexpected: a missing
/// parameter, an unparseable `continueUrl`, a `continueUrl` without an
/// email of its own.
fn extract_email(url: &Url) -> Option<String> {
    if let Some((_, email)) = url.query_pairs().find(|(key, _)| key == "email") {
        return Some(email.into_owned());
    }

    let continue_url = url
        .query_pairs()
        .find(|(key, _)| key == "continueUrl")
        .map(|(_, value)| value.into_owned())?;
    let continue_url = Url::parse(&continue_url).ok()?;

    continue_url
        .query_pairs()
        .find(|(key, _)| key == "email")
        .map(|(_, value)| value.into_owned())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_email_top_level() {
        let url = Url::parse("http://localhost:3000/api/auth/action?email=a%40b.com").unwrap();
        assert_eq!(extract_email(&url).as_deref(), Some("a@b.com"));
    }

    #[test]
    fn test_extract_email_from_continue_url() {
        // continueUrl is itself percent-encoded inside the outer query.
        let url = Url::parse(
            "http://localhost:3000/api/auth/action?mode=signIn&continueUrl=http%3A%2F%2Flocalhost%3A3000%2Flogin%3Femail%3Da%2540b.com",
        )
        .unwrap();
        assert_eq!(extract_email(&url).as_deref(), Some("a@b.com"));
    }

    #[test]
    fn test_top_level_email_wins_over_continue_url() {
        let url = Url::parse(
            "http://localhost:3000/api/auth/action?email=first%40b.com&continueUrl=http%3A%2F%2Fx%2F%3Femail%3Dsecond%2540b.com",
        )
        .unwrap();
        assert_eq!(extract_email(&url).as_deref(), Some("first@b.com"));
    }

    #[test]
    fn test_malformed_continue_url_yields_no_email() {
        let url = Url::parse(
            "http://localhost:3000/api/auth/action?continueUrl=not%20a%20url%20at%20all",
        )
        .unwrap();
        assert_eq!(extract_email(&url), None);
    }

    #[test]
    fn test_continue_url_without_email_yields_none() {
        let url = Url::parse(
            "http://localhost:3000/api/auth/action?continueUrl=http%3A%2F%2Flocalhost%3A3000%2Fdashboard",
        )
        .unwrap();
        assert_eq!(extract_email(&url), None);
    }

    #[test]
    fn test_callback_location_carries_original_url_verbatim() {
        let original = "http://localhost:3000/api/auth/action?mode=signIn&oobCode=XYZ";
        let location = callback_location(original, EMAIL_LINK_CALLBACK_ROUTE).unwrap();

        let resolved = Url::parse("http://localhost:3000")
            .unwrap()
            .join(&location)
            .unwrap();
        let link = resolved
            .query_pairs()
            .find(|(key, _)| key == "link")
            .map(|(_, value)| value.into_owned())
            .unwrap();
        assert_eq!(link, original);
        assert!(
            resolved
                .query_pairs()
                .all(|(key, _)| key != "email")
        );
    }
}
