//! Server-side identity provider lookup.
//!
//! The server never signs users in itself - the client SDK talks to the
//! provider directly. The one provider call made server-side is
//! `accounts:lookup`, used to confirm a provider-issued ID token before
//! minting a session credential for it.

use serde::Deserialize;
use thiserror::Error;

use prysm_core::{Email, Identity, Uid};

use crate::config::IdentityProviderConfig;
use secrecy::ExposeSecret;

/// Errors from the provider lookup call.
#[derive(Debug, Error)]
pub enum LookupError {
    /// The provider rejected the credential.
    #[error("identity provider rejected the credential: {0}")]
    Rejected(String),

    /// The provider answered with something we cannot use.
    #[error("identity provider returned an unusable response: {0}")]
    Malformed(String),

    /// The provider could not be reached.
    #[error("identity provider unreachable: {0}")]
    Transport(#[from] reqwest::Error),
}

#[derive(Debug, Deserialize)]
struct LookupResponse {
    #[serde(default)]
    users: Vec<LookupUser>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LookupUser {
    local_id: String,
    email: Option<String>,
    #[serde(default)]
    email_verified: bool,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    error: ApiErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ApiErrorDetail {
    message: String,
}

/// Client for the provider's account-lookup endpoint.
pub struct IdentityLookup {
    http: reqwest::Client,
    api_base: String,
    api_key: String,
}

impl IdentityLookup {
    /// Create a lookup client from provider configuration.
    #[must_use]
    pub fn new(config: &IdentityProviderConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_base: config.api_base.clone(),
            api_key: config.api_key.expose_secret().to_owned(),
        }
    }

    /// Resolve a provider ID token to the identity it belongs to.
    ///
    /// # Errors
    ///
    /// Returns `LookupError::Rejected` when the provider refuses the
    /// token, `Malformed` when the response does not carry a usable user,
    /// and `Transport` for network failures.
    pub async fn lookup(&self, id_token: &str) -> Result<Identity, LookupError> {
        let url = format!("{}/v1/accounts:lookup?key={}", self.api_base, self.api_key);

        let response = self
            .http
            .post(&url)
            .json(&serde_json::json!({ "idToken": id_token }))
            .send()
            .await?;

        if !response.status().is_success() {
            let message = response
                .json::<ApiErrorBody>()
                .await
                .map(|body| body.error.message)
                .unwrap_or_else(|_| "unknown provider error".to_owned());
            return Err(LookupError::Rejected(message));
        }

        let body: LookupResponse = response.json().await?;
        let user = body
            .users
            .into_iter()
            .next()
            .ok_or_else(|| LookupError::Malformed("no user for credential".to_owned()))?;

        let uid = Uid::parse(&user.local_id)
            .map_err(|e| LookupError::Malformed(format!("invalid uid: {e}")))?;
        let email = Email::parse(user.email.as_deref().unwrap_or_default())
            .map_err(|e| LookupError::Malformed(format!("invalid email: {e}")))?;

        Ok(Identity::new(uid, email, user.email_verified))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_response_decodes_provider_shape() {
        let body: LookupResponse = serde_json::from_str(
            r#"{"kind":"identitytoolkit#GetAccountInfoResponse",
                "users":[{"localId":"k9GhT2pQxYw5","email":"ada@example.com",
                          "emailVerified":true,"lastLoginAt":"1700000000000"}]}"#,
        )
        .unwrap();
        let user = &body.users[0];
        assert_eq!(user.local_id, "k9GhT2pQxYw5");
        assert_eq!(user.email.as_deref(), Some("ada@example.com"));
        assert!(user.email_verified);
    }

    #[test]
    fn test_error_body_decodes_provider_shape() {
        let body: ApiErrorBody = serde_json::from_str(
            r#"{"error":{"code":400,"message":"INVALID_ID_TOKEN","errors":[]}}"#,
        )
        .unwrap();
        assert_eq!(body.error.message, "INVALID_ID_TOKEN");
    }
}
