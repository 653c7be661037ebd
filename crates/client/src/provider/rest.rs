//! REST identity provider client.
//!
//! Talks to an identitytoolkit-style REST API: every operation is a POST
//! to `{base}/v1/accounts:{op}?key={apiKey}`. Successful sign-ins persist
//! the provider session through [`Storage`] and emit an
//! [`AuthChange::SignedIn`] on the ambient stream; sign-out clears both.

use std::sync::RwLock;

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tokio::sync::broadcast;
use url::Url;

use prysm_core::{Email, Identity, Uid};

use crate::error::AuthError;
use crate::storage::{Storage, keys};

use super::{AuthChange, IdentityProvider};

/// Capacity of the ambient event stream.
const EVENT_BUFFER: usize = 16;

/// Configuration for the REST provider.
#[derive(Clone)]
pub struct RestProviderConfig {
    /// REST base URL, without a trailing slash.
    pub api_base: String,
    /// Project API key appended to every call.
    pub api_key: String,
    /// Where sign-in links should bring the user back to; the email is
    /// appended as a query parameter so the callback normalizer can
    /// recover it on a device without local state.
    pub continue_url: String,
}

impl std::fmt::Debug for RestProviderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RestProviderConfig")
            .field("api_base", &self.api_base)
            .field("api_key", &"[REDACTED]")
            .field("continue_url", &self.continue_url)
            .finish()
    }
}

/// The provider-side session: the signed-in identity plus its tokens.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct ProviderSession {
    identity: Identity,
    id_token: String,
    refresh_token: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SignInResponse {
    local_id: String,
    id_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    email: Option<String>,
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

/// Identity provider client over REST.
pub struct RestIdentityProvider<S: Storage> {
    http: reqwest::Client,
    config: RestProviderConfig,
    session: RwLock<Option<ProviderSession>>,
    events: broadcast::Sender<AuthChange>,
    storage: S,
}

impl<S: Storage> RestIdentityProvider<S> {
    /// Create a provider client.
    #[must_use]
    pub fn new(config: RestProviderConfig, storage: S) -> Self {
        let (events, _) = broadcast::channel(EVENT_BUFFER);
        Self {
            http: reqwest::Client::new(),
            config,
            session: RwLock::new(None),
            events,
            storage,
        }
    }

    /// POST to an `accounts:{op}` endpoint and decode the response.
    async fn call<T: serde::de::DeserializeOwned>(
        &self,
        op: &str,
        body: Value,
    ) -> Result<T, AuthError> {
        let url = format!(
            "{}/v1/accounts:{}?key={}",
            self.config.api_base, op, self.config.api_key
        );

        let response = self.http.post(&url).json(&body).send().await?;

        if !response.status().is_success() {
            let message = response
                .json::<ApiErrorBody>()
                .await
                .map(|body| body.error.message)
                .unwrap_or_else(|_| "UNKNOWN_PROVIDER_ERROR".to_owned());
            return Err(AuthError::provider(message));
        }

        response
            .json()
            .await
            .map_err(|e| AuthError::provider(format!("UNUSABLE_RESPONSE {e}")))
    }

    /// Resolve an ID token to a full identity via `accounts:lookup`.
    async fn lookup(&self, id_token: &str) -> Result<Identity, AuthError> {
        let body: LookupResponse = self.call("lookup", json!({ "idToken": id_token })).await?;
        let user = body
            .users
            .into_iter()
            .next()
            .ok_or_else(|| AuthError::provider("USER_NOT_FOUND"))?;

        let uid = Uid::parse(&user.local_id)?;
        let email = Email::parse(user.email.as_deref().unwrap_or_default())?;
        Ok(Identity::new(uid, email, user.email_verified))
    }

    /// Record a fresh sign-in: cache it, persist it, announce it.
    fn install_session(&self, session: ProviderSession) {
        if let Ok(serialized) = serde_json::to_string(&session) {
            self.storage.set(keys::SESSION, &serialized);
        }
        let identity = session.identity.clone();
        if let Ok(mut slot) = self.session.write() {
            *slot = Some(session);
        }
        let _ = self.events.send(AuthChange::SignedIn(identity));
    }

    /// Turn a sign-in response into an installed session.
    async fn complete_sign_in(&self, response: SignInResponse) -> Result<Identity, AuthError> {
        // Sign-in responses don't carry the verification flag; one lookup
        // round trip fills in the full identity.
        let identity = self.lookup(&response.id_token).await?;
        self.install_session(ProviderSession {
            identity: identity.clone(),
            id_token: response.id_token,
            refresh_token: response.refresh_token,
        });
        Ok(identity)
    }

    fn current_id_token(&self) -> Option<String> {
        self.session
            .read()
            .ok()?
            .as_ref()
            .map(|s| s.id_token.clone())
    }
}

impl<S: Storage> IdentityProvider for RestIdentityProvider<S> {
    async fn sign_up(&self, email: &Email, password: &str) -> Result<Identity, AuthError> {
        let response: SignInResponse = self
            .call(
                "signUp",
                json!({
                    "email": email.as_str(),
                    "password": password,
                    "returnSecureToken": true,
                }),
            )
            .await?;

        // A brand-new account is never verified; skip the lookup.
        let uid = Uid::parse(&response.local_id)?;
        let identity = Identity::new(uid, email.clone(), false);
        self.install_session(ProviderSession {
            identity: identity.clone(),
            id_token: response.id_token,
            refresh_token: response.refresh_token,
        });
        Ok(identity)
    }

    async fn sign_in_with_password(
        &self,
        email: &Email,
        password: &str,
    ) -> Result<Identity, AuthError> {
        let response: SignInResponse = self
            .call(
                "signInWithPassword",
                json!({
                    "email": email.as_str(),
                    "password": password,
                    "returnSecureToken": true,
                }),
            )
            .await?;

        self.complete_sign_in(response).await
    }

    async fn send_sign_in_link(&self, email: &Email) -> Result<(), AuthError> {
        let mut continue_url = Url::parse(&self.config.continue_url)
            .map_err(|e| AuthError::Validation(format!("invalid continue URL: {e}")))?;
        continue_url
            .query_pairs_mut()
            .append_pair("email", email.as_str());

        let _: Value = self
            .call(
                "sendOobCode",
                json!({
                    "requestType": "EMAIL_SIGNIN",
                    "email": email.as_str(),
                    "continueUrl": continue_url.as_str(),
                }),
            )
            .await?;
        Ok(())
    }

    async fn sign_in_with_email_link(
        &self,
        email: &Email,
        link: &str,
    ) -> Result<Identity, AuthError> {
        let link = Url::parse(link)
            .map_err(|e| AuthError::Validation(format!("invalid sign-in link: {e}")))?;
        let oob_code = link
            .query_pairs()
            .find(|(key, _)| key == "oobCode")
            .map(|(_, value)| value.into_owned())
            .ok_or_else(|| AuthError::Validation("sign-in link has no oobCode".to_owned()))?;

        let response: SignInResponse = self
            .call(
                "signInWithEmailLink",
                json!({
                    "email": email.as_str(),
                    "oobCode": oob_code,
                }),
            )
            .await?;

        self.complete_sign_in(response).await
    }

    async fn sign_out(&self) {
        if let Ok(mut slot) = self.session.write() {
            *slot = None;
        }
        self.storage.remove(keys::SESSION);
        let _ = self.events.send(AuthChange::SignedOut);
    }

    async fn send_password_reset_email(&self, email: &Email) -> Result<(), AuthError> {
        let _: Value = self
            .call(
                "sendOobCode",
                json!({
                    "requestType": "PASSWORD_RESET",
                    "email": email.as_str(),
                }),
            )
            .await?;
        Ok(())
    }

    async fn send_verification_email(&self) -> Result<(), AuthError> {
        let id_token = self.current_id_token().ok_or(AuthError::NotSignedIn)?;
        let _: Value = self
            .call(
                "sendOobCode",
                json!({
                    "requestType": "VERIFY_EMAIL",
                    "idToken": id_token,
                }),
            )
            .await?;
        Ok(())
    }

    async fn reload(&self) -> Result<Identity, AuthError> {
        let id_token = self.current_id_token().ok_or(AuthError::NotSignedIn)?;
        let identity = self.lookup(&id_token).await?;

        if let Ok(mut slot) = self.session.write()
            && let Some(session) = slot.as_mut()
        {
            session.identity = identity.clone();
            if let Ok(serialized) = serde_json::to_string(session) {
                self.storage.set(keys::SESSION, &serialized);
            }
        }

        Ok(identity)
    }

    async fn restore(&self) -> Result<Option<Identity>, AuthError> {
        let Some(stored) = self.storage.get(keys::SESSION) else {
            return Ok(None);
        };
        let Ok(mut session) = serde_json::from_str::<ProviderSession>(&stored) else {
            // Unreadable session blob: drop it rather than error forever.
            self.storage.remove(keys::SESSION);
            return Ok(None);
        };

        match self.lookup(&session.id_token).await {
            Ok(identity) => {
                session.identity = identity.clone();
                if let Ok(serialized) = serde_json::to_string(&session) {
                    self.storage.set(keys::SESSION, &serialized);
                }
                if let Ok(mut slot) = self.session.write() {
                    *slot = Some(session);
                }
                Ok(Some(identity))
            }
            Err(err) if err.is_transient() => {
                // Offline start: trust the persisted identity for now.
                tracing::debug!(%err, "provider unreachable during restore; using persisted identity");
                let identity = session.identity.clone();
                if let Ok(mut slot) = self.session.write() {
                    *slot = Some(session);
                }
                Ok(Some(identity))
            }
            Err(err) => {
                // The provider no longer honors this session.
                tracing::debug!(%err, "persisted session rejected by provider; clearing");
                self.storage.remove(keys::SESSION);
                Ok(None)
            }
        }
    }

    async fn id_token(&self) -> Option<String> {
        self.current_id_token()
    }

    fn subscribe(&self) -> broadcast::Receiver<AuthChange> {
        self.events.subscribe()
    }
}
