//! Profile store access for the client.
//!
//! The SDK needs three operations against the profile store: read by id,
//! create, and merge by id. [`RestProfileStore`] implements them against
//! the Prysm backend, authorizing with a session credential it exchanges
//! lazily from the provider's ID token; tests use scripted in-memory
//! sources instead.

use std::future::Future;
use std::sync::{Arc, RwLock};

use serde::Deserialize;
use serde_json::{Value, json};

use prysm_core::{ProfileRecord, Uid};

use crate::error::AuthError;
use crate::provider::IdentityProvider;

/// The profile-store operations the SDK depends on.
pub trait ProfileSource: Send + Sync + 'static {
    /// Read the record for `uid`, if any.
    fn get(
        &self,
        uid: &Uid,
    ) -> impl Future<Output = Result<Option<ProfileRecord>, AuthError>> + Send;

    /// Create the record, merging fields into an existing one on conflict.
    fn create(&self, record: &ProfileRecord) -> impl Future<Output = Result<(), AuthError>> + Send;

    /// Shallow-merge `patch` into the record and return the result.
    fn merge(
        &self,
        uid: &Uid,
        patch: &Value,
    ) -> impl Future<Output = Result<ProfileRecord, AuthError>> + Send;
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SessionExchangeResponse {
    token: String,
}

/// Profile store backed by the Prysm backend API.
///
/// The backend scopes every call to the presented session credential, so
/// the uid argument never goes over the wire - the credential is the
/// authority on whose profile is being touched.
pub struct RestProfileStore<P> {
    http: reqwest::Client,
    api_base: String,
    provider: Arc<P>,
    bearer: RwLock<Option<String>>,
}

impl<P: IdentityProvider> RestProfileStore<P> {
    /// Create a store client for the backend at `api_base`.
    #[must_use]
    pub fn new(api_base: impl Into<String>, provider: Arc<P>) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_base: api_base.into().trim_end_matches('/').to_owned(),
            provider,
            bearer: RwLock::new(None),
        }
    }

    /// The cached session credential, or a fresh one exchanged from the
    /// provider's ID token.
    async fn ensure_bearer(&self) -> Result<String, AuthError> {
        if let Some(token) = self.bearer.read().ok().and_then(|slot| slot.clone()) {
            return Ok(token);
        }

        let id_token = self
            .provider
            .id_token()
            .await
            .ok_or(AuthError::NotSignedIn)?;

        let response = self
            .http
            .post(format!("{}/api/session", self.api_base))
            .json(&json!({ "idToken": id_token }))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(AuthError::provider(format!(
                "SESSION_EXCHANGE_FAILED {}",
                response.status()
            )));
        }

        let body: SessionExchangeResponse = response
            .json()
            .await
            .map_err(|e| AuthError::provider(format!("UNUSABLE_RESPONSE {e}")))?;

        if let Ok(mut slot) = self.bearer.write() {
            *slot = Some(body.token.clone());
        }
        Ok(body.token)
    }

    /// Send an authorized request, re-exchanging the credential once when
    /// the backend reports it expired.
    async fn send(
        &self,
        build: impl Fn(&str) -> reqwest::RequestBuilder,
    ) -> Result<reqwest::Response, AuthError> {
        let token = self.ensure_bearer().await?;
        let response = build(&token).send().await?;

        if response.status() == reqwest::StatusCode::UNAUTHORIZED {
            if let Ok(mut slot) = self.bearer.write() {
                *slot = None;
            }
            let token = self.ensure_bearer().await?;
            return Ok(build(&token).send().await?);
        }

        Ok(response)
    }
}

impl<P: IdentityProvider> ProfileSource for RestProfileStore<P> {
    async fn get(&self, _uid: &Uid) -> Result<Option<ProfileRecord>, AuthError> {
        let response = self
            .send(|token| {
                self.http
                    .get(format!("{}/api/profile", self.api_base))
                    .bearer_auth(token)
            })
            .await?;

        match response.status() {
            reqwest::StatusCode::NOT_FOUND => Ok(None),
            status if status.is_success() => Ok(Some(
                response
                    .json()
                    .await
                    .map_err(|e| AuthError::provider(format!("UNUSABLE_RESPONSE {e}")))?,
            )),
            status => Err(AuthError::provider(format!("PROFILE_READ_FAILED {status}"))),
        }
    }

    async fn create(&self, record: &ProfileRecord) -> Result<(), AuthError> {
        let body = serde_json::to_value(record)
            .map_err(|e| AuthError::Validation(format!("unencodable profile: {e}")))?;

        let response = self
            .send(|token| {
                self.http
                    .post(format!("{}/api/profile", self.api_base))
                    .bearer_auth(token)
                    .json(&body)
            })
            .await?;

        match response.status() {
            status if status.is_success() => Ok(()),
            reqwest::StatusCode::CONFLICT => {
                // Someone (the repair path, another tab) got there first;
                // land our fields on the existing record instead.
                let mut patch = body;
                if let Some(map) = patch.as_object_mut() {
                    map.remove("uid");
                    map.remove("createdAt");
                }
                self.merge(&record.uid, &patch).await?;
                Ok(())
            }
            status => Err(AuthError::provider(format!(
                "PROFILE_CREATE_FAILED {status}"
            ))),
        }
    }

    async fn merge(&self, _uid: &Uid, patch: &Value) -> Result<ProfileRecord, AuthError> {
        let response = self
            .send(|token| {
                self.http
                    .patch(format!("{}/api/profile", self.api_base))
                    .bearer_auth(token)
                    .json(patch)
            })
            .await?;

        if !response.status().is_success() {
            return Err(AuthError::provider(format!(
                "PROFILE_UPDATE_FAILED {}",
                response.status()
            )));
        }

        response
            .json()
            .await
            .map_err(|e| AuthError::provider(format!("UNUSABLE_RESPONSE {e}")))
    }
}
