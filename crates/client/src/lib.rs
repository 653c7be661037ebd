//! Prysm client SDK.
//!
//! This crate is what an interactive Prysm shell embeds: the session
//! bootstrapper that owns the process-wide auth snapshot, the reactive
//! route guard that gates protected pages, and the clients for the
//! identity provider and the profile store.
//!
//! # Wiring
//!
//! ```rust,ignore
//! let storage = Arc::new(MemoryStorage::new());
//! let provider = Arc::new(RestIdentityProvider::new(provider_config, storage.clone()));
//! let profiles = Arc::new(RestProfileStore::new(server_base, provider.clone()));
//! let auth = Arc::new(AuthContext::new(provider, profiles, storage));
//!
//! tokio::spawn({
//!     let auth = auth.clone();
//!     async move { auth.run().await }
//! });
//!
//! let mut guard = RouteGuard::new(auth.subscribe(), GuardPolicy::default());
//! match guard.resolve(current_path).await {
//!     GuardDecision::Allow => render(),
//!     decision => navigate(decision.target(guard.policy()).unwrap_or("/login")),
//! }
//! ```

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod error;
pub mod guard;
pub mod profiles;
pub mod provider;
pub mod session;
pub mod storage;

pub use error::{AuthError, ProviderErrorCode};
pub use guard::RouteGuard;
pub use profiles::{ProfileSource, RestProfileStore};
pub use provider::{AuthChange, IdentityProvider, RestIdentityProvider, RestProviderConfig};
pub use session::{AuthContext, NewProfile};
pub use storage::{MemoryStorage, Storage};

// The shared domain types, re-exported for embedders.
pub use prysm_core::{
    AuthSnapshot, CompletenessPolicy, Email, GuardDecision, GuardPolicy, Identity, ProfileRecord,
    Uid,
};
