//! Application state shared across handlers.

use std::sync::Arc;

use sqlx::PgPool;

use crate::config::ServerConfig;
use crate::services::{IdentityLookup, SessionTokens};

/// Application state shared across all handlers.
///
/// Cheaply cloneable via `Arc`; provides access to configuration, the
/// database pool, the session-token service, and the provider lookup
/// client.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: ServerConfig,
    pool: PgPool,
    tokens: SessionTokens,
    identity: IdentityLookup,
}

impl AppState {
    /// Create a new application state.
    #[must_use]
    pub fn new(config: ServerConfig, pool: PgPool) -> Self {
        let tokens = SessionTokens::new(&config.session_secret);
        let identity = IdentityLookup::new(&config.identity);

        Self {
            inner: Arc::new(AppStateInner {
                config,
                pool,
                tokens,
                identity,
            }),
        }
    }

    /// Get a reference to the server configuration.
    #[must_use]
    pub fn config(&self) -> &ServerConfig {
        &self.inner.config
    }

    /// Get a reference to the database connection pool.
    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.inner.pool
    }

    /// Get a reference to the session-token service.
    #[must_use]
    pub fn tokens(&self) -> &SessionTokens {
        &self.inner.tokens
    }

    /// Get a reference to the identity provider lookup client.
    #[must_use]
    pub fn identity(&self) -> &IdentityLookup {
        &self.inner.identity
    }
}
