//! Database operations for the Prysm profile store.
//!
//! Profiles are stored as JSONB documents keyed by uid - the one table this
//! core needs. The store is treated as a document database: read by id,
//! merge by id, and the conditional batch update used by early-user
//! seeding. Migrations live in `crates/server/migrations/` and run via:
//!
//! ```bash
//! cargo run -p prysm-cli -- migrate
//! ```

pub mod profiles;

use std::time::Duration;

use secrecy::ExposeSecret;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use thiserror::Error;

pub use profiles::ProfileRepository;

/// Errors from repository operations.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// Underlying database failure.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Insert conflicted with an existing record.
    #[error("record already exists: {0}")]
    Conflict(String),

    /// The targeted record does not exist.
    #[error("record not found")]
    NotFound,

    /// A stored document could not be decoded.
    #[error("corrupt stored document: {0}")]
    DataCorruption(String),
}

/// Create a `PostgreSQL` connection pool with sensible defaults.
///
/// # Errors
///
/// Returns `sqlx::Error` if the connection cannot be established.
pub async fn create_pool(database_url: &secrecy::SecretString) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(10)
        .min_connections(2)
        .acquire_timeout(Duration::from_secs(10))
        .connect(database_url.expose_secret())
        .await
}
