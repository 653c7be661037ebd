//! Database migration command.
//!
//! # Usage
//!
//! ```bash
//! prysm-cli migrate
//! ```
//!
//! # Environment Variables
//!
//! - `PRYSM_DATABASE_URL` - `PostgreSQL` connection string
//!   (falls back to `DATABASE_URL`)

use tracing::info;

use prysm_server::db;

/// Run the server database migrations.
///
/// # Errors
///
/// Returns an error if the database URL is missing, the connection
/// fails, or a migration fails to apply.
pub async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let database_url = super::database_url()?;

    info!("Connecting to database...");
    let pool = db::create_pool(&database_url).await?;

    info!("Running migrations...");
    sqlx::migrate!("../server/migrations").run(&pool).await?;

    info!("Migrations complete!");
    Ok(())
}
