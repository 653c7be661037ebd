//! Early-user signup-number seeding.
//!
//! Reads the ordered early-user uid list (one uid per line, `#` comments
//! allowed), computes the minimal assignment plan against the current
//! store, and applies it through conditional updates. Safe to re-run: a
//! store that already matches the list produces zero writes.

use std::path::Path;

use tracing::{info, warn};

use prysm_core::Uid;
use prysm_server::db::{self, ProfileRepository};
use prysm_server::services::early_users;

/// Assign signup numbers from an ordered uid list file.
///
/// # Errors
///
/// Returns an error if the file is missing or malformed, the list
/// violates the early-user constraints, or database operations fail.
pub async fn early_users(
    file_path: &str,
    dry_run: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let database_url = super::database_url()?;

    let path = Path::new(file_path);
    if !path.exists() {
        return Err(format!("File not found: {file_path}").into());
    }

    info!(path = %file_path, "Loading early-user list");
    let content = tokio::fs::read_to_string(path).await?;
    let ordered = parse_list(&content)?;
    info!(count = ordered.len(), "Parsed early-user list");

    let pool = db::create_pool(&database_url).await?;
    info!("Connected to database");

    let repo = ProfileRepository::new(&pool);
    let current = repo.signup_numbers(&ordered).await?;

    for uid in ordered.iter().filter(|uid| !current.contains_key(*uid)) {
        warn!(%uid, "listed uid has no profile record; it will be skipped");
    }

    let assignments = early_users::plan(&ordered, &current)?;
    info!(writes = assignments.len(), "Assignment plan computed");

    if dry_run {
        for assignment in &assignments {
            info!(uid = %assignment.uid, number = assignment.number, "would assign");
        }
        return Ok(());
    }

    let mut written = 0_usize;
    let mut skipped = 0_usize;
    for assignment in &assignments {
        if repo
            .set_signup_number(&assignment.uid, assignment.number)
            .await?
        {
            written += 1;
        } else {
            skipped += 1;
        }
    }

    info!("Seeding complete!");
    info!("  Numbers written: {written}");
    info!("  Skipped (no record or already correct): {skipped}");
    Ok(())
}

/// Parse the uid list: one uid per line, blank lines and `#` comments
/// ignored, order preserved.
fn parse_list(content: &str) -> Result<Vec<Uid>, Box<dyn std::error::Error>> {
    let mut ordered = Vec::new();
    for (index, line) in content.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let uid = Uid::parse(line).map_err(|e| format!("line {}: {e}", index + 1))?;
        ordered.push(uid);
    }
    Ok(ordered)
}
