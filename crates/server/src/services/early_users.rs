//! Signup-number assignment for early users.
//!
//! The first registrants get a dense 1-based rank taken from an ordered
//! list of uids maintained by the team. Planning is pure and separated
//! from applying so the interesting part - idempotence and density - can
//! be tested without a database: given the current numbers, the planner
//! emits only the writes needed to make the store agree with the list.

use std::collections::{HashMap, HashSet};

use thiserror::Error;

use prysm_core::Uid;

/// Maximum early-user list size; signup numbers are 1..=200.
pub const EARLY_USER_LIMIT: usize = 200;

/// One pending write: give `uid` the number `number`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Assignment {
    /// The profile to update.
    pub uid: Uid,
    /// The 1-based rank to write.
    pub number: u32,
}

/// Errors from assignment planning.
#[derive(Debug, Error)]
pub enum SeedError {
    /// The ordered list is larger than the early-user cap.
    #[error("early-user list has {count} entries, limit is {EARLY_USER_LIMIT}")]
    TooMany {
        /// Entries in the list.
        count: usize,
    },

    /// The ordered list mentions a uid twice.
    #[error("duplicate uid in early-user list: {0}")]
    Duplicate(Uid),
}

/// Compute the writes needed to make signup numbers match `ordered`.
///
/// `current` maps uid to the number currently stored (or `None` when the
/// profile has no number yet); uids absent from the map are treated the
/// same as `None`. Entries already holding their correct rank produce no
/// write, so applying the plan and planning again yields an empty plan.
///
/// # Errors
///
/// Returns `SeedError::TooMany` when the list exceeds the cap and
/// `SeedError::Duplicate` when a uid appears twice.
pub fn plan(
    ordered: &[Uid],
    current: &HashMap<Uid, Option<u32>>,
) -> Result<Vec<Assignment>, SeedError> {
    if ordered.len() > EARLY_USER_LIMIT {
        return Err(SeedError::TooMany {
            count: ordered.len(),
        });
    }

    let mut seen = HashSet::new();
    let mut assignments = Vec::new();

    for (index, uid) in ordered.iter().enumerate() {
        if !seen.insert(uid) {
            return Err(SeedError::Duplicate(uid.clone()));
        }

        // index < 200, so this cannot saturate in practice
        let number = u32::try_from(index + 1).unwrap_or(u32::MAX);

        if current.get(uid).copied().flatten() != Some(number) {
            assignments.push(Assignment {
                uid: uid.clone(),
                number,
            });
        }
    }

    Ok(assignments)
}
