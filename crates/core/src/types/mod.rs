//! Domain types shared across Prysm crates.

mod email;
mod identity;
mod profile;
mod uid;

pub use email::{Email, EmailError};
pub use identity::Identity;
pub use profile::{
    AcademicInfo, CompletenessPolicy, NotificationSettings, ProfileField, ProfileRecord, Theme,
};
pub use uid::{Uid, UidError};
