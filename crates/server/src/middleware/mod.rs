//! HTTP middleware and extractors.

pub mod bearer;

pub use bearer::{OptionalSession, RequireSession};
