//! Study identifiers, sharded paths and the version clock.
//!
//! Study definitions are stored under sharded directories derived from their uid.
//!
//! To keep path derivation deterministic, study uids use a *canonical* representation:
//! **32 lowercase hexadecimal characters** (no hyphens).
//!
//! This crate provides:
//! - [`StudyUuid`], a wrapper that *guarantees* the canonical format once constructed.
//! - Sharding logic deriving a study directory from its uid.
//! - [`VersionClock`], the monotonic timestamp source used when stamping version metadata.
//!
//! ## Canonical uid form
//! - Length: 32
//! - Characters: `0-9` and `a-f` only
//! - Example: `550e8400e29b41d4a716446655440000`
//!
//! Externally supplied identifiers (CLI arguments, stored records) must already be canonical.
//! Use [`StudyUuid::parse`] to validate an input string.
//!
//! ## Sharded directory layout
//! For a canonical uid `u`, a study is stored under:
//! `parent_dir/<u[0..2]>/<u[2..4]>/<u>/`
//!
//! Example:
//! `study_data/studies/55/0e/550e8400e29b41d4a716446655440000/`

mod service;

pub use service::{StudyUuid, Uuid, VersionClock};

/// Error type for uid operations.
#[derive(Debug, thiserror::Error)]
pub enum UuidError {
    /// Invalid input provided
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

/// Result type for uid operations.
pub type UuidResult<T> = Result<T, UuidError>;
