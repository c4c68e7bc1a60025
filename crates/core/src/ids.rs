//! Canonical identifiers and sharded-path derivation.
//!
//! MERA stores every durable document under a directory derived from its
//! UUID. To keep path derivation deterministic, identifiers use a
//! *canonical* representation: **32 lowercase hexadecimal characters** (no
//! hyphens), the same value `Uuid::new_v4().simple().to_string()` yields.
//!
//! For a canonical id `u`, documents live under
//! `parent_dir/<u[0..2]>/<u[2..4]>/<u>/`. Two-level sharding keeps any
//! single directory's fan-out small enough that listing and backup stay
//! cheap as the record count grows.

use crate::{CoreError, CoreResult};
use std::fmt;
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// A UUID guaranteed to be handled in MERA's canonical 32-hex form.
///
/// Use this wrapper when accepting an identifier from outside the core (CLI
/// input, API path segment) or when deriving a sharded storage path.
/// [`ShardedUuid::parse`] rejects non-canonical spellings (uppercase,
/// hyphenated, wrong length) rather than normalising them.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ShardedUuid(Uuid);

impl Default for ShardedUuid {
    fn default() -> Self {
        Self::new()
    }
}

impl ShardedUuid {
    /// Generates a fresh v4 identifier.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Validates an externally supplied identifier in canonical form.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidInput`] unless `input` is exactly 32
    /// lowercase hex characters.
    pub fn parse(input: &str) -> CoreResult<Self> {
        if Self::is_canonical(input) {
            // is_canonical guarantees valid hex, so parse_str cannot fail
            let uuid = Uuid::parse_str(input).expect("is_canonical guarantees valid UUID");
            return Ok(Self(uuid));
        }
        Err(CoreError::InvalidInput(format!(
            "identifier must be 32 lowercase hex characters without hyphens, got: '{input}'"
        )))
    }

    /// Returns the underlying `uuid::Uuid`.
    pub fn uuid(&self) -> Uuid {
        self.0
    }

    /// True if `input` is in canonical form (purely syntactic check).
    pub fn is_canonical(input: &str) -> bool {
        input.len() == 32
            && input
                .bytes()
                .all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f'))
    }

    /// Returns `parent_dir/<s1>/<s2>/<uuid>/` for this identifier.
    pub fn sharded_dir(&self, parent_dir: &Path) -> PathBuf {
        let canonical = self.to_string();
        parent_dir
            .join(&canonical[0..2])
            .join(&canonical[2..4])
            .join(&canonical)
    }
}

impl From<Uuid> for ShardedUuid {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

impl fmt::Display for ShardedUuid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.simple())
    }
}
