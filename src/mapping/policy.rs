use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::core::error::{Result, SoftDeleteError};

/// What happens to entities still referencing a record once it is
/// soft-deleted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DeletionPolicy {
    /// The referencing property is set to null; peers stay alive.
    Nullify,
    /// Referencing entities are soft-deleted in turn, recursively.
    Cascade,
    /// Many-to-many join records are removed; both sides stay alive.
    DetachAssociationOnly,
}

impl DeletionPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Nullify => "NULLIFY",
            Self::Cascade => "CASCADE",
            Self::DetachAssociationOnly => "DETACH_ASSOCIATION_ONLY",
        }
    }
}

impl fmt::Display for DeletionPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DeletionPolicy {
    type Err = SoftDeleteError;

    /// Accepts the canonical spellings plus the `SET_NULL`/`DETACH` aliases
    /// found in older schema declarations.
    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "NULLIFY" | "SET_NULL" => Ok(Self::Nullify),
            "CASCADE" => Ok(Self::Cascade),
            "DETACH_ASSOCIATION_ONLY" | "DETACH" => Ok(Self::DetachAssociationOnly),
            other => Err(SoftDeleteError::UnknownDeletionPolicy(other.to_string())),
        }
    }
}
