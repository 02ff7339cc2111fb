//! Storage-layer types for save identity and metadata.
//!
//! [`SaveId`] is defined here (not in laneway-core) because save identity
//! is a storage concern -- override data only gains a save ID when
//! persisted.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Unique identifier for a stored save.
///
/// The inner `i64` aligns with SQLite's `INTEGER PRIMARY KEY`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SaveId(pub i64);

impl fmt::Display for SaveId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SaveId({})", self.0)
    }
}

/// Summary of a stored save (for listing).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SaveSummary {
    /// Save identifier.
    pub id: SaveId,
    /// Save name.
    pub name: String,
    /// Override data version the save was written with. Gates which
    /// migration passes run on load.
    pub data_version: u32,
}
