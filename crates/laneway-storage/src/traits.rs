//! The [`OverrideStore`] trait defining the storage contract for lane
//! overrides.
//!
//! Two-layer API design:
//! - **Low-level CRUD** methods form the trait foundation. Each call writes
//!   exactly one row, serving as the incremental save mechanism.
//! - **High-level convenience** methods (`save_overrides`, `load_overrides`,
//!   `save_network`) provide bulk operations built on the CRUD primitives.
//!
//! All backends (InMemoryStore, SqliteStore) implement this trait, ensuring
//! they are fully swappable without changing engine logic.

use laneway_core::id::{HolderId, NodeId};
use laneway_core::network::{LaneEnd, RoadNetwork};
use laneway_core::overrides::{LaneOverrides, ModifiedConnection, OverrideHolder};

use crate::error::StorageError;
use crate::types::{SaveId, SaveSummary};

/// The storage contract for lane-connection overrides.
///
/// Implementations persist the override container plus its data version
/// and an optional snapshot of the road network the overrides were written
/// against. The trait is synchronous (not async) for simplicity in the
/// current single-threaded design.
pub trait OverrideStore {
    // -------------------------------------------------------------------
    // Save-level operations
    // -------------------------------------------------------------------

    /// Creates a new empty save with the given name.
    ///
    /// Returns the newly allocated [`SaveId`]. A fresh save carries data
    /// version 0 until `save_overrides` stamps it.
    fn create_save(&mut self, name: &str) -> Result<SaveId, StorageError>;

    /// Deletes a save and all its associated rows.
    fn delete_save(&mut self, id: SaveId) -> Result<(), StorageError>;

    /// Lists all stored saves.
    fn list_saves(&self) -> Result<Vec<SaveSummary>, StorageError>;

    /// The data version a save was written with.
    fn data_version(&self, id: SaveId) -> Result<u32, StorageError>;

    // -------------------------------------------------------------------
    // High-level convenience methods
    // -------------------------------------------------------------------

    /// Bulk save/overwrite of a save's entire override container, stamping
    /// the given data version.
    ///
    /// Overrides are stored row for row, including states the checked
    /// container API would not produce (dangling holder references, owners
    /// pointing elsewhere); the load pipeline owns judging those.
    fn save_overrides(
        &mut self,
        id: SaveId,
        overrides: &LaneOverrides,
        data_version: u32,
    ) -> Result<(), StorageError>;

    /// Loads a save's override container and its data version.
    ///
    /// Recomposition is lossless: broken stored states come back exactly
    /// as stored so the load pipeline can audit them.
    fn load_overrides(&self, id: SaveId) -> Result<(LaneOverrides, u32), StorageError>;

    /// Stores a snapshot of the road network alongside the overrides.
    ///
    /// The host simulation owns network persistence; this snapshot exists
    /// so the load pipeline can run standalone against a save.
    fn save_network(&mut self, id: SaveId, net: &RoadNetwork) -> Result<(), StorageError>;

    /// Loads the save's network snapshot, if one was stored.
    fn load_network(&self, id: SaveId) -> Result<RoadNetwork, StorageError>;

    // -------------------------------------------------------------------
    // Entry CRUD (incremental save)
    // -------------------------------------------------------------------

    /// Inserts one override entry into a node's buffer.
    fn insert_entry(
        &mut self,
        save: SaveId,
        node: NodeId,
        entry: &ModifiedConnection,
    ) -> Result<(), StorageError>;

    /// Deletes the entry for one lane end of a node.
    fn delete_entry(
        &mut self,
        save: SaveId,
        node: NodeId,
        end: LaneEnd,
    ) -> Result<(), StorageError>;

    /// All entries of a node's buffer, in insertion order.
    fn find_entries(
        &self,
        save: SaveId,
        node: NodeId,
    ) -> Result<Vec<ModifiedConnection>, StorageError>;

    /// All nodes that own at least one entry.
    fn list_nodes(&self, save: SaveId) -> Result<Vec<NodeId>, StorageError>;

    // -------------------------------------------------------------------
    // Holder CRUD
    // -------------------------------------------------------------------

    /// Inserts a holder under an explicit id.
    fn insert_holder(
        &mut self,
        save: SaveId,
        holder_id: HolderId,
        holder: &OverrideHolder,
    ) -> Result<(), StorageError>;

    /// Retrieves a holder by id.
    fn get_holder(&self, save: SaveId, holder_id: HolderId) -> Result<OverrideHolder, StorageError>;

    /// Updates an existing holder.
    fn update_holder(
        &mut self,
        save: SaveId,
        holder_id: HolderId,
        holder: &OverrideHolder,
    ) -> Result<(), StorageError>;

    /// Deletes a holder.
    fn delete_holder(&mut self, save: SaveId, holder_id: HolderId) -> Result<(), StorageError>;
}
