//! In-memory implementation of [`OverrideStore`].
//!
//! [`InMemoryStore`] is a first-class backend for tests, editor sessions,
//! and anywhere persistence isn't needed. It stores rows in plain vectors
//! with identical semantics to the SQLite backend, including the network
//! snapshot being held as JSON so both backends round-trip it the same
//! way.

use std::collections::HashMap;

use tracing::debug;

use laneway_core::id::{HolderId, NodeId};
use laneway_core::network::{LaneEnd, RoadNetwork};
use laneway_core::overrides::{LaneOverrides, ModifiedConnection, OverrideHolder};

use crate::convert::{decompose, recompose, OverrideRows};
use crate::error::StorageError;
use crate::traits::OverrideStore;
use crate::types::{SaveId, SaveSummary};

/// Data stored for a single save in the in-memory backend.
#[derive(Debug, Clone)]
struct StoredSave {
    name: String,
    data_version: u32,
    network_json: Option<String>,
    /// Entry rows in insertion order.
    entries: Vec<(NodeId, ModifiedConnection)>,
    /// Holder rows in insertion order.
    holders: Vec<(HolderId, OverrideHolder)>,
}

impl StoredSave {
    fn new(name: &str) -> Self {
        StoredSave {
            name: name.to_string(),
            data_version: 0,
            network_json: None,
            entries: Vec::new(),
            holders: Vec::new(),
        }
    }
}

/// In-memory implementation of [`OverrideStore`].
#[derive(Debug, Default)]
pub struct InMemoryStore {
    saves: HashMap<SaveId, StoredSave>,
    next_save_id: i64,
}

impl InMemoryStore {
    /// Creates a new empty in-memory store.
    pub fn new() -> Self {
        InMemoryStore {
            saves: HashMap::new(),
            next_save_id: 1,
        }
    }

    fn get_stored(&self, id: SaveId) -> Result<&StoredSave, StorageError> {
        self.saves.get(&id).ok_or(StorageError::SaveNotFound(id.0))
    }

    fn get_stored_mut(&mut self, id: SaveId) -> Result<&mut StoredSave, StorageError> {
        self.saves
            .get_mut(&id)
            .ok_or(StorageError::SaveNotFound(id.0))
    }
}

impl OverrideStore for InMemoryStore {
    // -------------------------------------------------------------------
    // Save-level operations
    // -------------------------------------------------------------------

    fn create_save(&mut self, name: &str) -> Result<SaveId, StorageError> {
        let id = SaveId(self.next_save_id);
        self.next_save_id += 1;
        self.saves.insert(id, StoredSave::new(name));
        Ok(id)
    }

    fn delete_save(&mut self, id: SaveId) -> Result<(), StorageError> {
        self.saves
            .remove(&id)
            .ok_or(StorageError::SaveNotFound(id.0))?;
        Ok(())
    }

    fn list_saves(&self) -> Result<Vec<SaveSummary>, StorageError> {
        let mut summaries: Vec<SaveSummary> = self
            .saves
            .iter()
            .map(|(&id, stored)| SaveSummary {
                id,
                name: stored.name.clone(),
                data_version: stored.data_version,
            })
            .collect();
        summaries.sort_by_key(|s| s.id.0);
        Ok(summaries)
    }

    fn data_version(&self, id: SaveId) -> Result<u32, StorageError> {
        Ok(self.get_stored(id)?.data_version)
    }

    // -------------------------------------------------------------------
    // High-level convenience methods
    // -------------------------------------------------------------------

    fn save_overrides(
        &mut self,
        id: SaveId,
        overrides: &LaneOverrides,
        data_version: u32,
    ) -> Result<(), StorageError> {
        let stored = self.get_stored_mut(id)?;
        let rows = decompose(overrides);
        debug!(
            save = id.0,
            data_version,
            entries = rows.entries.len(),
            holders = rows.holders.len(),
            "saving overrides"
        );
        stored.entries = rows.entries;
        stored.holders = rows.holders;
        stored.data_version = data_version;
        Ok(())
    }

    fn load_overrides(&self, id: SaveId) -> Result<(LaneOverrides, u32), StorageError> {
        let stored = self.get_stored(id)?;
        let rows = OverrideRows {
            entries: stored.entries.clone(),
            holders: stored.holders.clone(),
        };
        debug!(
            save = id.0,
            data_version = stored.data_version,
            entries = rows.entries.len(),
            holders = rows.holders.len(),
            "loading overrides"
        );
        Ok((recompose(rows), stored.data_version))
    }

    fn save_network(&mut self, id: SaveId, net: &RoadNetwork) -> Result<(), StorageError> {
        let json = serde_json::to_string(net)?;
        self.get_stored_mut(id)?.network_json = Some(json);
        Ok(())
    }

    fn load_network(&self, id: SaveId) -> Result<RoadNetwork, StorageError> {
        let stored = self.get_stored(id)?;
        let json = stored
            .network_json
            .as_ref()
            .ok_or(StorageError::NetworkNotFound(id.0))?;
        Ok(serde_json::from_str(json)?)
    }

    // -------------------------------------------------------------------
    // Entry CRUD
    // -------------------------------------------------------------------

    fn insert_entry(
        &mut self,
        save: SaveId,
        node: NodeId,
        entry: &ModifiedConnection,
    ) -> Result<(), StorageError> {
        let stored = self.get_stored_mut(save)?;
        stored.entries.push((node, *entry));
        Ok(())
    }

    fn delete_entry(
        &mut self,
        save: SaveId,
        node: NodeId,
        end: LaneEnd,
    ) -> Result<(), StorageError> {
        let stored = self.get_stored_mut(save)?;
        let pos = stored
            .entries
            .iter()
            .position(|(n, m)| *n == node && m.lane_end() == end)
            .ok_or(StorageError::EntryNotFound {
                save: save.0,
                node: node.0,
                edge: end.edge.0,
                lane_index: end.lane_index,
            })?;
        stored.entries.remove(pos);
        Ok(())
    }

    fn find_entries(
        &self,
        save: SaveId,
        node: NodeId,
    ) -> Result<Vec<ModifiedConnection>, StorageError> {
        let stored = self.get_stored(save)?;
        Ok(stored
            .entries
            .iter()
            .filter(|(n, _)| *n == node)
            .map(|(_, m)| *m)
            .collect())
    }

    fn list_nodes(&self, save: SaveId) -> Result<Vec<NodeId>, StorageError> {
        let stored = self.get_stored(save)?;
        let mut nodes: Vec<NodeId> = Vec::new();
        for (node, _) in &stored.entries {
            if !nodes.contains(node) {
                nodes.push(*node);
            }
        }
        Ok(nodes)
    }

    // -------------------------------------------------------------------
    // Holder CRUD
    // -------------------------------------------------------------------

    fn insert_holder(
        &mut self,
        save: SaveId,
        holder_id: HolderId,
        holder: &OverrideHolder,
    ) -> Result<(), StorageError> {
        let stored = self.get_stored_mut(save)?;
        stored.holders.push((holder_id, holder.clone()));
        Ok(())
    }

    fn get_holder(&self, save: SaveId, holder_id: HolderId) -> Result<OverrideHolder, StorageError> {
        let stored = self.get_stored(save)?;
        stored
            .holders
            .iter()
            .find(|(id, _)| *id == holder_id)
            .map(|(_, h)| h.clone())
            .ok_or(StorageError::HolderNotFound {
                save: save.0,
                holder: holder_id.0,
            })
    }

    fn update_holder(
        &mut self,
        save: SaveId,
        holder_id: HolderId,
        holder: &OverrideHolder,
    ) -> Result<(), StorageError> {
        let stored = self.get_stored_mut(save)?;
        let slot = stored
            .holders
            .iter_mut()
            .find(|(id, _)| *id == holder_id)
            .ok_or(StorageError::HolderNotFound {
                save: save.0,
                holder: holder_id.0,
            })?;
        slot.1 = holder.clone();
        Ok(())
    }

    fn delete_holder(&mut self, save: SaveId, holder_id: HolderId) -> Result<(), StorageError> {
        let stored = self.get_stored_mut(save)?;
        let pos = stored
            .holders
            .iter()
            .position(|(id, _)| *id == holder_id)
            .ok_or(StorageError::HolderNotFound {
                save: save.0,
                holder: holder_id.0,
            })?;
        stored.holders.remove(pos);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use laneway_core::id::EdgeId;
    use laneway_core::overrides::{GeneratedConnection, LaneDescriptor};
    use laneway_core::PathMethod;

    fn seeded_overrides() -> LaneOverrides {
        let mut overrides = LaneOverrides::new();
        let h = overrides.ensure_entry(NodeId(1), LaneEnd::new(EdgeId(2), 0));
        overrides
            .holder_mut(h)
            .unwrap()
            .connections
            .push(GeneratedConnection {
                source_edge: EdgeId(2),
                target_edge: EdgeId(3),
                lane_indexes: (0, 1),
                method: PathMethod::ROAD,
                is_unsafe: false,
                descriptor: LaneDescriptor::INVALID,
            });
        overrides
    }

    #[test]
    fn test_create_and_load_save() {
        let mut store = InMemoryStore::new();
        let overrides = seeded_overrides();

        let id = store.create_save("city").unwrap();
        store.save_overrides(id, &overrides, 2).unwrap();

        let (loaded, version) = store.load_overrides(id).unwrap();
        assert_eq!(version, 2);
        assert_eq!(loaded, overrides);
    }

    #[test]
    fn test_fresh_save_has_version_zero() {
        let mut store = InMemoryStore::new();
        let id = store.create_save("empty").unwrap();
        assert_eq!(store.data_version(id).unwrap(), 0);
        let (loaded, version) = store.load_overrides(id).unwrap();
        assert!(loaded.is_empty());
        assert_eq!(version, 0);
    }

    #[test]
    fn test_list_saves() {
        let mut store = InMemoryStore::new();
        store.create_save("alpha").unwrap();
        let beta = store.create_save("beta").unwrap();
        store.save_overrides(beta, &seeded_overrides(), 2).unwrap();

        let list = store.list_saves().unwrap();
        assert_eq!(list.len(), 2);
        assert_eq!(list[0].name, "alpha");
        assert_eq!(list[0].data_version, 0);
        assert_eq!(list[1].name, "beta");
        assert_eq!(list[1].data_version, 2);
    }

    #[test]
    fn test_delete_save() {
        let mut store = InMemoryStore::new();
        let id = store.create_save("doomed").unwrap();
        store.delete_save(id).unwrap();
        match store.load_overrides(id) {
            Err(StorageError::SaveNotFound(sid)) => assert_eq!(sid, id.0),
            other => panic!("expected SaveNotFound, got: {:?}", other),
        }
    }

    #[test]
    fn test_entry_crud() {
        let mut store = InMemoryStore::new();
        let id = store.create_save("crud").unwrap();
        let entry = ModifiedConnection {
            edge: EdgeId(4),
            lane_index: 1,
            holder: HolderId(0),
        };

        store.insert_entry(id, NodeId(9), &entry).unwrap();
        assert_eq!(store.find_entries(id, NodeId(9)).unwrap(), vec![entry]);
        assert_eq!(store.list_nodes(id).unwrap(), vec![NodeId(9)]);

        store
            .delete_entry(id, NodeId(9), LaneEnd::new(EdgeId(4), 1))
            .unwrap();
        assert!(store.find_entries(id, NodeId(9)).unwrap().is_empty());
        assert!(store
            .delete_entry(id, NodeId(9), LaneEnd::new(EdgeId(4), 1))
            .is_err());
    }

    #[test]
    fn test_holder_crud() {
        let mut store = InMemoryStore::new();
        let id = store.create_save("crud").unwrap();
        let holder = OverrideHolder::owned_by(NodeId(3));

        store.insert_holder(id, HolderId(5), &holder).unwrap();
        assert_eq!(store.get_holder(id, HolderId(5)).unwrap(), holder);

        let mut updated = holder.clone();
        updated.owner = None;
        store.update_holder(id, HolderId(5), &updated).unwrap();
        assert_eq!(store.get_holder(id, HolderId(5)).unwrap().owner, None);

        store.delete_holder(id, HolderId(5)).unwrap();
        assert!(store.get_holder(id, HolderId(5)).is_err());
        assert!(store.update_holder(id, HolderId(5), &holder).is_err());
    }

    #[test]
    fn test_network_snapshot_roundtrip() {
        let mut store = InMemoryStore::new();
        let id = store.create_save("net").unwrap();
        match store.load_network(id) {
            Err(StorageError::NetworkNotFound(sid)) => assert_eq!(sid, id.0),
            other => panic!("expected NetworkNotFound, got: {:?}", other),
        }

        let net = RoadNetwork::new();
        store.save_network(id, &net).unwrap();
        let loaded = store.load_network(id).unwrap();
        assert_eq!(loaded.node_count(), 0);
    }
}
