//! SQLite implementation of [`OverrideStore`].
//!
//! [`SqliteStore`] persists lane overrides in a SQLite database with WAL
//! mode, atomic transactions on bulk writes, and automatic schema
//! migrations. The holder connection list is stored as a JSON TEXT column
//! via serde_json; entry rows are flat columns so the per-node buffers can
//! be queried without deserializing anything.

use rusqlite::{params, Connection, OptionalExtension};
use tracing::debug;

use laneway_core::id::{EdgeId, HolderId, NodeId};
use laneway_core::network::{LaneEnd, RoadNetwork};
use laneway_core::overrides::{
    GeneratedConnection, LaneOverrides, ModifiedConnection, OverrideHolder,
};

use crate::convert::{decompose, recompose, OverrideRows};
use crate::error::StorageError;
use crate::traits::OverrideStore;
use crate::types::{SaveId, SaveSummary};

/// SQLite-backed implementation of [`OverrideStore`].
///
/// Bulk writes are wrapped in a transaction for atomicity. The database
/// uses WAL mode for performance and foreign keys for integrity.
pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    /// Opens (or creates) a SQLite database at `path`.
    pub fn new(path: &str) -> Result<Self, StorageError> {
        let conn = crate::schema::open_database(path)?;
        Ok(SqliteStore { conn })
    }

    /// Opens an in-memory SQLite database (for testing).
    pub fn in_memory() -> Result<Self, StorageError> {
        let conn = crate::schema::open_in_memory()?;
        Ok(SqliteStore { conn })
    }

    // -----------------------------------------------------------------------
    // Internal helpers
    // -----------------------------------------------------------------------

    /// Verifies a save exists, returning an error if not.
    fn assert_save_exists(&self, id: SaveId) -> Result<(), StorageError> {
        let exists: bool = self.conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM saves WHERE id = ?1)",
            params![id.0],
            |row| row.get(0),
        )?;
        if !exists {
            return Err(StorageError::SaveNotFound(id.0));
        }
        Ok(())
    }

    /// Loads all rows of a save.
    fn load_rows(&self, save_id: i64) -> Result<OverrideRows, StorageError> {
        let entries: Vec<(NodeId, ModifiedConnection)> = {
            let mut stmt = self.conn.prepare_cached(
                "SELECT node_id, edge_id, lane_index, holder_id FROM entries \
                 WHERE save_id = ?1 ORDER BY rowid",
            )?;
            let rows = stmt.query_map(params![save_id], |row| {
                let node_id: u32 = row.get(0)?;
                let edge_id: u32 = row.get(1)?;
                let lane_index: u32 = row.get(2)?;
                let holder_id: u32 = row.get(3)?;
                Ok((
                    NodeId(node_id),
                    ModifiedConnection {
                        edge: EdgeId(edge_id),
                        lane_index,
                        holder: HolderId(holder_id),
                    },
                ))
            })?;
            rows.collect::<Result<_, _>>()?
        };

        let holders: Vec<(HolderId, OverrideHolder)> = {
            let mut stmt = self.conn.prepare_cached(
                "SELECT holder_id, owner_node_id, tagged, connections_json FROM holders \
                 WHERE save_id = ?1 ORDER BY rowid",
            )?;
            let rows = stmt.query_map(params![save_id], |row| {
                let holder_id: u32 = row.get(0)?;
                let owner: Option<u32> = row.get(1)?;
                let tagged: i32 = row.get(2)?;
                let connections_json: String = row.get(3)?;
                Ok((holder_id, owner, tagged, connections_json))
            })?;
            let mut result = Vec::new();
            for row in rows {
                let (holder_id, owner, tagged, connections_json) = row?;
                let connections: Vec<GeneratedConnection> =
                    serde_json::from_str(&connections_json)?;
                result.push((
                    HolderId(holder_id),
                    OverrideHolder {
                        owner: owner.map(NodeId),
                        tagged: tagged != 0,
                        connections,
                    },
                ));
            }
            result
        };

        Ok(OverrideRows { entries, holders })
    }

    fn insert_entry_row(
        tx: &Connection,
        save_id: i64,
        node: NodeId,
        entry: &ModifiedConnection,
    ) -> Result<(), StorageError> {
        let mut stmt = tx.prepare_cached(
            "INSERT INTO entries (save_id, node_id, edge_id, lane_index, holder_id) \
             VALUES (?1, ?2, ?3, ?4, ?5)",
        )?;
        stmt.execute(params![
            save_id,
            node.0,
            entry.edge.0,
            entry.lane_index,
            entry.holder.0,
        ])?;
        Ok(())
    }

    fn insert_holder_row(
        tx: &Connection,
        save_id: i64,
        holder_id: HolderId,
        holder: &OverrideHolder,
    ) -> Result<(), StorageError> {
        let connections_json = serde_json::to_string(&holder.connections)?;
        let owner: Option<u32> = holder.owner.map(|n| n.0);
        let mut stmt = tx.prepare_cached(
            "INSERT INTO holders (save_id, holder_id, owner_node_id, tagged, connections_json) \
             VALUES (?1, ?2, ?3, ?4, ?5)",
        )?;
        stmt.execute(params![
            save_id,
            holder_id.0,
            owner,
            holder.tagged as i32,
            connections_json,
        ])?;
        Ok(())
    }
}

impl OverrideStore for SqliteStore {
    // -------------------------------------------------------------------
    // Save-level operations
    // -------------------------------------------------------------------

    fn create_save(&mut self, name: &str) -> Result<SaveId, StorageError> {
        self.conn
            .execute("INSERT INTO saves (name) VALUES (?1)", params![name])?;
        Ok(SaveId(self.conn.last_insert_rowid()))
    }

    fn delete_save(&mut self, id: SaveId) -> Result<(), StorageError> {
        // CASCADE drops entry and holder rows.
        let deleted = self
            .conn
            .execute("DELETE FROM saves WHERE id = ?1", params![id.0])?;
        if deleted == 0 {
            return Err(StorageError::SaveNotFound(id.0));
        }
        Ok(())
    }

    fn list_saves(&self) -> Result<Vec<SaveSummary>, StorageError> {
        let mut stmt = self
            .conn
            .prepare_cached("SELECT id, name, data_version FROM saves ORDER BY id")?;
        let rows = stmt.query_map([], |row| {
            let id: i64 = row.get(0)?;
            let name: String = row.get(1)?;
            let data_version: u32 = row.get(2)?;
            Ok(SaveSummary {
                id: SaveId(id),
                name,
                data_version,
            })
        })?;
        Ok(rows.collect::<Result<_, _>>()?)
    }

    fn data_version(&self, id: SaveId) -> Result<u32, StorageError> {
        self.conn
            .query_row(
                "SELECT data_version FROM saves WHERE id = ?1",
                params![id.0],
                |row| row.get(0),
            )
            .optional()?
            .ok_or(StorageError::SaveNotFound(id.0))
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
        self.assert_save_exists(id)?;
        let rows = decompose(overrides);
        debug!(
            save = id.0,
            data_version,
            entries = rows.entries.len(),
            holders = rows.holders.len(),
            "saving overrides"
        );

        let tx = self.conn.transaction()?;
        tx.execute("DELETE FROM entries WHERE save_id = ?1", params![id.0])?;
        tx.execute("DELETE FROM holders WHERE save_id = ?1", params![id.0])?;
        for (node, entry) in &rows.entries {
            Self::insert_entry_row(&tx, id.0, *node, entry)?;
        }
        for (holder_id, holder) in &rows.holders {
            Self::insert_holder_row(&tx, id.0, *holder_id, holder)?;
        }
        tx.execute(
            "UPDATE saves SET data_version = ?2 WHERE id = ?1",
            params![id.0, data_version],
        )?;
        tx.commit()?;
        Ok(())
    }

    fn load_overrides(&self, id: SaveId) -> Result<(LaneOverrides, u32), StorageError> {
        let data_version = self.data_version(id)?;
        let rows = self.load_rows(id.0)?;
        debug!(
            save = id.0,
            data_version,
            entries = rows.entries.len(),
            holders = rows.holders.len(),
            "loading overrides"
        );
        Ok((recompose(rows), data_version))
    }

    fn save_network(&mut self, id: SaveId, net: &RoadNetwork) -> Result<(), StorageError> {
        let json = serde_json::to_string(net)?;
        let updated = self.conn.execute(
            "UPDATE saves SET network_json = ?2 WHERE id = ?1",
            params![id.0, json],
        )?;
        if updated == 0 {
            return Err(StorageError::SaveNotFound(id.0));
        }
        Ok(())
    }

    fn load_network(&self, id: SaveId) -> Result<RoadNetwork, StorageError> {
        let json: Option<String> = self
            .conn
            .query_row(
                "SELECT network_json FROM saves WHERE id = ?1",
                params![id.0],
                |row| row.get(0),
            )
            .optional()?
            .ok_or(StorageError::SaveNotFound(id.0))?;
        let json = json.ok_or(StorageError::NetworkNotFound(id.0))?;
        Ok(serde_json::from_str(&json)?)
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
        self.assert_save_exists(save)?;
        Self::insert_entry_row(&self.conn, save.0, node, entry)
    }

    fn delete_entry(
        &mut self,
        save: SaveId,
        node: NodeId,
        end: LaneEnd,
    ) -> Result<(), StorageError> {
        let deleted = self.conn.execute(
            "DELETE FROM entries WHERE save_id = ?1 AND node_id = ?2 \
             AND edge_id = ?3 AND lane_index = ?4",
            params![save.0, node.0, end.edge.0, end.lane_index],
        )?;
        if deleted == 0 {
            return Err(StorageError::EntryNotFound {
                save: save.0,
                node: node.0,
                edge: end.edge.0,
                lane_index: end.lane_index,
            });
        }
        Ok(())
    }

    fn find_entries(
        &self,
        save: SaveId,
        node: NodeId,
    ) -> Result<Vec<ModifiedConnection>, StorageError> {
        self.assert_save_exists(save)?;
        let mut stmt = self.conn.prepare_cached(
            "SELECT edge_id, lane_index, holder_id FROM entries \
             WHERE save_id = ?1 AND node_id = ?2 ORDER BY rowid",
        )?;
        let rows = stmt.query_map(params![save.0, node.0], |row| {
            let edge_id: u32 = row.get(0)?;
            let lane_index: u32 = row.get(1)?;
            let holder_id: u32 = row.get(2)?;
            Ok(ModifiedConnection {
                edge: EdgeId(edge_id),
                lane_index,
                holder: HolderId(holder_id),
            })
        })?;
        Ok(rows.collect::<Result<_, _>>()?)
    }

    fn list_nodes(&self, save: SaveId) -> Result<Vec<NodeId>, StorageError> {
        self.assert_save_exists(save)?;
        let mut stmt = self.conn.prepare_cached(
            "SELECT node_id FROM entries WHERE save_id = ?1 GROUP BY node_id ORDER BY MIN(rowid)",
        )?;
        let rows = stmt.query_map(params![save.0], |row| {
            let node_id: u32 = row.get(0)?;
            Ok(NodeId(node_id))
        })?;
        Ok(rows.collect::<Result<_, _>>()?)
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
        self.assert_save_exists(save)?;
        Self::insert_holder_row(&self.conn, save.0, holder_id, holder)
    }

    fn get_holder(&self, save: SaveId, holder_id: HolderId) -> Result<OverrideHolder, StorageError> {
        let row: Option<(Option<u32>, i32, String)> = self
            .conn
            .query_row(
                "SELECT owner_node_id, tagged, connections_json FROM holders \
                 WHERE save_id = ?1 AND holder_id = ?2",
                params![save.0, holder_id.0],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
            )
            .optional()?;
        let (owner, tagged, connections_json) = row.ok_or(StorageError::HolderNotFound {
            save: save.0,
            holder: holder_id.0,
        })?;
        let connections: Vec<GeneratedConnection> = serde_json::from_str(&connections_json)?;
        Ok(OverrideHolder {
            owner: owner.map(NodeId),
            tagged: tagged != 0,
            connections,
        })
    }

    fn update_holder(
        &mut self,
        save: SaveId,
        holder_id: HolderId,
        holder: &OverrideHolder,
    ) -> Result<(), StorageError> {
        let connections_json = serde_json::to_string(&holder.connections)?;
        let owner: Option<u32> = holder.owner.map(|n| n.0);
        let updated = self.conn.execute(
            "UPDATE holders SET owner_node_id = ?3, tagged = ?4, connections_json = ?5 \
             WHERE save_id = ?1 AND holder_id = ?2",
            params![
                save.0,
                holder_id.0,
                owner,
                holder.tagged as i32,
                connections_json,
            ],
        )?;
        if updated == 0 {
            return Err(StorageError::HolderNotFound {
                save: save.0,
                holder: holder_id.0,
            });
        }
        Ok(())
    }

    fn delete_holder(&mut self, save: SaveId, holder_id: HolderId) -> Result<(), StorageError> {
        let deleted = self.conn.execute(
            "DELETE FROM holders WHERE save_id = ?1 AND holder_id = ?2",
            params![save.0, holder_id.0],
        )?;
        if deleted == 0 {
            return Err(StorageError::HolderNotFound {
                save: save.0,
                holder: holder_id.0,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use laneway_core::overrides::LaneDescriptor;
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
                method: PathMethod::ROAD.with(PathMethod::TRACK),
                is_unsafe: true,
                descriptor: LaneDescriptor {
                    source_group: 0,
                    source_carriageway: 1,
                    target_group: 0,
                    target_carriageway: 1,
                },
            });
        overrides.ensure_entry(NodeId(6), LaneEnd::new(EdgeId(4), 2));
        overrides
    }

    #[test]
    fn test_save_load_roundtrip() {
        let mut store = SqliteStore::in_memory().unwrap();
        let overrides = seeded_overrides();

        let id = store.create_save("city").unwrap();
        store.save_overrides(id, &overrides, 2).unwrap();

        let (loaded, version) = store.load_overrides(id).unwrap();
        assert_eq!(version, 2);
        assert_eq!(loaded, overrides);
    }

    #[test]
    fn test_resave_overwrites_rows() {
        let mut store = SqliteStore::in_memory().unwrap();
        let id = store.create_save("city").unwrap();
        store.save_overrides(id, &seeded_overrides(), 1).unwrap();

        let mut smaller = LaneOverrides::new();
        smaller.ensure_entry(NodeId(1), LaneEnd::new(EdgeId(2), 0));
        store.save_overrides(id, &smaller, 2).unwrap();

        let (loaded, version) = store.load_overrides(id).unwrap();
        assert_eq!(version, 2);
        assert_eq!(loaded, smaller);
    }

    #[test]
    fn test_delete_save_cascades() {
        let mut store = SqliteStore::in_memory().unwrap();
        let id = store.create_save("doomed").unwrap();
        store.save_overrides(id, &seeded_overrides(), 2).unwrap();
        store.delete_save(id).unwrap();

        assert!(matches!(
            store.load_overrides(id),
            Err(StorageError::SaveNotFound(_))
        ));
        // A new save sees none of the deleted rows.
        let fresh = store.create_save("fresh").unwrap();
        assert!(store.list_nodes(fresh).unwrap().is_empty());
    }

    #[test]
    fn test_broken_states_survive_roundtrip() {
        let mut store = SqliteStore::in_memory().unwrap();
        let id = store.create_save("broken").unwrap();

        let mut overrides = LaneOverrides::new();
        overrides.insert_entry_unchecked(
            NodeId(0),
            ModifiedConnection {
                edge: EdgeId(5),
                lane_index: 2,
                holder: HolderId(99),
            },
        );
        overrides.insert_holder_unchecked(
            HolderId(7),
            OverrideHolder {
                owner: None,
                tagged: false,
                connections: Vec::new(),
            },
        );
        store.save_overrides(id, &overrides, 2).unwrap();

        let (loaded, _) = store.load_overrides(id).unwrap();
        assert_eq!(loaded.entries(NodeId(0))[0].holder, HolderId(99));
        let holder = loaded.holder(HolderId(7)).unwrap();
        assert_eq!(holder.owner, None);
        assert!(!holder.tagged);
    }

    #[test]
    fn test_entry_and_holder_crud() {
        let mut store = SqliteStore::in_memory().unwrap();
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
        assert!(store
            .delete_entry(id, NodeId(9), LaneEnd::new(EdgeId(4), 1))
            .is_err());

        let holder = OverrideHolder::owned_by(NodeId(3));
        store.insert_holder(id, HolderId(5), &holder).unwrap();
        assert_eq!(store.get_holder(id, HolderId(5)).unwrap(), holder);
        let mut updated = holder.clone();
        updated.owner = Some(NodeId(4));
        store.update_holder(id, HolderId(5), &updated).unwrap();
        assert_eq!(
            store.get_holder(id, HolderId(5)).unwrap().owner,
            Some(NodeId(4))
        );
        store.delete_holder(id, HolderId(5)).unwrap();
        assert!(store.get_holder(id, HolderId(5)).is_err());
    }

    #[test]
    fn test_network_snapshot() {
        let mut store = SqliteStore::in_memory().unwrap();
        let id = store.create_save("net").unwrap();
        assert!(matches!(
            store.load_network(id),
            Err(StorageError::NetworkNotFound(_))
        ));

        let mut net = RoadNetwork::new();
        net.add_node(glam::Vec3::ZERO);
        store.save_network(id, &net).unwrap();
        assert_eq!(store.load_network(id).unwrap().node_count(), 1);
    }
}
