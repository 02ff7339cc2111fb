//! Stored lane-connection overrides.
//!
//! [`LaneOverrides`] is the persisted state of the engine: per-node entry
//! buffers pointing at [`OverrideHolder`]s, which carry the replacement
//! connection lists. The container is deliberately loose. It can hold
//! dangling holder references, holders with missing or wrong owners, and
//! descriptors from older data versions, because save files genuinely
//! contain such states and the load pipeline has to be able to see them.
//! The checked mutation API (`ensure_entry`, `remove_entry`, `reset_node`,
//! `remove_holder`) maintains the invariants; the `_unchecked` inserts
//! bypass them for storage recomposition and for tests that need broken
//! state on purpose.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::id::{EdgeId, HolderId, NodeId};
use crate::lane::PathMethod;
use crate::network::LaneEnd;

/// Cached composition coordinates of a connection's two lane ends.
///
/// Groups and carriageways locate the lanes within their compositions
/// without touching the network. Data version 1 never wrote these; such
/// rows load as [`LaneDescriptor::INVALID`] and are recomputed by the
/// legacy-repair pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LaneDescriptor {
    pub source_group: u8,
    pub source_carriageway: u8,
    pub target_group: u8,
    pub target_carriageway: u8,
}

impl LaneDescriptor {
    /// Sentinel carried by rows that predate descriptors.
    pub const INVALID: LaneDescriptor = LaneDescriptor {
        source_group: 0xFF,
        source_carriageway: 0xFF,
        target_group: 0xFF,
        target_carriageway: 0xFF,
    };

    pub fn is_valid(self) -> bool {
        self != Self::INVALID
    }

    fn invalid() -> Self {
        Self::INVALID
    }
}

/// One stored override connection.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeneratedConnection {
    pub source_edge: EdgeId,
    pub target_edge: EdgeId,
    /// `(source lane, target lane)` indexes into the edges' compositions.
    pub lane_indexes: (u32, u32),
    pub method: PathMethod,
    pub is_unsafe: bool,
    /// Version-1 rows were written without this field and deserialize to
    /// the invalid sentinel, which legacy repair recomputes.
    #[serde(default = "LaneDescriptor::invalid")]
    pub descriptor: LaneDescriptor,
}

impl GeneratedConnection {
    pub fn source_end(&self) -> LaneEnd {
        LaneEnd::new(self.source_edge, self.lane_indexes.0)
    }

    pub fn target_end(&self) -> LaneEnd {
        LaneEnd::new(self.target_edge, self.lane_indexes.1)
    }

    /// Whether this is the stored form of `source -> target`.
    pub fn links(&self, source: LaneEnd, target: LaneEnd) -> bool {
        self.source_end() == source && self.target_end() == target
    }
}

/// The holder entity an entry points at: owner back-reference, the
/// mod-owned sentinel tag, and the replacement connection list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OverrideHolder {
    pub owner: Option<NodeId>,
    pub tagged: bool,
    pub connections: Vec<GeneratedConnection>,
}

impl OverrideHolder {
    pub fn owned_by(node: NodeId) -> Self {
        OverrideHolder {
            owner: Some(node),
            tagged: true,
            connections: Vec::new(),
        }
    }
}

/// One entry in a node's override buffer: this lane end's connections are
/// overridden, look at `holder`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModifiedConnection {
    pub edge: EdgeId,
    pub lane_index: u32,
    pub holder: HolderId,
}

impl ModifiedConnection {
    pub fn lane_end(&self) -> LaneEnd {
        LaneEnd::new(self.edge, self.lane_index)
    }
}

/// All stored overrides of one save.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LaneOverrides {
    by_node: IndexMap<NodeId, Vec<ModifiedConnection>>,
    holders: IndexMap<HolderId, OverrideHolder>,
    next_holder_id: u32,
}

impl LaneOverrides {
    pub fn new() -> Self {
        Self::default()
    }

    // -----------------------------------------------------------------------
    // Read-only accessors
    // -----------------------------------------------------------------------

    pub fn is_empty(&self) -> bool {
        self.by_node.is_empty() && self.holders.is_empty()
    }

    pub fn node_count(&self) -> usize {
        self.by_node.len()
    }

    pub fn holder_count(&self) -> usize {
        self.holders.len()
    }

    pub fn entry_count(&self) -> usize {
        self.by_node.values().map(Vec::len).sum()
    }

    /// Nodes that own at least one entry, in insertion order.
    pub fn nodes(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.by_node.keys().copied()
    }

    pub fn has_node(&self, node: NodeId) -> bool {
        self.by_node.contains_key(&node)
    }

    /// A node's entry buffer; empty slice when the node owns nothing.
    pub fn entries(&self, node: NodeId) -> &[ModifiedConnection] {
        self.by_node.get(&node).map(Vec::as_slice).unwrap_or(&[])
    }

    /// The entry for one lane end of a node, if overridden.
    pub fn entry(&self, node: NodeId, end: LaneEnd) -> Option<&ModifiedConnection> {
        self.entries(node).iter().find(|m| m.lane_end() == end)
    }

    pub fn holder(&self, id: HolderId) -> Option<&OverrideHolder> {
        self.holders.get(&id)
    }

    pub fn holder_mut(&mut self, id: HolderId) -> Option<&mut OverrideHolder> {
        self.holders.get_mut(&id)
    }

    pub fn holders(&self) -> impl Iterator<Item = (HolderId, &OverrideHolder)> + '_ {
        self.holders.iter().map(|(id, h)| (*id, h))
    }

    pub fn holder_ids(&self) -> Vec<HolderId> {
        self.holders.keys().copied().collect()
    }

    pub fn next_holder_id(&self) -> u32 {
        self.next_holder_id
    }

    // -----------------------------------------------------------------------
    // Checked mutations
    // -----------------------------------------------------------------------

    /// Returns the holder for `end` at `node`, creating entry and holder
    /// when absent. Entries are keyed by lane end; re-ensuring an existing
    /// key returns the existing holder, it never duplicates the entry.
    pub fn ensure_entry(&mut self, node: NodeId, end: LaneEnd) -> HolderId {
        if let Some(existing) = self.entry(node, end) {
            return existing.holder;
        }
        let id = HolderId(self.next_holder_id);
        self.next_holder_id += 1;
        self.holders.insert(id, OverrideHolder::owned_by(node));
        self.by_node
            .entry(node)
            .or_default()
            .push(ModifiedConnection {
                edge: end.edge,
                lane_index: end.lane_index,
                holder: id,
            });
        id
    }

    /// Removes one entry and its holder. Drops the node's buffer when it
    /// empties. Returns the removed entry's holder id.
    pub fn remove_entry(&mut self, node: NodeId, end: LaneEnd) -> Option<HolderId> {
        let buffer = self.by_node.get_mut(&node)?;
        let pos = buffer.iter().position(|m| m.lane_end() == end)?;
        let removed = buffer.remove(pos);
        if buffer.is_empty() {
            self.by_node.shift_remove(&node);
        }
        self.holders.shift_remove(&removed.holder);
        Some(removed.holder)
    }

    /// Removes every entry and holder of a node. Returns how many entries
    /// were dropped.
    pub fn reset_node(&mut self, node: NodeId) -> usize {
        let Some(buffer) = self.by_node.shift_remove(&node) else {
            return 0;
        };
        for entry in &buffer {
            self.holders.shift_remove(&entry.holder);
        }
        buffer.len()
    }

    /// Removes a holder and scrubs every entry referencing it, dropping
    /// buffers that empty. Returns whether the holder existed.
    pub fn remove_holder(&mut self, id: HolderId) -> bool {
        let existed = self.holders.shift_remove(&id).is_some();
        self.by_node.retain(|_, buffer| {
            buffer.retain(|m| m.holder != id);
            !buffer.is_empty()
        });
        existed
    }

    /// Points an existing entry at a different lane end. Returns false
    /// when no entry for `old` exists.
    pub fn rewrite_entry(&mut self, node: NodeId, old: LaneEnd, new: LaneEnd) -> bool {
        let Some(buffer) = self.by_node.get_mut(&node) else {
            return false;
        };
        match buffer.iter_mut().find(|m| m.lane_end() == old) {
            Some(entry) => {
                entry.edge = new.edge;
                entry.lane_index = new.lane_index;
                true
            }
            None => false,
        }
    }

    // -----------------------------------------------------------------------
    // Unchecked inserts (storage recomposition, broken-state tests)
    // -----------------------------------------------------------------------

    /// Inserts an entry without touching holders. The buffer is created on
    /// demand; duplicate lane-end keys are the caller's problem.
    pub fn insert_entry_unchecked(&mut self, node: NodeId, entry: ModifiedConnection) {
        self.by_node.entry(node).or_default().push(entry);
    }

    /// Inserts a holder under an explicit id, bumping the id counter past
    /// it.
    pub fn insert_holder_unchecked(&mut self, id: HolderId, holder: OverrideHolder) {
        self.next_holder_id = self.next_holder_id.max(id.0 + 1);
        self.holders.insert(id, holder);
    }

    // -----------------------------------------------------------------------
    // Derived indexes
    // -----------------------------------------------------------------------

    /// Forward map holder -> node rebuilt from the entry buffers. When a
    /// holder is (wrongly) listed by several nodes the first listing wins.
    pub fn holders_listed(&self) -> HashMap<HolderId, NodeId> {
        let mut listed = HashMap::new();
        for (node, buffer) in &self.by_node {
            for entry in buffer {
                listed.entry(entry.holder).or_insert(*node);
            }
        }
        listed
    }

    /// Whether `node`'s buffer lists `holder`.
    pub fn node_lists_holder(&self, node: NodeId, holder: HolderId) -> bool {
        self.entries(node).iter().any(|m| m.holder == holder)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn end(edge: u32, lane: u32) -> LaneEnd {
        LaneEnd::new(EdgeId(edge), lane)
    }

    #[test]
    fn descriptorless_rows_deserialize_to_sentinel() {
        let json = r#"{"source_edge":1,"target_edge":2,"lane_indexes":[0,1],"method":1,"is_unsafe":false}"#;
        let c: GeneratedConnection = serde_json::from_str(json).unwrap();
        assert_eq!(c.descriptor, LaneDescriptor::INVALID);
        assert!(!c.descriptor.is_valid());
    }

    #[test]
    fn ensure_is_keyed_by_lane_end() {
        let mut ov = LaneOverrides::new();
        let h1 = ov.ensure_entry(NodeId(0), end(1, 0));
        let h2 = ov.ensure_entry(NodeId(0), end(1, 0));
        assert_eq!(h1, h2);
        assert_eq!(ov.entry_count(), 1);
        let h3 = ov.ensure_entry(NodeId(0), end(1, 1));
        assert_ne!(h1, h3);
        assert_eq!(ov.entry_count(), 2);
    }

    #[test]
    fn new_holders_are_owned_and_tagged() {
        let mut ov = LaneOverrides::new();
        let h = ov.ensure_entry(NodeId(7), end(1, 0));
        let holder = ov.holder(h).unwrap();
        assert_eq!(holder.owner, Some(NodeId(7)));
        assert!(holder.tagged);
        assert!(holder.connections.is_empty());
    }

    #[test]
    fn remove_entry_drops_holder_and_empty_buffer() {
        let mut ov = LaneOverrides::new();
        let h = ov.ensure_entry(NodeId(0), end(1, 0));
        assert_eq!(ov.remove_entry(NodeId(0), end(1, 0)), Some(h));
        assert!(ov.is_empty());
        assert_eq!(ov.remove_entry(NodeId(0), end(1, 0)), None);
    }

    #[test]
    fn reset_node_cascades() {
        let mut ov = LaneOverrides::new();
        ov.ensure_entry(NodeId(0), end(1, 0));
        ov.ensure_entry(NodeId(0), end(2, 1));
        ov.ensure_entry(NodeId(9), end(3, 0));
        assert_eq!(ov.reset_node(NodeId(0)), 2);
        assert!(!ov.has_node(NodeId(0)));
        assert_eq!(ov.holder_count(), 1);
        assert!(ov.has_node(NodeId(9)));
    }

    #[test]
    fn remove_holder_scrubs_references() {
        let mut ov = LaneOverrides::new();
        let h = ov.ensure_entry(NodeId(0), end(1, 0));
        ov.ensure_entry(NodeId(0), end(2, 0));
        assert!(ov.remove_holder(h));
        assert_eq!(ov.entries(NodeId(0)).len(), 1);
        assert!(ov.entry(NodeId(0), end(1, 0)).is_none());
        // Dangling reference inserted the unchecked way scrubs too.
        ov.insert_entry_unchecked(
            NodeId(4),
            ModifiedConnection {
                edge: EdgeId(5),
                lane_index: 0,
                holder: HolderId(99),
            },
        );
        assert!(!ov.remove_holder(HolderId(99)));
        assert!(!ov.has_node(NodeId(4)));
    }

    #[test]
    fn unchecked_holder_insert_bumps_counter() {
        let mut ov = LaneOverrides::new();
        ov.insert_holder_unchecked(HolderId(40), OverrideHolder::owned_by(NodeId(0)));
        let fresh = ov.ensure_entry(NodeId(1), end(1, 0));
        assert!(fresh.0 > 40);
    }

    #[test]
    fn listed_map_reflects_buffers_not_owners() {
        let mut ov = LaneOverrides::new();
        ov.insert_holder_unchecked(
            HolderId(0),
            OverrideHolder {
                owner: Some(NodeId(5)),
                tagged: true,
                connections: Vec::new(),
            },
        );
        ov.insert_entry_unchecked(
            NodeId(2),
            ModifiedConnection {
                edge: EdgeId(1),
                lane_index: 0,
                holder: HolderId(0),
            },
        );
        let listed = ov.holders_listed();
        assert_eq!(listed.get(&HolderId(0)), Some(&NodeId(2)));
        assert!(ov.node_lists_holder(NodeId(2), HolderId(0)));
        assert!(!ov.node_lists_holder(NodeId(5), HolderId(0)));
    }

    mod properties {
        use super::*;
        use proptest::prelude::*;

        #[derive(Debug, Clone)]
        enum Op {
            Ensure(u32, u32, u32),
            Remove(u32, u32, u32),
            Reset(u32),
        }

        fn op_strategy() -> impl Strategy<Value = Op> {
            prop_oneof![
                (0..4u32, 0..6u32, 0..3u32).prop_map(|(n, e, l)| Op::Ensure(n, e, l)),
                (0..4u32, 0..6u32, 0..3u32).prop_map(|(n, e, l)| Op::Remove(n, e, l)),
                (0..4u32).prop_map(Op::Reset),
            ]
        }

        proptest! {
            /// Any interleaving of checked mutations keeps entries unique
            /// per lane end, buffers non-empty, and holders owned by the
            /// listing node.
            #[test]
            fn checked_api_keeps_container_coherent(ops in prop::collection::vec(op_strategy(), 0..64)) {
                let mut ov = LaneOverrides::new();
                for op in ops {
                    match op {
                        Op::Ensure(n, e, l) => {
                            ov.ensure_entry(NodeId(n), LaneEnd::new(EdgeId(e), l));
                        }
                        Op::Remove(n, e, l) => {
                            ov.remove_entry(NodeId(n), LaneEnd::new(EdgeId(e), l));
                        }
                        Op::Reset(n) => {
                            ov.reset_node(NodeId(n));
                        }
                    }
                }
                for node in ov.nodes().collect::<Vec<_>>() {
                    let buffer = ov.entries(node);
                    prop_assert!(!buffer.is_empty());
                    let mut keys: Vec<LaneEnd> = buffer.iter().map(|m| m.lane_end()).collect();
                    keys.sort();
                    let before = keys.len();
                    keys.dedup();
                    prop_assert_eq!(keys.len(), before);
                    for entry in buffer {
                        let holder = ov.holder(entry.holder);
                        prop_assert!(holder.is_some());
                        prop_assert_eq!(holder.unwrap().owner, Some(node));
                    }
                }
            }
        }
    }
}
