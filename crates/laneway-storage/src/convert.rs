//! Decompose/recompose conversions between [`LaneOverrides`] and flat
//! storage rows.
//!
//! [`decompose`] breaks the container into a [`OverrideRows`] of flat row
//! vectors. [`recompose`] rebuilds the container through the unchecked
//! insert API, which is what makes the round trip lossless for broken
//! states: a stored entry whose holder row is missing, or a holder whose
//! owner points at the wrong node, comes back exactly as stored. Judging
//! such states is the load pipeline's job, not the store's.

use laneway_core::id::{HolderId, NodeId};
use laneway_core::overrides::{LaneOverrides, ModifiedConnection, OverrideHolder};

/// The override container broken into flat row vectors for storage.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OverrideRows {
    /// Entry rows: one per `(node, edge, lane_index) -> holder` mapping,
    /// in buffer order.
    pub entries: Vec<(NodeId, ModifiedConnection)>,
    /// Holder rows: owner, tag, and the stored connection list.
    pub holders: Vec<(HolderId, OverrideHolder)>,
}

/// Decomposes the container into flat row vectors suitable for storage.
pub fn decompose(overrides: &LaneOverrides) -> OverrideRows {
    let mut rows = OverrideRows::default();
    for node in overrides.nodes() {
        for entry in overrides.entries(node) {
            rows.entries.push((node, *entry));
        }
    }
    for (id, holder) in overrides.holders() {
        rows.holders.push((id, holder.clone()));
    }
    rows
}

/// Recomposes a container from stored rows.
///
/// Holder rows land first so the id counter is past every stored holder
/// before any checked mutation runs on the loaded container. Entry rows
/// keep their stored buffer order.
pub fn recompose(rows: OverrideRows) -> LaneOverrides {
    let mut overrides = LaneOverrides::new();
    for (id, holder) in rows.holders {
        overrides.insert_holder_unchecked(id, holder);
    }
    for (node, entry) in rows.entries {
        overrides.insert_entry_unchecked(node, entry);
    }
    overrides
}

#[cfg(test)]
mod tests {
    use super::*;
    use laneway_core::id::EdgeId;
    use laneway_core::network::LaneEnd;
    use laneway_core::overrides::{GeneratedConnection, LaneDescriptor};
    use laneway_core::PathMethod;

    fn sample_connection() -> GeneratedConnection {
        GeneratedConnection {
            source_edge: EdgeId(1),
            target_edge: EdgeId(2),
            lane_indexes: (0, 1),
            method: PathMethod::ROAD,
            is_unsafe: true,
            descriptor: LaneDescriptor {
                source_group: 0,
                source_carriageway: 1,
                target_group: 0,
                target_carriageway: 1,
            },
        }
    }

    #[test]
    fn roundtrip_preserves_checked_container() {
        let mut overrides = LaneOverrides::new();
        let h = overrides.ensure_entry(NodeId(3), LaneEnd::new(EdgeId(1), 0));
        overrides
            .holder_mut(h)
            .unwrap()
            .connections
            .push(sample_connection());
        overrides.ensure_entry(NodeId(3), LaneEnd::new(EdgeId(2), 1));
        overrides.ensure_entry(NodeId(8), LaneEnd::new(EdgeId(4), 0));

        let back = recompose(decompose(&overrides));
        assert_eq!(back, overrides);
    }

    #[test]
    fn roundtrip_preserves_broken_states() {
        let mut overrides = LaneOverrides::new();
        // Entry whose holder row does not exist.
        overrides.insert_entry_unchecked(
            NodeId(0),
            ModifiedConnection {
                edge: EdgeId(5),
                lane_index: 2,
                holder: HolderId(99),
            },
        );
        // Holder no entry lists, owned by nobody, untagged.
        overrides.insert_holder_unchecked(
            HolderId(7),
            OverrideHolder {
                owner: None,
                tagged: false,
                connections: vec![sample_connection()],
            },
        );

        let back = recompose(decompose(&overrides));
        assert_eq!(back.entries(NodeId(0)).len(), 1);
        assert_eq!(back.entries(NodeId(0))[0].holder, HolderId(99));
        let holder = back.holder(HolderId(7)).unwrap();
        assert_eq!(holder.owner, None);
        assert!(!holder.tagged);
        assert_eq!(holder.connections.len(), 1);
    }

    #[test]
    fn recompose_bumps_holder_counter_past_stored_ids() {
        let mut rows = OverrideRows::default();
        rows.holders
            .push((HolderId(41), OverrideHolder::owned_by(NodeId(1))));
        let mut back = recompose(rows);
        let fresh = back.ensure_entry(NodeId(2), LaneEnd::new(EdgeId(1), 0));
        assert!(fresh.0 > 41);
    }
}
