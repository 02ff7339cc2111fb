//! Deferred override mutations.
//!
//! All writes to [`LaneOverrides`] go through [`OverrideCommand`]s staged
//! in a [`CommandBuffer`]. Planning passes (apply requests, sync, the load
//! pipeline) run read-only over shared state and emit commands; the buffer
//! is then applied in one sequential pass. Commands are idempotent where
//! the data allows it: applying a command whose effect is already present
//! counts zero mutations.

use laneway_core::{
    GeneratedConnection, HolderId, LaneDescriptor, LaneEnd, LaneOverrides, NodeId, PathMethod,
};

/// One staged mutation of the override container.
#[derive(Debug, Clone, PartialEq)]
pub enum OverrideCommand {
    /// Ensure an entry for `source` at `node` and append `connection` to
    /// its holder unless the same source/target triple is already stored.
    Upsert {
        node: NodeId,
        source: LaneEnd,
        connection: GeneratedConnection,
    },
    /// Remove the stored `source -> target` connection. The holder stays,
    /// even emptied; a miss is a no-op.
    RemoveConnection {
        node: NodeId,
        source: LaneEnd,
        target: LaneEnd,
    },
    /// Remove one entry together with its holder.
    DeleteEntry { node: NodeId, end: LaneEnd },
    /// Re-point an entry at a different lane end (topology sync).
    RewriteEntry {
        node: NodeId,
        old: LaneEnd,
        new: LaneEnd,
    },
    /// Replace a holder's whole connection list (topology sync).
    ReplaceConnections {
        holder: HolderId,
        connections: Vec<GeneratedConnection>,
    },
    /// Drop every entry and holder of a node.
    ResetNode { node: NodeId },
    /// Drop a holder and scrub entries referencing it.
    DeleteHolder { holder: HolderId },
    /// Restore a holder's owner back-reference and sentinel tag.
    RepairHolder { holder: HolderId, owner: NodeId },
    /// Overwrite one connection's cached descriptor (legacy repair).
    PatchDescriptor {
        holder: HolderId,
        index: usize,
        descriptor: LaneDescriptor,
    },
    /// Overwrite one connection's method flags (validation repair).
    PatchMethod {
        holder: HolderId,
        index: usize,
        method: PathMethod,
    },
}

impl OverrideCommand {
    /// The node whose derived state this command touches, when one can be
    /// named without consulting the container.
    pub fn node_hint(&self) -> Option<NodeId> {
        match self {
            OverrideCommand::Upsert { node, .. }
            | OverrideCommand::RemoveConnection { node, .. }
            | OverrideCommand::DeleteEntry { node, .. }
            | OverrideCommand::RewriteEntry { node, .. }
            | OverrideCommand::ResetNode { node }
            | OverrideCommand::RepairHolder { owner: node, .. } => Some(*node),
            OverrideCommand::ReplaceConnections { .. }
            | OverrideCommand::DeleteHolder { .. }
            | OverrideCommand::PatchDescriptor { .. }
            | OverrideCommand::PatchMethod { .. } => None,
        }
    }
}

/// An append-only log of staged commands.
#[derive(Debug, Clone, Default)]
pub struct CommandBuffer {
    commands: Vec<OverrideCommand>,
}

impl CommandBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, command: OverrideCommand) {
        self.commands.push(command);
    }

    pub fn extend(&mut self, commands: impl IntoIterator<Item = OverrideCommand>) {
        self.commands.extend(commands);
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    pub fn commands(&self) -> &[OverrideCommand] {
        &self.commands
    }

    /// Applies every staged command in order, draining the buffer.
    /// Returns the number of actual mutations (no-ops excluded).
    pub fn apply(&mut self, overrides: &mut LaneOverrides) -> usize {
        let mut mutations = 0;
        for command in self.commands.drain(..) {
            mutations += apply_one(overrides, command);
        }
        mutations
    }
}

fn apply_one(overrides: &mut LaneOverrides, command: OverrideCommand) -> usize {
    match command {
        OverrideCommand::Upsert {
            node,
            source,
            connection,
        } => {
            let had_entry = overrides.entry(node, source).is_some();
            let holder_id = overrides.ensure_entry(node, source);
            let mut mutations = usize::from(!had_entry);
            if let Some(holder) = overrides.holder_mut(holder_id) {
                let duplicate = holder
                    .connections
                    .iter()
                    .any(|c| c.links(connection.source_end(), connection.target_end()));
                if !duplicate {
                    holder.connections.push(connection);
                    mutations += 1;
                }
            }
            mutations
        }
        OverrideCommand::RemoveConnection {
            node,
            source,
            target,
        } => {
            let Some(entry) = overrides.entry(node, source) else {
                return 0;
            };
            let holder_id = entry.holder;
            let Some(holder) = overrides.holder_mut(holder_id) else {
                return 0;
            };
            match holder.connections.iter().position(|c| c.links(source, target)) {
                Some(pos) => {
                    holder.connections.swap_remove(pos);
                    1
                }
                None => 0,
            }
        }
        OverrideCommand::DeleteEntry { node, end } => {
            usize::from(overrides.remove_entry(node, end).is_some())
        }
        OverrideCommand::RewriteEntry { node, old, new } => {
            usize::from(overrides.rewrite_entry(node, old, new))
        }
        OverrideCommand::ReplaceConnections {
            holder,
            connections,
        } => match overrides.holder_mut(holder) {
            Some(h) if h.connections != connections => {
                h.connections = connections;
                1
            }
            _ => 0,
        },
        OverrideCommand::ResetNode { node } => overrides.reset_node(node),
        OverrideCommand::DeleteHolder { holder } => usize::from(overrides.remove_holder(holder)),
        OverrideCommand::RepairHolder { holder, owner } => match overrides.holder_mut(holder) {
            Some(h) if h.owner != Some(owner) || !h.tagged => {
                h.owner = Some(owner);
                h.tagged = true;
                1
            }
            _ => 0,
        },
        OverrideCommand::PatchDescriptor {
            holder,
            index,
            descriptor,
        } => match overrides
            .holder_mut(holder)
            .and_then(|h| h.connections.get_mut(index))
        {
            Some(c) if c.descriptor != descriptor => {
                c.descriptor = descriptor;
                1
            }
            _ => 0,
        },
        OverrideCommand::PatchMethod {
            holder,
            index,
            method,
        } => match overrides
            .holder_mut(holder)
            .and_then(|h| h.connections.get_mut(index))
        {
            Some(c) if c.method != method => {
                c.method = method;
                1
            }
            _ => 0,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use laneway_core::EdgeId;

    fn connection(se: u32, sl: u32, te: u32, tl: u32) -> GeneratedConnection {
        GeneratedConnection {
            source_edge: EdgeId(se),
            target_edge: EdgeId(te),
            lane_indexes: (sl, tl),
            method: PathMethod::ROAD,
            is_unsafe: false,
            descriptor: LaneDescriptor::INVALID,
        }
    }

    fn end(edge: u32, lane: u32) -> LaneEnd {
        LaneEnd::new(EdgeId(edge), lane)
    }

    #[test]
    fn upsert_creates_then_deduplicates() {
        let mut overrides = LaneOverrides::new();
        let mut buffer = CommandBuffer::new();
        buffer.push(OverrideCommand::Upsert {
            node: NodeId(0),
            source: end(1, 0),
            connection: connection(1, 0, 2, 0),
        });
        assert_eq!(buffer.apply(&mut overrides), 2);
        // Same triple again: zero mutations.
        buffer.push(OverrideCommand::Upsert {
            node: NodeId(0),
            source: end(1, 0),
            connection: connection(1, 0, 2, 0),
        });
        assert_eq!(buffer.apply(&mut overrides), 0);
        // New target under the same entry: one mutation.
        buffer.push(OverrideCommand::Upsert {
            node: NodeId(0),
            source: end(1, 0),
            connection: connection(1, 0, 3, 1),
        });
        assert_eq!(buffer.apply(&mut overrides), 1);
        assert_eq!(overrides.entry_count(), 1);
    }

    #[test]
    fn remove_misses_are_no_ops_and_holder_survives() {
        let mut overrides = LaneOverrides::new();
        let mut buffer = CommandBuffer::new();
        buffer.push(OverrideCommand::Upsert {
            node: NodeId(0),
            source: end(1, 0),
            connection: connection(1, 0, 2, 0),
        });
        buffer.apply(&mut overrides);
        buffer.push(OverrideCommand::RemoveConnection {
            node: NodeId(0),
            source: end(1, 0),
            target: end(9, 9),
        });
        assert_eq!(buffer.apply(&mut overrides), 0);
        buffer.push(OverrideCommand::RemoveConnection {
            node: NodeId(0),
            source: end(1, 0),
            target: end(2, 0),
        });
        assert_eq!(buffer.apply(&mut overrides), 1);
        // Emptied holder stays; cleanup belongs elsewhere.
        let entry = *overrides.entry(NodeId(0), end(1, 0)).unwrap();
        assert!(overrides.holder(entry.holder).unwrap().connections.is_empty());
    }

    #[test]
    fn replace_connections_counts_only_real_changes() {
        let mut overrides = LaneOverrides::new();
        let h = overrides.ensure_entry(NodeId(0), end(1, 0));
        let list = vec![connection(1, 0, 2, 0)];
        let mut buffer = CommandBuffer::new();
        buffer.push(OverrideCommand::ReplaceConnections {
            holder: h,
            connections: list.clone(),
        });
        assert_eq!(buffer.apply(&mut overrides), 1);
        buffer.push(OverrideCommand::ReplaceConnections {
            holder: h,
            connections: list,
        });
        assert_eq!(buffer.apply(&mut overrides), 0);
    }

    #[test]
    fn repair_holder_is_idempotent() {
        let mut overrides = LaneOverrides::new();
        let h = overrides.ensure_entry(NodeId(3), end(1, 0));
        overrides.holder_mut(h).unwrap().tagged = false;
        let mut buffer = CommandBuffer::new();
        buffer.push(OverrideCommand::RepairHolder {
            holder: h,
            owner: NodeId(3),
        });
        assert_eq!(buffer.apply(&mut overrides), 1);
        buffer.push(OverrideCommand::RepairHolder {
            holder: h,
            owner: NodeId(3),
        });
        assert_eq!(buffer.apply(&mut overrides), 0);
    }
}
