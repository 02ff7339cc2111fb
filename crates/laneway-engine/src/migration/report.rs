//! Load-pipeline issues and the structured report.
//!
//! [`LoadIssue`] captures per-node context for everything the pipeline
//! repaired or discarded. Issues are recovered conditions, never raised as
//! errors: the pipeline's contract is that loading always succeeds and the
//! report says what it cost.

use std::collections::BTreeSet;

use laneway_core::{EdgeId, HolderId, NodeId};
use serde::{Deserialize, Serialize};

/// One recovered condition found while loading stored overrides.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, thiserror::Error)]
pub enum LoadIssue {
    /// An entry or connection references an edge or lane the current
    /// network no longer has at this node.
    #[error("node {node}: stale reference to edge {edge}")]
    StaleReference {
        /// Node whose overrides were reset.
        node: NodeId,
        /// The edge that failed to resolve.
        edge: EdgeId,
    },

    /// A stored connection's method flags cannot ride the lane its target
    /// now resolves to.
    #[error("node {node}: connection {source_edge}->{target_edge} incompatible with composition")]
    IncompatibleComposition {
        node: NodeId,
        source_edge: EdgeId,
        target_edge: EdgeId,
    },

    /// A holder whose owner back-reference is missing, wrong, or not
    /// mirrored by the owner's entry buffer.
    #[error("holder {holder}: broken back-reference")]
    BrokenBackReference {
        holder: HolderId,
        /// The node whose overrides the deletion affected, when known.
        node: Option<NodeId>,
    },

    /// Data from a version before cached descriptors that could not be
    /// recomputed against the current network.
    #[error("node {node}: legacy data could not be upgraded")]
    LegacySentinelData { node: NodeId },
}

impl LoadIssue {
    /// The node this issue affected, when it names one.
    pub fn node(&self) -> Option<NodeId> {
        match self {
            LoadIssue::StaleReference { node, .. }
            | LoadIssue::IncompatibleComposition { node, .. }
            | LoadIssue::LegacySentinelData { node } => Some(*node),
            LoadIssue::BrokenBackReference { node, .. } => *node,
        }
    }
}

/// What one load-pipeline run found and did.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LoadReport {
    /// Data version the save carried.
    pub loaded_version: u32,
    /// Number of override-owning intersections inspected.
    pub checked: usize,
    /// Intersections whose overrides were reset or rewritten by force.
    pub affected: BTreeSet<NodeId>,
    pub issues: Vec<LoadIssue>,
    pub repaired_descriptors: usize,
    pub repaired_holders: usize,
    pub deleted_holders: usize,
    pub reset_nodes: usize,
    /// Total container mutations applied across all passes.
    pub mutations: usize,
}

impl LoadReport {
    pub fn new(loaded_version: u32, checked: usize) -> Self {
        LoadReport {
            loaded_version,
            checked,
            ..Default::default()
        }
    }

    pub fn record(&mut self, issue: LoadIssue) {
        if let Some(node) = issue.node() {
            self.affected.insert(node);
        }
        self.issues.push(issue);
    }

    pub fn is_clean(&self) -> bool {
        self.issues.is_empty() && self.mutations == 0
    }

    /// The one-line summary surfaced to the player.
    pub fn summary(&self) -> String {
        format!(
            "{} of {} intersections could not be loaded",
            self.affected.len(),
            self.checked
        )
    }
}
