//! The lane-connection override engine.
//!
//! Sits between the road network core and the tool/storage layers: it
//! generates the connector handles and connection graph the tool works
//! with, applies user overrides through a deferred command buffer, keeps
//! stored overrides attached across structural network edits, and runs
//! the load-time migration/validation pipeline over saved data.
//!
//! # Architecture
//!
//! All mutation of [`laneway_core::LaneOverrides`] flows through
//! [`OverrideCommand`]s in a [`CommandBuffer`]: planning passes read
//! shared state (in parallel where the work is per-node) and stage
//! commands, which apply in one sequential pass. Per-node work never
//! observes another node's in-flight mutations.
//!
//! # Modules
//!
//! - [`connectors`]: lane-end handle generation
//! - [`connections`]: connection-view generation
//! - [`routing`]: node lane materialization (defaults + overrides)
//! - [`apply`]: tool request resolution
//! - [`commands`]: the deferred mutation log
//! - [`sync`]: topology sync across edit steps
//! - [`migration`]: the load pipeline and its report
//! - [`session`]: tool-facing edit session
//! - [`dirty`]: recompute tracking

pub mod apply;
pub mod commands;
pub mod connections;
pub mod connectors;
pub mod dirty;
pub mod error;
pub mod migration;
pub mod routing;
pub mod session;
pub mod sync;

// Re-export key types for ergonomic use.
pub use apply::{apply_and_mark, request_add, request_remove, request_reset, RequestModifiers};
pub use commands::{CommandBuffer, OverrideCommand};
pub use connections::{generate_connections, Connection, ConnectionView};
pub use connectors::{generate_connectors, Connector, ConnectorRole};
pub use dirty::DirtySet;
pub use error::EngineError;
pub use migration::{run_load_pipeline, LoadIssue, LoadReport, DATA_VERSION};
pub use routing::rebuild_node_lanes;
pub use session::EditSession;
pub use sync::{run_sync, SyncOutcome};
