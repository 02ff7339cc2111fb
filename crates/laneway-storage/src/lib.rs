//! Storage abstraction for lane-connection overrides.
//!
//! Provides the [`OverrideStore`] trait defining the storage contract that
//! all backends implement, plus the [`InMemoryStore`] and [`SqliteStore`]
//! as first-class backends.
//!
//! # Architecture
//!
//! The storage layer has a two-layer API:
//! - **Low-level CRUD** methods (insert/get/update/delete for entries and
//!   holders) serve as the incremental save mechanism.
//! - **High-level convenience** methods (`save_overrides`,
//!   `load_overrides`) provide bulk operations for save and full
//!   reconstruction.
//!
//! The store is deliberately judgment-free: broken override states found
//! in save files round-trip losslessly, and the engine's load pipeline is
//! what repairs or discards them.
//!
//! # Modules
//!
//! - [`error`]: StorageError enum with all failure modes
//! - [`types`]: SaveId, SaveSummary storage-layer types
//! - [`traits`]: OverrideStore trait definition
//! - [`convert`]: LaneOverrides decompose/recompose functions
//! - [`memory`]: InMemoryStore implementation
//! - [`schema`]: SQL schema constants and migration setup
//! - [`sqlite`]: SqliteStore implementation

pub mod convert;
pub mod error;
pub mod memory;
pub mod schema;
pub mod sqlite;
pub mod traits;
pub mod types;

// Re-export key types for ergonomic use.
pub use error::StorageError;
pub use memory::InMemoryStore;
pub use sqlite::SqliteStore;
pub use traits::OverrideStore;
pub use types::{SaveId, SaveSummary};
