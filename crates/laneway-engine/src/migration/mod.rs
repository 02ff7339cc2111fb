//! Load-time migration and validation pipeline.
//!
//! A versioned state machine executed once per load. Legacy repair runs
//! only for saves older than [`DATA_VERSION`]; structural validation and
//! back-reference validation always run, in that order, each observing
//! the previous pass's applied mutations. Each pass plans read-only in
//! parallel over nodes (or holders) and applies its command lists
//! sequentially; a second run over the surviving data applies nothing.

mod legacy;
mod references;
mod report;
mod validate;

pub use report::{LoadIssue, LoadReport};

use laneway_core::{LaneOverrides, RoadNetwork};
use tracing::info;

use crate::dirty::DirtySet;

/// Current override data version. Bumped when the stored layout gains
/// fields older saves must be upgraded into.
pub const DATA_VERSION: u32 = 2;

enum LoadState {
    LegacyRepair,
    Validate,
    ValidateReferences,
    Done,
}

/// Runs the full pipeline against freshly loaded overrides.
pub fn run_load_pipeline(
    net: &RoadNetwork,
    overrides: &mut LaneOverrides,
    loaded_version: u32,
    dirty: &mut DirtySet,
) -> LoadReport {
    let mut report = LoadReport::new(loaded_version, overrides.node_count());
    let mut state = if loaded_version < DATA_VERSION {
        LoadState::LegacyRepair
    } else {
        LoadState::Validate
    };

    loop {
        state = match state {
            LoadState::LegacyRepair => {
                legacy::run(net, overrides, &mut report, dirty);
                LoadState::Validate
            }
            LoadState::Validate => {
                validate::run(net, overrides, &mut report, dirty);
                LoadState::ValidateReferences
            }
            LoadState::ValidateReferences => {
                references::run(net, overrides, &mut report, dirty);
                LoadState::Done
            }
            LoadState::Done => break,
        };
    }

    info!(
        loaded_version,
        checked = report.checked,
        affected = report.affected.len(),
        mutations = report.mutations,
        "{}",
        report.summary()
    );
    report
}
