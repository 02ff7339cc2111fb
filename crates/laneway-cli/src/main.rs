//! Lane-override tools CLI.
//!
//! Provides the `laneway` binary with subcommands for inspecting and
//! validating override databases: `list` enumerates saves, `show` dumps a
//! save's overrides as JSON, and `validate` runs the same load pipeline
//! the game runs at the save/load boundary, optionally writing the
//! repaired data back.

use std::process;

use clap::{Parser, Subcommand};
use serde::Serialize;

use laneway_core::{LaneOverrides, NodeId};
use laneway_engine::{run_load_pipeline, DirtySet, LoadReport, DATA_VERSION};
use laneway_storage::{OverrideStore, SaveId, SqliteStore};

/// Lane-connection override tools.
#[derive(Parser)]
#[command(name = "laneway", about = "Lane-connection override tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

/// Available subcommands.
#[derive(Subcommand)]
enum Commands {
    /// List stored saves with their data versions.
    List {
        /// Path to the override database file.
        #[arg(short, long)]
        db: String,
    },

    /// Dump a save's overrides as JSON.
    Show {
        /// Path to the override database file.
        #[arg(short, long)]
        db: String,

        /// Save ID to dump.
        #[arg(short, long)]
        save: i64,

        /// Restrict output to one node's overrides.
        #[arg(short, long)]
        node: Option<u32>,
    },

    /// Run the load pipeline over a save and print the report.
    Validate {
        /// Path to the override database file.
        #[arg(short, long)]
        db: String,

        /// Save ID to validate.
        #[arg(short, long)]
        save: i64,

        /// Write the repaired overrides back to the save.
        #[arg(long)]
        apply: bool,
    },
}

fn main() {
    tracing_subscriber::fmt::init();
    let cli = Cli::parse();

    let exit_code = match cli.command {
        Commands::List { db } => run_list(&db),
        Commands::Show { db, save, node } => run_show(&db, save, node.map(NodeId)),
        Commands::Validate { db, save, apply } => run_validate(&db, save, apply),
    };
    process::exit(exit_code);
}

/// Execute the list subcommand.
///
/// Returns exit code: 0 = success, 3 = I/O error.
fn run_list(db_path: &str) -> i32 {
    let store = match open(db_path) {
        Ok(s) => s,
        Err(code) => return code,
    };
    match store.list_saves() {
        Ok(saves) => {
            print_json(&saves);
            0
        }
        Err(e) => {
            eprintln!("Error: failed to list saves: {}", e);
            3
        }
    }
}

/// One node's overrides in `show` output.
#[derive(Serialize)]
struct NodeDump {
    node: NodeId,
    entries: Vec<EntryDump>,
}

#[derive(Serialize)]
struct EntryDump {
    entry: laneway_core::ModifiedConnection,
    holder: Option<laneway_core::OverrideHolder>,
}

/// Execute the show subcommand.
///
/// Returns exit code: 0 = success, 3 = I/O error.
fn run_show(db_path: &str, save_id: i64, node: Option<NodeId>) -> i32 {
    let store = match open(db_path) {
        Ok(s) => s,
        Err(code) => return code,
    };
    let (overrides, data_version) = match store.load_overrides(SaveId(save_id)) {
        Ok(loaded) => loaded,
        Err(e) => {
            eprintln!("Error: failed to load save {}: {}", save_id, e);
            return 3;
        }
    };

    let nodes: Vec<NodeId> = match node {
        Some(node) => vec![node],
        None => overrides.nodes().collect(),
    };
    let dump: Vec<NodeDump> = nodes
        .into_iter()
        .map(|node| NodeDump {
            node,
            entries: overrides
                .entries(node)
                .iter()
                .map(|entry| EntryDump {
                    entry: *entry,
                    holder: overrides.holder(entry.holder).cloned(),
                })
                .collect(),
        })
        .collect();

    print_json(&serde_json::json!({
        "save": save_id,
        "data_version": data_version,
        "nodes": dump,
    }));
    0
}

/// Execute the validate subcommand.
///
/// Returns exit code: 0 = clean, 1 = issues found, 3 = I/O error.
fn run_validate(db_path: &str, save_id: i64, apply: bool) -> i32 {
    let mut store = match open(db_path) {
        Ok(s) => s,
        Err(code) => return code,
    };
    let id = SaveId(save_id);

    let net = match store.load_network(id) {
        Ok(net) => net,
        Err(e) => {
            eprintln!("Error: failed to load network snapshot: {}", e);
            return 3;
        }
    };
    let (mut overrides, loaded_version) = match store.load_overrides(id) {
        Ok(loaded) => loaded,
        Err(e) => {
            eprintln!("Error: failed to load save {}: {}", save_id, e);
            return 3;
        }
    };

    let mut dirty = DirtySet::new();
    let report = run_load_pipeline(&net, &mut overrides, loaded_version, &mut dirty);

    if apply {
        if let Err(e) = write_back(&mut store, id, &overrides) {
            eprintln!("Error: failed to write repaired overrides: {}", e);
            return 3;
        }
    }
    print_report(&report, apply);
    if report.is_clean() {
        0
    } else {
        1
    }
}

fn open(db_path: &str) -> Result<SqliteStore, i32> {
    SqliteStore::new(db_path).map_err(|e| {
        eprintln!("Error: failed to open database '{}': {}", db_path, e);
        3
    })
}

fn write_back(
    store: &mut SqliteStore,
    id: SaveId,
    overrides: &LaneOverrides,
) -> Result<(), laneway_storage::StorageError> {
    // A repaired save is a current-version save regardless of what it
    // was loaded as.
    store.save_overrides(id, overrides, DATA_VERSION)
}

fn print_report(report: &LoadReport, applied: bool) {
    print_json(&serde_json::json!({
        "summary": report.summary(),
        "applied": applied,
        "report": report,
    }));
}

/// Print a value as pretty JSON to stdout for machine-readable output.
fn print_json<T: Serialize>(value: &T) {
    let json = serde_json::to_string_pretty(value)
        .unwrap_or_else(|e| format!("{{\"error\": \"failed to serialize output: {}\"}}", e));
    println!("{}", json);
}
