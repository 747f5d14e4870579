//! # twinsync-core
//!
//! Comparison and synchronization engine for folder pairs.
//!
//! The data flow of one run is:
//!
//! 1. [`comparison::CompareProcess`] builds a [`hierarchy::FolderComparison`]
//!    with one arena tree per folder pair.
//! 2. [`filter`] marks items active or inactive without removing them.
//! 3. [`direction`] assigns a sync direction (or an unresolved conflict) to
//!    every item, consulting the [`database`] in automatic mode.
//! 4. [`sync::SyncProcess`] executes the plan and persists the new database.

#![warn(missing_docs)]
#![warn(clippy::all)]

/// Error taxonomy shared by all engine layers
pub mod error;

/// Progress, warning and retry/ignore callbacks
pub mod status;

/// Detached probes with bounded polling
pub mod async_task;

/// Arena-based model of a compared folder pair
pub mod hierarchy;

/// Low-level filesystem operations
pub mod native;

/// Tree traversal and item classification
pub mod comparison;

/// Hard (name) and soft (time/size) filtering
pub mod filter;

/// Persisted state of the last successful synchronization
pub mod database;

/// Sync direction resolution (explicit and automatic)
pub mod direction;

/// Configuration file parsing and management
pub mod config;

/// Execution of the synchronization plan
pub mod sync;

/// Suffix of files written during a copy before they are renamed into place
pub const TEMP_FILE_ENDING: &str = ".tws_tmp";

/// Default file name of a folder pair's sync database
pub const SYNC_DB_FILE_NAME: &str = "sync.tws_db";
