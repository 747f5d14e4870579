//! Status reporting between the engine and its front end
//!
//! The engine never talks to a terminal or window directly. Everything that
//! needs user attention (progress, warnings, retry/ignore decisions, abort
//! requests) goes through a [`ProcessCallback`].

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::error::{Result, SyncError};

/// Answer to a failed filesystem operation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorResponse {
    /// Run the operation again
    Retry,
    /// Skip the item and continue
    Ignore,
}

/// Stage of a run, announced through [`ProcessCallback::init_new_phase`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Reading both directory trees
    Scanning,
    /// Comparing file content
    Comparing,
    /// Executing the synchronization plan
    Synchronizing,
}

/// Callback interface implemented by front ends
pub trait ProcessCallback {
    /// Start a new phase with its expected workload
    fn init_new_phase(&mut self, items_total: usize, bytes_total: u64, phase: Phase);

    /// Account for processed work; deltas may be negative to undo a failed attempt
    fn update_processed_data(&mut self, items_delta: i64, bytes_delta: i64);

    /// Informational status line
    fn report_info(&mut self, text: &str);

    /// Warning the user may suppress for the rest of the run by clearing `warning_active`
    fn report_warning(&mut self, text: &str, warning_active: &mut bool);

    /// Ask how to proceed after a failed filesystem operation
    fn report_error(&mut self, text: &str) -> ErrorResponse;

    /// Periodic refresh point
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Abort`] if the user asked to cancel.
    fn request_ui_refresh(&mut self) -> Result<()>;
}

/// Thread-safe abort request shared between a front end and the engine
#[derive(Debug, Clone, Default)]
pub struct AbortFlag(Arc<AtomicBool>);

impl AbortFlag {
    /// Create a flag that is not yet raised
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Ask the engine to stop at the next work unit
    pub fn request(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    /// Whether abort was requested
    #[must_use]
    pub fn is_requested(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    /// `Err(Abort)` once the flag is raised
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Abort`] if abort was requested.
    pub fn check(&self) -> Result<()> {
        if self.is_requested() {
            Err(SyncError::Abort)
        } else {
            Ok(())
        }
    }
}

/// Run `op` until it succeeds or the user ignores the failure
///
/// File errors are routed to [`ProcessCallback::report_error`]; `Retry` runs
/// the operation again, `Ignore` yields `Ok(None)`. Any other error (abort,
/// fatal) propagates unchanged.
///
/// # Errors
///
/// Returns every non-file error produced by `op`.
pub fn try_reporting_error<T, C, F>(callback: &mut C, mut op: F) -> Result<Option<T>>
where
    C: ProcessCallback + ?Sized,
    F: FnMut(&mut C) -> Result<T>,
{
    loop {
        match op(callback) {
            Ok(value) => return Ok(Some(value)),
            Err(SyncError::File(err)) => match callback.report_error(err.message()) {
                ErrorResponse::Retry => {
                    tracing::debug!("retrying after: {}", err.message());
                }
                ErrorResponse::Ignore => {
                    tracing::warn!("ignored: {}", err.message());
                    return Ok(None);
                }
            },
            Err(other) => return Err(other),
        }
    }
}

/// Callback that records everything and ignores all errors
///
/// Used for non-interactive runs and tests.
#[derive(Debug, Default)]
pub struct CollectingCallback {
    /// Info lines in order of arrival
    pub infos: Vec<String>,
    /// Warnings in order of arrival
    pub warnings: Vec<String>,
    /// Errors in order of arrival
    pub errors: Vec<String>,
    /// Phases announced so far
    pub phases: Vec<Phase>,
    /// Sum of processed item deltas
    pub items_processed: i64,
    /// Sum of processed byte deltas
    pub bytes_processed: i64,
    abort: AbortFlag,
}

impl CollectingCallback {
    /// Create a callback that never aborts on its own
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a callback honoring an external abort flag
    #[must_use]
    pub fn with_abort(abort: AbortFlag) -> Self {
        Self {
            abort,
            ..Self::default()
        }
    }
}

impl ProcessCallback for CollectingCallback {
    fn init_new_phase(&mut self, _items_total: usize, _bytes_total: u64, phase: Phase) {
        self.phases.push(phase);
    }

    fn update_processed_data(&mut self, items_delta: i64, bytes_delta: i64) {
        self.items_processed += items_delta;
        self.bytes_processed += bytes_delta;
    }

    fn report_info(&mut self, text: &str) {
        self.infos.push(text.to_string());
    }

    fn report_warning(&mut self, text: &str, warning_active: &mut bool) {
        if *warning_active {
            self.warnings.push(text.to_string());
        }
    }

    fn report_error(&mut self, text: &str) -> ErrorResponse {
        self.errors.push(text.to_string());
        ErrorResponse::Ignore
    }

    fn request_ui_refresh(&mut self) -> Result<()> {
        self.abort.check()
    }
}
