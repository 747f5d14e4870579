//! Terminal front end for engine callbacks

use std::io::IsTerminal;

use dialoguer::Select;
use twinsync_core::config::OnError;
use twinsync_core::error::Result;
use twinsync_core::status::{AbortFlag, ErrorResponse, Phase, ProcessCallback};

/// Reports progress through `tracing` and asks about errors when allowed to
pub struct BatchStatusHandler {
    on_error: OnError,
    interactive: bool,
    abort: AbortFlag,
    items_total: usize,
    items_done: i64,
    bytes_done: i64,
    warnings: usize,
    errors: usize,
    stopped_on_error: bool,
}

impl BatchStatusHandler {
    /// Create a handler; prompts are shown only if stdin is a terminal
    pub fn new(on_error: OnError, abort: AbortFlag) -> Self {
        Self {
            on_error,
            interactive: std::io::stdin().is_terminal(),
            abort,
            items_total: 0,
            items_done: 0,
            bytes_done: 0,
            warnings: 0,
            errors: 0,
            stopped_on_error: false,
        }
    }

    /// Whether the user may be asked questions
    pub const fn is_interactive(&self) -> bool {
        self.interactive && matches!(self.on_error, OnError::Popup)
    }

    /// Warnings shown so far
    pub const fn warnings(&self) -> usize {
        self.warnings
    }

    /// Errors reported so far
    pub const fn errors(&self) -> usize {
        self.errors
    }

    /// Whether `on_error = exit` ended the run
    pub const fn stopped_on_error(&self) -> bool {
        self.stopped_on_error
    }

    /// Items processed in the current phase
    pub const fn items_done(&self) -> i64 {
        self.items_done
    }

    fn ask(prompt: &str, items: &[&str]) -> Option<usize> {
        match Select::new().with_prompt(prompt).items(items).default(0).interact() {
            Ok(choice) => Some(choice),
            Err(err) => {
                tracing::warn!("cannot show prompt: {err}");
                None
            }
        }
    }
}

impl ProcessCallback for BatchStatusHandler {
    fn init_new_phase(&mut self, items_total: usize, bytes_total: u64, phase: Phase) {
        self.items_total = items_total;
        self.items_done = 0;
        self.bytes_done = 0;
        match phase {
            Phase::Scanning => tracing::info!("scanning"),
            Phase::Comparing => tracing::info!(items = items_total, bytes = bytes_total, "comparing file content"),
            Phase::Synchronizing => tracing::info!(items = items_total, bytes = bytes_total, "synchronizing"),
        }
    }

    fn update_processed_data(&mut self, items_delta: i64, bytes_delta: i64) {
        self.items_done += items_delta;
        self.bytes_done += bytes_delta;
    }

    fn report_info(&mut self, text: &str) {
        tracing::info!(done = self.items_done, total = self.items_total, bytes = self.bytes_done, "{text}");
    }

    fn report_warning(&mut self, text: &str, warning_active: &mut bool) {
        if !*warning_active {
            return;
        }
        self.warnings += 1;
        eprintln!("Warning: {text}\n");

        if self.is_interactive() {
            match Self::ask("Continue?", &["Continue", "Continue and hide this warning", "Abort"]) {
                Some(1) => *warning_active = false,
                Some(2) | None => self.abort.request(),
                _ => {}
            }
        }
    }

    fn report_error(&mut self, text: &str) -> ErrorResponse {
        eprintln!("Error: {text}\n");

        match self.on_error {
            OnError::Ignore => {}
            OnError::Exit => {
                self.stopped_on_error = true;
                self.abort.request();
            }
            OnError::Popup if self.interactive => match Self::ask("How to proceed?", &["Retry", "Ignore", "Abort"]) {
                Some(0) => return ErrorResponse::Retry,
                Some(1) => {}
                _ => self.abort.request(),
            },
            OnError::Popup => {}
        }
        self.errors += 1;
        ErrorResponse::Ignore
    }

    fn request_ui_refresh(&mut self) -> Result<()> {
        self.abort.check()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn handler(on_error: OnError) -> BatchStatusHandler {
        BatchStatusHandler {
            interactive: false,
            ..BatchStatusHandler::new(on_error, AbortFlag::new())
        }
    }

    #[test]
    fn test_ignore_counts_errors() {
        let mut h = handler(OnError::Ignore);
        assert_eq!(h.report_error("Cannot open file"), ErrorResponse::Ignore);
        assert_eq!(h.errors(), 1);
        assert!(h.request_ui_refresh().is_ok());
    }

    #[test]
    fn test_exit_requests_abort() {
        let mut h = handler(OnError::Exit);
        h.report_error("Cannot open file");
        assert!(h.stopped_on_error());
        assert!(h.request_ui_refresh().unwrap_err().is_abort());
    }

    #[test]
    fn test_suppressed_warning_is_not_counted() {
        let mut h = handler(OnError::Popup);
        let mut active = false;
        h.report_warning("ignored", &mut active);
        let mut active = true;
        h.report_warning("shown", &mut active);
        assert_eq!(h.warnings(), 1);
        assert!(active);
    }
}
