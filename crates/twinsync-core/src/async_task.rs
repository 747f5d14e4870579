//! Detached calls with bounded polling
//!
//! A probe of a slow or hung network path may block for a long time. The probe
//! runs on a detached thread while the caller polls with a short timeout and
//! gets a refresh hook (which may abort) on every poll.

use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::thread;
use std::time::{Duration, Instant};

use crate::error::{Result, SyncError};

/// Poll interval used by the engine while waiting on a probe
pub const UI_UPDATE_INTERVAL: Duration = Duration::from_millis(100);

/// Handle to a result computed on a detached thread
pub struct AsyncTask<T> {
    receiver: Receiver<T>,
}

/// Run `f` on a detached thread
pub fn run_async<T, F>(f: F) -> AsyncTask<T>
where
    T: Send + 'static,
    F: FnOnce() -> T + Send + 'static,
{
    let (sender, receiver) = mpsc::channel();
    thread::spawn(move || {
        // the receiver may be gone if the caller aborted
        let _ = sender.send(f());
    });
    AsyncTask { receiver }
}

impl<T> AsyncTask<T> {
    /// Wait for the result, calling `on_poll` every `interval`
    ///
    /// # Errors
    ///
    /// Propagates errors from `on_poll` (typically an abort) and reports an
    /// internal error if the worker thread died without a result.
    pub fn wait_with_refresh<F>(self, interval: Duration, mut on_poll: F) -> Result<T>
    where
        F: FnMut() -> Result<()>,
    {
        loop {
            match self.receiver.recv_timeout(interval) {
                Ok(value) => return Ok(value),
                Err(RecvTimeoutError::Timeout) => on_poll()?,
                Err(RecvTimeoutError::Disconnected) => {
                    return Err(SyncError::Internal(
                        "worker thread terminated without a result".to_string(),
                    ));
                }
            }
        }
    }
}

/// Whether `path` is an existing, listable directory
#[must_use]
pub fn dir_available(path: &Path) -> bool {
    std::fs::read_dir(path).is_ok()
}

/// [`dir_available`] on a detached thread, refreshing while it runs
///
/// # Errors
///
/// Propagates errors from `on_poll`.
pub fn probe_dir_available<F>(path: &Path, on_poll: F) -> Result<bool>
where
    F: FnMut() -> Result<()>,
{
    let path = path.to_path_buf();
    run_async(move || dir_available(&path)).wait_with_refresh(UI_UPDATE_INTERVAL, on_poll)
}

/// Block until every directory in `paths` is available
///
/// Unavailable directories are re-checked every `check_interval`; `on_poll`
/// runs at least every [`UI_UPDATE_INTERVAL`] with the directory being waited on.
///
/// # Errors
///
/// Propagates errors from `on_poll`.
pub fn wait_for_missing_dirs<F>(
    paths: &[PathBuf],
    check_interval: Duration,
    mut on_poll: F,
) -> Result<()>
where
    F: FnMut(&Path) -> Result<()>,
{
    loop {
        let mut missing = None;
        for path in paths {
            if !probe_dir_available(path, || on_poll(path))? {
                missing = Some(path);
                break;
            }
        }

        let Some(path) = missing else {
            return Ok(());
        };

        tracing::info!("waiting for directory {}", path.display());
        let started = Instant::now();
        while started.elapsed() < check_interval {
            on_poll(path)?;
            thread::sleep(UI_UPDATE_INTERVAL.min(check_interval));
        }
    }
}
