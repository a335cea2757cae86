//! Run status: single-flight guard and last-success timestamp

use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

use chrono::{DateTime, Utc};

/// Tracks whether a refresh run is in progress and when one last finished
/// clean. At most one [`RunToken`] exists at a time, which is what makes
/// concurrent runs impossible.
#[derive(Debug, Default)]
pub struct RunStatus {
    running: AtomicBool,
    last_success: Mutex<Option<DateTime<Utc>>>,
}

impl RunStatus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim the run slot. `None` means a run is already in progress.
    pub fn try_begin(&self) -> Option<RunToken<'_>> {
        self.running
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
            .then_some(RunToken { status: self })
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// When the last fully clean run finished.
    pub fn last_success(&self) -> Option<DateTime<Utc>> {
        *self
            .last_success
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn record_success(&self, at: DateTime<Utc>) {
        *self
            .last_success
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = Some(at);
    }
}

/// Held for the duration of one run; dropping it frees the run slot.
#[derive(Debug)]
pub struct RunToken<'a> {
    status: &'a RunStatus,
}

impl RunToken<'_> {
    /// Record the run as fully successful.
    pub fn succeed(&self, at: DateTime<Utc>) {
        self.status.record_success(at);
    }
}

impl Drop for RunToken<'_> {
    fn drop(&mut self) {
        self.status.running.store(false, Ordering::SeqCst);
    }
}
