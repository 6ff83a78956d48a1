//! Best-effort temporary wake lock.
//!
//! Proximity changes often happen while the display is off. Writing a
//! timed lock request to the power-management interface keeps the system
//! from suspending before those samples have been passed on.

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::PathBuf;

use crate::tracing::prelude::*;

/// Default power-management control path.
pub const DEFAULT_WAKE_LOCK_PATH: &str = "/sys/power/wake_lock";

/// Lock request: lock name and timeout in nanoseconds (one second).
const WAKE_LOCK_REQUEST: &[u8] = b"sensorbridge_pass_data 1000000000\n";

enum State {
    Untried,
    Open(File),
    Unavailable,
}

/// Timed wake lock, opened on first use.
///
/// If the control path cannot be opened, or a write to it fails, wake locks
/// are disabled for the rest of the process.
pub struct WakeLock {
    path: PathBuf,
    state: State,
}

impl WakeLock {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            state: State::Untried,
        }
    }

    /// Request a short wake lock. Returns whether the request was written.
    pub fn acquire(&mut self) -> bool {
        if let State::Untried = self.state {
            self.state = match OpenOptions::new().read(true).write(true).open(&self.path) {
                Ok(file) => State::Open(file),
                Err(e) => {
                    warn!(path = %self.path.display(), error = %e, "Wake locks not available");
                    State::Unavailable
                }
            };
        }

        let State::Open(file) = &mut self.state else {
            return false;
        };

        debug!("Wake lock to guard sensor data io");
        if let Err(e) = file.write_all(WAKE_LOCK_REQUEST) {
            warn!(error = %e, "Wake locking failed");
            self.state = State::Unavailable;
            return false;
        }
        true
    }

    pub fn is_available(&self) -> bool {
        !matches!(self.state, State::Unavailable)
    }
}
