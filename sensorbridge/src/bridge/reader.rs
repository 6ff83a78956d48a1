//! Hardware event reader thread.
//!
//! A dedicated `std::thread` blocks in [`SensorDevice::poll`] for the whole
//! lifetime of the bridge and fans received events out to the adaptors.
//!
//! The vendor poll call cannot be interrupted. Cancellation is therefore a
//! flag that is only looked at right before entering and right after
//! leaving `poll`: a batch that has started dispatching is always
//! dispatched completely. A reader that never comes back out of `poll` is
//! detected by [`Reader::cancel_and_join`] timing out, and the owner then
//! has no safe option left other than terminating the process.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc, Weak};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use super::wake_lock::WakeLock;
use super::HardwareBridge;
use crate::hal::{SensorDevice, SensorEvent};
use crate::sensor_type::SensorType;
use crate::tracing::prelude::*;

/// Maximum number of events fetched per poll.
pub const POLL_BATCH_SIZE: usize = 16;

/// Pause after a failed poll, keeps a broken device from spinning the CPU.
pub const POLL_ERROR_BACKOFF: Duration = Duration::from_secs(1);

/// Pause after a batch containing malformed events.
pub const MALFORMED_INPUT_BACKOFF: Duration = Duration::from_millis(50);

/// What a dispatched batch asks of the reader loop.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct BatchOutcome {
    /// A proximity event was seen, hold off suspend.
    pub block_suspend: bool,
    /// At least one event had an unexpected size tag.
    pub malformed: bool,
}

/// Error returned when the reader does not exit in time.
#[derive(Debug, thiserror::Error)]
#[error("Reader thread did not exit within {0:?}")]
pub struct ReaderStuck(pub Duration);

/// Handle to the running reader thread.
pub struct Reader {
    cancel: Arc<AtomicBool>,
    done_rx: mpsc::Receiver<()>,
    handle: JoinHandle<()>,
}

/// Signals thread exit when dropped, including on panic.
struct ExitNotifier(mpsc::Sender<()>);

impl Drop for ExitNotifier {
    fn drop(&mut self) {
        let _ = self.0.send(());
    }
}

impl Reader {
    /// Launch the reader thread.
    pub fn spawn(
        bridge: Weak<HardwareBridge>,
        device: Arc<dyn SensorDevice>,
        wake_lock: WakeLock,
    ) -> std::io::Result<Self> {
        let cancel = Arc::new(AtomicBool::new(false));
        let (done_tx, done_rx) = mpsc::channel();

        let thread_cancel = Arc::clone(&cancel);
        let handle = std::thread::Builder::new()
            .name("sensor-reader".into())
            .spawn(move || {
                let _notifier = ExitNotifier(done_tx);
                block_shutdown_signals();
                run_reader_loop(bridge, device, wake_lock, thread_cancel);
            })?;

        Ok(Self {
            cancel,
            done_rx,
            handle,
        })
    }

    /// Request the reader to stop and wait up to `timeout` for it to exit.
    ///
    /// The device should be closed first so that a pending poll returns.
    pub fn cancel_and_join(self, timeout: Duration) -> Result<(), ReaderStuck> {
        self.cancel.store(true, Ordering::Release);
        self.handle.thread().unpark();

        match self.done_rx.recv_timeout(timeout) {
            Ok(()) | Err(mpsc::RecvTimeoutError::Disconnected) => {
                if self.handle.join().is_err() {
                    warn!("Reader thread panicked");
                }
                Ok(())
            }
            Err(mpsc::RecvTimeoutError::Timeout) => Err(ReaderStuck(timeout)),
        }
    }
}

/// Leave SIGINT and SIGTERM to the thread that owns process lifecycle.
fn block_shutdown_signals() {
    // SAFETY: the signal set is initialized by sigemptyset before use and
    // pthread_sigmask only changes the calling thread's mask.
    let rc = unsafe {
        let mut set: libc::sigset_t = std::mem::zeroed();
        libc::sigemptyset(&mut set);
        libc::sigaddset(&mut set, libc::SIGINT);
        libc::sigaddset(&mut set, libc::SIGTERM);
        libc::pthread_sigmask(libc::SIG_BLOCK, &set, std::ptr::null_mut())
    };
    if rc != 0 {
        warn!(
            error = %std::io::Error::from_raw_os_error(rc),
            "Failed to mask signals in reader thread"
        );
    }
}

fn run_reader_loop(
    bridge: Weak<HardwareBridge>,
    device: Arc<dyn SensorDevice>,
    mut wake_lock: WakeLock,
    cancel: Arc<AtomicBool>,
) {
    let mut buffer = [SensorEvent::default(); POLL_BATCH_SIZE];

    debug!("Reader thread started");
    loop {
        if cancel.load(Ordering::Acquire) {
            break;
        }
        let result = device.poll(&mut buffer);
        if cancel.load(Ordering::Acquire) {
            break;
        }

        let count = match result {
            Ok(count) => count.min(buffer.len()),
            Err(e) => {
                warn!(error = %e, "Device poll failed");
                backoff(POLL_ERROR_BACKOFF, &cancel);
                continue;
            }
        };

        let Some(bridge) = bridge.upgrade() else {
            break;
        };
        let outcome = dispatch_batch(&bridge, &buffer[..count]);
        drop(bridge);

        if outcome.block_suspend {
            wake_lock.acquire();
        }
        if outcome.malformed {
            backoff(MALFORMED_INPUT_BACKOFF, &cancel);
        }
    }
    debug!("Reader thread exiting");
}

/// Sleep for `duration`, returning early once cancellation is requested.
fn backoff(duration: Duration, cancel: &AtomicBool) {
    let deadline = Instant::now() + duration;
    while !cancel.load(Ordering::Acquire) {
        let now = Instant::now();
        if now >= deadline {
            break;
        }
        std::thread::park_timeout(deadline - now);
    }
}

/// Deliver one polled batch.
pub(crate) fn dispatch_batch(bridge: &HardwareBridge, events: &[SensorEvent]) -> BatchOutcome {
    let mut outcome = BatchOutcome::default();

    for event in events {
        trace!(sensor_type = %event.sensor_type, handle = %event.sensor, "Event");

        // Real data arrived, the synthetic value is no longer needed
        bridge.clear_fallback(event);

        if !event.is_well_formed() {
            warn!(
                version = event.version,
                expected = SensorEvent::WIRE_SIZE,
                "Incorrect event version"
            );
            outcome.malformed = true;
        }
        if event.sensor_type == SensorType::PROXIMITY {
            outcome.block_suspend = true;
        }

        bridge.process_sample(event);
    }

    outcome
}
