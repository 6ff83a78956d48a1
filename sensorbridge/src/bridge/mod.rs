//! Hardware bridge.
//!
//! The bridge owns the single connection to the vendor sensor module. It
//! enumerates the physical sensors once at startup, keeps the runtime state
//! of each one (applied delay, activation, armed fallback sample), and runs
//! the reader thread that fans hardware events out to the registered
//! adaptors.
//!
//! # Locking
//!
//! The handle and type lookup tables are built before the reader thread is
//! started and are read-only afterwards. The per-sensor runtime state lives
//! in one arena indexed like the sensor list and guarded by a single mutex.
//! Hardware control calls are made with that mutex held, so the recorded
//! state always matches what was last applied to the device. The reader
//! takes the same mutex to disarm fallback samples while dispatching, so a
//! slow vendor `activate` or `set_delay` delays dispatch for all sensors
//! until it returns.
//!
//! Adaptors are registered as weak references: the bridge knows which
//! adaptors exist for each type but does not keep them alive.
//!
//! # Degraded mode
//!
//! If the module or device cannot be opened the bridge still constructs,
//! with zero physical sensors. Every query then returns a neutral value and
//! every adaptor ends up invalid, but the daemon keeps running.

mod reader;
mod state;
mod wake_lock;

#[cfg(test)]
pub(crate) use reader::dispatch_batch;
pub use reader::{BatchOutcome, ReaderStuck, MALFORMED_INPUT_BACKOFF, POLL_BATCH_SIZE};
pub use state::{normalize_delays, DelayRange, PhysicalSensorState, DEFAULT_DELAY_MS};
pub use wake_lock::{WakeLock, DEFAULT_WAKE_LOCK_PATH};

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;

use crate::adaptor::SensorAdaptor;
use crate::config::BridgeConfig;
use crate::error::{Error, Result};
use crate::hal::{
    ApiVersion, HalError, SensorDescriptor, SensorDevice, SensorEvent, SensorHandle, SensorModule,
};
use crate::sensor_type::SensorType;
use crate::tracing::prelude::*;
use reader::Reader;

/// How long shutdown waits for the reader thread.
pub const READER_JOIN_TIMEOUT: Duration = Duration::from_secs(3);

/// Orientation sensors other than the calibrated compass report another
/// range and are skipped.
const COMPASS_MAX_RANGE: f32 = 360.0;

/// Opened module and device.
struct Hal {
    // Kept for the lifetime of the device
    _module: Box<dyn SensorModule>,
    device: Arc<dyn SensorDevice>,
}

/// Result of enumerating the hardware sensor list.
struct Enumeration {
    index_of_handle: HashMap<SensorHandle, usize>,
    index_of_type: HashMap<SensorType, usize>,
    states: Vec<PhysicalSensorState>,
    /// Startup delay for each selected, adjustable sensor.
    startup_delays: Vec<Option<i32>>,
}

/// Select the sensors to use and prepare their runtime state.
///
/// The first entry of each type wins; later entries of the same type are
/// only reachable by handle. Orientation entries are only used when they
/// report the calibrated compass range.
fn enumerate(sensors: &[SensorDescriptor], max_delay_reported: bool) -> Enumeration {
    let mut result = Enumeration {
        index_of_handle: HashMap::new(),
        index_of_type: HashMap::new(),
        states: vec![PhysicalSensorState::default(); sensors.len()],
        startup_delays: vec![None; sensors.len()],
    };

    for (index, sensor) in sensors.iter().enumerate() {
        result.index_of_handle.insert(sensor.handle, index);

        let mut selected = !result.index_of_type.contains_key(&sensor.sensor_type);
        if sensor.sensor_type == SensorType::ORIENTATION && sensor.max_range != COMPASS_MAX_RANGE
        {
            selected = false;
        }

        debug!(
            sensor_type = %sensor.sensor_type,
            handle = %sensor.handle,
            name = %sensor.name,
            "{}",
            if selected { "SELECT" } else { "IGNORE" }
        );
        if !selected {
            continue;
        }

        let max_delay_us = max_delay_reported.then_some(sensor.max_delay_us);
        if let Some(range) = state::normalize_delays(sensor.min_delay_us, max_delay_us) {
            let state = &mut result.states[index];
            state.min_delay = range.min;
            state.max_delay = range.max;
            result.startup_delays[index] = Some(range.default);
        }
        result.states[index].fallback = state::fallback_event(sensor);
        result.index_of_type.insert(sensor.sensor_type, index);
    }

    result
}

/// The process-wide bridge to the sensor hardware.
///
/// Construct one with [`HardwareBridge::start`], hand clones of the `Arc`
/// to every adaptor, and call [`HardwareBridge::shutdown`] before exit.
pub struct HardwareBridge {
    hal: Option<Hal>,
    sensors: Vec<SensorDescriptor>,
    index_of_handle: HashMap<SensorHandle, usize>,
    index_of_type: HashMap<SensorType, usize>,
    states: Mutex<Vec<PhysicalSensorState>>,
    adaptors: Mutex<HashMap<SensorType, Vec<Weak<SensorAdaptor>>>>,
    reader: Mutex<Option<Reader>>,
    initialized: AtomicBool,
    shut_down: AtomicBool,
}

impl HardwareBridge {
    /// Open the device, prime every sensor and launch the reader thread.
    ///
    /// Never fails: when the hardware is unavailable the bridge runs with
    /// zero sensors, and when the reader cannot be launched no samples are
    /// delivered.
    pub fn start(
        module: std::result::Result<Box<dyn SensorModule>, HalError>,
        config: &BridgeConfig,
    ) -> Arc<Self> {
        let opened = module.and_then(|module| {
            let device = module.open_device()?;
            Ok((module, device))
        });
        let (module, device) = match opened {
            Ok(opened) => opened,
            Err(e) => {
                warn!(error = %e, "Sensor hardware unavailable, continuing without sensors");
                return Arc::new(Self::degraded());
            }
        };

        let sensors = module.sensor_list();
        let api_version = device.api_version();
        info!(
            module = module.name(),
            api = %api_version,
            sensors = sensors.len(),
            "Sensor device opened"
        );

        let enumeration = enumerate(&sensors, api_version >= ApiVersion::V1_3);
        let bridge = Arc::new(Self {
            hal: Some(Hal {
                _module: module,
                device: Arc::clone(&device),
            }),
            sensors,
            index_of_handle: enumeration.index_of_handle,
            index_of_type: enumeration.index_of_type,
            states: Mutex::new(enumeration.states),
            adaptors: Mutex::new(HashMap::new()),
            reader: Mutex::new(None),
            initialized: AtomicBool::new(false),
            shut_down: AtomicBool::new(false),
        });
        bridge.prime(&enumeration.startup_delays);

        match Reader::spawn(
            Arc::downgrade(&bridge),
            device,
            WakeLock::new(&config.wake_lock_path),
        ) {
            Ok(reader) => {
                *bridge.lock_reader() = Some(reader);
                bridge.initialized.store(true, Ordering::Release);
            }
            Err(e) => error!(error = %e, "Failed to start reader thread"),
        }

        bridge
    }

    fn degraded() -> Self {
        Self {
            hal: None,
            sensors: Vec::new(),
            index_of_handle: HashMap::new(),
            index_of_type: HashMap::new(),
            states: Mutex::new(Vec::new()),
            adaptors: Mutex::new(HashMap::new()),
            reader: Mutex::new(None),
            initialized: AtomicBool::new(false),
            shut_down: AtomicBool::new(false),
        }
    }

    /// Bring every sensor into a configured but inactive state.
    ///
    /// Some vendor implementations do not report until a delay has been set,
    /// so selected sensors get the startup delay applied while active.
    fn prime(&self, startup_delays: &[Option<i32>]) {
        for (sensor, delay) in self.sensors.iter().zip(startup_delays) {
            if let Some(delay) = *delay {
                let _ = self.set_active(sensor.handle, true);
                let _ = self.set_delay(sensor.handle, delay);
                debug!(
                    sensor_type = %sensor.sensor_type,
                    delay_ms = delay,
                    min_ms = self.min_delay(sensor.handle),
                    max_ms = self.max_delay(sensor.handle),
                    "Startup delay applied"
                );
            }
            let _ = self.set_active(sensor.handle, false);
        }
    }

    /// Whether the device is open and the reader thread is running.
    pub fn is_initialized(&self) -> bool {
        self.initialized.load(Ordering::Acquire)
    }

    /// All sensors reported by the hardware, selected or not.
    pub fn sensors(&self) -> &[SensorDescriptor] {
        &self.sensors
    }

    fn lock_states(&self) -> MutexGuard<'_, Vec<PhysicalSensorState>> {
        self.states.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_adaptors(&self) -> MutexGuard<'_, HashMap<SensorType, Vec<Weak<SensorAdaptor>>>> {
        self.adaptors.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_reader(&self) -> MutexGuard<'_, Option<Reader>> {
        self.reader.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn index_for_handle(&self, handle: SensorHandle) -> Option<usize> {
        let index = self.index_of_handle.get(&handle).copied();
        if index.is_none() {
            warn!(handle = %handle, "Invalid sensor handle");
        }
        index
    }

    /// Handle of the physical sensor selected for `sensor_type`.
    pub fn handle_for_type(&self, sensor_type: SensorType) -> Option<SensorHandle> {
        match self.index_of_type.get(&sensor_type) {
            Some(&index) => Some(self.sensors[index].handle),
            None => {
                warn!(sensor_type = %sensor_type, "Invalid sensor type");
                None
            }
        }
    }

    fn device(&self) -> Result<&Arc<dyn SensorDevice>> {
        self.hal.as_ref().map(|hal| &hal.device).ok_or(Error::Unavailable)
    }

    pub fn max_range(&self, handle: SensorHandle) -> f32 {
        let Some(index) = self.index_for_handle(handle) else {
            return 0.0;
        };
        let sensor = &self.sensors[index];
        trace!(sensor_type = %sensor.sensor_type, range = sensor.max_range, "getMaxRange");
        sensor.max_range
    }

    pub fn resolution(&self, handle: SensorHandle) -> f32 {
        let Some(index) = self.index_for_handle(handle) else {
            return 0.0;
        };
        let sensor = &self.sensors[index];
        trace!(sensor_type = %sensor.sensor_type, resolution = sensor.resolution, "getResolution");
        sensor.resolution
    }

    /// Minimum delay in milliseconds.
    pub fn min_delay(&self, handle: SensorHandle) -> i32 {
        self.index_for_handle(handle)
            .map(|index| self.lock_states()[index].min_delay)
            .unwrap_or(0)
    }

    /// Maximum delay in milliseconds.
    pub fn max_delay(&self, handle: SensorHandle) -> i32 {
        self.index_for_handle(handle)
            .map(|index| self.lock_states()[index].max_delay)
            .unwrap_or(0)
    }

    /// Delay last applied to the hardware, in milliseconds.
    pub fn delay(&self, handle: SensorHandle) -> Option<i32> {
        self.index_for_handle(handle)
            .and_then(|index| self.lock_states()[index].delay)
    }

    pub fn active(&self, handle: SensorHandle) -> bool {
        self.index_for_handle(handle)
            .map(|index| self.lock_states()[index].active == Some(true))
            .unwrap_or(false)
    }

    /// Apply a sampling delay in milliseconds.
    ///
    /// Does not touch the hardware when the delay is already applied.
    pub fn set_delay(&self, handle: SensorHandle, delay_ms: i32) -> Result<()> {
        let index = self
            .index_for_handle(handle)
            .ok_or(Error::InvalidHandle(handle))?;
        let mut states = self.lock_states();
        self.apply_delay(index, &mut states[index], delay_ms)
    }

    fn apply_delay(
        &self,
        index: usize,
        state: &mut PhysicalSensorState,
        delay_ms: i32,
    ) -> Result<()> {
        let sensor = &self.sensors[index];
        if state.delay == Some(delay_ms) {
            trace!(sensor_type = %sensor.sensor_type, delay_ms, "setDelay: no change");
            return Ok(());
        }

        let delay_ns = i64::from(delay_ms) * 1_000_000;
        match self.device()?.set_delay(sensor.handle, delay_ns) {
            Ok(()) => {
                debug!(sensor_type = %sensor.sensor_type, delay_ms, "setDelay: success");
                state.delay = Some(delay_ms);
                Ok(())
            }
            Err(e) => {
                warn!(sensor_type = %sensor.sensor_type, delay_ms, error = %e, "setDelay failed");
                Err(e.into())
            }
        }
    }

    /// Enable or disable a sensor.
    ///
    /// Does not touch the hardware when the state is already applied. On
    /// every transition to active the recorded delay is sent again, as
    /// vendors may drop it while the sensor is disabled.
    pub fn set_active(&self, handle: SensorHandle, active: bool) -> Result<()> {
        let index = self
            .index_for_handle(handle)
            .ok_or(Error::InvalidHandle(handle))?;
        let sensor = &self.sensors[index];
        let mut states = self.lock_states();
        let state = &mut states[index];

        if state.active == Some(active) {
            trace!(sensor_type = %sensor.sensor_type, active, "setActive: no change");
            return Ok(());
        }

        if let Err(e) = self.device()?.activate(sensor.handle, active) {
            warn!(sensor_type = %sensor.sensor_type, active, error = %e, "setActive failed");
            return Err(e.into());
        }
        debug!(sensor_type = %sensor.sensor_type, active, "setActive: success");
        state.active = Some(active);

        if active {
            if let Some(delay_ms) = state.delay.take() {
                debug!(sensor_type = %sensor.sensor_type, delay_ms, "Forcing delay update");
                // Failure is logged by apply_delay; activation itself succeeded
                let _ = self.apply_delay(index, state, delay_ms);
            }
        }
        Ok(())
    }

    /// Armed fallback sample of a sensor, if any.
    pub fn fallback(&self, handle: SensorHandle) -> Option<SensorEvent> {
        self.index_for_handle(handle)
            .and_then(|index| self.lock_states()[index].fallback)
    }

    /// Take the armed fallback sample of the given sensor.
    ///
    /// Returns it only if it is still armed and belongs to exactly this
    /// handle and type; it is disarmed in the same step.
    pub fn take_fallback(
        &self,
        handle: SensorHandle,
        sensor_type: SensorType,
    ) -> Option<SensorEvent> {
        let index = self.index_for_handle(handle)?;
        let key = SensorEvent::new(handle, sensor_type, 0);
        self.lock_states()[index].take_fallback(&key)
    }

    /// Disarm the fallback of the sensor an incoming event belongs to.
    fn clear_fallback(&self, event: &SensorEvent) {
        let Some(&index) = self.index_of_handle.get(&event.sensor) else {
            return;
        };
        if self.lock_states()[index].take_fallback(event).is_some() {
            trace!(sensor_type = %event.sensor_type, "Fallback cleared by real data");
        }
    }

    /// Add an adaptor to the set receiving samples of its type.
    ///
    /// Invalid adaptors and repeated registrations are ignored.
    pub fn register_adaptor(&self, adaptor: &Arc<SensorAdaptor>) {
        if !adaptor.is_valid() {
            return;
        }
        let mut adaptors = self.lock_adaptors();
        let members = adaptors.entry(adaptor.sensor_type()).or_default();
        members.retain(|member| member.strong_count() > 0);
        if members.iter().any(|member| member.as_ptr() == Arc::as_ptr(adaptor)) {
            return;
        }
        members.push(Arc::downgrade(adaptor));
    }

    fn is_registered(&self, adaptor: &SensorAdaptor) -> bool {
        self.lock_adaptors()
            .get(&adaptor.sensor_type())
            .is_some_and(|members| {
                members
                    .iter()
                    .any(|member| std::ptr::eq(member.as_ptr(), adaptor))
            })
    }

    fn registered_adaptors(&self) -> Vec<Arc<SensorAdaptor>> {
        self.lock_adaptors()
            .values()
            .flatten()
            .filter_map(Weak::upgrade)
            .collect()
    }

    /// Activate the physical sensor of a registered adaptor.
    ///
    /// Unregistered adaptors are ignored.
    pub fn start_reader(&self, adaptor: &SensorAdaptor) -> Result<()> {
        let Some(handle) = adaptor.handle() else {
            return Ok(());
        };
        if !self.is_registered(adaptor) {
            return Ok(());
        }
        debug!(adaptor = adaptor.id(), handle = %handle, "Activating");
        self.set_active(handle, true)
    }

    /// Deactivate the physical sensor of a registered adaptor.
    pub fn stop_reader(&self, adaptor: &SensorAdaptor) -> Result<()> {
        let Some(handle) = adaptor.handle() else {
            return Ok(());
        };
        if !self.is_registered(adaptor) {
            return Ok(());
        }
        debug!(adaptor = adaptor.id(), handle = %handle, "Deactivating");
        self.set_active(handle, false)
    }

    /// Deliver a sample to every running adaptor of its type.
    pub fn process_sample(&self, event: &SensorEvent) {
        let targets: Vec<_> = self
            .lock_adaptors()
            .get(&event.sensor_type)
            .map(|members| members.iter().filter_map(Weak::upgrade).collect())
            .unwrap_or_default();

        for adaptor in targets {
            if adaptor.is_running() {
                adaptor.process_sample(event);
            }
        }
    }

    /// Stop all adaptors, close the device and stop the reader thread.
    ///
    /// If the reader is stuck inside the vendor poll call and does not exit
    /// within [`READER_JOIN_TIMEOUT`], the process is terminated right away:
    /// releasing resources the vendor code may still be using is not safe.
    pub fn shutdown(&self) {
        if self.shut_down.swap(true, Ordering::AcqRel) {
            return;
        }

        debug!("Stopping all sensors");
        for adaptor in self.registered_adaptors() {
            adaptor.stop_sensor();
        }

        if let Some(hal) = &self.hal {
            debug!("Closing sensor device");
            if let Err(e) = hal.device.close() {
                warn!(error = %e, "Closing sensor device failed");
            }
        }

        let reader = self.lock_reader().take();
        if let Some(reader) = reader {
            debug!("Waiting for reader thread to exit");
            match reader.cancel_and_join(READER_JOIN_TIMEOUT) {
                Ok(()) => debug!("Reader thread terminated"),
                Err(e) => {
                    error!(error = %e, "Reader thread stuck in hardware poll, terminating");
                    terminate_process();
                }
            }
        }
        self.initialized.store(false, Ordering::Release);
    }
}

fn terminate_process() -> ! {
    // SAFETY: _exit takes no pointers and never returns.
    unsafe { libc::_exit(libc::EXIT_FAILURE) }
}
