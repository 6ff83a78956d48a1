//! Simulated sensor module.
//!
//! Provides a virtual sensor module that behaves like a vendor module
//! without any hardware attached. Useful for testing and for running the
//! daemon on development machines.
//!
//! The device records every control call it receives and can be scripted:
//! event batches and poll failures can be queued, control calls can be made
//! to fail for a given handle, and `poll` can be made to hang forever to
//! model a vendor blob that never returns. When sample generation is enabled,
//! active sensors also produce synthetic events at their configured delay.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use super::{
    ApiVersion, HalError, SensorDescriptor, SensorDevice, SensorEvent, SensorHandle, SensorModule,
};
use crate::sensor_type::SensorType;

/// Period used for generated samples when no delay has been set.
const DEFAULT_GENERATION_PERIOD: Duration = Duration::from_millis(200);

/// A control call received by a [`SimulatedDevice`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HalCall {
    Activate(SensorHandle, bool),
    SetDelay(SensorHandle, i64),
    Close,
}

/// Build a plausible descriptor for a simulated sensor of the given type.
pub fn descriptor(handle: i32, sensor_type: SensorType) -> SensorDescriptor {
    // (max range, resolution, min delay in us)
    let (max_range, resolution, min_delay_us) = match sensor_type {
        SensorType::ACCELEROMETER => (39.2, 0.0012, 10_000),
        SensorType::MAGNETIC_FIELD => (4912.0, 0.15, 20_000),
        SensorType::ORIENTATION => (360.0, 1.0, 20_000),
        SensorType::GYROSCOPE => (34.9, 0.001, 5_000),
        SensorType::LIGHT => (10_000.0, 1.0, 0),
        SensorType::PRESSURE => (1100.0, 0.01, 100_000),
        SensorType::PROXIMITY => (5.0, 5.0, 0),
        SensorType::STEP_COUNTER | SensorType::STEP_DETECTOR => (1.0, 1.0, 0),
        _ => (100.0, 0.1, 100_000),
    };

    SensorDescriptor {
        name: format!("Simulated {}", sensor_type),
        vendor: "sensorbridge".into(),
        handle: SensorHandle(handle),
        sensor_type,
        max_range,
        resolution,
        min_delay_us,
        max_delay_us: 0,
    }
}

/// Virtual sensor module.
pub struct SimulatedModule {
    sensors: Vec<SensorDescriptor>,
    device: Arc<SimulatedDevice>,
    open_error: Option<HalError>,
}

impl SimulatedModule {
    /// Create a module reporting the given sensor list.
    pub fn new(sensors: Vec<SensorDescriptor>) -> Self {
        let device = Arc::new(SimulatedDevice::new(&sensors));
        Self {
            sensors,
            device,
            open_error: None,
        }
    }

    /// Create a module with one simulated sensor per type, handles from 1.
    pub fn from_types(types: &[SensorType]) -> Self {
        let sensors = types
            .iter()
            .zip(1..)
            .map(|(&sensor_type, handle)| descriptor(handle, sensor_type))
            .collect();
        Self::new(sensors)
    }

    /// Make `open_device` fail with the given error.
    pub fn failing_open(mut self, error: HalError) -> Self {
        self.open_error = Some(error);
        self
    }

    pub fn with_api_version(self, version: ApiVersion) -> Self {
        self.device.state().api_version = version;
        self
    }

    /// Enable or disable synthetic samples for active sensors.
    pub fn generating_samples(self, enabled: bool) -> Self {
        self.device.state().generate = enabled;
        self
    }

    /// The device this module hands out, for scripting and inspection.
    pub fn device(&self) -> Arc<SimulatedDevice> {
        Arc::clone(&self.device)
    }
}

impl SensorModule for SimulatedModule {
    fn name(&self) -> &str {
        "simulated"
    }

    fn open_device(&self) -> Result<Arc<dyn SensorDevice>, HalError> {
        match &self.open_error {
            Some(err) => Err(err.clone()),
            None => Ok(self.device.clone()),
        }
    }

    fn sensor_list(&self) -> Vec<SensorDescriptor> {
        self.sensors.clone()
    }
}

struct Generator {
    sensor_type: SensorType,
    period: Duration,
    next_due: Instant,
    sequence: u32,
}

struct DeviceState {
    api_version: ApiVersion,
    types: HashMap<SensorHandle, SensorType>,
    calls: Vec<HalCall>,
    activate_failures: HashMap<SensorHandle, i32>,
    delay_failures: HashMap<SensorHandle, i32>,
    queued: VecDeque<Result<Vec<SensorEvent>, HalError>>,
    generate: bool,
    generators: HashMap<SensorHandle, Generator>,
    delays: HashMap<SensorHandle, Duration>,
    hang: bool,
    closed: bool,
    polls: usize,
    started: Instant,
}

/// Virtual sensor device, see the module documentation.
pub struct SimulatedDevice {
    inner: Mutex<DeviceState>,
    wakeup: Condvar,
}

impl SimulatedDevice {
    fn new(sensors: &[SensorDescriptor]) -> Self {
        Self {
            inner: Mutex::new(DeviceState {
                api_version: ApiVersion::V1_0,
                types: sensors
                    .iter()
                    .map(|s| (s.handle, s.sensor_type))
                    .collect(),
                calls: Vec::new(),
                activate_failures: HashMap::new(),
                delay_failures: HashMap::new(),
                queued: VecDeque::new(),
                generate: false,
                generators: HashMap::new(),
                delays: HashMap::new(),
                hang: false,
                closed: false,
                polls: 0,
                started: Instant::now(),
            }),
            wakeup: Condvar::new(),
        }
    }

    fn state(&self) -> MutexGuard<'_, DeviceState> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// All control calls received so far, oldest first.
    pub fn calls(&self) -> Vec<HalCall> {
        self.state().calls.clone()
    }

    pub fn clear_calls(&self) {
        self.state().calls.clear();
    }

    /// Make `activate` for `handle` fail with `code` until cleared.
    pub fn fail_activate(&self, handle: SensorHandle, code: i32) {
        self.state().activate_failures.insert(handle, code);
    }

    /// Make `set_delay` for `handle` fail with `code` until cleared.
    pub fn fail_set_delay(&self, handle: SensorHandle, code: i32) {
        self.state().delay_failures.insert(handle, code);
    }

    pub fn clear_failures(&self) {
        let mut state = self.state();
        state.activate_failures.clear();
        state.delay_failures.clear();
    }

    /// Queue a batch to be returned by the next `poll`.
    pub fn push_batch(&self, events: Vec<SensorEvent>) {
        self.state().queued.push_back(Ok(events));
        self.wakeup.notify_all();
    }

    /// Queue a poll failure with the given error code.
    pub fn push_poll_error(&self, code: i32) {
        self.state().queued.push_back(Err(HalError::Call(code)));
        self.wakeup.notify_all();
    }

    /// Make every current and future `poll` block forever, even across
    /// `close`.
    pub fn hang_poll(&self) {
        self.state().hang = true;
    }

    /// Number of `poll` calls entered so far.
    pub fn poll_count(&self) -> usize {
        self.state().polls
    }

    pub fn is_closed(&self) -> bool {
        self.state().closed
    }
}

impl DeviceState {
    fn generated_batch(&mut self, now: Instant, buffer: &mut [SensorEvent]) -> usize {
        let timestamp = i64::try_from((now - self.started).as_nanos()).unwrap_or(i64::MAX);
        let mut count = 0;
        for (&handle, generator) in self.generators.iter_mut() {
            if count == buffer.len() {
                break;
            }
            if generator.next_due > now {
                continue;
            }
            generator.sequence = generator.sequence.wrapping_add(1);
            generator.next_due = now + generator.period;
            buffer[count] = SensorEvent::new(handle, generator.sensor_type, timestamp)
                .with_value((generator.sequence % 100) as f32);
            count += 1;
        }
        count
    }

    fn next_due(&self) -> Option<Instant> {
        self.generators.values().map(|g| g.next_due).min()
    }
}

impl SensorDevice for SimulatedDevice {
    fn api_version(&self) -> ApiVersion {
        self.state().api_version
    }

    fn set_delay(&self, handle: SensorHandle, delay_ns: i64) -> Result<(), HalError> {
        let mut state = self.state();
        state.calls.push(HalCall::SetDelay(handle, delay_ns));
        if let Some(&code) = state.delay_failures.get(&handle) {
            return Err(HalError::Call(code));
        }

        let period = Duration::from_nanos(u64::try_from(delay_ns).unwrap_or(0));
        let period = if period.is_zero() {
            DEFAULT_GENERATION_PERIOD
        } else {
            period
        };
        state.delays.insert(handle, period);
        if let Some(generator) = state.generators.get_mut(&handle) {
            generator.period = period;
        }
        self.wakeup.notify_all();
        Ok(())
    }

    fn activate(&self, handle: SensorHandle, enabled: bool) -> Result<(), HalError> {
        let mut state = self.state();
        state.calls.push(HalCall::Activate(handle, enabled));
        if let Some(&code) = state.activate_failures.get(&handle) {
            return Err(HalError::Call(code));
        }

        if !enabled {
            state.generators.remove(&handle);
        } else if state.generate {
            let sensor_type = state.types.get(&handle).copied().unwrap_or_default();
            let period = state
                .delays
                .get(&handle)
                .copied()
                .unwrap_or(DEFAULT_GENERATION_PERIOD);
            state.generators.insert(
                handle,
                Generator {
                    sensor_type,
                    period,
                    next_due: Instant::now() + period,
                    sequence: 0,
                },
            );
        }
        self.wakeup.notify_all();
        Ok(())
    }

    fn poll(&self, buffer: &mut [SensorEvent]) -> Result<usize, HalError> {
        let mut state = self.state();
        state.polls += 1;

        loop {
            if state.hang {
                state = self
                    .wakeup
                    .wait(state)
                    .unwrap_or_else(PoisonError::into_inner);
                continue;
            }

            if let Some(batch) = state.queued.pop_front() {
                let mut events = batch?;
                let count = events.len().min(buffer.len());
                if events.len() > count {
                    let rest = events.split_off(count);
                    state.queued.push_front(Ok(rest));
                }
                buffer[..count].copy_from_slice(&events);
                return Ok(count);
            }

            if state.closed {
                return Err(HalError::Closed);
            }

            if state.generate {
                let now = Instant::now();
                let count = state.generated_batch(now, buffer);
                if count > 0 {
                    return Ok(count);
                }
                if let Some(due) = state.next_due() {
                    let timeout = due.saturating_duration_since(now);
                    state = self
                        .wakeup
                        .wait_timeout(state, timeout)
                        .unwrap_or_else(PoisonError::into_inner)
                        .0;
                    continue;
                }
            }

            state = self
                .wakeup
                .wait(state)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }

    fn close(&self) -> Result<(), HalError> {
        let mut state = self.state();
        state.calls.push(HalCall::Close);
        state.closed = true;
        self.wakeup.notify_all();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_types_assigns_sequential_handles() {
        let module = SimulatedModule::from_types(&[SensorType::LIGHT, SensorType::PROXIMITY]);
        let sensors = module.sensor_list();
        assert_eq!(sensors.len(), 2);
        assert_eq!(sensors[0].handle, SensorHandle(1));
        assert_eq!(sensors[1].handle, SensorHandle(2));
        assert_eq!(sensors[1].sensor_type, SensorType::PROXIMITY);
    }

    #[test]
    fn test_calls_are_recorded_and_failures_injected() {
        let module = SimulatedModule::from_types(&[SensorType::ACCELEROMETER]);
        let device = module.device();
        device.fail_activate(SensorHandle(1), -5);

        assert_eq!(
            device.activate(SensorHandle(1), true),
            Err(HalError::Call(-5))
        );
        assert_eq!(device.set_delay(SensorHandle(1), 1_000_000), Ok(()));
        assert_eq!(
            device.calls(),
            vec![
                HalCall::Activate(SensorHandle(1), true),
                HalCall::SetDelay(SensorHandle(1), 1_000_000),
            ]
        );
    }

    #[test]
    fn test_poll_splits_oversized_batches() {
        let module = SimulatedModule::from_types(&[SensorType::LIGHT]);
        let device = module.device();
        let events: Vec<_> = (0..3)
            .map(|i| SensorEvent::new(SensorHandle(1), SensorType::LIGHT, i))
            .collect();
        device.push_batch(events);

        let mut buffer = [SensorEvent::default(); 2];
        assert_eq!(device.poll(&mut buffer), Ok(2));
        assert_eq!(buffer[1].timestamp, 1);
        assert_eq!(device.poll(&mut buffer), Ok(1));
        assert_eq!(buffer[0].timestamp, 2);
        assert_eq!(device.poll_count(), 2);
    }

    #[test]
    fn test_poll_after_close_fails() {
        let module = SimulatedModule::from_types(&[SensorType::LIGHT]);
        let device = module.device();
        device.close().unwrap();

        let mut buffer = [SensorEvent::default(); 4];
        assert_eq!(device.poll(&mut buffer), Err(HalError::Closed));
    }

    #[test]
    fn test_generates_samples_for_active_sensors() {
        let module =
            SimulatedModule::from_types(&[SensorType::ACCELEROMETER]).generating_samples(true);
        let device = module.device();
        device.set_delay(SensorHandle(1), 5_000_000).unwrap();
        device.activate(SensorHandle(1), true).unwrap();

        let mut buffer = [SensorEvent::default(); 4];
        let count = device.poll(&mut buffer).unwrap();
        assert_eq!(count, 1);
        assert_eq!(buffer[0].sensor, SensorHandle(1));
        assert_eq!(buffer[0].sensor_type, SensorType::ACCELEROMETER);
        assert!(buffer[0].is_well_formed());
    }
}
