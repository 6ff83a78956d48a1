//! Logical sensor adaptors.
//!
//! A [`SensorAdaptor`] is one client-facing sensor channel backed by exactly
//! one physical sensor of the [`HardwareBridge`]. It turns the client view
//! (start, stop, standby, resume, per-session interval requests) into the
//! minimal set of hardware calls, and forwards the samples the bridge
//! delivers to its [`SampleSink`].
//!
//! Whether the physical sensor runs is resolved from two independent flags
//! and one fixed policy:
//!
//! ```text
//! running = should_be_running && (standby_override || !in_standby)
//! ```
//!
//! Every toggle re-evaluates that expression and acts only on a change.

mod entry;
mod interval;
mod kind;

pub use entry::AdaptedSensorEntry;
pub use interval::{evaluate_interval_requests, IntervalDecision, SessionId};
pub use kind::{DataRange, SensorKind};

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::bridge::HardwareBridge;
use crate::error::{Error, Result};
use crate::hal::{SensorEvent, SensorHandle};
use crate::sensor_type::SensorType;
use crate::tracing::prelude::*;

/// Receiver of the samples of one adaptor.
///
/// Called from the reader thread and from control threads, must not call
/// back into the adaptor.
pub trait SampleSink: Send + Sync {
    fn deliver(&self, event: &SensorEvent);
}

impl<F> SampleSink for F
where
    F: Fn(&SensorEvent) + Send + Sync,
{
    fn deliver(&self, event: &SensorEvent) {
        self(event)
    }
}

/// Per-adaptor settings.
#[derive(Debug, Clone, Default)]
pub struct AdaptorConfig {
    /// Keep running while the device is in standby.
    pub standby_override: bool,
    /// File holding a value to push on interval change (light, proximity).
    pub initial_value_path: Option<PathBuf>,
}

/// Capabilities advertised to clients.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SensorCapabilities {
    pub data_range: DataRange,
    /// Interval range in milliseconds; resolution is always zero.
    pub interval_range: DataRange,
}

#[derive(Debug, Default)]
struct ControlState {
    should_be_running: bool,
    in_standby: bool,
    is_running: bool,
    intervals: BTreeMap<SessionId, u32>,
}

impl ControlState {
    fn resolved_running(&self, standby_override: bool) -> bool {
        self.should_be_running && (standby_override || !self.in_standby)
    }
}

/// One logical sensor channel.
pub struct SensorAdaptor {
    kind: SensorKind,
    bridge: Arc<HardwareBridge>,
    /// `None` when no physical sensor backs this kind; the adaptor is then
    /// permanently invalid.
    handle: Option<SensorHandle>,
    config: AdaptorConfig,
    entry: Arc<AdaptedSensorEntry>,
    sink: Arc<dyn SampleSink>,
    control: Mutex<ControlState>,
    /// Mirror of `ControlState::is_running` readable without the lock.
    running: AtomicBool,
}

impl SensorAdaptor {
    /// Create an adaptor and register it with the bridge.
    ///
    /// If the bridge has no physical sensor for the kind the adaptor is
    /// returned invalid and is not registered.
    pub fn new(
        bridge: &Arc<HardwareBridge>,
        kind: SensorKind,
        config: AdaptorConfig,
        entry: Arc<AdaptedSensorEntry>,
        sink: Arc<dyn SampleSink>,
    ) -> Arc<Self> {
        let handle = bridge.handle_for_type(kind.sensor_type());
        if handle.is_none() {
            warn!(adaptor = kind.id(), "No such sensor");
        }

        let adaptor = Arc::new(Self {
            kind,
            bridge: Arc::clone(bridge),
            handle,
            config,
            entry,
            sink,
            control: Mutex::new(ControlState::default()),
            running: AtomicBool::new(false),
        });

        if adaptor.is_valid() {
            bridge.register_adaptor(&adaptor);
        }
        adaptor
    }

    pub fn id(&self) -> &str {
        self.kind.id()
    }

    pub fn kind(&self) -> SensorKind {
        self.kind
    }

    pub fn sensor_type(&self) -> SensorType {
        self.kind.sensor_type()
    }

    pub fn handle(&self) -> Option<SensorHandle> {
        self.handle
    }

    pub fn is_valid(&self) -> bool {
        self.handle.is_some()
    }

    pub fn entry(&self) -> &Arc<AdaptedSensorEntry> {
        &self.entry
    }

    /// Whether the physical sensor is currently requested for this adaptor.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    fn valid_handle(&self) -> Result<SensorHandle> {
        self.handle.ok_or_else(|| Error::InvalidSensor {
            id: self.id().to_string(),
            sensor_type: self.sensor_type(),
        })
    }

    fn lock_control(&self) -> MutexGuard<'_, ControlState> {
        self.control.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Forward a sample to the sink.
    pub fn process_sample(&self, event: &SensorEvent) {
        self.sink.deliver(event);
    }

    /// Ready the adaptor for use. Fails only for invalid adaptors.
    pub fn start_adaptor(&self) -> Result<()> {
        self.valid_handle().map(|_| ())
    }

    /// Stop the sensor if its logical sensor is running at all.
    pub fn stop_adaptor(&self) {
        if self.entry.is_running() {
            self.stop_sensor();
        }
    }

    pub fn start_sensor(&self) -> Result<()> {
        self.valid_handle()?;
        let mut control = self.lock_control();
        if !control.should_be_running {
            control.should_be_running = true;
            trace!(sensor_type = %self.sensor_type(), "should_be_running = true");
            self.evaluate(&mut control);
        }
        Ok(())
    }

    pub fn stop_sensor(&self) {
        if !self.is_valid() {
            return;
        }
        let mut control = self.lock_control();
        if control.should_be_running {
            control.should_be_running = false;
            trace!(sensor_type = %self.sensor_type(), "should_be_running = false");
            self.evaluate(&mut control);
        }
    }

    pub fn standby(&self) -> Result<()> {
        self.valid_handle()?;
        let mut control = self.lock_control();
        if !control.in_standby {
            control.in_standby = true;
            trace!(sensor_type = %self.sensor_type(), "in_standby = true");
            self.evaluate(&mut control);
        }
        Ok(())
    }

    pub fn resume(&self) -> Result<()> {
        self.valid_handle()?;
        let mut control = self.lock_control();
        if control.in_standby {
            control.in_standby = false;
            trace!(sensor_type = %self.sensor_type(), "in_standby = false");
            self.evaluate(&mut control);
        }
        Ok(())
    }

    /// Act on a change of the resolved running state.
    ///
    /// Starting activates the hardware before taking a reference on the
    /// shared entry. Stopping drops the reference before deactivating.
    fn evaluate(&self, control: &mut ControlState) {
        let target = control.resolved_running(self.config.standby_override);
        if control.is_running == target {
            return;
        }
        control.is_running = target;
        self.running.store(target, Ordering::Release);

        if target {
            if let Err(e) = self.bridge.start_reader(self) {
                warn!(adaptor = self.id(), error = %e, "Failed to activate sensor");
            }
            if self.entry.add_reference() == 1 {
                self.entry.set_running(true);
            }
            self.deliver_fallback();
        } else {
            if self.entry.remove_reference() == 0 {
                self.entry.set_running(false);
            }
            if let Err(e) = self.bridge.stop_reader(self) {
                warn!(adaptor = self.id(), error = %e, "Failed to deactivate sensor");
            }
        }

        trace!(
            entry = self.entry.name(),
            refs = self.entry.reference_count(),
            running = self.entry.is_running(),
            "Sensor evaluated"
        );
    }

    /// Deliver the armed fallback sample if no real data has arrived yet.
    fn deliver_fallback(&self) {
        let Some(handle) = self.handle else {
            return;
        };
        if let Some(fallback) = self.bridge.take_fallback(handle, self.sensor_type()) {
            trace!(sensor_type = %fallback.sensor_type, handle = %fallback.sensor, "Fallback");
            self.process_sample(&fallback);
        }
    }

    /// Apply a sampling interval in milliseconds.
    ///
    /// On success the fallback sample is delivered if still armed, then the
    /// kind's initial value, if it has one.
    pub fn set_interval(&self, interval_ms: u32, session: Option<SessionId>) -> Result<()> {
        let handle = self.valid_handle()?;
        let delay_ms = i32::try_from(interval_ms).unwrap_or(i32::MAX);

        if let Err(e) = self.bridge.set_delay(handle, delay_ms) {
            warn!(
                adaptor = self.id(),
                interval_ms,
                session = ?session,
                error = %e,
                "setInterval failed"
            );
            return Err(e);
        }

        self.deliver_fallback();
        self.send_initial_data(handle);
        Ok(())
    }

    fn send_initial_data(&self, handle: SensorHandle) {
        let path = self.config.initial_value_path.as_deref();
        if let Some(event) = self.kind.initial_sample(handle, path) {
            self.process_sample(&event);
        }
    }

    /// Interval used when no session has a positive request.
    pub fn default_interval(&self) -> u32 {
        self.kind.default_interval()
    }

    /// Record a session's interval request and apply the arbitrated winner.
    pub fn request_interval(
        &self,
        session: SessionId,
        interval_ms: u32,
    ) -> Result<IntervalDecision> {
        self.valid_handle()?;
        // Held until applied so concurrent requests cannot reorder
        let mut control = self.lock_control();
        control.intervals.insert(session, interval_ms);
        let decision = evaluate_interval_requests(&control.intervals, self.default_interval());
        debug!(
            adaptor = self.id(),
            session = %session,
            requested = interval_ms,
            interval = decision.interval,
            "Interval requested"
        );
        self.set_interval(decision.interval, decision.session)?;
        Ok(decision)
    }

    /// Forget a session's request and apply the arbitrated winner.
    pub fn remove_session(&self, session: SessionId) -> Result<IntervalDecision> {
        self.valid_handle()?;
        let mut control = self.lock_control();
        control.intervals.remove(&session);
        let decision = evaluate_interval_requests(&control.intervals, self.default_interval());
        self.set_interval(decision.interval, decision.session)?;
        Ok(decision)
    }

    /// Smallest interval in milliseconds, 0 when invalid.
    pub fn min_interval(&self) -> u32 {
        self.handle
            .map(|handle| u32::try_from(self.bridge.min_delay(handle)).unwrap_or(0))
            .unwrap_or(0)
    }

    /// Largest interval in milliseconds, 0 when invalid.
    pub fn max_interval(&self) -> u32 {
        self.handle
            .map(|handle| u32::try_from(self.bridge.max_delay(handle)).unwrap_or(0))
            .unwrap_or(0)
    }

    /// Interval currently applied to the hardware.
    pub fn interval(&self) -> Option<u32> {
        let delay = self.bridge.delay(self.handle?)?;
        u32::try_from(delay).ok()
    }

    pub fn capabilities(&self) -> Result<SensorCapabilities> {
        let handle = self.valid_handle()?;
        Ok(SensorCapabilities {
            data_range: self.kind.data_range(&self.bridge, handle),
            interval_range: DataRange::new(
                self.min_interval() as f32,
                self.max_interval() as f32,
                0.0,
            ),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BridgeConfig;
    use crate::hal::sim::{self, HalCall, SimulatedDevice, SimulatedModule};
    use std::path::PathBuf;

    type Collected = Arc<Mutex<Vec<SensorEvent>>>;

    fn start_bridge(types: &[SensorType]) -> (Arc<HardwareBridge>, Arc<SimulatedDevice>) {
        let module = SimulatedModule::from_types(types);
        let device = module.device();
        let config = BridgeConfig {
            wake_lock_path: PathBuf::from("/nonexistent/sensorbridge/wake_lock"),
        };
        (HardwareBridge::start(Ok(Box::new(module)), &config), device)
    }

    fn collecting_sink() -> (Arc<dyn SampleSink>, Collected) {
        let events: Collected = Arc::new(Mutex::new(Vec::new()));
        let target = Arc::clone(&events);
        let sink: Arc<dyn SampleSink> =
            Arc::new(move |event: &SensorEvent| target.lock().unwrap().push(*event));
        (sink, events)
    }

    fn adaptor(
        bridge: &Arc<HardwareBridge>,
        kind: SensorKind,
        config: AdaptorConfig,
        entry: &Arc<AdaptedSensorEntry>,
    ) -> (Arc<SensorAdaptor>, Collected) {
        let (sink, events) = collecting_sink();
        let adaptor = SensorAdaptor::new(bridge, kind, config, Arc::clone(entry), sink);
        (adaptor, events)
    }

    #[test]
    fn test_state_machine_truth_table() {
        for standby_override in [false, true] {
            for should_run in [false, true] {
                for standby in [false, true] {
                    let (bridge, _device) = start_bridge(&[SensorType::ACCELEROMETER]);
                    let entry = Arc::new(AdaptedSensorEntry::new("accelerometeradaptor"));
                    let config = AdaptorConfig {
                        standby_override,
                        ..Default::default()
                    };
                    let (adaptor, _) =
                        adaptor(&bridge, SensorKind::Accelerometer, config, &entry);

                    if should_run {
                        adaptor.start_sensor().unwrap();
                    }
                    if standby {
                        adaptor.standby().unwrap();
                    }

                    let expected = should_run && (standby_override || !standby);
                    assert_eq!(adaptor.is_running(), expected);
                    assert_eq!(bridge.active(SensorHandle(1)), expected);
                    assert_eq!(entry.is_running(), expected);
                    bridge.shutdown();
                }
            }
        }
    }

    #[test]
    fn test_standby_and_resume_toggle_hardware() {
        let (bridge, device) = start_bridge(&[SensorType::ACCELEROMETER]);
        let entry = Arc::new(AdaptedSensorEntry::new("accelerometeradaptor"));
        let (adaptor, _) = adaptor(
            &bridge,
            SensorKind::Accelerometer,
            AdaptorConfig::default(),
            &entry,
        );

        adaptor.start_sensor().unwrap();
        adaptor.standby().unwrap();
        assert!(!bridge.active(SensorHandle(1)));
        adaptor.resume().unwrap();
        assert!(bridge.active(SensorHandle(1)));

        // Repeated requests are no-ops
        device.clear_calls();
        adaptor.start_sensor().unwrap();
        adaptor.resume().unwrap();
        assert!(device.calls().is_empty());
        assert_eq!(entry.reference_count(), 1);
        bridge.shutdown();
    }

    #[test]
    fn test_entry_running_follows_first_and_last_reference() {
        let (bridge, device) = start_bridge(&[SensorType::ACCELEROMETER]);
        let entry = Arc::new(AdaptedSensorEntry::new("accelerometeradaptor"));
        let config = AdaptorConfig::default();
        let (first, _) = adaptor(&bridge, SensorKind::Accelerometer, config.clone(), &entry);
        let (second, _) = adaptor(&bridge, SensorKind::Accelerometer, config, &entry);

        first.start_sensor().unwrap();
        assert!(entry.is_running());
        second.start_sensor().unwrap();
        assert_eq!(entry.reference_count(), 2);

        device.clear_calls();
        first.stop_sensor();
        assert!(entry.is_running());
        assert_eq!(entry.reference_count(), 1);
        assert_eq!(
            device.calls(),
            vec![HalCall::Activate(SensorHandle(1), false)]
        );

        second.stop_sensor();
        assert!(!entry.is_running());
        assert_eq!(entry.reference_count(), 0);
        // Already inactive, no second hardware call
        assert_eq!(
            device.calls(),
            vec![HalCall::Activate(SensorHandle(1), false)]
        );
        bridge.shutdown();
    }

    #[test]
    fn test_stop_deactivates_sensor_while_entry_still_referenced() {
        let (bridge, device) = start_bridge(&[SensorType::ORIENTATION, SensorType::LIGHT]);
        let entry = Arc::new(AdaptedSensorEntry::new("shared"));
        let (orientation, _) = adaptor(
            &bridge,
            SensorKind::Orientation,
            AdaptorConfig::default(),
            &entry,
        );
        let (light, _) = adaptor(&bridge, SensorKind::Light, AdaptorConfig::default(), &entry);

        orientation.start_sensor().unwrap();
        light.start_sensor().unwrap();
        device.clear_calls();

        orientation.stop_sensor();
        assert!(!orientation.is_running());
        assert!(entry.is_running());
        assert!(!bridge.active(SensorHandle(1)));
        assert!(bridge.active(SensorHandle(2)));
        assert_eq!(
            device.calls(),
            vec![HalCall::Activate(SensorHandle(1), false)]
        );
        bridge.shutdown();
    }

    #[test]
    fn test_concurrent_requests_apply_arbitrated_interval() {
        let (bridge, _device) = start_bridge(&[SensorType::ACCELEROMETER]);
        let entry = Arc::new(AdaptedSensorEntry::new("accelerometeradaptor"));
        let (adaptor, _) = adaptor(
            &bridge,
            SensorKind::Accelerometer,
            AdaptorConfig::default(),
            &entry,
        );

        let workers: Vec<_> = (1..=8)
            .map(|session| {
                let adaptor = Arc::clone(&adaptor);
                std::thread::spawn(move || {
                    for round in 0..50u32 {
                        let interval = 20 + ((session as u32 * 7 + round) % 40);
                        adaptor
                            .request_interval(SessionId(session), interval)
                            .unwrap();
                    }
                    // Final request, the smallest one belongs to session 1
                    adaptor
                        .request_interval(SessionId(session), 100 + session as u32)
                        .unwrap();
                })
            })
            .collect();
        for worker in workers {
            worker.join().unwrap();
        }

        assert_eq!(adaptor.interval(), Some(101));
        bridge.shutdown();
    }

    #[test]
    fn test_fallback_delivered_exactly_once() {
        let (bridge, _device) = start_bridge(&[SensorType::LIGHT]);
        let entry = Arc::new(AdaptedSensorEntry::new("alsadaptor"));
        let (first, first_events) =
            adaptor(&bridge, SensorKind::Light, AdaptorConfig::default(), &entry);
        let (second, second_events) =
            adaptor(&bridge, SensorKind::Light, AdaptorConfig::default(), &entry);

        first.start_sensor().unwrap();
        {
            let events = first_events.lock().unwrap();
            assert_eq!(events.len(), 1);
            assert_eq!(events[0].light(), 400.0);
        }

        first.stop_sensor();
        first.start_sensor().unwrap();
        second.start_sensor().unwrap();
        first.set_interval(100, None).unwrap();

        assert_eq!(first_events.lock().unwrap().len(), 1);
        assert!(second_events.lock().unwrap().is_empty());
        bridge.shutdown();
    }

    #[test]
    fn test_real_sample_preempts_fallback() {
        let (bridge, _device) = start_bridge(&[SensorType::PROXIMITY]);
        let entry = Arc::new(AdaptedSensorEntry::new("proximityadaptor"));
        let (adaptor, events) = adaptor(
            &bridge,
            SensorKind::Proximity,
            AdaptorConfig::default(),
            &entry,
        );

        // Real data before any start disarms the fallback
        let real = SensorEvent::new(SensorHandle(1), SensorType::PROXIMITY, 9).with_value(0.0);
        crate::bridge::dispatch_batch(&bridge, &[real]);
        assert!(events.lock().unwrap().is_empty());

        adaptor.start_sensor().unwrap();
        assert!(events.lock().unwrap().is_empty());

        crate::bridge::dispatch_batch(&bridge, &[real]);
        assert_eq!(*events.lock().unwrap(), vec![real]);
        bridge.shutdown();
    }

    #[test]
    fn test_set_interval_delivers_fallback_then_initial_value() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("lux");
        std::fs::write(&path, "42").unwrap();

        let (bridge, device) = start_bridge(&[SensorType::LIGHT]);
        let entry = Arc::new(AdaptedSensorEntry::new("alsadaptor"));
        let config = AdaptorConfig {
            initial_value_path: Some(path),
            ..Default::default()
        };
        let (adaptor, events) = adaptor(&bridge, SensorKind::Light, config, &entry);

        device.clear_calls();
        adaptor.set_interval(250, Some(SessionId(3))).unwrap();

        assert_eq!(
            device.calls(),
            vec![HalCall::SetDelay(SensorHandle(1), 250_000_000)]
        );
        let values: Vec<f32> = events.lock().unwrap().iter().map(|e| e.light()).collect();
        assert_eq!(values, vec![400.0, 42.0]);
        bridge.shutdown();
    }

    #[test]
    fn test_failed_set_interval_delivers_nothing() {
        let (bridge, device) = start_bridge(&[SensorType::LIGHT]);
        let entry = Arc::new(AdaptedSensorEntry::new("alsadaptor"));
        let (adaptor, events) =
            adaptor(&bridge, SensorKind::Light, AdaptorConfig::default(), &entry);

        device.fail_set_delay(SensorHandle(1), -5);
        assert!(adaptor.set_interval(300, None).is_err());
        assert!(events.lock().unwrap().is_empty());
        assert!(bridge.fallback(SensorHandle(1)).is_some());
        bridge.shutdown();
    }

    #[test]
    fn test_session_requests_are_arbitrated() {
        let (bridge, _device) = start_bridge(&[SensorType::ACCELEROMETER]);
        let entry = Arc::new(AdaptedSensorEntry::new("accelerometeradaptor"));
        let (adaptor, _) = adaptor(
            &bridge,
            SensorKind::Accelerometer,
            AdaptorConfig::default(),
            &entry,
        );

        adaptor.request_interval(SessionId(1), 50).unwrap();
        let decision = adaptor.request_interval(SessionId(2), 20).unwrap();
        assert_eq!(decision.session, Some(SessionId(2)));
        adaptor.request_interval(SessionId(3), 0).unwrap();
        assert_eq!(adaptor.interval(), Some(20));

        let decision = adaptor.remove_session(SessionId(2)).unwrap();
        assert_eq!(decision.interval, 50);
        assert_eq!(adaptor.interval(), Some(50));

        adaptor.remove_session(SessionId(1)).unwrap();
        let decision = adaptor.remove_session(SessionId(3)).unwrap();
        assert_eq!(decision.session, None);
        assert_eq!(adaptor.interval(), Some(adaptor.default_interval()));
        bridge.shutdown();
    }

    #[test]
    fn test_capabilities() {
        let (bridge, _device) = start_bridge(&[SensorType::ORIENTATION, SensorType::LIGHT]);
        let entry = Arc::new(AdaptedSensorEntry::new("shared"));
        let (orientation, _) = adaptor(
            &bridge,
            SensorKind::Orientation,
            AdaptorConfig::default(),
            &entry,
        );
        let (light, _) = adaptor(&bridge, SensorKind::Light, AdaptorConfig::default(), &entry);

        let caps = orientation.capabilities().unwrap();
        assert_eq!(caps.data_range, DataRange::new(0.0, 359.0, 1.0));
        assert_eq!(caps.interval_range.min, orientation.min_interval() as f32);
        assert_eq!(caps.interval_range.resolution, 0.0);

        let expected = sim::descriptor(2, SensorType::LIGHT);
        let caps = light.capabilities().unwrap();
        assert_eq!(caps.data_range.max, expected.max_range);
        assert_eq!(caps.data_range.resolution, expected.resolution);
        bridge.shutdown();
    }

    #[test]
    fn test_missing_sensor_makes_adaptor_invalid() {
        let (bridge, device) = start_bridge(&[SensorType::LIGHT]);
        device.clear_calls();
        let entry = Arc::new(AdaptedSensorEntry::new("pressureadaptor"));
        let (adaptor, _) = adaptor(
            &bridge,
            SensorKind::Pressure,
            AdaptorConfig::default(),
            &entry,
        );

        assert!(!adaptor.is_valid());
        assert!(matches!(
            adaptor.start_adaptor(),
            Err(Error::InvalidSensor { .. })
        ));
        assert!(adaptor.start_sensor().is_err());
        assert!(adaptor.standby().is_err());
        assert!(adaptor.set_interval(100, None).is_err());
        assert!(adaptor.request_interval(SessionId(1), 100).is_err());
        assert!(adaptor.capabilities().is_err());
        adaptor.stop_sensor();

        assert_eq!(adaptor.min_interval(), 0);
        assert_eq!(adaptor.interval(), None);
        assert!(!adaptor.is_running());
        assert_eq!(entry.reference_count(), 0);
        assert!(device.calls().is_empty());
        bridge.shutdown();
    }

    #[test]
    fn test_stop_adaptor_only_when_entry_running() {
        let (bridge, _device) = start_bridge(&[SensorType::ACCELEROMETER]);
        let entry = Arc::new(AdaptedSensorEntry::new("accelerometeradaptor"));
        let (adaptor, _) = adaptor(
            &bridge,
            SensorKind::Accelerometer,
            AdaptorConfig::default(),
            &entry,
        );

        assert!(adaptor.start_adaptor().is_ok());
        adaptor.stop_adaptor();
        assert!(!adaptor.is_running());

        adaptor.start_sensor().unwrap();
        adaptor.stop_adaptor();
        assert!(!adaptor.is_running());
        assert!(!bridge.active(SensorHandle(1)));
        bridge.shutdown();
    }

    #[test]
    fn test_bridge_shutdown_stops_adaptors() {
        let (bridge, _device) = start_bridge(&[SensorType::ACCELEROMETER]);
        let entry = Arc::new(AdaptedSensorEntry::new("accelerometeradaptor"));
        let (adaptor, _) = adaptor(
            &bridge,
            SensorKind::Accelerometer,
            AdaptorConfig::default(),
            &entry,
        );

        adaptor.start_sensor().unwrap();
        bridge.shutdown();
        assert!(!adaptor.is_running());
        assert_eq!(entry.reference_count(), 0);
    }
}
