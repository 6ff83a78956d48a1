//! Hardware abstraction for vendor sensor modules.
//!
//! The vendor module is consumed through two traits: [`SensorModule`] for
//! the module itself (static sensor list, device open) and [`SensorDevice`]
//! for the opened device (activation, sampling delay, blocking event poll).
//! The device is shared between caller threads issuing control calls and the
//! bridge's reader thread sitting in [`SensorDevice::poll`], so every method
//! takes `&self` and implementations must be `Send + Sync`.
//!
//! No vendor loader is linked into this crate. [`open_module`] hands out the
//! [`sim::SimulatedModule`] when one is configured and otherwise reports the
//! module as unavailable, which leaves the bridge in its degraded mode.

pub mod sim;

use std::fmt;
use std::sync::Arc;

use crate::sensor_type::SensorType;

/// Handle the vendor module assigns to one physical sensor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct SensorHandle(pub i32);

impl fmt::Display for SensorHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Device API version reported by an opened sensor device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct ApiVersion {
    pub major: u8,
    pub minor: u8,
}

impl ApiVersion {
    pub const V1_0: Self = Self::new(1, 0);
    /// First version whose sensor list carries a maximum delay.
    pub const V1_3: Self = Self::new(1, 3);

    pub const fn new(major: u8, minor: u8) -> Self {
        Self { major, minor }
    }
}

impl fmt::Display for ApiVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}

/// Static description of one hardware-reported sensor.
#[derive(Debug, Clone, PartialEq)]
pub struct SensorDescriptor {
    pub name: String,
    pub vendor: String,
    pub handle: SensorHandle,
    pub sensor_type: SensorType,
    pub max_range: f32,
    pub resolution: f32,
    /// Minimum sampling delay in microseconds. Zero for on-change sensors.
    pub min_delay_us: i32,
    /// Maximum sampling delay in microseconds. Only meaningful on devices
    /// reporting [`ApiVersion::V1_3`] or later.
    pub max_delay_us: i32,
}

/// Number of payload words carried by a [`SensorEvent`].
pub const PAYLOAD_WORDS: usize = 16;

/// One event record as delivered by [`SensorDevice::poll`].
///
/// The payload is type dependent and is forwarded as-is; only the light and
/// distance accessors used for fallback values interpret it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SensorEvent {
    /// Size tag of the record, must equal [`SensorEvent::WIRE_SIZE`].
    pub version: i32,
    pub sensor: SensorHandle,
    pub sensor_type: SensorType,
    /// Event time in nanoseconds.
    pub timestamp: i64,
    pub data: [f32; PAYLOAD_WORDS],
}

impl SensorEvent {
    /// Size in bytes of the vendor event record.
    pub const WIRE_SIZE: i32 = 104;

    /// Create a well-formed event with an all-zero payload.
    pub fn new(sensor: SensorHandle, sensor_type: SensorType, timestamp: i64) -> Self {
        Self {
            version: Self::WIRE_SIZE,
            sensor,
            sensor_type,
            timestamp,
            data: [0.0; PAYLOAD_WORDS],
        }
    }

    /// Builder-style setter for the first payload word.
    pub fn with_value(mut self, value: f32) -> Self {
        self.data[0] = value;
        self
    }

    pub fn light(&self) -> f32 {
        self.data[0]
    }

    pub fn distance(&self) -> f32 {
        self.data[0]
    }

    /// Whether the declared record size matches the expected wire size.
    pub fn is_well_formed(&self) -> bool {
        self.version == Self::WIRE_SIZE
    }
}

impl Default for SensorEvent {
    fn default() -> Self {
        Self {
            version: 0,
            sensor: SensorHandle(0),
            sensor_type: SensorType(0),
            timestamp: 0,
            data: [0.0; PAYLOAD_WORDS],
        }
    }
}

/// Errors reported by the hardware layer.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum HalError {
    /// The vendor module could not be loaded.
    #[error("Sensor module unavailable: {0}")]
    ModuleUnavailable(String),

    /// The module loaded but its device could not be opened.
    #[error("Failed to open sensor device: {0}")]
    OpenFailed(String),

    /// A device call returned a (negative errno style) error code.
    #[error("Device call failed: {}", errno_text(.0))]
    Call(i32),

    /// The device has been closed.
    #[error("Device closed")]
    Closed,
}

fn errno_text(code: &i32) -> String {
    format!(
        "{} (code {})",
        std::io::Error::from_raw_os_error(code.saturating_abs()),
        code
    )
}

/// A loaded vendor sensor module.
pub trait SensorModule: Send + Sync {
    /// Module name for logging.
    fn name(&self) -> &str;

    /// Open the sensor device exposed by this module.
    fn open_device(&self) -> Result<Arc<dyn SensorDevice>, HalError>;

    /// Static list of sensors the module reports.
    fn sensor_list(&self) -> Vec<SensorDescriptor>;
}

/// An opened sensor device.
pub trait SensorDevice: Send + Sync {
    fn api_version(&self) -> ApiVersion;

    /// Set the sampling delay of one sensor, in nanoseconds.
    fn set_delay(&self, handle: SensorHandle, delay_ns: i64) -> Result<(), HalError>;

    /// Enable or disable one sensor.
    fn activate(&self, handle: SensorHandle, enabled: bool) -> Result<(), HalError>;

    /// Block until at least one event is available and fill `buffer` with up
    /// to `buffer.len()` events. Returns the number of events written.
    fn poll(&self, buffer: &mut [SensorEvent]) -> Result<usize, HalError>;

    fn close(&self) -> Result<(), HalError>;
}

/// Open the sensor module for this process.
///
/// With `simulated` set, a [`sim::SimulatedModule`] exposing those sensor
/// types is returned. Otherwise no module is available.
pub fn open_module(simulated: Option<&[SensorType]>) -> Result<Box<dyn SensorModule>, HalError> {
    match simulated {
        Some(types) => {
            let module = sim::SimulatedModule::from_types(types).generating_samples(true);
            Ok(Box::new(module))
        }
        None => Err(HalError::ModuleUnavailable(
            "no vendor sensor module configured".into(),
        )),
    }
}
