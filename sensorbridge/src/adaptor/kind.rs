//! Logical sensor kinds and their per-kind hooks.

use std::fmt;
use std::path::Path;
use std::str::FromStr;

use crate::bridge::HardwareBridge;
use crate::error::Error;
use crate::hal::{SensorEvent, SensorHandle};
use crate::sensor_type::SensorType;
use crate::tracing::prelude::*;

/// Reported value range of a sensor, or of its sampling interval.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DataRange {
    pub min: f32,
    pub max: f32,
    pub resolution: f32,
}

impl DataRange {
    pub fn new(min: f32, max: f32, resolution: f32) -> Self {
        Self {
            min,
            max,
            resolution,
        }
    }
}

/// Orientation reports whole degrees regardless of the hardware range.
const ORIENTATION_RANGE: DataRange = DataRange {
    min: 0.0,
    max: 359.0,
    resolution: 1.0,
};

/// The logical sensors this daemon can expose.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SensorKind {
    Accelerometer,
    Magnetometer,
    Orientation,
    Gyroscope,
    Light,
    Pressure,
    Temperature,
    Proximity,
    RotationVector,
    Humidity,
    StepCounter,
    StepDetector,
}

impl SensorKind {
    pub const ALL: [SensorKind; 12] = [
        SensorKind::Accelerometer,
        SensorKind::Magnetometer,
        SensorKind::Orientation,
        SensorKind::Gyroscope,
        SensorKind::Light,
        SensorKind::Pressure,
        SensorKind::Temperature,
        SensorKind::Proximity,
        SensorKind::RotationVector,
        SensorKind::Humidity,
        SensorKind::StepCounter,
        SensorKind::StepDetector,
    ];

    /// Adaptor id used by the registration layer.
    pub fn id(self) -> &'static str {
        match self {
            SensorKind::Accelerometer => "accelerometeradaptor",
            SensorKind::Magnetometer => "magnetometeradaptor",
            SensorKind::Orientation => "orientationadaptor",
            SensorKind::Gyroscope => "gyroscopeadaptor",
            SensorKind::Light => "alsadaptor",
            SensorKind::Pressure => "pressureadaptor",
            SensorKind::Temperature => "temperatureadaptor",
            SensorKind::Proximity => "proximityadaptor",
            SensorKind::RotationVector => "rotationadaptor",
            SensorKind::Humidity => "humidityadaptor",
            SensorKind::StepCounter => "stepcounteradaptor",
            SensorKind::StepDetector => "stepdetectoradaptor",
        }
    }

    pub fn from_id(id: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.id() == id)
    }

    /// Physical sensor type backing this kind.
    pub fn sensor_type(self) -> SensorType {
        match self {
            SensorKind::Accelerometer => SensorType::ACCELEROMETER,
            SensorKind::Magnetometer => SensorType::MAGNETIC_FIELD,
            SensorKind::Orientation => SensorType::ORIENTATION,
            SensorKind::Gyroscope => SensorType::GYROSCOPE,
            SensorKind::Light => SensorType::LIGHT,
            SensorKind::Pressure => SensorType::PRESSURE,
            SensorKind::Temperature => SensorType::AMBIENT_TEMPERATURE,
            SensorKind::Proximity => SensorType::PROXIMITY,
            SensorKind::RotationVector => SensorType::ROTATION_VECTOR,
            SensorKind::Humidity => SensorType::RELATIVE_HUMIDITY,
            SensorKind::StepCounter => SensorType::STEP_COUNTER,
            SensorKind::StepDetector => SensorType::STEP_DETECTOR,
        }
    }

    /// Interval in milliseconds used when no session asks for one.
    pub fn default_interval(self) -> u32 {
        match self {
            SensorKind::Accelerometer | SensorKind::Gyroscope | SensorKind::RotationVector => 50,
            SensorKind::Magnetometer | SensorKind::Orientation => 100,
            SensorKind::Light
            | SensorKind::Pressure
            | SensorKind::Temperature
            | SensorKind::Proximity
            | SensorKind::Humidity
            | SensorKind::StepCounter
            | SensorKind::StepDetector => 1000,
        }
    }

    /// Whether this kind pushes a value read from a file on interval change.
    pub fn has_initial_value(self) -> bool {
        matches!(self, SensorKind::Light | SensorKind::Proximity)
    }

    /// Value range reported to clients.
    pub fn data_range(self, bridge: &HardwareBridge, handle: SensorHandle) -> DataRange {
        match self {
            SensorKind::Orientation => ORIENTATION_RANGE,
            _ => DataRange::new(0.0, bridge.max_range(handle), bridge.resolution(handle)),
        }
    }

    /// Synthetic sample built from the configured initial-value file.
    ///
    /// Only light and proximity have one. A missing or unparsable file
    /// yields nothing.
    pub fn initial_sample(self, handle: SensorHandle, path: Option<&Path>) -> Option<SensorEvent> {
        if !self.has_initial_value() {
            return None;
        }
        let value = read_initial_value(path?)?;
        trace!(kind = %self, value, "Initial value");
        Some(SensorEvent::new(handle, self.sensor_type(), 0).with_value(value))
    }
}

fn read_initial_value(path: &Path) -> Option<f32> {
    let content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) => {
            debug!(path = %path.display(), error = %e, "Initial value not readable");
            return None;
        }
    };
    match content.trim().parse() {
        Ok(value) => Some(value),
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Malformed initial value");
            None
        }
    }
}

impl fmt::Display for SensorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

impl FromStr for SensorKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_id(s).ok_or_else(|| Error::Config(format!("unknown adaptor id: {s}")))
    }
}
