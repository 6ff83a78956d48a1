//! Error types for the sensor bridge.

use crate::hal::{HalError, SensorHandle};
use crate::sensor_type::SensorType;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Failure reported by the hardware layer.
    #[error("Hardware error: {0}")]
    Hal(#[from] HalError),

    /// The handle is not known to the bridge.
    #[error("Invalid sensor handle: {0}")]
    InvalidHandle(SensorHandle),

    /// No physical sensor backs this logical sensor.
    #[error("No {sensor_type} sensor available for {id}")]
    InvalidSensor { id: String, sensor_type: SensorType },

    /// The bridge has no opened device.
    #[error("Sensor hardware unavailable")]
    Unavailable,

    #[error("Configuration error: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, Error>;
