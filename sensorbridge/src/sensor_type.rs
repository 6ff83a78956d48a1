//! Physical sensor type codes reported by the vendor module.
//!
//! Vendors may report codes beyond the standard set (private sensor types),
//! so the type is an open newtype over the raw code rather than a closed
//! enum. The standard codes are provided as associated constants.

use std::fmt;

/// Raw sensor type code as reported by the hardware module.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct SensorType(pub i32);

impl SensorType {
    pub const META_DATA: Self = Self(0);
    pub const ACCELEROMETER: Self = Self(1);
    /// Also known as the geomagnetic field sensor.
    pub const MAGNETIC_FIELD: Self = Self(2);
    pub const ORIENTATION: Self = Self(3);
    pub const GYROSCOPE: Self = Self(4);
    pub const LIGHT: Self = Self(5);
    pub const PRESSURE: Self = Self(6);
    pub const TEMPERATURE: Self = Self(7);
    pub const PROXIMITY: Self = Self(8);
    pub const GRAVITY: Self = Self(9);
    pub const LINEAR_ACCELERATION: Self = Self(10);
    pub const ROTATION_VECTOR: Self = Self(11);
    pub const RELATIVE_HUMIDITY: Self = Self(12);
    pub const AMBIENT_TEMPERATURE: Self = Self(13);
    pub const MAGNETIC_FIELD_UNCALIBRATED: Self = Self(14);
    pub const GAME_ROTATION_VECTOR: Self = Self(15);
    pub const GYROSCOPE_UNCALIBRATED: Self = Self(16);
    pub const SIGNIFICANT_MOTION: Self = Self(17);
    pub const STEP_DETECTOR: Self = Self(18);
    pub const STEP_COUNTER: Self = Self(19);
    pub const GEOMAGNETIC_ROTATION_VECTOR: Self = Self(20);
    pub const HEART_RATE: Self = Self(21);
    pub const TILT_DETECTOR: Self = Self(22);
    pub const WAKE_GESTURE: Self = Self(23);
    pub const GLANCE_GESTURE: Self = Self(24);
    pub const PICK_UP_GESTURE: Self = Self(25);
    pub const WRIST_TILT_GESTURE: Self = Self(26);

    /// Symbolic name of a standard type, `None` for vendor-private codes.
    pub fn name(self) -> Option<&'static str> {
        let name = match self {
            Self::META_DATA => "META_DATA",
            Self::ACCELEROMETER => "ACCELEROMETER",
            Self::MAGNETIC_FIELD => "MAGNETIC_FIELD",
            Self::ORIENTATION => "ORIENTATION",
            Self::GYROSCOPE => "GYROSCOPE",
            Self::LIGHT => "LIGHT",
            Self::PRESSURE => "PRESSURE",
            Self::TEMPERATURE => "TEMPERATURE",
            Self::PROXIMITY => "PROXIMITY",
            Self::GRAVITY => "GRAVITY",
            Self::LINEAR_ACCELERATION => "LINEAR_ACCELERATION",
            Self::ROTATION_VECTOR => "ROTATION_VECTOR",
            Self::RELATIVE_HUMIDITY => "RELATIVE_HUMIDITY",
            Self::AMBIENT_TEMPERATURE => "AMBIENT_TEMPERATURE",
            Self::MAGNETIC_FIELD_UNCALIBRATED => "MAGNETIC_FIELD_UNCALIBRATED",
            Self::GAME_ROTATION_VECTOR => "GAME_ROTATION_VECTOR",
            Self::GYROSCOPE_UNCALIBRATED => "GYROSCOPE_UNCALIBRATED",
            Self::SIGNIFICANT_MOTION => "SIGNIFICANT_MOTION",
            Self::STEP_DETECTOR => "STEP_DETECTOR",
            Self::STEP_COUNTER => "STEP_COUNTER",
            Self::GEOMAGNETIC_ROTATION_VECTOR => "GEOMAGNETIC_ROTATION_VECTOR",
            Self::HEART_RATE => "HEART_RATE",
            Self::TILT_DETECTOR => "TILT_DETECTOR",
            Self::WAKE_GESTURE => "WAKE_GESTURE",
            Self::GLANCE_GESTURE => "GLANCE_GESTURE",
            Self::PICK_UP_GESTURE => "PICK_UP_GESTURE",
            Self::WRIST_TILT_GESTURE => "WRIST_TILT_GESTURE",
            _ => return None,
        };
        Some(name)
    }
}

impl fmt::Display for SensorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.name() {
            Some(name) => f.write_str(name),
            None => write!(f, "type{}", self.0),
        }
    }
}
