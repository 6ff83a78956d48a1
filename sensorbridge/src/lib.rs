//! Bridge between a vendor sensor module and logical sensor channels.
//!
//! [`bridge::HardwareBridge`] owns the device connection and the reader
//! thread; [`adaptor::SensorAdaptor`] exposes one logical sensor on top of
//! it. [`daemon::Daemon`] wires both together for the `sensorbridge` binary.

pub mod adaptor;
pub mod bridge;
pub mod config;
pub mod daemon;
pub mod error;
pub mod hal;
pub mod sensor_type;
pub mod tracing;
