//! Configuration for the sensor bridge daemon.
//!
//! Parses environment variables. Lists of adaptors are comma separated
//! adaptor ids, e.g. `accelerometeradaptor,alsadaptor`.

use std::path::PathBuf;

use crate::adaptor::{AdaptorConfig, SensorKind};
use crate::bridge::DEFAULT_WAKE_LOCK_PATH;
use crate::error::Error;
use crate::sensor_type::SensorType;

/// Settings of the hardware bridge itself.
#[derive(Debug, Clone)]
pub struct BridgeConfig {
    /// Power-management control path used for temporary wake locks.
    pub wake_lock_path: PathBuf,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            wake_lock_path: PathBuf::from(DEFAULT_WAKE_LOCK_PATH),
        }
    }
}

impl BridgeConfig {
    /// Parse configuration from environment variables.
    ///
    /// - `SENSORBRIDGE_WAKE_LOCK_PATH`: wake lock path (default: `/sys/power/wake_lock`)
    pub fn from_env() -> Self {
        std::env::var_os("SENSORBRIDGE_WAKE_LOCK_PATH")
            .map(|path| Self {
                wake_lock_path: PathBuf::from(path),
            })
            .unwrap_or_default()
    }
}

/// Daemon configuration parsed from environment variables.
#[derive(Debug, Clone)]
pub struct DaemonConfig {
    /// Adaptors to create.
    pub sensors: Vec<SensorKind>,

    /// Adaptors that keep running while the device is in standby.
    pub standby_override: Vec<SensorKind>,

    /// Adaptors started at their default interval right after startup.
    pub autostart: Vec<SensorKind>,

    /// Sensors of the simulated module, `None` to use the vendor module.
    pub simulated: Option<Vec<SensorKind>>,

    pub initial_light_path: Option<PathBuf>,
    pub initial_proximity_path: Option<PathBuf>,

    pub bridge: BridgeConfig,
}

impl DaemonConfig {
    /// Parse configuration from environment variables.
    ///
    /// Fails on unknown adaptor ids.
    ///
    /// # Environment Variables
    ///
    /// - `SENSORBRIDGE_SENSORS`: adaptors to create (default: all)
    /// - `SENSORBRIDGE_STANDBY_OVERRIDE`: adaptors running through standby
    /// - `SENSORBRIDGE_AUTOSTART`: adaptors started at startup
    /// - `SENSORBRIDGE_SIM_SENSORS`: presence enables the simulated module
    /// - `SENSORBRIDGE_INITIAL_LIGHT_PATH`, `SENSORBRIDGE_INITIAL_PROXIMITY_PATH`:
    ///   initial-value files
    /// - `SENSORBRIDGE_WAKE_LOCK_PATH`: see [`BridgeConfig::from_env`]
    pub fn from_env() -> Result<Self, Error> {
        let sensors =
            kinds_from_env("SENSORBRIDGE_SENSORS")?.unwrap_or_else(|| SensorKind::ALL.to_vec());
        let standby_override = kinds_from_env("SENSORBRIDGE_STANDBY_OVERRIDE")?.unwrap_or_default();
        let autostart = kinds_from_env("SENSORBRIDGE_AUTOSTART")?.unwrap_or_default();
        let simulated = kinds_from_env("SENSORBRIDGE_SIM_SENSORS")?;

        Ok(Self {
            sensors,
            standby_override,
            autostart,
            simulated,
            initial_light_path: path_from_env("SENSORBRIDGE_INITIAL_LIGHT_PATH"),
            initial_proximity_path: path_from_env("SENSORBRIDGE_INITIAL_PROXIMITY_PATH"),
            bridge: BridgeConfig::from_env(),
        })
    }

    /// Physical types the simulated module should expose.
    pub fn simulated_types(&self) -> Option<Vec<SensorType>> {
        self.simulated
            .as_ref()
            .map(|kinds| kinds.iter().map(|kind| kind.sensor_type()).collect())
    }

    /// Settings for the adaptor of the given kind.
    pub fn adaptor_config(&self, kind: SensorKind) -> AdaptorConfig {
        let initial_value_path = match kind {
            SensorKind::Light => self.initial_light_path.clone(),
            SensorKind::Proximity => self.initial_proximity_path.clone(),
            _ => None,
        };
        AdaptorConfig {
            standby_override: self.standby_override.contains(&kind),
            initial_value_path,
        }
    }
}

fn path_from_env(name: &str) -> Option<PathBuf> {
    std::env::var_os(name)
        .filter(|value| !value.is_empty())
        .map(PathBuf::from)
}

fn kinds_from_env(name: &str) -> Result<Option<Vec<SensorKind>>, Error> {
    match std::env::var(name) {
        Ok(value) => parse_kinds(&value).map(Some),
        Err(std::env::VarError::NotPresent) => Ok(None),
        Err(e) => Err(Error::Config(format!("{name}: {e}"))),
    }
}

/// Parse a comma separated adaptor id list. Empty items are skipped and
/// duplicates are dropped.
fn parse_kinds(value: &str) -> Result<Vec<SensorKind>, Error> {
    let mut kinds = Vec::new();
    for id in value.split(',').map(str::trim).filter(|id| !id.is_empty()) {
        let kind: SensorKind = id.parse()?;
        if !kinds.contains(&kind) {
            kinds.push(kind);
        }
    }
    Ok(kinds)
}
