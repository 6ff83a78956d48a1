//! Daemon lifecycle management for sensorbridge.
//!
//! Opens the sensor hardware, sets up one adaptor per configured logical
//! sensor, and tears everything down again on SIGINT or SIGTERM.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::signal::unix::{self, SignalKind};

use crate::tracing::prelude::*;
use crate::{
    adaptor::{AdaptedSensorEntry, SampleSink, SensorAdaptor, SensorKind, SessionId},
    bridge::HardwareBridge,
    config::DaemonConfig,
    hal::{self, SensorEvent},
};

/// Session the daemon itself uses for autostarted adaptors. A request of 0
/// leaves the choice of interval to the adaptor default.
const DAEMON_SESSION: SessionId = SessionId(0);

/// The main daemon.
pub struct Daemon {
    config: DaemonConfig,
}

impl Daemon {
    pub fn new(config: DaemonConfig) -> Self {
        Self { config }
    }

    /// Run the daemon until shutdown is requested.
    pub async fn run(self) -> anyhow::Result<()> {
        let simulated = self.config.simulated_types();
        if let Some(types) = &simulated {
            info!(sensors = types.len(), "Simulated sensor module enabled");
        }
        let module = hal::open_module(simulated.as_deref());
        let bridge = HardwareBridge::start(module, &self.config.bridge);

        let adaptors = self.create_adaptors(&bridge);
        self.autostart(&adaptors);

        info!(adaptors = adaptors.len(), "Started.");
        info!("For debugging, set RUST_LOG=sensorbridge=debug or trace.");

        let mut sigint = unix::signal(SignalKind::interrupt())?;
        let mut sigterm = unix::signal(SignalKind::terminate())?;

        tokio::select! {
            _ = sigint.recv() => {
                info!("Received SIGINT.");
            },
            _ = sigterm.recv() => {
                info!("Received SIGTERM.");
            },
        }

        // Joining the reader blocks for up to the join timeout
        let shutdown_bridge = Arc::clone(&bridge);
        tokio::task::spawn_blocking(move || shutdown_bridge.shutdown()).await?;
        drop(adaptors);

        info!("Exiting.");
        Ok(())
    }

    /// Create and register the configured adaptors.
    ///
    /// Adaptors without a backing physical sensor are logged and dropped.
    fn create_adaptors(
        &self,
        bridge: &Arc<HardwareBridge>,
    ) -> HashMap<SensorKind, Arc<SensorAdaptor>> {
        let mut adaptors = HashMap::new();

        for &kind in &self.config.sensors {
            debug!(adaptor = kind.id(), "Registering adaptor");
            let entry = Arc::new(AdaptedSensorEntry::new(kind.id()));
            let adaptor = SensorAdaptor::new(
                bridge,
                kind,
                self.config.adaptor_config(kind),
                entry,
                logging_sink(kind),
            );

            match adaptor.start_adaptor() {
                Ok(()) => {
                    info!(
                        adaptor = kind.id(),
                        sensor_type = %kind.sensor_type(),
                        "Adaptor ready"
                    );
                    adaptors.insert(kind, adaptor);
                }
                Err(e) => warn!(adaptor = kind.id(), error = %e, "Adaptor unavailable"),
            }
        }

        adaptors
    }

    fn autostart(&self, adaptors: &HashMap<SensorKind, Arc<SensorAdaptor>>) {
        for kind in &self.config.autostart {
            let Some(adaptor) = adaptors.get(kind) else {
                warn!(adaptor = kind.id(), "Cannot autostart unavailable adaptor");
                continue;
            };

            let started = adaptor
                .start_sensor()
                .and_then(|()| adaptor.request_interval(DAEMON_SESSION, 0));
            match started {
                Ok(decision) => info!(
                    adaptor = kind.id(),
                    interval_ms = decision.interval,
                    "Adaptor started"
                ),
                Err(e) => warn!(adaptor = kind.id(), error = %e, "Failed to start adaptor"),
            }
        }
    }
}

/// Sink that logs every sample it receives.
fn logging_sink(kind: SensorKind) -> Arc<dyn SampleSink> {
    Arc::new(move |event: &SensorEvent| {
        debug!(
            adaptor = kind.id(),
            handle = %event.sensor,
            timestamp = event.timestamp,
            value = event.data[0],
            "Sample"
        );
    })
}
