//! Startup phase and thread wiring.
//!
//! Every resource (config, store, devices) is acquired before any thread is
//! spawned. Failures are returned as one [`StartupError`]; nothing deep in a
//! worker aborts the process.

use crate::bus::sample_bus;
use crate::config::{Config, ConfigError, DeviceConfig};
use crate::database::Database;
use crate::monitor::{spawn_producer, DeviceMonitor, EventSource, EvdevSource, Heartbeat, Schedule};
use crate::shutdown::Shutdown;
use crate::types::DeviceKind;
use crate::writer::{PersistenceWriter, SampleSink, WriterStats};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::thread::JoinHandle;

/// Running producers and writer.
pub struct Pipeline {
    producers: Vec<(String, JoinHandle<u64>)>,
    writer: JoinHandle<WriterStats>,
}

impl Pipeline {
    /// Validates `config`, opens the store and every device, then starts
    /// the monitors, heartbeat and writer. Samples are logged to stdout.
    pub fn start(config: &Config, shutdown: &Shutdown) -> Result<Self, StartupError> {
        config.validate()?;
        let database = Database::open(&config.database_path)?;
        let sources = open_devices(&config.devices, EvdevSource::open)?;

        Self::launch(config, shutdown, sources, database, io::stdout())
    }

    /// Starts the threads over already opened resources.
    pub fn launch<S, K, W>(
        config: &Config,
        shutdown: &Shutdown,
        sources: Vec<(DeviceConfig, S)>,
        sink: K,
        output: W,
    ) -> Result<Self, StartupError>
    where
        S: EventSource + Send + 'static,
        K: SampleSink + Send + 'static,
        W: Write + Send + 'static,
    {
        let schedule = Schedule::every(config.tick_interval).with_max_ticks(config.max_ticks);
        let (bus, receiver) = sample_bus(config.bus_capacity);

        let writer = PersistenceWriter::new(sink, output)
            .spawn(receiver)
            .map_err(StartupError::Spawn)?;

        let mut producers = Vec::with_capacity(sources.len() + 1);
        let mut spawn = |result: io::Result<JoinHandle<u64>>, name: String| match result {
            Ok(handle) => {
                producers.push((name, handle));
                Ok(())
            }
            Err(e) => {
                // Already running threads exit at their next tick boundary
                shutdown.trigger();
                Err(StartupError::Spawn(e))
            }
        };

        for (device, source) in sources {
            let name = format!("{} ({})", device.kind, device.path.display());
            let monitor = DeviceMonitor::new(device.kind, device.path, source);
            spawn(
                spawn_producer(monitor, schedule, bus.clone(), shutdown.clone()),
                name,
            )?;
        }
        spawn(
            spawn_producer(Heartbeat, schedule, bus, shutdown.clone()),
            DeviceKind::Heartbeat.to_string(),
        )?;

        tracing::info!(
            producers = producers.len(),
            capacity = config.bus_capacity,
            "Pipeline started"
        );

        Ok(Self { producers, writer })
    }

    /// Waits for every producer to stop, then for the writer to drain the bus.
    pub fn join(self) -> WriterStats {
        for (name, handle) in self.producers {
            match handle.join() {
                Ok(samples) => tracing::debug!(producer = %name, samples, "Producer joined"),
                Err(_) => tracing::error!(producer = %name, "Producer thread panicked"),
            }
        }

        self.writer.join().unwrap_or_else(|_| {
            tracing::error!("Persistence writer thread panicked");
            WriterStats::default()
        })
    }
}

/// Opens every configured device, collecting all failures.
pub fn open_devices<S, F>(
    devices: &[DeviceConfig],
    mut open: F,
) -> Result<Vec<(DeviceConfig, S)>, StartupError>
where
    F: FnMut(&Path) -> io::Result<S>,
{
    let mut opened = Vec::with_capacity(devices.len());
    let mut failures = Vec::new();

    for device in devices {
        match open(&device.path) {
            Ok(source) => {
                tracing::info!(device = %device.kind, path = ?device.path, "Device opened");
                opened.push((device.clone(), source));
            }
            Err(error) => {
                tracing::error!(
                    device = %device.kind,
                    path = ?device.path,
                    %error,
                    "Failed to open device"
                );
                failures.push(DeviceOpenError {
                    kind: device.kind,
                    path: device.path.clone(),
                    error,
                });
            }
        }
    }

    if failures.is_empty() {
        Ok(opened)
    } else {
        Err(StartupError::Devices(failures))
    }
}

/// A device that could not be opened at startup.
#[derive(Debug)]
pub struct DeviceOpenError {
    pub kind: DeviceKind,
    pub path: PathBuf,
    pub error: io::Error,
}

impl std::fmt::Display for DeviceOpenError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "failed to open {} device {}: {}",
            self.kind,
            self.path.display(),
            self.error
        )
    }
}

/// Errors that prevent the collector from starting.
#[derive(Debug)]
pub enum StartupError {
    Config(ConfigError),
    Database(rusqlite::Error),
    Devices(Vec<DeviceOpenError>),
    Spawn(io::Error),
}

impl std::fmt::Display for StartupError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StartupError::Config(e) => write!(f, "{e}"),
            StartupError::Database(e) => write!(f, "Failed to initialize database: {e}"),
            StartupError::Devices(failures) => {
                write!(f, "{} device(s) could not be opened", failures.len())?;
                for failure in failures {
                    write!(f, "\n  {failure}")?;
                }
                Ok(())
            }
            StartupError::Spawn(e) => write!(f, "Failed to spawn thread: {e}"),
        }
    }
}

impl std::error::Error for StartupError {}

impl From<ConfigError> for StartupError {
    fn from(e: ConfigError) -> Self {
        StartupError::Config(e)
    }
}

impl From<rusqlite::Error> for StartupError {
    fn from(e: rusqlite::Error) -> Self {
        StartupError::Database(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Sample;
    use chrono::{DateTime, Utc};
    use std::time::Duration;

    struct Quiet;

    impl EventSource for Quiet {
        fn drain(&mut self) -> io::Result<usize> {
            Ok(0)
        }
    }

    #[derive(Default)]
    struct Collect(Vec<Sample>);

    impl SampleSink for std::sync::Arc<std::sync::Mutex<Collect>> {
        type Error = String;

        fn append(&mut self, sample: &Sample, _at: DateTime<Utc>) -> Result<(), String> {
            self.lock().map_err(|e| e.to_string())?.0.push(*sample);
            Ok(())
        }
    }

    #[test]
    fn test_open_devices_aggregates_failures() {
        let devices = vec![
            DeviceConfig::new(DeviceKind::Mouse, "/dev/input/event16"),
            DeviceConfig::new(DeviceKind::Keyboard, "/dev/input/event19"),
            DeviceConfig::new(DeviceKind::Keyboard, "/dev/input/event20"),
        ];

        let result = open_devices(&devices, |path| {
            if path.ends_with("event16") {
                Ok(Quiet)
            } else {
                Err(io::Error::new(io::ErrorKind::PermissionDenied, "denied"))
            }
        });

        match result {
            Err(StartupError::Devices(failures)) => {
                assert_eq!(failures.len(), 2);
                assert_eq!(failures[0].path, PathBuf::from("/dev/input/event19"));
                assert_eq!(failures[1].path, PathBuf::from("/dev/input/event20"));
            }
            _ => panic!("expected aggregated device errors"),
        }
    }

    #[test]
    fn test_startup_error_lists_every_device() {
        let error = StartupError::Devices(vec![
            DeviceOpenError {
                kind: DeviceKind::Mouse,
                path: PathBuf::from("/dev/input/event16"),
                error: io::Error::new(io::ErrorKind::PermissionDenied, "Permission denied"),
            },
            DeviceOpenError {
                kind: DeviceKind::Keyboard,
                path: PathBuf::from("/dev/input/event19"),
                error: io::Error::new(io::ErrorKind::NotFound, "No such file or directory"),
            },
        ]);

        let message = error.to_string();
        assert!(message.starts_with("2 device(s) could not be opened"));
        assert!(message.contains("failed to open mouse device /dev/input/event16: Permission denied"));
        assert!(message.contains("failed to open keyboard device /dev/input/event19"));
        assert!(!message.contains("DeviceOpenError"));
    }

    #[test]
    fn test_start_rejects_invalid_config() {
        let config = Config {
            devices: Vec::new(),
            ..Config::default()
        };
        let result = Pipeline::start(&config, &Shutdown::new());
        assert!(matches!(result, Err(StartupError::Config(_))));
    }

    #[test]
    fn test_start_fails_on_missing_device() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config {
            devices: vec![DeviceConfig::new(DeviceKind::Mouse, "/nonexistent/input/event0")],
            database_path: dir.path().join("usage_stats.db"),
            ..Config::default()
        };

        let result = Pipeline::start(&config, &Shutdown::new());
        assert!(matches!(result, Err(StartupError::Devices(ref f)) if f.len() == 1));
        // The store was still initialized before the devices were tried
        assert!(dir.path().join("usage_stats.db").exists());
    }

    #[test]
    fn test_shutdown_stops_running_pipeline() {
        let config = Config {
            devices: vec![DeviceConfig::new(DeviceKind::Mouse, "/dev/input/event16")],
            tick_interval: Duration::from_millis(5),
            ..Config::default()
        };
        let sources = vec![(config.devices[0].clone(), Quiet)];
        let sink = std::sync::Arc::new(std::sync::Mutex::new(Collect::default()));
        let shutdown = Shutdown::new();

        let pipeline =
            Pipeline::launch(&config, &shutdown, sources, sink.clone(), io::sink()).unwrap();
        std::thread::sleep(Duration::from_millis(40));
        shutdown.trigger();
        let stats = pipeline.join();

        let stored = sink.lock().unwrap();
        assert_eq!(stats.persisted as usize, stored.0.len());
        assert!(stored.0.contains(&Sample::idle(DeviceKind::Mouse)));
        assert!(stored.0.contains(&Sample::active(DeviceKind::Heartbeat)));
    }
}
