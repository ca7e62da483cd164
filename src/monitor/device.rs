//! Device monitor: classifies each tick of one input device as active or idle.

use crate::monitor::source::EventSource;
use crate::monitor::Producer;
use crate::types::{DeviceKind, Sample};
use std::path::PathBuf;

/// Polls one exclusively owned event source.
///
/// A tick with at least one event is active. A tick with no events, or whose
/// read failed, is idle. Read failures are logged and never end the loop.
pub struct DeviceMonitor<S> {
    kind: DeviceKind,
    path: PathBuf,
    source: S,
    read_errors: u64,
}

impl<S: EventSource> DeviceMonitor<S> {
    pub fn new(kind: DeviceKind, path: impl Into<PathBuf>, source: S) -> Self {
        Self {
            kind,
            path: path.into(),
            source,
            read_errors: 0,
        }
    }

    /// Number of failed reads so far.
    pub fn read_errors(&self) -> u64 {
        self.read_errors
    }
}

impl<S: EventSource> Producer for DeviceMonitor<S> {
    fn name(&self) -> String {
        format!("monitor-{}", self.kind)
    }

    fn tick(&mut self) -> Sample {
        match self.source.drain() {
            Ok(events) => {
                tracing::trace!(device = %self.kind, events, "Drained input events");
                Sample::from_event_count(self.kind, events)
            }
            Err(e) => {
                self.read_errors += 1;
                tracing::warn!(
                    device = %self.kind,
                    path = ?self.path,
                    error = %e,
                    "Error reading input events"
                );
                Sample::idle(self.kind)
            }
        }
    }
}
