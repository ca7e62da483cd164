//! Data types for activity sampling.
//!
//! A [`Sample`] is the only domain entity: one labeled observation produced
//! per tick by a device monitor or the heartbeat emitter.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Which producer a sample came from.
///
/// The label set is closed. Device labels are what ends up in the
/// `device` column of the store and on stdout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceKind {
    /// Pointing device (mouse, touchpad).
    Mouse,
    Keyboard,
    /// Synthetic "process alive" producer, not backed by a device.
    Heartbeat,
}

impl DeviceKind {
    /// Returns the persisted label.
    pub fn as_str(&self) -> &'static str {
        match self {
            DeviceKind::Mouse => "mouse",
            DeviceKind::Keyboard => "keyboard",
            DeviceKind::Heartbeat => "heartbeat",
        }
    }
}

impl fmt::Display for DeviceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One per-tick activity observation.
///
/// Samples carry no timestamp: the commit time is attached by the
/// persistence writer when the row is inserted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Sample {
    pub device: DeviceKind,
    /// Whether any activity was observed during the tick.
    pub used: bool,
}

impl Sample {
    pub fn active(device: DeviceKind) -> Self {
        Self { device, used: true }
    }

    pub fn idle(device: DeviceKind) -> Self {
        Self {
            device,
            used: false,
        }
    }

    /// Classifies a tick from the number of events drained during it.
    ///
    /// Bursts collapse to a single `used` flag; the count is not kept.
    pub fn from_event_count(device: DeviceKind, events: usize) -> Self {
        Self {
            device,
            used: events > 0,
        }
    }

    /// Integer form of `used` as stored in the `used` column.
    pub fn used_flag(&self) -> i64 {
        i64::from(self.used)
    }
}

/// Formats the stdout log line, `<device>,<used>`.
impl fmt::Display for Sample {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{}", self.device, self.used_flag())
    }
}
