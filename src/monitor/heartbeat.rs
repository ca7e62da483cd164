//! Heartbeat emitter.

use crate::monitor::Producer;
use crate::types::{DeviceKind, Sample};

/// Emits an active `heartbeat` sample every tick to show the process is up.
#[derive(Debug, Default)]
pub struct Heartbeat;

impl Producer for Heartbeat {
    fn name(&self) -> String {
        "heartbeat".into()
    }

    fn tick(&mut self) -> Sample {
        Sample::active(DeviceKind::Heartbeat)
    }
}
