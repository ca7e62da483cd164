//! Periodic sample producers.
//!
//! Device monitors poll one raw input device per tick; the heartbeat emits
//! an unconditional liveness sample. Both run the same tick loop on their
//! own thread and push into the sample bus.

pub mod device;
pub mod heartbeat;
pub mod source;

pub use device::*;
pub use heartbeat::*;
pub use source::*;

use crate::bus::{BusSender, SendError};
use crate::shutdown::Shutdown;
use crate::types::Sample;
use std::io;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// Something that yields one sample per tick.
pub trait Producer {
    /// Thread name and log label.
    fn name(&self) -> String;

    fn tick(&mut self) -> Sample;
}

/// Tick cadence shared by all producers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Schedule {
    pub interval: Duration,
    /// Stop after this many samples. `None` runs until shutdown.
    pub max_ticks: Option<u64>,
}

impl Schedule {
    pub fn every(interval: Duration) -> Self {
        Self {
            interval,
            max_ticks: None,
        }
    }

    pub fn with_max_ticks(mut self, max_ticks: Option<u64>) -> Self {
        self.max_ticks = max_ticks;
        self
    }
}

/// Runs the tick loop until shutdown, the tick limit, or the writer going away.
///
/// Shutdown is checked at every tick boundary and while blocked on a full
/// bus. Returns the number of samples enqueued.
pub fn run_producer<P: Producer>(
    producer: &mut P,
    schedule: Schedule,
    bus: &BusSender,
    shutdown: &Shutdown,
) -> u64 {
    let name = producer.name();
    tracing::info!(
        producer = %name,
        interval_ms = schedule.interval.as_millis(),
        "Producer started"
    );

    let mut sent = 0u64;
    while !shutdown.is_triggered() {
        let started = Instant::now();
        let sample = producer.tick();

        match bus.send(sample, shutdown) {
            Ok(()) => sent += 1,
            Err(SendError::Stopped) => break,
            Err(e @ SendError::Disconnected) => {
                tracing::warn!(producer = %name, error = %e, "Writer gone, stopping");
                break;
            }
        }

        if schedule.max_ticks.is_some_and(|max| sent >= max) {
            break;
        }

        // Sleep for whatever is left of the interval
        if shutdown.wait(schedule.interval.saturating_sub(started.elapsed())) {
            break;
        }
    }

    tracing::info!(producer = %name, samples = sent, "Producer stopped");
    sent
}

/// Spawns a named thread running [`run_producer`].
pub fn spawn_producer<P>(
    mut producer: P,
    schedule: Schedule,
    bus: BusSender,
    shutdown: Shutdown,
) -> io::Result<JoinHandle<u64>>
where
    P: Producer + Send + 'static,
{
    thread::Builder::new()
        .name(producer.name())
        .spawn(move || run_producer(&mut producer, schedule, &bus, &shutdown))
}
