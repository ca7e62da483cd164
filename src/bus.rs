//! Sample bus: bounded fan-in channel from producers to the writer.
//!
//! Per-producer order is preserved; interleaving across producers is not
//! defined. When the bus is full, producers block until the writer catches
//! up or shutdown is requested.

use crate::shutdown::Shutdown;
use crate::types::Sample;
use crossbeam_channel::{bounded, select, Receiver, Sender, TrySendError};

/// Creates a bus holding at most `capacity` queued samples.
pub fn sample_bus(capacity: usize) -> (BusSender, BusReceiver) {
    let (tx, rx) = bounded(capacity);
    (BusSender { tx }, BusReceiver { rx })
}

/// Producer end. Clone one per producer thread.
#[derive(Debug, Clone)]
pub struct BusSender {
    tx: Sender<Sample>,
}

impl BusSender {
    /// Enqueues a sample, blocking while the bus is full.
    pub fn send(&self, sample: Sample, shutdown: &Shutdown) -> Result<(), SendError> {
        let sample = match self.tx.try_send(sample) {
            Ok(()) => return Ok(()),
            Err(TrySendError::Disconnected(_)) => return Err(SendError::Disconnected),
            Err(TrySendError::Full(sample)) => sample,
        };

        tracing::trace!(device = %sample.device, "Sample bus full, waiting for writer");

        select! {
            send(self.tx, sample) -> res => res.map_err(|_| SendError::Disconnected),
            recv(shutdown.signal()) -> _ => Err(SendError::Stopped),
        }
    }
}

/// Consumer end, owned by the persistence writer.
#[derive(Debug)]
pub struct BusReceiver {
    rx: Receiver<Sample>,
}

impl BusReceiver {
    /// Blocks until a sample arrives. `None` once every sender is gone and
    /// the queue is drained.
    pub fn recv(&self) -> Option<Sample> {
        self.rx.recv().ok()
    }

    pub fn iter(&self) -> impl Iterator<Item = Sample> + '_ {
        self.rx.iter()
    }
}

/// Why a sample could not be enqueued.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendError {
    /// Shutdown was requested while waiting for space.
    Stopped,
    /// The writer is gone.
    Disconnected,
}

impl std::fmt::Display for SendError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SendError::Stopped => write!(f, "shutdown requested while bus was full"),
            SendError::Disconnected => write!(f, "sample bus disconnected"),
        }
    }
}

impl std::error::Error for SendError {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::DeviceKind;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn test_fifo_within_producer() {
        let (tx, rx) = sample_bus(8);
        let shutdown = Shutdown::new();

        tx.send(Sample::active(DeviceKind::Mouse), &shutdown).unwrap();
        tx.send(Sample::idle(DeviceKind::Mouse), &shutdown).unwrap();
        tx.send(Sample::active(DeviceKind::Mouse), &shutdown).unwrap();
        drop(tx);

        let used: Vec<bool> = rx.iter().map(|s| s.used).collect();
        assert_eq!(used, vec![true, false, true]);
    }

    #[test]
    fn test_full_bus_blocks_until_drained() {
        let (tx, rx) = sample_bus(1);
        let shutdown = Shutdown::new();
        tx.send(Sample::active(DeviceKind::Heartbeat), &shutdown).unwrap();

        let producer = thread::spawn(move || {
            tx.send(Sample::idle(DeviceKind::Keyboard), &shutdown)
        });

        thread::sleep(Duration::from_millis(30));
        assert!(!producer.is_finished());
        assert_eq!(rx.recv(), Some(Sample::active(DeviceKind::Heartbeat)));

        assert_eq!(producer.join().unwrap(), Ok(()));
        assert_eq!(rx.recv(), Some(Sample::idle(DeviceKind::Keyboard)));
        assert_eq!(rx.recv(), None);
    }

    #[test]
    fn test_shutdown_releases_blocked_sender() {
        let (tx, _rx) = sample_bus(1);
        let shutdown = Shutdown::new();
        tx.send(Sample::active(DeviceKind::Mouse), &shutdown).unwrap();

        let stopper = shutdown.clone();
        let producer = thread::spawn(move || {
            tx.send(Sample::active(DeviceKind::Mouse), &shutdown)
        });

        thread::sleep(Duration::from_millis(20));
        stopper.trigger();
        assert_eq!(producer.join().unwrap(), Err(SendError::Stopped));
    }

    #[test]
    fn test_send_after_writer_gone() {
        let (tx, rx) = sample_bus(4);
        drop(rx);
        let result = tx.send(Sample::active(DeviceKind::Mouse), &Shutdown::new());
        assert_eq!(result, Err(SendError::Disconnected));
    }
}
