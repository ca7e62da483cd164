//! Persistence writer: sole consumer of the sample bus.
//!
//! For every sample, in the order received, the writer prints the
//! `<device>,<used>` line and appends one row stamped with the commit time.
//! A failed insert is logged and the sample dropped; the loop keeps going.

use crate::bus::BusReceiver;
use crate::types::Sample;
use chrono::{DateTime, Utc};
use std::io::{self, Write};
use std::thread::{self, JoinHandle};

/// Destination for persisted samples.
pub trait SampleSink {
    type Error: std::fmt::Display;

    fn append(&mut self, sample: &Sample, at: DateTime<Utc>) -> Result<(), Self::Error>;
}

/// Counters reported when the writer exits.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WriterStats {
    pub received: u64,
    pub persisted: u64,
    pub failed: u64,
}

pub struct PersistenceWriter<K, W> {
    sink: K,
    output: W,
    stats: WriterStats,
}

impl<K: SampleSink, W: Write> PersistenceWriter<K, W> {
    pub fn new(sink: K, output: W) -> Self {
        Self {
            sink,
            output,
            stats: WriterStats::default(),
        }
    }

    /// Logs and persists one sample with the current time.
    pub fn handle(&mut self, sample: Sample) {
        self.handle_at(sample, Utc::now());
    }

    fn handle_at(&mut self, sample: Sample, at: DateTime<Utc>) {
        self.stats.received += 1;

        if let Err(e) = writeln!(self.output, "{sample}").and_then(|()| self.output.flush()) {
            tracing::warn!(?e, "Failed to write sample line");
        }

        match self.sink.append(&sample, at) {
            Ok(()) => {
                self.stats.persisted += 1;
                tracing::trace!(device = %sample.device, used = sample.used, "Sample persisted");
            }
            Err(e) => {
                self.stats.failed += 1;
                tracing::error!(
                    device = %sample.device,
                    used = sample.used,
                    error = %e,
                    "Failed to insert sample"
                );
            }
        }
    }

    /// Drains the bus until every producer has hung up.
    pub fn run(mut self, bus: BusReceiver) -> WriterStats {
        tracing::info!("Persistence writer started");

        for sample in bus.iter() {
            self.handle(sample);
        }

        tracing::info!(
            received = self.stats.received,
            persisted = self.stats.persisted,
            failed = self.stats.failed,
            "Persistence writer stopped"
        );
        self.stats
    }

    pub fn stats(&self) -> WriterStats {
        self.stats
    }
}

impl<K, W> PersistenceWriter<K, W>
where
    K: SampleSink + Send + 'static,
    W: Write + Send + 'static,
{
    /// Runs the writer on its own thread.
    pub fn spawn(self, bus: BusReceiver) -> io::Result<JoinHandle<WriterStats>> {
        thread::Builder::new()
            .name("persistence-writer".into())
            .spawn(move || self.run(bus))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::sample_bus;
    use crate::database::Database;
    use crate::shutdown::Shutdown;
    use crate::types::DeviceKind;

    /// Sink that rejects the calls listed in `fail_on` (0-based).
    #[derive(Default)]
    struct FlakySink {
        calls: usize,
        fail_on: Vec<usize>,
        rows: Vec<(Sample, DateTime<Utc>)>,
    }

    impl SampleSink for FlakySink {
        type Error = String;

        fn append(&mut self, sample: &Sample, at: DateTime<Utc>) -> Result<(), String> {
            let call = self.calls;
            self.calls += 1;
            if self.fail_on.contains(&call) {
                return Err("store unavailable".into());
            }
            self.rows.push((*sample, at));
            Ok(())
        }
    }

    fn samples() -> Vec<Sample> {
        vec![
            Sample::active(DeviceKind::Mouse),
            Sample::active(DeviceKind::Heartbeat),
            Sample::idle(DeviceKind::Keyboard),
            Sample::idle(DeviceKind::Mouse),
        ]
    }

    #[test]
    fn test_one_row_and_line_per_sample_in_order() {
        let mut writer = PersistenceWriter::new(FlakySink::default(), Vec::new());
        for sample in samples() {
            writer.handle(sample);
        }

        let stored: Vec<Sample> = writer.sink.rows.iter().map(|(s, _)| *s).collect();
        assert_eq!(stored, samples());

        let output = String::from_utf8(writer.output.clone()).unwrap();
        assert_eq!(output, "mouse,1\nheartbeat,1\nkeyboard,0\nmouse,0\n");
        assert_eq!(
            writer.stats(),
            WriterStats {
                received: 4,
                persisted: 4,
                failed: 0
            }
        );
    }

    #[test]
    fn test_failed_insert_does_not_block_next_sample() {
        let sink = FlakySink {
            fail_on: vec![1],
            ..FlakySink::default()
        };
        let mut writer = PersistenceWriter::new(sink, Vec::new());
        for sample in samples() {
            writer.handle(sample);
        }

        let stored: Vec<Sample> = writer.sink.rows.iter().map(|(s, _)| *s).collect();
        assert_eq!(
            stored,
            vec![
                Sample::active(DeviceKind::Mouse),
                Sample::idle(DeviceKind::Keyboard),
                Sample::idle(DeviceKind::Mouse),
            ]
        );
        // The failed sample is still logged
        let lines = String::from_utf8(writer.output.clone()).unwrap();
        assert_eq!(lines.lines().count(), 4);
        assert_eq!(writer.stats().failed, 1);
        assert_eq!(writer.stats().persisted, 3);
    }

    #[test]
    fn test_run_drains_queue_after_producers_hang_up() {
        let (tx, rx) = sample_bus(8);
        let shutdown = Shutdown::new();
        for sample in samples() {
            tx.send(sample, &shutdown).unwrap();
        }
        drop(tx);

        let db = Database::open_in_memory().unwrap();
        let stats = PersistenceWriter::new(db, io::sink())
            .spawn(rx)
            .unwrap()
            .join()
            .unwrap();

        assert_eq!(stats.received, 4);
        assert_eq!(stats.persisted, 4);
    }
}
