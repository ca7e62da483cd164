//! Apodemus - minimal input activity collector.
//!
//! Once per tick, each device monitor records whether its raw input device
//! produced any events, and a heartbeat records that the process is alive.
//! Every sample travels over a bounded bus to a single writer that prints it
//! and appends it to a SQLite table.
//!
//! ```text
//!  DeviceMonitor (mouse) ──┐
//!  DeviceMonitor (kbd)   ──┼──▶ sample bus ──▶ PersistenceWriter ──▶ usage_stats
//!  Heartbeat             ──┘   (bounded)           │
//!                                                  └──▶ stdout "<device>,<used>"
//! ```

pub mod bus;
pub mod config;
pub mod database;
pub mod monitor;
pub mod pipeline;
pub mod shutdown;
pub mod types;
pub mod writer;

pub use config::{Config, ConfigError, DeviceConfig};
pub use database::Database;
pub use pipeline::{Pipeline, StartupError};
pub use shutdown::Shutdown;
pub use types::{DeviceKind, Sample};
pub use writer::{PersistenceWriter, SampleSink, WriterStats};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
