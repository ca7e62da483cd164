//! Apodemus - input activity collector.
//!
//! Samples the configured input devices once per tick, writes one line per
//! sample to stdout and one row per sample to SQLite. Runs until Ctrl+C.

use apodemus::{Config, Pipeline, Shutdown, VERSION};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Diagnostics go to stderr; stdout carries only sample lines
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("apodemus=info")),
        )
        .init();

    let config = match Config::load() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{e}");
            std::process::exit(1);
        }
    };
    tracing::info!(
        version = VERSION,
        devices = config.devices.len(),
        interval_ms = config.tick_interval.as_millis(),
        database = ?config.database_path,
        "Starting collector"
    );

    let shutdown = Shutdown::new();
    let shutdown_ctrlc = shutdown.clone();
    ctrlc::set_handler(move || {
        tracing::info!("Shutdown signal received");
        shutdown_ctrlc.trigger();
    })?;

    let pipeline = match Pipeline::start(&config, &shutdown) {
        Ok(pipeline) => pipeline,
        Err(e) => {
            tracing::error!("Startup failed");
            eprintln!("{e}");
            std::process::exit(1);
        }
    };

    let tracked = config
        .devices
        .iter()
        .map(|d| format!("{} ({})", d.kind, d.path.display()))
        .collect::<Vec<_>>()
        .join(", ");
    eprintln!("Tracking {tracked}. Press Ctrl+C to exit.");

    let stats = pipeline.join();
    tracing::info!(
        received = stats.received,
        persisted = stats.persisted,
        failed = stats.failed,
        "Collector stopped"
    );

    Ok(())
}
