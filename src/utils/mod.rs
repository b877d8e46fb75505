//! Utility functions and helpers

use std::time::Duration;

/// Logging utilities
pub struct Logger;

impl Logger {
    /// Initialize logger with specified level. `RUST_LOG` still wins per module.
    pub fn init(level: log::LevelFilter) {
        let _ = env_logger::Builder::new()
            .filter_level(level)
            .parse_default_env()
            .format_timestamp_secs()
            .try_init();
    }

    /// Log scan start
    pub fn log_scan_start(target: &str, ports: usize, connector: &str) {
        log::info!("Starting exposure scan of {} ({} ports) using {}", target, ports, connector);
    }

    /// Log scan completion
    pub fn log_scan_complete(duration: Duration, open_ports: usize, total_ports: usize) {
        log::info!(
            "Scan completed in {:.2}s - {}/{} ports open",
            duration.as_secs_f64(),
            open_ports,
            total_ports
        );
    }

    /// Log a classification run
    pub fn log_classification(rows: usize, duration: Duration) {
        log::info!("Classified {} rows in {:.1}ms", rows, duration.as_secs_f64() * 1000.0);
    }
}
