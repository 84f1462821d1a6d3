use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;

// Command-line arguments for the watchdog binary
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Health endpoint to probe (the watchdog's only contract with the service)
    #[arg(short, long, default_value = "http://localhost:3000/health")]
    pub url: String,

    /// Seconds between probes
    #[arg(short, long, default_value_t = 5)]
    pub interval_secs: u64,

    /// Per-probe timeout in milliseconds
    #[arg(short, long, default_value_t = 2000)]
    pub timeout_ms: u64,

    /// Append-only log file for watchdog samples
    #[arg(short, long, default_value = "monitoring-log.txt")]
    pub log_file: PathBuf,

    /// Responses slower than this (milliseconds) are flagged as urgent
    #[arg(long, default_value_t = 1000)]
    pub slow_threshold_ms: u64,
}

impl Args {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}
