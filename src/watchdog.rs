//! External watchdog: probes the service's health surface from a separate
//! process on its own cadence. It depends only on the health endpoint's
//! request/response shape and keeps working no matter how starved the
//! serving process is. Every sample is appended to a durable log and
//! surfaced to the operator via tracing.

use crate::config::WatchdogArgs;
use crate::error::Result;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;
use std::future::Future;
use std::path::Path;
use std::time::{Duration, Instant};
use tokio::fs::{File, OpenOptions};
use tokio::io::AsyncWriteExt;
use tracing::{info, warn};

/// Classification of one health probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ProbeStatus {
    Responsive,
    Timeout,
    Error,
}

impl fmt::Display for ProbeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProbeStatus::Responsive => write!(f, "responsive"),
            ProbeStatus::Timeout => write!(f, "TIMEOUT"),
            ProbeStatus::Error => write!(f, "ERROR"),
        }
    }
}

/// One probe outcome. Immutable once constructed; appended to the log and
/// never mutated.
#[derive(Debug, Clone, Serialize)]
pub struct WatchdogSample {
    pub status: ProbeStatus,
    pub response_time_ms: u64,
    pub http_status: Option<u16>,
    pub failure: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl WatchdogSample {
    /// Samples that indicate degraded responsiveness get operator-facing
    /// urgency: timeouts, connection errors, and slow-but-successful probes.
    pub fn is_urgent(&self, slow_threshold: Duration) -> bool {
        self.status != ProbeStatus::Responsive
            || self.response_time_ms > slow_threshold.as_millis() as u64
    }

    /// One line of the append-only watchdog log.
    pub fn log_line(&self) -> String {
        let http = match (self.http_status, &self.failure) {
            (Some(code), _) => code.to_string(),
            (None, Some(reason)) => reason.clone(),
            (None, None) => "-".to_string(),
        };
        format!(
            "{} | Status: {} | Response: {}ms | HTTP: {}",
            self.timestamp.to_rfc3339(),
            self.status,
            self.response_time_ms,
            http
        )
    }
}

/// Append-only, per-line-flushed sample log. Flushing on every append keeps
/// the log durable even if the watchdog is killed mid-run.
pub struct WatchdogLog {
    file: File,
}

impl WatchdogLog {
    pub async fn open(path: &Path) -> Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path).await?;
        Ok(WatchdogLog { file })
    }

    pub async fn append(&mut self, sample: &WatchdogSample) -> Result<()> {
        let mut line = sample.log_line();
        line.push('\n');
        self.file.write_all(line.as_bytes()).await?;
        self.file.flush().await?;
        Ok(())
    }

    pub async fn flush(&mut self) -> Result<()> {
        self.file.flush().await?;
        Ok(())
    }
}

pub struct Watchdog {
    client: reqwest::Client,
    args: WatchdogArgs,
}

impl Watchdog {
    pub fn new(args: WatchdogArgs) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(args.timeout()).build()?;
        Ok(Watchdog { client, args })
    }

    /// Issues one bounded-timeout probe and classifies the outcome. Never
    /// fails: every failure mode becomes a classified sample.
    pub async fn probe(&self) -> WatchdogSample {
        let started = Instant::now();
        match self.client.get(&self.args.url).send().await {
            Ok(response) => WatchdogSample {
                status: ProbeStatus::Responsive,
                response_time_ms: started.elapsed().as_millis() as u64,
                http_status: Some(response.status().as_u16()),
                failure: None,
                timestamp: Utc::now(),
            },
            Err(e) if e.is_timeout() => WatchdogSample {
                status: ProbeStatus::Timeout,
                response_time_ms: started.elapsed().as_millis() as u64,
                http_status: None,
                failure: Some("probe exceeded timeout".to_string()),
                timestamp: Utc::now(),
            },
            Err(e) => WatchdogSample {
                status: ProbeStatus::Error,
                response_time_ms: started.elapsed().as_millis() as u64,
                http_status: None,
                failure: Some(e.to_string()),
                timestamp: Utc::now(),
            },
        }
    }

    /// Probe loop: idle -> probe -> classify -> log, repeating every
    /// interval until the shutdown future resolves. Pending log writes are
    /// flushed before returning.
    pub async fn run<F>(&self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        let mut log = WatchdogLog::open(&self.args.log_file).await?;
        let mut ticker = tokio::time::interval(self.args.interval());
        info!(
            url = %self.args.url,
            interval_secs = self.args.interval_secs,
            "external watchdog started"
        );

        tokio::pin!(shutdown);
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let sample = self.probe().await;
                    if sample.is_urgent(Duration::from_millis(self.args.slow_threshold_ms)) {
                        warn!(sample = %sample.log_line(), "degraded responsiveness detected");
                    } else {
                        info!(sample = %sample.log_line(), "service healthy");
                    }
                    log.append(&sample).await?;
                }
                _ = &mut shutdown => {
                    log.flush().await?;
                    info!("watchdog shutting down");
                    return Ok(());
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(status: ProbeStatus, ms: u64) -> WatchdogSample {
        WatchdogSample {
            status,
            response_time_ms: ms,
            http_status: (status == ProbeStatus::Responsive).then_some(200),
            failure: None,
            timestamp: Utc::now(),
        }
    }

    #[test]
    fn slow_responsive_samples_are_urgent() {
        let threshold = Duration::from_millis(1000);
        assert!(!sample(ProbeStatus::Responsive, 40).is_urgent(threshold));
        assert!(sample(ProbeStatus::Responsive, 1500).is_urgent(threshold));
        assert!(sample(ProbeStatus::Timeout, 2000).is_urgent(threshold));
        assert!(sample(ProbeStatus::Error, 3).is_urgent(threshold));
    }

    #[test]
    fn log_line_carries_status_and_timing() {
        let s = sample(ProbeStatus::Responsive, 12);
        let line = s.log_line();
        assert!(line.contains("Status: responsive"));
        assert!(line.contains("Response: 12ms"));
        assert!(line.contains("HTTP: 200"));
    }
}
