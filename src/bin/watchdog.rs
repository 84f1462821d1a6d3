// src/bin/watchdog.rs

use clap::Parser;
use fileforge::config::WatchdogArgs;
use fileforge::watchdog::Watchdog;
use tracing::error;
use tracing_subscriber::{fmt, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = WatchdogArgs::parse();
    let watchdog = Watchdog::new(args)?;

    // Runs until operator interrupt; the watchdog flushes its log before
    // exiting.
    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "failed to listen for ctrl-c");
        }
    };
    watchdog.run(shutdown).await?;
    Ok(())
}
