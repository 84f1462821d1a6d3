// src/bin/server.rs

use clap::Parser;
use fileforge::config::ServerArgs;
use fileforge::server::run_server;
use tracing_subscriber::{fmt, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = ServerArgs::parse();
    run_server(args).await?;
    Ok(())
}
