use std::path::PathBuf;

use clap::Parser;

// Command-line arguments for the server binary
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Port to bind the HTTP server on
    #[arg(short, long, default_value_t = 3000)]
    pub port: u16,

    /// Directory derived thumbnails are written to
    #[arg(long, default_value = "uploads/thumbnails")]
    pub thumbnail_dir: PathBuf,

    /// Maximum accepted upload size in megabytes
    #[arg(long, default_value_t = 50)]
    pub max_upload_mb: u64,

    /// Signature matches above this count classify an upload as suspicious
    #[arg(long, default_value_t = 5)]
    pub suspicious_threshold: usize,
}

impl Args {
    pub fn max_upload_bytes(&self) -> usize {
        (self.max_upload_mb as usize) * 1024 * 1024
    }
}
