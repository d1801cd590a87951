//! Standalone binary for serving generated tiles
//!
//! Usage:
//!   cargo run --bin serve_api -- modelos --port 5000

use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use rust_dcgan_azulejos::{server, utils::ServerConfig};

/// Serve tiles drawn by a trained generator
#[derive(Parser)]
#[command(name = "serve_api")]
#[command(about = "HTTP endpoint returning a freshly generated azulejo per request")]
struct Args {
    /// Model file, or a directory to pick a random model from per request
    #[arg(default_value = "modelos")]
    model_path: PathBuf,

    /// Bind address
    #[arg(long, default_value = "127.0.0.1")]
    host: String,

    /// Bind port
    #[arg(short, long, default_value = "5000")]
    port: u16,

    /// Use GPU if available
    #[arg(long)]
    gpu: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Setup logging
    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .with_target(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let args = Args::parse();

    // Determine device
    let device = if args.gpu && tch::Cuda::is_available() {
        info!("Using CUDA GPU");
        tch::Device::Cuda(0)
    } else {
        info!("Using CPU");
        tch::Device::Cpu
    };

    let config = ServerConfig {
        host: args.host,
        port: args.port,
        model_path: args.model_path,
    };
    server::serve(config, device).await
}
