//! DCGAN for Azulejo Tiles
//!
//! Main entry point providing CLI interface for:
//! - Building the augmented tile dataset
//! - Training the DCGAN model
//! - Serving and generating tiles from a trained generator

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use rust_dcgan_azulejos::{
    model::TopologyVariant,
    pipeline, server,
    utils::Config,
};

/// Azulejo tile generator
#[derive(Parser)]
#[command(name = "dcgan_azulejos")]
#[command(version = "0.1.0")]
#[command(about = "Train a DCGAN on azulejo tiles and serve the tiles it draws")]
struct Cli {
    /// Path to configuration file (TOML or JSON)
    #[arg(short, long, default_value = "config.toml")]
    config: PathBuf,

    /// Verbosity level
    #[arg(short, long, default_value = "info")]
    verbosity: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Resize source images and write six variants of each
    Resize {
        /// Directory with the source images
        source: PathBuf,

        /// Directory receiving the dataset
        destination: PathBuf,

        /// Side of the square tiles, in pixels
        #[arg(short, long, default_value = "128")]
        size: u32,
    },

    /// Train the DCGAN model
    Train {
        /// Directory with the prepared dataset
        dataset: PathBuf,

        /// Existing root directory of the run artifacts
        result: Option<PathBuf>,

        /// Number of epochs
        #[arg(short, long)]
        epochs: Option<usize>,

        /// Side of the square tiles, in pixels
        #[arg(short, long)]
        size: Option<u32>,

        /// Batch size
        #[arg(short, long)]
        batch_size: Option<usize>,

        /// Topology variant: exact or oversampled
        #[arg(long)]
        variant: Option<TopologyVariant>,
    },

    /// Serve generated tiles over HTTP
    Serve {
        /// Model file, or a directory of models
        model_path: Option<PathBuf>,

        /// Bind address
        #[arg(long)]
        host: Option<String>,

        /// Bind port
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Write tiles from a trained generator
    Generate {
        /// Model file, or a directory of models
        model: PathBuf,

        /// Number of tiles
        #[arg(short = 'n', long, default_value = "10")]
        count: usize,

        /// Output directory
        #[arg(short, long, default_value = "generated")]
        output: PathBuf,
    },

    /// Initialize default configuration file
    Init {
        /// Output configuration file path
        #[arg(short, long, default_value = "config.toml")]
        output: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup logging
    let level = match cli.verbosity.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let mut config = Config::load_or_default(&cli.config)?;

    match cli.command {
        Commands::Resize {
            source,
            destination,
            size,
        } => {
            if let Some(written) = pipeline::resize(&source, &destination, size)? {
                info!("Dataset ready: {} tiles in {}", written, destination.display());
            }
        }
        Commands::Train {
            dataset,
            result,
            epochs,
            size,
            batch_size,
            variant,
        } => {
            if let Some(epochs) = epochs {
                config.training.epochs = epochs;
            }
            if let Some(size) = size {
                config.data.image_size = size;
            }
            if let Some(batch_size) = batch_size {
                config.data.batch_size = batch_size;
            }
            if let Some(variant) = variant {
                config.model.variant = variant;
            }
            let result = result.or_else(|| config.training.result_dir.clone());

            // Tensor work stays off the async runtime
            let outcome = tokio::task::spawn_blocking(move || {
                pipeline::train(&dataset, result.as_deref(), &config)
            })
            .await??;

            if let Some(outcome) = outcome {
                info!(
                    "Training complete. Final G_loss: {:.4}, D_loss: {:.4}, artifacts in {}",
                    outcome.metrics.latest_gen_loss().unwrap_or(0.0),
                    outcome.metrics.latest_disc_loss().unwrap_or(0.0),
                    outcome.run.root.display()
                );
            }
        }
        Commands::Serve {
            model_path,
            host,
            port,
        } => {
            if let Some(model_path) = model_path {
                config.server.model_path = model_path;
            }
            if let Some(host) = host {
                config.server.host = host;
            }
            if let Some(port) = port {
                config.server.port = port;
            }
            let device = config.get_device();
            server::serve(config.server, device).await?;
        }
        Commands::Generate {
            model,
            count,
            output,
        } => {
            let device = config.get_device();
            pipeline::generate(&model, count, &output, device)?;
        }
        Commands::Init { output } => {
            init_config(&output)?;
        }
    }

    Ok(())
}

/// Initialize default configuration file
fn init_config(output_path: &std::path::Path) -> Result<()> {
    let config = Config::default();
    config.save(output_path)?;

    info!("Created default configuration at {}", output_path.display());
    Ok(())
}
