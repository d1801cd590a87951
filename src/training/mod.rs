//! Training module for DCGAN
//!
//! This module provides:
//! - Training loop implementation
//! - Loss functions (Binary Cross Entropy)
//! - Fixed-noise previews
//! - Training configuration and metrics

mod trainer;
mod losses;
mod metrics;
mod sampler;

pub use trainer::{train_step, Trainer, TrainingConfig};
pub use losses::{generator_loss, discriminator_loss};
pub use metrics::TrainingMetrics;
pub use sampler::{is_preview_epoch, preview_file_name, write_previews, FixedNoise};
