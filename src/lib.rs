//! # DCGAN for Azulejo Tiles
//!
//! This crate provides a modular implementation of Deep Convolutional Generative
//! Adversarial Networks (DCGAN) that learn to draw square azulejo tiles.
//!
//! ## Modules
//!
//! - `data`: Tile preprocessing, dataset loading and batching
//! - `model`: Size-driven topology and the DCGAN networks
//! - `training`: Training loop, loss functions and previews
//! - `utils`: Configuration, run artifacts and image rendering
//! - `server`: HTTP endpoint returning generated tiles
//! - `pipeline`: The resize / train / generate operations

pub mod data;
pub mod error;
pub mod model;
pub mod pipeline;
pub mod server;
pub mod training;
pub mod utils;

pub use data::{DataLoader, TileDataset};
pub use error::AzulejoError;
pub use model::{Discriminator, Generator, TopologyConfig, TopologyVariant, DCGAN};
pub use training::{Trainer, TrainingConfig, TrainingMetrics};
pub use utils::{Config, OutputRescale, TrainedGenerator};
