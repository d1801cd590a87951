//! Utility module with helper functions
//!
//! This module provides:
//! - Configuration handling
//! - Run artifacts and generator checkpoints
//! - Visualization helpers

pub mod checkpoint;
mod config;
pub mod visualization;

pub use checkpoint::{
    model_label, resolve_model_file, save_generator, ModelMeta, RunArtifacts, RunLog,
    TrainedGenerator,
};
pub use config::{Config, DataConfig, ModelConfig, ServerConfig, TrainingConfigFile};
pub use visualization::{encode_png, tensor_to_image, upscale_for_serving, OutputRescale};
