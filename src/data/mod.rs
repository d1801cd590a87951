//! Data module for building and loading the tile dataset
//!
//! This module provides:
//! - Tile preprocessing (resize, rotations and mirrors)
//! - In-memory dataset normalized to [-1, 1]
//! - DataLoader for shuffling and batching tiles

mod dataset;
mod loader;
mod preprocessing;

pub use dataset::{normalize_pixel, TileDataset, PIXEL_MIDPOINT};
pub use loader::DataLoader;
pub use preprocessing::{
    augment, list_files, prepare_images, preprocess_file, tile_file_name, AugmentedTile,
    AUGMENTATION_SUFFIXES,
};
