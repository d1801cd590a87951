//! In-memory tile dataset
//!
//! Loads a directory of preprocessed tiles into a single
//! (num_images, channels, size, size) array scaled to [-1, 1], the range
//! of the generator's `tanh` output.

use std::path::{Path, PathBuf};

use anyhow::Context;
use image::DynamicImage;
use ndarray::Array4;
use tracing::{info, warn};

use super::preprocessing::list_files;
use crate::error::AzulejoError;

/// Half of the byte range, used to centre pixels around zero
pub const PIXEL_MIDPOINT: f32 = 127.5;

/// Map a byte to [-1, 1]
pub fn normalize_pixel(value: u8) -> f32 {
    (value as f32 - PIXEL_MIDPOINT) / PIXEL_MIDPOINT
}

/// Normalized tiles held in memory
#[derive(Debug, Clone)]
pub struct TileDataset {
    images: Array4<f32>,
    files: Vec<PathBuf>,
}

impl TileDataset {
    /// Load every file in `dir`
    ///
    /// Returns `None` when the directory is missing or empty. Any file that
    /// fails to decode or is not `image_size` square aborts the load.
    pub fn load_dir(dir: &Path, image_size: u32, channels: i64) -> anyhow::Result<Option<Self>> {
        info!("Preparing dataset from {}", dir.display());

        let files = if dir.is_dir() { list_files(dir)? } else { Vec::new() };
        if files.is_empty() {
            warn!("No dataset images found in {}", dir.display());
            return Ok(None);
        }

        info!("Loading {} images", files.len());
        let mut images = Vec::with_capacity(files.len());
        for file in &files {
            let image = image::open(file)
                .with_context(|| format!("failed to read image {}", file.display()))?;
            if image.width() != image_size || image.height() != image_size {
                return Err(AzulejoError::ImageSizeMismatch {
                    path: file.clone(),
                    width: image.width(),
                    height: image.height(),
                    expected: image_size,
                }
                .into());
            }
            images.push(image);
        }

        let images = Self::to_array(&images, image_size, channels)?;
        info!("Dataset normalized to [-1, 1]");
        Ok(Some(Self { images, files }))
    }

    /// Build a dataset from decoded images that are already `image_size` square
    pub fn from_images(
        images: &[DynamicImage],
        image_size: u32,
        channels: i64,
    ) -> anyhow::Result<Self> {
        Ok(Self {
            images: Self::to_array(images, image_size, channels)?,
            files: Vec::new(),
        })
    }

    fn to_array(
        images: &[DynamicImage],
        image_size: u32,
        channels: i64,
    ) -> anyhow::Result<Array4<f32>> {
        let size = image_size as usize;
        let mut data = Array4::<f32>::zeros((images.len(), channels as usize, size, size));

        for (n, image) in images.iter().enumerate() {
            match channels {
                1 => {
                    let luma = image.to_luma8();
                    for (x, y, pixel) in luma.enumerate_pixels() {
                        data[[n, 0, y as usize, x as usize]] = normalize_pixel(pixel.0[0]);
                    }
                }
                3 => {
                    let rgb = image.to_rgb8();
                    for (x, y, pixel) in rgb.enumerate_pixels() {
                        for c in 0..3 {
                            data[[n, c, y as usize, x as usize]] = normalize_pixel(pixel.0[c]);
                        }
                    }
                }
                other => return Err(AzulejoError::UnsupportedChannels(other).into()),
            }
        }

        Ok(data)
    }

    /// Number of images
    pub fn len(&self) -> usize {
        self.images.shape()[0]
    }

    /// Check if empty
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Source files, in load order
    pub fn files(&self) -> &[PathBuf] {
        &self.files
    }

    /// Consume the dataset, returning the normalized array
    pub fn into_array(self) -> Array4<f32> {
        self.images
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};

    #[test]
    fn test_normalize_pixel() {
        assert_eq!(normalize_pixel(0), -1.0);
        assert_eq!(normalize_pixel(255), 1.0);
        assert!(normalize_pixel(128).abs() < 0.01);
    }

    #[test]
    fn test_from_images_layout() {
        let mut img = RgbImage::from_pixel(4, 4, Rgb([0, 0, 0]));
        img.put_pixel(3, 1, Rgb([255, 0, 0]));
        let dataset = TileDataset::from_images(&[DynamicImage::ImageRgb8(img)], 4, 3).unwrap();

        let data = dataset.into_array();
        assert_eq!(data.shape(), &[1, 3, 4, 4]);
        assert_eq!(data[[0, 0, 1, 3]], 1.0);
        assert_eq!(data[[0, 1, 1, 3]], -1.0);
        assert_eq!(data[[0, 0, 0, 0]], -1.0);
    }

    #[test]
    fn test_grayscale_dataset() {
        let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(4, 4, Rgb([255, 255, 255])));
        let dataset = TileDataset::from_images(&[img], 4, 1).unwrap();
        assert_eq!(dataset.into_array().shape(), &[1, 1, 4, 4]);
    }

    #[test]
    fn test_unsupported_channels() {
        let img = DynamicImage::ImageRgb8(RgbImage::new(4, 4));
        assert!(TileDataset::from_images(&[img], 4, 2).is_err());
    }

    #[test]
    fn test_load_dir_rejects_wrong_size() {
        let dir = tempfile::tempdir().unwrap();
        RgbImage::new(8, 8).save(dir.path().join("a.png")).unwrap();

        assert!(TileDataset::load_dir(dir.path(), 4, 3).is_err());
    }

    #[test]
    fn test_load_dir_empty() {
        let dir = tempfile::tempdir().unwrap();
        assert!(TileDataset::load_dir(dir.path(), 4, 3).unwrap().is_none());
        assert!(TileDataset::load_dir(&dir.path().join("missing"), 4, 3)
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_load_dir() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["b.png", "a.png"] {
            RgbImage::from_pixel(4, 4, Rgb([10, 20, 30]))
                .save(dir.path().join(name))
                .unwrap();
        }

        let dataset = TileDataset::load_dir(dir.path(), 4, 3).unwrap().unwrap();
        assert_eq!(dataset.len(), 2);
        assert!(dataset.files()[0].ends_with("a.png"));
    }
}
