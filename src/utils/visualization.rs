//! Rendering generator output as images
//!
//! Converts `tanh` tensors back to bytes, builds `image` buffers and encodes
//! PNG for previews, the `generate` command and the HTTP endpoint.

use std::io::Cursor;
use std::path::Path;

use anyhow::Context;
use image::{imageops::FilterType, DynamicImage, GrayImage, ImageFormat, RgbImage};
use serde::{Deserialize, Serialize};
use tch::{Device, Kind, Tensor};

use crate::error::AzulejoError;

/// Side length of images returned by the HTTP endpoint
pub const SERVE_IMAGE_SIZE: u32 = 256;

/// How generator values in [-1, 1] are mapped to bytes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputRescale {
    /// `(x + 127.5) * 127.5` in `f32`, wrapped into a byte
    #[default]
    Literal,
    /// `x * 127.5 + 127.5`, clamped to [0, 255]
    Inverse,
}

impl OutputRescale {
    /// Map one generator value to a byte
    pub fn to_byte(self, x: f32) -> u8 {
        match self {
            OutputRescale::Literal => {
                let v = ((x + 127.5f32) * 127.5f32).floor() as i64;
                v.rem_euclid(256) as u8
            }
            OutputRescale::Inverse => {
                (x as f64 * 127.5 + 127.5).round().clamp(0.0, 255.0) as u8
            }
        }
    }
}

impl std::str::FromStr for OutputRescale {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "literal" => Ok(OutputRescale::Literal),
            "inverse" => Ok(OutputRescale::Inverse),
            other => Err(format!("unknown output rescale '{}' (literal|inverse)", other)),
        }
    }
}

/// Convert one generated image to an `image` buffer
///
/// Accepts (C, H, W) or (1, C, H, W) tensors with 1 or 3 channels.
pub fn tensor_to_image(tensor: &Tensor, rescale: OutputRescale) -> anyhow::Result<DynamicImage> {
    let tensor = match tensor.dim() {
        4 if tensor.size()[0] == 1 => tensor.squeeze_dim(0),
        3 => tensor.shallow_clone(),
        _ => return Err(AzulejoError::UnexpectedShape(tensor.size()).into()),
    };

    let size = tensor.size();
    let (channels, height, width) = (size[0], size[1] as u32, size[2] as u32);

    // (C, H, W) -> (H, W, C) so the flat buffer is interleaved
    let hwc = tensor
        .to_device(Device::Cpu)
        .to_kind(Kind::Float)
        .permute([1, 2, 0])
        .contiguous()
        .flatten(0, -1);
    let values = Vec::<f32>::try_from(&hwc)?;
    let bytes: Vec<u8> = values.into_iter().map(|x| rescale.to_byte(x)).collect();

    let image = match channels {
        1 => GrayImage::from_raw(width, height, bytes).map(DynamicImage::ImageLuma8),
        3 => RgbImage::from_raw(width, height, bytes).map(DynamicImage::ImageRgb8),
        other => return Err(AzulejoError::UnsupportedChannels(other).into()),
    };

    image.ok_or_else(|| AzulejoError::UnexpectedShape(size).into())
}

/// Split a (N, C, H, W) batch into images
pub fn batch_to_images(
    batch: &Tensor,
    rescale: OutputRescale,
) -> anyhow::Result<Vec<DynamicImage>> {
    if batch.dim() != 4 {
        return Err(AzulejoError::UnexpectedShape(batch.size()).into());
    }
    (0..batch.size()[0])
        .map(|i| tensor_to_image(&batch.get(i), rescale))
        .collect()
}

/// Resize to the square served over HTTP
pub fn upscale_for_serving(image: &DynamicImage) -> DynamicImage {
    image.resize_exact(SERVE_IMAGE_SIZE, SERVE_IMAGE_SIZE, FilterType::CatmullRom)
}

/// Encode as PNG in memory
pub fn encode_png(image: &DynamicImage) -> anyhow::Result<Vec<u8>> {
    let mut buffer = Cursor::new(Vec::new());
    image
        .write_to(&mut buffer, ImageFormat::Png)
        .context("failed to encode PNG")?;
    Ok(buffer.into_inner())
}

/// Write as PNG, creating missing parent directories
pub fn save_png(image: &DynamicImage, path: &Path) -> anyhow::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    image
        .save_with_format(path, ImageFormat::Png)
        .with_context(|| format!("failed to write {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::GenericImageView;

    #[test]
    fn test_literal_rescale_wraps_into_bytes() {
        let r = OutputRescale::Literal;
        assert_eq!(r.to_byte(-1.0), 0);
        assert_eq!(r.to_byte(0.0), 128);
        assert_eq!(r.to_byte(1.0), 255);
    }

    #[test]
    fn test_literal_rescale_rounds_in_single_precision() {
        // Rounding `x + 127.5` to f32 lifts these past the next byte
        let r = OutputRescale::Literal;
        assert_eq!(r.to_byte(f32::from_bits(1045878069)), 155);
        assert_eq!(r.to_byte(f32::from_bits(3198000576)), 89);
    }

    #[test]
    fn test_inverse_rescale() {
        let r = OutputRescale::Inverse;
        assert_eq!(r.to_byte(-1.0), 0);
        assert_eq!(r.to_byte(1.0), 255);
        assert_eq!(r.to_byte(0.0), 128);
        assert_eq!(r.to_byte(3.0), 255);
    }

    #[test]
    fn test_rescale_from_str() {
        assert_eq!("Literal".parse::<OutputRescale>(), Ok(OutputRescale::Literal));
        assert_eq!("inverse".parse::<OutputRescale>(), Ok(OutputRescale::Inverse));
        assert!("linear".parse::<OutputRescale>().is_err());
    }

    #[test]
    fn test_tensor_to_rgb_image() {
        // Red channel at +1, others at -1
        let tensor = Tensor::cat(
            &[
                Tensor::ones([1, 2, 3], (Kind::Float, Device::Cpu)),
                Tensor::full([2, 2, 3], -1.0, (Kind::Float, Device::Cpu)),
            ],
            0,
        );
        let image = tensor_to_image(&tensor, OutputRescale::Inverse).unwrap();

        assert_eq!(image.dimensions(), (3, 2));
        assert_eq!(image.to_rgb8().get_pixel(2, 1).0, [255, 0, 0]);
    }

    #[test]
    fn test_tensor_to_gray_image() {
        let tensor = Tensor::zeros([1, 1, 4, 4], (Kind::Float, Device::Cpu));
        let image = tensor_to_image(&tensor, OutputRescale::Literal).unwrap();
        assert_eq!(image.to_luma8().get_pixel(0, 0).0, [128]);
    }

    #[test]
    fn test_tensor_to_image_rejects_bad_shape() {
        let tensor = Tensor::zeros([2, 3, 4, 4], (Kind::Float, Device::Cpu));
        assert!(tensor_to_image(&tensor, OutputRescale::Literal).is_err());

        let tensor = Tensor::zeros([2, 4, 4], (Kind::Float, Device::Cpu));
        assert!(tensor_to_image(&tensor, OutputRescale::Literal).is_err());
    }

    #[test]
    fn test_batch_to_images() {
        let batch = Tensor::zeros([3, 3, 4, 4], (Kind::Float, Device::Cpu));
        assert_eq!(batch_to_images(&batch, OutputRescale::Literal).unwrap().len(), 3);
    }

    #[test]
    fn test_png_encoding_of_upscaled_image() {
        let image = DynamicImage::ImageRgb8(RgbImage::new(8, 8));
        let png = encode_png(&upscale_for_serving(&image)).unwrap();

        let decoded = image::load_from_memory(&png).unwrap();
        assert_eq!(decoded.dimensions(), (256, 256));
    }
}
