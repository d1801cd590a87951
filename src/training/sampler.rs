//! Progress previews from a fixed set of noise vectors
//!
//! The same vectors are rendered throughout training so previews from
//! different epochs are directly comparable.

use std::path::{Path, PathBuf};

use rand::rngs::StdRng;
use rand::SeedableRng;
use rand_distr::{Distribution, StandardNormal};
use tch::{Device, Tensor};

use crate::model::Generator;
use crate::utils::visualization::{batch_to_images, save_png, OutputRescale};

/// Standard-normal noise drawn once before training
#[derive(Debug)]
pub struct FixedNoise {
    noise: Tensor,
}

impl FixedNoise {
    /// Draw `count` vectors of length `noise_dim`
    ///
    /// With a seed the vectors are reproducible across runs.
    pub fn new(count: usize, noise_dim: i64, seed: Option<u64>, device: Device) -> Self {
        let mut rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let values: Vec<f32> = (0..count * noise_dim as usize)
            .map(|_| StandardNormal.sample(&mut rng))
            .collect();

        let noise = Tensor::from_slice(&values)
            .view([count as i64, noise_dim])
            .to_device(device);
        Self { noise }
    }

    /// Number of vectors
    pub fn len(&self) -> usize {
        self.noise.size()[0] as usize
    }

    /// Check if empty
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The (count, noise_dim) noise tensor
    pub fn tensor(&self) -> &Tensor {
        &self.noise
    }
}

/// `epoca_<epoch+1>_<kk>.png`, with `kk` 1-based and two digits wide
pub fn preview_file_name(epoch: usize, index: usize) -> String {
    format!("epoca_{}_{:02}.png", epoch + 1, index + 1)
}

/// Whether previews are rendered after the 0-indexed `epoch`
pub fn is_preview_epoch(epoch: usize, every: usize) -> bool {
    every > 0 && epoch % every == 0
}

/// Render every fixed vector through `generator` in inference mode and
/// write the images into `dir`
pub fn write_previews(
    generator: &Generator,
    noise: &FixedNoise,
    epoch: usize,
    dir: &Path,
    rescale: OutputRescale,
) -> anyhow::Result<Vec<PathBuf>> {
    if noise.is_empty() {
        return Ok(Vec::new());
    }

    let images = batch_to_images(&generator.generate(noise.tensor()), rescale)?;

    let mut written = Vec::with_capacity(images.len());
    for (index, image) in images.iter().enumerate() {
        let path = dir.join(preview_file_name(epoch, index));
        save_png(image, &path)?;
        written.push(path);
    }
    tracing::debug!("Wrote {} previews for epoch {}", written.len(), epoch + 1);
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{GeneratorConfig, TopologyConfig};
    use tch::nn::VarStore;

    #[test]
    fn test_preview_file_name() {
        assert_eq!(preview_file_name(0, 0), "epoca_1_01.png");
        assert_eq!(preview_file_name(5, 9), "epoca_6_10.png");
    }

    #[test]
    fn test_preview_schedule() {
        let epochs: Vec<usize> = (0..12).filter(|&e| is_preview_epoch(e, 5)).collect();
        assert_eq!(epochs, vec![0, 5, 10]);
        assert!(!is_preview_epoch(0, 0));
    }

    #[test]
    fn test_seeded_noise_is_reproducible() {
        let a = FixedNoise::new(10, 8, Some(3), Device::Cpu);
        let b = FixedNoise::new(10, 8, Some(3), Device::Cpu);
        let c = FixedNoise::new(10, 8, Some(4), Device::Cpu);

        assert_eq!(a.tensor().size(), vec![10, 8]);
        assert!(a.tensor().equal(b.tensor()));
        assert!(!a.tensor().equal(c.tensor()));
    }

    #[test]
    fn test_write_previews() {
        let dir = tempfile::tempdir().unwrap();
        let vs = VarStore::new(Device::Cpu);
        let config = GeneratorConfig {
            noise_dim: 8,
            topology: TopologyConfig {
                image_size: 8,
                max_filters: 16,
                min_filters: 4,
                ..Default::default()
            },
            ..Default::default()
        };
        let generator = Generator::new(&vs.root(), config).unwrap();
        let noise = FixedNoise::new(3, 8, Some(1), Device::Cpu);

        let written =
            write_previews(&generator, &noise, 5, dir.path(), OutputRescale::Literal).unwrap();

        assert_eq!(written.len(), 3);
        assert!(written[2].ends_with("epoca_6_03.png"));
        assert_eq!(image::open(&written[0]).unwrap().width(), 8);
    }
}
