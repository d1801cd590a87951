//! DCGAN wrapper combining Generator and Discriminator
//!
//! Each network owns its own `VarStore`, so the two parameter sets and the
//! two optimizers never overlap.

use tch::{nn, nn::OptimizerConfig, nn::VarStore, Device, Tensor};

use super::discriminator::{Discriminator, DiscriminatorConfig};
use super::generator::{Generator, GeneratorConfig};
use super::topology::TopologyConfig;
use crate::error::AzulejoError;

/// Complete DCGAN model
pub struct DCGAN {
    /// Generator network
    pub generator: Generator,
    /// Discriminator network
    pub discriminator: Discriminator,
    /// Variable store for generator
    pub gen_vs: VarStore,
    /// Variable store for discriminator
    pub disc_vs: VarStore,
    /// Device (CPU/GPU)
    pub device: Device,
}

impl DCGAN {
    /// Create a new DCGAN model
    ///
    /// # Arguments
    ///
    /// * `gen_config` - Generator configuration
    /// * `disc_config` - Discriminator configuration
    /// * `device` - Device to create model on
    pub fn new(
        gen_config: GeneratorConfig,
        disc_config: DiscriminatorConfig,
        device: Device,
    ) -> Result<Self, AzulejoError> {
        let gen_vs = VarStore::new(device);
        let disc_vs = VarStore::new(device);

        let generator = Generator::new(&gen_vs.root(), gen_config)?;
        let discriminator = Discriminator::new(&disc_vs.root(), disc_config)?;

        Ok(Self {
            generator,
            discriminator,
            gen_vs,
            disc_vs,
            device,
        })
    }

    /// Create a DCGAN where both networks share one topology
    ///
    /// # Arguments
    ///
    /// * `noise_dim` - Size of latent noise vector
    /// * `topology` - Image size, channels, filter range and variant
    /// * `dropout` - Dropout rate of the discriminator
    /// * `device` - Device to create model on
    pub fn from_topology(
        noise_dim: i64,
        topology: TopologyConfig,
        dropout: f64,
        device: Device,
    ) -> Result<Self, AzulejoError> {
        let gen_config = GeneratorConfig {
            noise_dim,
            topology: topology.clone(),
            ..Default::default()
        };

        let disc_config = DiscriminatorConfig {
            topology,
            dropout,
            ..Default::default()
        };

        Self::new(gen_config, disc_config, device)
    }

    /// Generate images from fresh noise
    ///
    /// # Returns
    ///
    /// Tensor of shape (num_samples, channels, image_size, image_size)
    pub fn generate(&self, num_samples: i64) -> Tensor {
        self.generator.generate_random(num_samples, self.device)
    }

    /// Discriminate images (get probability of being real)
    pub fn discriminate(&self, images: &Tensor) -> Tensor {
        self.discriminator.classify(images)
    }

    /// Adam optimizer over the generator's variables
    pub fn gen_optimizer(&self, lr: f64) -> anyhow::Result<nn::Optimizer> {
        Ok(nn::Adam::default().build(&self.gen_vs, lr)?)
    }

    /// Adam optimizer over the discriminator's variables
    pub fn disc_optimizer(&self, lr: f64) -> anyhow::Result<nn::Optimizer> {
        Ok(nn::Adam::default().build(&self.disc_vs, lr)?)
    }

    /// Save the generator weights
    pub fn save_generator(&self, path: &std::path::Path) -> anyhow::Result<()> {
        self.gen_vs.save(path)?;
        Ok(())
    }

    /// Get noise dimension
    pub fn noise_dim(&self) -> i64 {
        self.generator.config().noise_dim
    }

    /// Get the shared topology
    pub fn topology(&self) -> &TopologyConfig {
        &self.generator.config().topology
    }

    /// Stop gradients from reaching the discriminator's variables
    pub fn freeze_discriminator(&mut self) {
        self.disc_vs.freeze();
    }

    /// Let the discriminator's variables collect gradients again
    pub fn unfreeze_discriminator(&mut self) {
        self.disc_vs.unfreeze();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small_dcgan() -> DCGAN {
        let topology = TopologyConfig {
            image_size: 16,
            max_filters: 32,
            min_filters: 4,
            ..Default::default()
        };
        DCGAN::from_topology(20, topology, 0.3, Device::Cpu).unwrap()
    }

    #[test]
    fn test_dcgan_creation() {
        let dcgan = small_dcgan();

        assert_eq!(dcgan.noise_dim(), 20);
        assert_eq!(dcgan.topology().image_size, 16);
        assert_eq!(dcgan.topology().channels, 3);
    }

    #[test]
    fn test_generator_feeds_discriminator() {
        let dcgan = small_dcgan();

        let samples = dcgan.generate(4);
        assert_eq!(samples.size(), vec![4, 3, 16, 16]);

        let probs = dcgan.discriminate(&samples);
        assert_eq!(probs.size(), vec![4, 1]);
    }

    #[test]
    fn test_each_network_has_its_own_store() {
        let dcgan = small_dcgan();

        assert!(!dcgan.gen_vs.trainable_variables().is_empty());
        assert!(!dcgan.disc_vs.trainable_variables().is_empty());
        // Only the generator carries batch norm statistics
        assert!(dcgan.gen_vs.variables().keys().any(|k| k.contains("running_mean")));
        assert!(!dcgan.disc_vs.variables().keys().any(|k| k.contains("running_mean")));
    }

    #[test]
    fn test_freeze_discriminator() {
        let mut dcgan = small_dcgan();

        dcgan.freeze_discriminator();
        assert!(dcgan
            .disc_vs
            .trainable_variables()
            .iter()
            .all(|v| !v.requires_grad()));

        dcgan.unfreeze_discriminator();
        assert!(dcgan
            .disc_vs
            .trainable_variables()
            .iter()
            .all(|v| v.requires_grad()));
    }
}
