//! Generator network for DCGAN
//!
//! The Generator turns a noise vector into a square tile image. Its layers
//! are built by walking the plan produced by [`generator_plan`].

use tch::{nn, nn::ModuleT, Device, Tensor};

use super::leaky_relu;
use super::topology::{generator_plan, StageKind, TopologyConfig, TopologyVariant};
use crate::error::AzulejoError;

/// Generator network configuration
#[derive(Debug, Clone)]
pub struct GeneratorConfig {
    /// Size of the latent noise vector
    pub noise_dim: i64,
    /// Image geometry and filter widths
    pub topology: TopologyConfig,
    /// Negative slope of the hidden activations
    pub leaky_slope: f64,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            noise_dim: 100,
            topology: TopologyConfig::default(),
            leaky_slope: 0.3,
        }
    }
}

/// Batch norm matching a 0.8 moving-average momentum
fn batch_norm_config() -> nn::BatchNormConfig {
    nn::BatchNormConfig {
        momentum: 0.2,
        eps: 1e-3,
        ..Default::default()
    }
}

/// Generator network
///
/// Architecture:
/// 1. Dense projection to a 4x4 tile with `max_filters` channels
/// 2. One transposed convolution per stage (BatchNorm + LeakyReLU), each
///    doubling the resolution
/// 3. Final transposed convolution onto the image channels with Tanh
#[derive(Debug)]
pub struct Generator {
    config: GeneratorConfig,
    net: nn::SequentialT,
}

impl Generator {
    /// Create a new Generator network
    pub fn new(vs: &nn::Path, config: GeneratorConfig) -> Result<Self, AzulejoError> {
        let topology = &config.topology;
        let plan = generator_plan(config.noise_dim, topology)?;
        let slope = config.leaky_slope;
        let padding = topology.padding();

        let mut net = nn::seq_t();
        for (idx, stage) in plan.iter().enumerate() {
            let p = vs / format!("stage{}", idx);
            net = match stage.kind {
                StageKind::Project => {
                    let filters = stage.out_filters;
                    let spatial = stage.spatial_out;
                    let linear_config = nn::LinearConfig {
                        bias: false,
                        ..Default::default()
                    };
                    net.add(nn::linear(
                        &p / "dense",
                        stage.in_filters,
                        filters * spatial * spatial,
                        linear_config,
                    ))
                    .add_fn(move |xs| xs.view([-1, filters, spatial, spatial]))
                    .add(nn::batch_norm2d(&p / "bn", filters, batch_norm_config()))
                    .add_fn(move |xs| leaky_relu(xs, slope))
                }
                StageKind::Upsample => {
                    let conv_config = nn::ConvTransposeConfig {
                        stride: stage.stride,
                        padding,
                        output_padding: 2 + 2 * padding - stage.kernel_size,
                        bias: false,
                        ..Default::default()
                    };
                    net.add(nn::conv_transpose2d(
                        &p / "conv",
                        stage.in_filters,
                        stage.out_filters,
                        stage.kernel_size,
                        conv_config,
                    ))
                    .add(nn::batch_norm2d(&p / "bn", stage.out_filters, batch_norm_config()))
                    .add_fn(move |xs| leaky_relu(xs, slope))
                }
                StageKind::ToImage => {
                    let conv_config = nn::ConvTransposeConfig {
                        stride: 1,
                        padding,
                        bias: false,
                        ..Default::default()
                    };
                    net.add(nn::conv_transpose2d(
                        &p / "conv",
                        stage.in_filters,
                        stage.out_filters,
                        stage.kernel_size,
                        conv_config,
                    ))
                    .add_fn(|xs| xs.tanh())
                }
                StageKind::Downsample | StageKind::Classify => {
                    unreachable!("generator plans only hold upsampling stages")
                }
            };
        }

        // Oversampled stacks overshoot by one stage; area-resize back down
        if topology.variant == TopologyVariant::Oversampled {
            let size = topology.image_size;
            net = net.add_fn(move |xs| xs.adaptive_avg_pool2d([size, size]));
        }

        Ok(Self { config, net })
    }

    /// Generate images from noise
    ///
    /// # Arguments
    ///
    /// * `noise` - Tensor of shape (batch_size, noise_dim)
    /// * `train` - Whether in training mode (affects batch norm)
    ///
    /// # Returns
    ///
    /// Tensor of shape (batch_size, channels, image_size, image_size) in [-1, 1]
    pub fn forward_t(&self, noise: &Tensor, train: bool) -> Tensor {
        self.net.forward_t(noise, train)
    }

    /// Generate images (inference mode)
    pub fn generate(&self, noise: &Tensor) -> Tensor {
        tch::no_grad(|| self.forward_t(noise, false))
    }

    /// Generate images from fresh standard-normal noise
    pub fn generate_random(&self, num_samples: i64, device: Device) -> Tensor {
        let noise = Tensor::randn([num_samples, self.config.noise_dim], (tch::Kind::Float, device));
        self.generate(&noise)
    }

    /// Get configuration
    pub fn config(&self) -> &GeneratorConfig {
        &self.config
    }
}

impl ModuleT for Generator {
    fn forward_t(&self, xs: &Tensor, train: bool) -> Tensor {
        Generator::forward_t(self, xs, train)
    }
}
