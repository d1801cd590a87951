//! Discriminator network for DCGAN
//!
//! The Discriminator scores tiles as real or generated. It mirrors the
//! generator: strided convolutions shrink the image while the filter width
//! grows, then a dense layer produces one score per image.

use tch::{nn, nn::ModuleT, Tensor};

use super::leaky_relu;
use super::topology::{discriminator_plan, StageKind, TopologyConfig};
use crate::error::AzulejoError;

/// Discriminator network configuration
#[derive(Debug, Clone)]
pub struct DiscriminatorConfig {
    /// Image geometry and filter widths
    pub topology: TopologyConfig,
    /// Dropout rate after every convolution
    pub dropout: f64,
    /// Negative slope of the hidden activations
    pub leaky_slope: f64,
}

impl Default for DiscriminatorConfig {
    fn default() -> Self {
        Self {
            topology: TopologyConfig::default(),
            dropout: 0.3,
            leaky_slope: 0.2,
        }
    }
}

/// Discriminator network
///
/// Architecture:
/// 1. One strided Conv2d per stage with Dropout and LeakyReLU
/// 2. Flatten and Dense layer for final classification
#[derive(Debug)]
pub struct Discriminator {
    config: DiscriminatorConfig,
    net: nn::SequentialT,
}

impl Discriminator {
    /// Create a new Discriminator network
    pub fn new(vs: &nn::Path, config: DiscriminatorConfig) -> Result<Self, AzulejoError> {
        let plan = discriminator_plan(&config.topology)?;
        let padding = config.topology.padding();
        let dropout = config.dropout;
        let slope = config.leaky_slope;

        let mut net = nn::seq_t();
        for (idx, stage) in plan.iter().enumerate() {
            let p = vs / format!("stage{}", idx);
            net = match stage.kind {
                StageKind::Downsample => {
                    let conv_config = nn::ConvConfig {
                        stride: stage.stride,
                        padding,
                        bias: false,
                        ..Default::default()
                    };
                    net.add(nn::conv2d(
                        &p / "conv",
                        stage.in_filters,
                        stage.out_filters,
                        stage.kernel_size,
                        conv_config,
                    ))
                    .add_fn_t(move |xs, train| xs.dropout(dropout, train))
                    .add_fn(move |xs| leaky_relu(xs, slope))
                }
                StageKind::Classify => net.add_fn(|xs| xs.flat_view()).add(nn::linear(
                    &p / "dense",
                    stage.in_filters,
                    stage.out_filters,
                    Default::default(),
                )),
                StageKind::Project | StageKind::Upsample | StageKind::ToImage => {
                    unreachable!("discriminator plans only hold downsampling stages")
                }
            };
        }

        Ok(Self { config, net })
    }

    /// Forward pass
    ///
    /// # Arguments
    ///
    /// * `input` - Tensor of shape (batch_size, channels, image_size, image_size)
    /// * `train` - Whether in training mode (affects dropout)
    ///
    /// # Returns
    ///
    /// Tensor of shape (batch_size, 1) with logits (not sigmoid)
    pub fn forward_t(&self, input: &Tensor, train: bool) -> Tensor {
        self.net.forward_t(input, train)
    }

    /// Classify samples (inference mode)
    ///
    /// Returns probability of being real (after sigmoid)
    pub fn classify(&self, input: &Tensor) -> Tensor {
        tch::no_grad(|| self.forward_t(input, false).sigmoid())
    }

    /// Get configuration
    pub fn config(&self) -> &DiscriminatorConfig {
        &self.config
    }
}

impl ModuleT for Discriminator {
    fn forward_t(&self, xs: &Tensor, train: bool) -> Tensor {
        Discriminator::forward_t(self, xs, train)
    }
}
