//! Model module containing GAN architecture components
//!
//! This module provides:
//! - Topology planning from the image size
//! - Generator network for creating tiles
//! - Discriminator network for distinguishing real from fake
//! - DCGAN wrapper combining both networks

pub mod topology;
mod generator;
mod discriminator;
mod dcgan;

pub use topology::{
    discriminator_plan, generator_plan, StageDescriptor, StageKind, TopologyConfig,
    TopologyVariant,
};
pub use generator::{Generator, GeneratorConfig};
pub use discriminator::{Discriminator, DiscriminatorConfig};
pub use dcgan::DCGAN;

use tch::Tensor;

/// Leaky ReLU with an arbitrary negative slope in (0, 1)
pub(crate) fn leaky_relu(xs: &Tensor, slope: f64) -> Tensor {
    xs.maximum(&(xs * slope))
}
