//! Loss functions for GAN training
//!
//! Implements Binary Cross Entropy losses for generator and discriminator.
//! Both take discriminator logits; `binary_cross_entropy_with_logits` gives
//! the same value as BCE on the sigmoid output without its saturation.

use tch::Tensor;

fn bce_with_logits(logits: &Tensor, targets: &Tensor) -> Tensor {
    logits.binary_cross_entropy_with_logits::<Tensor>(targets, None, None, tch::Reduction::Mean)
}

/// Generator loss: -log(D(G(z)))
///
/// The generator wants the discriminator to output 1 (real) for fake samples.
///
/// # Arguments
///
/// * `fake_output` - Discriminator output on generated samples (logits)
///
/// # Returns
///
/// Scalar loss tensor
pub fn generator_loss(fake_output: &Tensor) -> Tensor {
    bce_with_logits(fake_output, &Tensor::ones_like(fake_output))
}

/// Discriminator loss: -log(D(x)) - log(1-D(G(z)))
///
/// The discriminator wants to output 1 for real samples and 0 for fake samples.
/// The two terms are summed, not averaged.
///
/// # Arguments
///
/// * `real_output` - Discriminator output on real samples (logits)
/// * `fake_output` - Discriminator output on generated samples (logits)
pub fn discriminator_loss(real_output: &Tensor, fake_output: &Tensor) -> Tensor {
    let real_loss = bce_with_logits(real_output, &Tensor::ones_like(real_output));
    let fake_loss = bce_with_logits(fake_output, &Tensor::zeros_like(fake_output));
    real_loss + fake_loss
}
