//! Training loop implementation for DCGAN
//!
//! Each step computes both losses from the same pre-update weights and only
//! then lets the two optimizers apply their updates.

use std::time::Instant;

use indicatif::{ProgressBar, ProgressStyle};
use tch::{nn, Device, Tensor};
use tracing::warn;

use super::losses::{discriminator_loss, generator_loss};
use super::metrics::TrainingMetrics;
use super::sampler::{is_preview_epoch, write_previews, FixedNoise};
use crate::data::DataLoader;
use crate::model::{TopologyVariant, DCGAN};
use crate::utils::checkpoint::RunArtifacts;
use crate::utils::visualization::OutputRescale;

/// Training configuration
#[derive(Debug, Clone)]
pub struct TrainingConfig {
    /// Number of training epochs
    pub epochs: usize,
    /// Adam learning rate, shared by both networks
    pub learning_rate: f64,
    /// Render previews when `epoch % preview_every == 0`
    pub preview_every: usize,
    /// Number of fixed preview noise vectors
    pub preview_count: usize,
    /// Seed for the preview noise and the shuffle order
    pub seed: Option<u64>,
    /// Byte mapping used for previews
    pub output_rescale: OutputRescale,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            epochs: 100,
            learning_rate: TopologyVariant::default().learning_rate(),
            preview_every: 5,
            preview_count: 10,
            seed: None,
            output_rescale: OutputRescale::default(),
        }
    }
}

/// DCGAN Trainer
pub struct Trainer {
    config: TrainingConfig,
    device: Device,
    metrics: TrainingMetrics,
}

impl Trainer {
    /// Create a new trainer
    pub fn new(config: TrainingConfig, device: Device) -> Self {
        Self {
            config,
            device,
            metrics: TrainingMetrics::new(),
        }
    }

    /// Train the DCGAN model
    ///
    /// # Arguments
    ///
    /// * `model` - DCGAN model to train
    /// * `data_loader` - DataLoader providing training batches
    /// * `run` - Run directory receiving the history, previews and metrics
    ///
    /// # Returns
    ///
    /// Training metrics
    pub fn train(
        &mut self,
        model: &mut DCGAN,
        data_loader: &mut DataLoader,
        run: &RunArtifacts,
    ) -> anyhow::Result<&TrainingMetrics> {
        if data_loader.num_samples() == 0 {
            anyhow::bail!("cannot train on an empty dataset");
        }

        let mut gen_opt = model.gen_optimizer(self.config.learning_rate)?;
        let mut disc_opt = model.disc_optimizer(self.config.learning_rate)?;

        let fixed_noise = FixedNoise::new(
            self.config.preview_count,
            model.noise_dim(),
            self.config.seed,
            self.device,
        );
        let num_batches = data_loader.num_batches();

        run.log.record(&format!(
            "Starting training for {} epochs, {} batches per epoch, learning rate {}",
            self.config.epochs, num_batches, self.config.learning_rate
        ))?;

        for epoch in 0..self.config.epochs {
            let start = Instant::now();
            let mut epoch_gen_loss = 0.0;
            let mut epoch_disc_loss = 0.0;
            let mut batch_count = 0;

            // Progress bar for epoch
            let pb = ProgressBar::new(num_batches as u64);
            pb.set_style(
                ProgressStyle::default_bar()
                    .template("[{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} {msg}")
                    .unwrap_or_else(|_| ProgressStyle::default_bar())
                    .progress_chars("##-"),
            );

            for real_batch in data_loader.iter() {
                let real_data = Tensor::try_from(real_batch)?.to_device(self.device);

                let (g_loss, d_loss) =
                    train_step(model, &real_data, &mut gen_opt, &mut disc_opt);
                epoch_gen_loss += g_loss;
                epoch_disc_loss += d_loss;
                batch_count += 1;

                pb.set_message(format!("G: {:.4}, D: {:.4}", g_loss, d_loss));
                pb.inc(1);
            }

            pb.finish_and_clear();

            let avg_gen_loss = epoch_gen_loss / batch_count as f64;
            let avg_disc_loss = epoch_disc_loss / batch_count as f64;
            let secs = start.elapsed().as_secs_f64();
            self.metrics.record_epoch(avg_gen_loss, avg_disc_loss, secs);

            run.log.record(&format!(
                "Epoch {}/{}: G_loss={:.4}, D_loss={:.4}, {:.2} seconds",
                epoch + 1,
                self.config.epochs,
                avg_gen_loss,
                avg_disc_loss,
                secs
            ))?;

            if is_preview_epoch(epoch, self.config.preview_every) {
                write_previews(
                    &model.generator,
                    &fixed_noise,
                    epoch,
                    &run.imgs_dir,
                    self.config.output_rescale,
                )?;
            }

            // Check for mode collapse
            if self.metrics.check_mode_collapse(10) {
                warn!("Possible mode collapse detected! Consider adjusting learning rates.");
            }
        }

        self.metrics.save_csv(&run.metrics_path())?;

        Ok(&self.metrics)
    }
}

/// Discriminator and generator losses for one real batch
///
/// Both losses come from the same forward pass of the generator. The
/// discriminator loss sees detached fakes. The generator loss scores the
/// fakes in a second discriminator pass made with the discriminator's
/// variables frozen, so each loss only reaches its own network. That pass
/// draws its own dropout mask.
///
/// # Returns
///
/// `(generator_loss, discriminator_loss)`
pub fn adversarial_losses(model: &mut DCGAN, real_data: &Tensor) -> (Tensor, Tensor) {
    let batch_size = real_data.size()[0];
    let noise = Tensor::randn(
        [batch_size, model.noise_dim()],
        (tch::Kind::Float, model.device),
    );
    let fake_data = model.generator.forward_t(&noise, true);

    let real_output = model.discriminator.forward_t(real_data, true);
    let fake_output = model.discriminator.forward_t(&fake_data.detach(), true);
    let d_loss = discriminator_loss(&real_output, &fake_output);

    model.freeze_discriminator();
    let fooled_output = model.discriminator.forward_t(&fake_data, true);
    model.unfreeze_discriminator();
    let g_loss = generator_loss(&fooled_output);

    (g_loss, d_loss)
}

/// Single adversarial step on one real batch
///
/// Both gradients are computed from the pre-update weights before either
/// optimizer steps.
///
/// # Returns
///
/// `(generator_loss, discriminator_loss)`
pub fn train_step(
    model: &mut DCGAN,
    real_data: &Tensor,
    gen_opt: &mut nn::Optimizer,
    disc_opt: &mut nn::Optimizer,
) -> (f64, f64) {
    let (g_loss, d_loss) = adversarial_losses(model, real_data);

    disc_opt.zero_grad();
    gen_opt.zero_grad();
    d_loss.backward();
    g_loss.backward();
    disc_opt.step();
    gen_opt.step();

    (g_loss.double_value(&[]), d_loss.double_value(&[]))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::TopologyConfig;
    use ndarray::Array4;

    fn tiny_dcgan() -> DCGAN {
        let topology = TopologyConfig {
            image_size: 8,
            max_filters: 16,
            min_filters: 4,
            ..Default::default()
        };
        DCGAN::from_topology(8, topology, 0.3, Device::Cpu).unwrap()
    }

    #[test]
    fn test_training_config_default() {
        let config = TrainingConfig::default();
        assert_eq!(config.epochs, 100);
        assert_eq!(config.preview_every, 5);
        assert_eq!(config.preview_count, 10);
        assert_eq!(config.learning_rate, 1e-3);
    }

    #[test]
    fn test_train_step_updates_both_networks() {
        let mut model = tiny_dcgan();
        let mut gen_opt = model.gen_optimizer(1e-3).unwrap();
        let mut disc_opt = model.disc_optimizer(1e-3).unwrap();

        let snapshot = |vs: &nn::VarStore| -> Vec<Tensor> {
            vs.trainable_variables().iter().map(|t| t.copy()).collect()
        };
        let gen_before = snapshot(&model.gen_vs);
        let disc_before = snapshot(&model.disc_vs);

        let real = Tensor::rand([2, 3, 8, 8], (tch::Kind::Float, Device::Cpu)) * 2.0 - 1.0;
        let (g_loss, d_loss) = train_step(&mut model, &real, &mut gen_opt, &mut disc_opt);

        assert!(g_loss.is_finite() && g_loss > 0.0);
        assert!(d_loss.is_finite() && d_loss > 0.0);

        let changed = |before: &[Tensor], after: Vec<Tensor>| {
            before.iter().zip(after.iter()).any(|(b, a)| !b.equal(a))
        };
        assert!(changed(&gen_before, model.gen_vs.trainable_variables()));
        assert!(changed(&disc_before, model.disc_vs.trainable_variables()));
        // The discriminator is left trainable
        assert!(model.disc_vs.trainable_variables().iter().all(|v| v.requires_grad()));
    }

    /// True when no variable of `vs` holds a non-zero gradient
    fn no_gradient(vs: &nn::VarStore) -> bool {
        vs.trainable_variables().iter().all(|v| {
            let grad = v.grad();
            !grad.defined() || grad.abs().max().double_value(&[]) == 0.0
        })
    }

    #[test]
    fn test_losses_only_reach_their_own_network() {
        let mut model = tiny_dcgan();
        let mut disc_opt = model.disc_optimizer(1e-3).unwrap();

        let real = Tensor::rand([2, 3, 8, 8], (tch::Kind::Float, Device::Cpu)) * 2.0 - 1.0;
        let (g_loss, d_loss) = adversarial_losses(&mut model, &real);

        // Detached fakes: the discriminator loss never reaches the generator
        d_loss.backward();
        assert!(no_gradient(&model.gen_vs));
        assert!(!no_gradient(&model.disc_vs));

        // Frozen discriminator: the generator loss never reaches it
        disc_opt.zero_grad();
        g_loss.backward();
        assert!(no_gradient(&model.disc_vs));
        assert!(!no_gradient(&model.gen_vs));
    }

    #[test]
    fn test_train_writes_history_and_previews() {
        let dir = tempfile::tempdir().unwrap();
        let run = RunArtifacts::create(dir.path()).unwrap();
        let mut model = tiny_dcgan();
        let data = Array4::<f32>::zeros((3, 3, 8, 8));
        let mut loader = DataLoader::seeded(data, 2, true, 0);

        let config = TrainingConfig {
            epochs: 2,
            preview_count: 2,
            preview_every: 1,
            seed: Some(9),
            ..Default::default()
        };
        let mut trainer = Trainer::new(config, Device::Cpu);
        let metrics = trainer.train(&mut model, &mut loader, &run).unwrap();
        assert_eq!(metrics.num_epochs(), 2);

        let history = std::fs::read_to_string(run.log.path()).unwrap();
        assert_eq!(history.lines().filter(|l| l.contains("-> Epoch ")).count(), 2);
        assert!(run.imgs_dir.join("epoca_2_02.png").exists());
        assert!(run.metrics_path().exists());
    }
}
