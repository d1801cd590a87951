//! Training metrics for monitoring GAN progress
//!
//! Per-epoch mean losses and durations, with CSV persistence.

use std::path::Path;

/// Metrics collected during training
#[derive(Debug, Clone, Default)]
pub struct TrainingMetrics {
    /// Generator losses per epoch
    pub gen_losses: Vec<f64>,
    /// Discriminator losses per epoch
    pub disc_losses: Vec<f64>,
    /// Wall-clock seconds per epoch
    pub epoch_secs: Vec<f64>,
}

impl TrainingMetrics {
    /// Create new empty metrics
    pub fn new() -> Self {
        Self::default()
    }

    /// Record epoch metrics
    pub fn record_epoch(&mut self, gen_loss: f64, disc_loss: f64, secs: f64) {
        self.gen_losses.push(gen_loss);
        self.disc_losses.push(disc_loss);
        self.epoch_secs.push(secs);
    }

    /// Get number of recorded epochs
    pub fn num_epochs(&self) -> usize {
        self.gen_losses.len()
    }

    /// Get latest generator loss
    pub fn latest_gen_loss(&self) -> Option<f64> {
        self.gen_losses.last().copied()
    }

    /// Get latest discriminator loss
    pub fn latest_disc_loss(&self) -> Option<f64> {
        self.disc_losses.last().copied()
    }

    /// Total training time in seconds
    pub fn total_secs(&self) -> f64 {
        self.epoch_secs.iter().sum()
    }

    /// Calculate moving average of generator loss
    pub fn gen_loss_ma(&self, window: usize) -> f64 {
        moving_average(&self.gen_losses, window)
    }

    /// Calculate moving average of discriminator loss
    pub fn disc_loss_ma(&self, window: usize) -> f64 {
        moving_average(&self.disc_losses, window)
    }

    /// Check if training appears to have collapsed
    ///
    /// Mode collapse indicators:
    /// - Discriminator loss very low (can easily distinguish)
    /// - Generator loss very high (can't fool discriminator)
    pub fn check_mode_collapse(&self, window: usize) -> bool {
        if self.num_epochs() < window {
            return false;
        }

        let disc_ma = self.disc_loss_ma(window);
        let gen_ma = self.gen_loss_ma(window);

        disc_ma < 0.1 && gen_ma > 5.0
    }

    /// Save metrics to CSV file
    pub fn save_csv(&self, path: &Path) -> anyhow::Result<()> {
        let mut writer = csv::Writer::from_path(path)?;

        writer.write_record(["epoch", "gen_loss", "disc_loss", "secs"])?;

        for i in 0..self.num_epochs() {
            writer.write_record([
                (i + 1).to_string(),
                self.gen_losses[i].to_string(),
                self.disc_losses[i].to_string(),
                self.epoch_secs[i].to_string(),
            ])?;
        }

        writer.flush()?;
        Ok(())
    }
}

/// Calculate moving average of last `window` values
fn moving_average(values: &[f64], window: usize) -> f64 {
    if values.is_empty() {
        return 0.0;
    }

    let n = window.min(values.len());
    let sum: f64 = values.iter().rev().take(n).sum();
    sum / n as f64
}
