//! End-to-end operations behind the CLI
//!
//! Each function wires the lower layers together the same way for the
//! binaries and the integration tests.

use std::path::{Path, PathBuf};
use std::time::Instant;

use tch::Device;
use tracing::{info, warn};

use crate::data::{prepare_images, DataLoader, TileDataset};
use crate::error::AzulejoError;
use crate::model::DCGAN;
use crate::training::{Trainer, TrainingMetrics};
use crate::utils::checkpoint::{save_generator, ModelMeta, RunArtifacts, TrainedGenerator};
use crate::utils::visualization::save_png;
use crate::utils::Config;

/// What a finished training run produced
#[derive(Debug)]
pub struct TrainingOutcome {
    /// Run directory layout
    pub run: RunArtifacts,
    /// Per-epoch metrics
    pub metrics: TrainingMetrics,
    /// Saved generator weights
    pub generator_path: PathBuf,
}

/// Build the augmented dataset: six tiles per source image
///
/// Returns the number of tiles written, or `None` when the source is
/// missing or empty.
pub fn resize(source: &Path, destination: &Path, size: u32) -> anyhow::Result<Option<usize>> {
    prepare_images(source, destination, size)
}

/// Train a DCGAN on `dataset_dir` and write a run directory under `result_dir`
///
/// Returns `None`, writing nothing, when the dataset is missing or empty.
/// A `result_dir` that is not given or does not exist is an error, checked
/// before the dataset is read, and nothing is written either.
pub fn train(
    dataset_dir: &Path,
    result_dir: Option<&Path>,
    config: &Config,
) -> anyhow::Result<Option<TrainingOutcome>> {
    let start = Instant::now();
    let result_dir = result_dir.ok_or(AzulejoError::MissingResultDir)?;
    if !result_dir.is_dir() {
        return Err(AzulejoError::ResultDirNotFound(result_dir.to_path_buf()).into());
    }
    config.validate()?;

    let (image_size, channels) = (config.data.image_size, config.data.channels);
    let Some(dataset) = TileDataset::load_dir(dataset_dir, image_size, channels)? else {
        warn!("Skipping training: no dataset at {}", dataset_dir.display());
        return Ok(None);
    };
    let num_images = dataset.len();

    let device = config.get_device();
    info!("Using device: {:?}", device);
    let mut model = DCGAN::new(
        config.generator_config(),
        config.discriminator_config(),
        device,
    )?;

    let run = RunArtifacts::create(result_dir)?;
    let topology = model.topology();
    run.log.record(&format!(
        "Dataset {} with {} images of {}x{}, batch size {}",
        dataset_dir.display(),
        num_images,
        topology.image_size,
        topology.image_size,
        config.data.batch_size
    ))?;
    run.log.record(&format!(
        "Topology '{}': {} stages, filters {}..{}, noise dimension {}",
        topology.variant,
        topology.stage_count(),
        topology.min_filters,
        topology.max_filters,
        model.noise_dim()
    ))?;

    let data = dataset.into_array();
    let batch_size = config.data.batch_size;
    let mut loader = match config.training.seed {
        Some(seed) => DataLoader::seeded(data, batch_size, true, seed),
        None => DataLoader::new(data, batch_size, true),
    };

    let training_config = config.training_config();
    let mut trainer = Trainer::new(training_config.clone(), device);
    let metrics = trainer.train(&mut model, &mut loader, &run)?.clone();

    let meta = ModelMeta::from_model(&model, &metrics, training_config.output_rescale);
    let generator_path = save_generator(&model, &meta, &run.generator_path())?;

    run.log.record(&format!(
        "Training finished in {:.2} seconds, generator saved to {}",
        start.elapsed().as_secs_f64(),
        generator_path.display()
    ))?;

    Ok(Some(TrainingOutcome {
        run,
        metrics,
        generator_path,
    }))
}

/// Write `count` tiles from a saved generator into `output_dir`
///
/// Tiles keep the model's native resolution and are named
/// `<label>_<nnn>.png`.
pub fn generate(
    model_path: &Path,
    count: usize,
    output_dir: &Path,
    device: Device,
) -> anyhow::Result<Vec<PathBuf>> {
    let model = TrainedGenerator::load(model_path, device)?;
    let images = model.render(count as i64, model.meta().output_rescale)?;
    let label = model.label();

    let mut written = Vec::with_capacity(images.len());
    for (i, image) in images.iter().enumerate() {
        let path = output_dir.join(format!("{}_{:03}.png", label, i + 1));
        save_png(image, &path)?;
        written.push(path);
    }

    info!("Wrote {} tiles to {}", written.len(), output_dir.display());
    Ok(written)
}
