//! Run artifacts and generator checkpoints
//!
//! Every training run writes into its own timestamped directory:
//!
//! ```text
//! <result_root>/<YYYYMMDDHHMMSS>/
//!     historico_execucao.txt
//!     imgs/epoca_<n>_<kk>.png
//!     model/gerador_azulejos.ot
//!     model/gerador_azulejos.json
//!     training_metrics.csv
//! ```
//!
//! The JSON sidecar records the generator topology so the weights can be
//! loaded back without any other configuration.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::Context;
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};
use tch::{nn::VarStore, Device};
use tracing::{info, warn};

use crate::error::AzulejoError;
use crate::model::{Generator, GeneratorConfig, TopologyConfig, DCGAN};
use crate::training::TrainingMetrics;
use crate::utils::visualization::{batch_to_images, OutputRescale};

/// Run history file name
pub const RUN_LOG_FILE: &str = "historico_execucao.txt";
/// Final generator weights file name
pub const GENERATOR_FILE: &str = "gerador_azulejos.ot";
/// Per-epoch metrics file name
pub const METRICS_FILE: &str = "training_metrics.csv";
/// Extension of loadable generator weights
pub const MODEL_EXTENSION: &str = "ot";

/// Append-only, timestamped history of a training run
#[derive(Debug, Clone)]
pub struct RunLog {
    path: PathBuf,
}

impl RunLog {
    /// Log to `path`, creating it on first write
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Emit `message` through tracing and append it as
    /// `YYYY-mm-dd HH:MM:SS -> message`
    pub fn record(&self, message: &str) -> anyhow::Result<()> {
        info!("{}", message);
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .with_context(|| format!("failed to open {}", self.path.display()))?;
        writeln!(
            file,
            "{} -> {}",
            chrono::Local::now().format("%Y-%m-%d %H:%M:%S"),
            message
        )?;
        Ok(())
    }

    /// Path of the history file
    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Directory layout of one training run
#[derive(Debug, Clone)]
pub struct RunArtifacts {
    /// `<result_root>/<YYYYMMDDHHMMSS>`
    pub root: PathBuf,
    /// Preview images
    pub imgs_dir: PathBuf,
    /// Generator weights and metadata
    pub model_dir: PathBuf,
    /// Run history
    pub log: RunLog,
}

impl RunArtifacts {
    /// Create a fresh run directory under an existing `result_root`
    pub fn create(result_root: &Path) -> anyhow::Result<Self> {
        if !result_root.is_dir() {
            return Err(AzulejoError::ResultDirNotFound(result_root.to_path_buf()).into());
        }
        let stamp = chrono::Local::now().format("%Y%m%d%H%M%S").to_string();
        let root = result_root.join(stamp);
        let imgs_dir = root.join("imgs");
        let model_dir = root.join("model");

        for dir in [&root, &imgs_dir, &model_dir] {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("failed to create {}", dir.display()))?;
        }

        let log = RunLog::new(root.join(RUN_LOG_FILE));
        Ok(Self {
            root,
            imgs_dir,
            model_dir,
            log,
        })
    }

    /// Where the final generator is written
    pub fn generator_path(&self) -> PathBuf {
        self.model_dir.join(GENERATOR_FILE)
    }

    /// Where the per-epoch metrics are written
    pub fn metrics_path(&self) -> PathBuf {
        self.root.join(METRICS_FILE)
    }
}

/// Everything needed to rebuild a saved generator
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelMeta {
    /// Latent dimension
    pub noise_dim: i64,
    /// Geometry and filter widths
    pub topology: TopologyConfig,
    /// Negative slope of the hidden activations
    pub leaky_slope: f64,
    /// Byte mapping used for previews
    #[serde(default)]
    pub output_rescale: OutputRescale,
    /// Epochs trained
    pub epochs: usize,
    /// Mean generator loss of the last epoch
    pub gen_loss: Option<f64>,
    /// Mean discriminator loss of the last epoch
    pub disc_loss: Option<f64>,
    /// RFC 3339 save time
    pub timestamp: String,
}

impl ModelMeta {
    /// Describe the generator of `model` after training
    pub fn from_model(
        model: &DCGAN,
        metrics: &TrainingMetrics,
        output_rescale: OutputRescale,
    ) -> Self {
        let config = model.generator.config();
        Self {
            noise_dim: config.noise_dim,
            topology: config.topology.clone(),
            leaky_slope: config.leaky_slope,
            output_rescale,
            epochs: metrics.num_epochs(),
            gen_loss: metrics.latest_gen_loss(),
            disc_loss: metrics.latest_disc_loss(),
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }

    /// Generator configuration described by this metadata
    pub fn generator_config(&self) -> GeneratorConfig {
        GeneratorConfig {
            noise_dim: self.noise_dim,
            topology: self.topology.clone(),
            leaky_slope: self.leaky_slope,
        }
    }

    /// Sidecar path for a weights file
    pub fn path_for(weights: &Path) -> PathBuf {
        weights.with_extension("json")
    }

    /// Write as pretty JSON
    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        std::fs::write(path, serde_json::to_string_pretty(self)?)
            .with_context(|| format!("failed to write {}", path.display()))
    }

    /// Read from JSON
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        Ok(serde_json::from_str(&content)?)
    }
}

/// Save the generator weights and their metadata sidecar
///
/// # Returns
///
/// Path of the weights file
pub fn save_generator(model: &DCGAN, meta: &ModelMeta, weights: &Path) -> anyhow::Result<PathBuf> {
    if let Some(parent) = weights.parent() {
        std::fs::create_dir_all(parent)?;
    }
    model.save_generator(weights)?;
    meta.save(&ModelMeta::path_for(weights))?;

    info!("Saved generator to {}", weights.display());
    Ok(weights.to_path_buf())
}

/// Generator weight files in `dir`, sorted by name
pub fn list_models(dir: &Path) -> anyhow::Result<Vec<PathBuf>> {
    let mut models: Vec<PathBuf> = std::fs::read_dir(dir)
        .with_context(|| format!("failed to list {}", dir.display()))?
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| p.is_file())
        .filter(|p| p.extension().is_some_and(|ext| ext == MODEL_EXTENSION))
        .collect();
    models.sort();
    Ok(models)
}

/// Resolve a model path: a file is used as is, a directory yields one of
/// its weight files at random
pub fn resolve_model_file(path: &Path) -> anyhow::Result<PathBuf> {
    if path.is_file() {
        return Ok(path.to_path_buf());
    }
    if !path.is_dir() {
        return Err(AzulejoError::NoModelFound(path.to_path_buf()).into());
    }

    let models = list_models(path)?;
    models
        .choose(&mut rand::thread_rng())
        .cloned()
        .ok_or_else(|| AzulejoError::NoModelFound(path.to_path_buf()).into())
}

/// Provenance label of a model file: its name up to the first `_`
pub fn model_label(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy())
        .and_then(|n| n.split('_').next().map(str::to_string))
        .unwrap_or_default()
}

/// A generator loaded read-only from disk
pub struct TrainedGenerator {
    generator: Generator,
    // Keeps the weights alive for `generator`
    _vs: VarStore,
    meta: ModelMeta,
    path: PathBuf,
    device: Device,
}

impl TrainedGenerator {
    /// Load the weights at `path` (a file, or a directory to pick from)
    ///
    /// The topology comes from the JSON sidecar; without one the default
    /// configuration is assumed.
    pub fn load(path: &Path, device: Device) -> anyhow::Result<Self> {
        let path = resolve_model_file(path)?;

        let meta_path = ModelMeta::path_for(&path);
        let meta = if meta_path.exists() {
            ModelMeta::load(&meta_path)?
        } else {
            warn!("No metadata next to {}, assuming defaults", path.display());
            let config = GeneratorConfig::default();
            ModelMeta {
                noise_dim: config.noise_dim,
                topology: config.topology,
                leaky_slope: config.leaky_slope,
                output_rescale: OutputRescale::default(),
                epochs: 0,
                gen_loss: None,
                disc_loss: None,
                timestamp: String::new(),
            }
        };

        let mut vs = VarStore::new(device);
        let generator = Generator::new(&vs.root(), meta.generator_config())?;
        vs.load(&path)
            .with_context(|| format!("failed to load weights from {}", path.display()))?;
        vs.freeze();

        let size = meta.topology.image_size;
        info!("Loaded generator {} ({}x{})", path.display(), size, size);
        Ok(Self {
            generator,
            _vs: vs,
            meta,
            path,
            device,
        })
    }

    /// Render `count` tiles from fresh noise
    pub fn render(
        &self,
        count: i64,
        rescale: OutputRescale,
    ) -> anyhow::Result<Vec<image::DynamicImage>> {
        let images = self.generator.generate_random(count, self.device);
        batch_to_images(&images, rescale)
    }

    /// Metadata of the loaded model
    pub fn meta(&self) -> &ModelMeta {
        &self.meta
    }

    /// Weights file that was loaded
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Provenance label of the loaded file
    pub fn label(&self) -> String {
        model_label(&self.path)
    }
}
