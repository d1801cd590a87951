//! Configuration management
//!
//! Provides unified configuration for the entire azulejo pipeline.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::{Deserialize, Serialize};

use crate::model::{DiscriminatorConfig, GeneratorConfig, TopologyConfig, TopologyVariant};
use crate::training::TrainingConfig;
use crate::utils::visualization::OutputRescale;

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Data configuration
    pub data: DataConfig,
    /// Model configuration
    pub model: ModelConfig,
    /// Training configuration
    pub training: TrainingConfigFile,
    /// HTTP server configuration
    pub server: ServerConfig,
}

/// Data-related configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DataConfig {
    /// Side of the square tiles, in pixels
    pub image_size: u32,
    /// 1 for grayscale, 3 for RGB
    pub channels: i64,
    /// Batch size
    pub batch_size: usize,
}

/// Model-related configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    /// Latent dimension size
    pub noise_dim: i64,
    /// Filter width of the widest layer
    pub max_filters: i64,
    /// Lower bound of every filter width
    pub min_filters: i64,
    /// Convolution kernel size
    pub kernel_size: i64,
    /// Stage count strategy
    pub variant: TopologyVariant,
    /// Dropout rate for discriminator
    pub dropout: f64,
}

/// Training-related configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainingConfigFile {
    /// Number of epochs
    pub epochs: usize,
    /// Overrides the variant's learning rate
    pub learning_rate: Option<f64>,
    /// Preview frequency in epochs
    pub preview_every: usize,
    /// Number of preview images
    pub preview_count: usize,
    /// Seed for previews and shuffling
    pub seed: Option<u64>,
    /// Device: "cpu" or "cuda"
    pub device: String,
    /// Root of the timestamped run directories
    pub result_dir: Option<PathBuf>,
    /// Byte mapping of generated images
    pub output_rescale: OutputRescale,
}

/// HTTP server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Bind address
    pub host: String,
    /// Bind port
    pub port: u16,
    /// Model file, or a directory to pick a model from per request
    pub model_path: PathBuf,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            image_size: 128,
            channels: 3,
            batch_size: 32,
        }
    }
}

impl Default for ModelConfig {
    fn default() -> Self {
        let topology = TopologyConfig::default();
        Self {
            noise_dim: 100,
            max_filters: topology.max_filters,
            min_filters: topology.min_filters,
            kernel_size: topology.kernel_size,
            variant: topology.variant,
            dropout: 0.3,
        }
    }
}

impl Default for TrainingConfigFile {
    fn default() -> Self {
        Self {
            epochs: 100,
            learning_rate: None,
            preview_every: 5,
            preview_count: 10,
            seed: None,
            device: "cpu".to_string(),
            result_dir: None,
            output_rescale: OutputRescale::default(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 5000,
            model_path: PathBuf::from("modelos"),
        }
    }
}

impl ServerConfig {
    /// Socket address to bind
    pub fn addr(&self) -> anyhow::Result<SocketAddr> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .with_context(|| format!("invalid bind address {}:{}", self.host, self.port))
    }
}

impl Config {
    /// Create a new default configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Load configuration from TOML file
    pub fn from_toml(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to TOML file
    pub fn save_toml(&self, path: &Path) -> anyhow::Result<()> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Load configuration from JSON file
    pub fn from_json(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to JSON file
    pub fn save_json(&self, path: &Path) -> anyhow::Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Load from `path` by extension, or defaults when the file is absent
    pub fn load_or_default(path: &Path) -> anyhow::Result<Self> {
        if !path.exists() {
            tracing::info!("Config file {} not found, using defaults", path.display());
            return Ok(Self::default());
        }
        let config = if is_toml(path) {
            Self::from_toml(path)
        } else {
            Self::from_json(path)
        }
        .with_context(|| format!("failed to read config {}", path.display()))?;
        Ok(config)
    }

    /// Save to `path`, TOML or JSON by extension
    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        if is_toml(path) {
            self.save_toml(path)
        } else {
            self.save_json(path)
        }
    }

    /// Get device from configuration
    pub fn get_device(&self) -> tch::Device {
        match self.training.device.to_lowercase().as_str() {
            "cuda" | "gpu" => {
                if tch::Cuda::is_available() {
                    tch::Device::Cuda(0)
                } else {
                    tracing::warn!("CUDA requested but not available, falling back to CPU");
                    tch::Device::Cpu
                }
            }
            _ => tch::Device::Cpu,
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.data.batch_size == 0 {
            anyhow::bail!("Batch size must be > 0");
        }
        if !matches!(self.data.channels, 1 | 3) {
            anyhow::bail!("Channels must be 1 or 3");
        }
        if self.model.noise_dim <= 0 {
            anyhow::bail!("Noise dimension must be > 0");
        }
        if !(0.0..1.0).contains(&self.model.dropout) {
            anyhow::bail!("Dropout must be in [0, 1)");
        }
        if self.training.epochs == 0 {
            anyhow::bail!("Number of epochs must be > 0");
        }
        if self.training.learning_rate.is_some_and(|lr| lr <= 0.0) {
            anyhow::bail!("Learning rate must be > 0");
        }
        self.topology().validate()?;
        Ok(())
    }

    /// Network geometry shared by both networks
    pub fn topology(&self) -> TopologyConfig {
        TopologyConfig {
            image_size: self.data.image_size as i64,
            channels: self.data.channels,
            max_filters: self.model.max_filters,
            min_filters: self.model.min_filters,
            kernel_size: self.model.kernel_size,
            variant: self.model.variant,
        }
    }

    /// Generator configuration
    pub fn generator_config(&self) -> GeneratorConfig {
        GeneratorConfig {
            noise_dim: self.model.noise_dim,
            topology: self.topology(),
            ..Default::default()
        }
    }

    /// Discriminator configuration
    pub fn discriminator_config(&self) -> DiscriminatorConfig {
        DiscriminatorConfig {
            topology: self.topology(),
            dropout: self.model.dropout,
            ..Default::default()
        }
    }

    /// Trainer configuration; the learning rate defaults to the variant's
    pub fn training_config(&self) -> TrainingConfig {
        TrainingConfig {
            epochs: self.training.epochs,
            learning_rate: self
                .training
                .learning_rate
                .unwrap_or_else(|| self.model.variant.learning_rate()),
            preview_every: self.training.preview_every,
            preview_count: self.training.preview_count,
            seed: self.training.seed,
            output_rescale: self.training.output_rescale,
        }
    }
}

fn is_toml(path: &Path) -> bool {
    path.extension().is_some_and(|ext| ext == "toml")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_config_default() {
        let config = Config::default();
        assert_eq!(config.data.image_size, 128);
        assert_eq!(config.data.batch_size, 32);
        assert_eq!(config.model.noise_dim, 100);
        assert_eq!(config.server.model_path, PathBuf::from("modelos"));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_json_roundtrip() {
        let config = Config::default();
        let json = serde_json::to_string(&config).unwrap();
        let loaded: Config = serde_json::from_str(&json).unwrap();

        assert_eq!(config.data.image_size, loaded.data.image_size);
        assert_eq!(config.model.variant, loaded.model.variant);
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let mut file = NamedTempFile::with_suffix(".toml").unwrap();
        writeln!(
            file,
            "[data]\nimage_size = 64\n\n[model]\nvariant = \"oversampled\"\n\n\
             [training]\noutput_rescale = \"inverse\""
        )
        .unwrap();

        let config = Config::load_or_default(file.path()).unwrap();
        assert_eq!(config.data.image_size, 64);
        assert_eq!(config.data.batch_size, 32);
        assert_eq!(config.model.variant, TopologyVariant::Oversampled);
        assert_eq!(config.training.output_rescale, OutputRescale::Inverse);
        assert_eq!(config.training_config().learning_rate, 1e-4);
    }

    #[test]
    fn test_save_by_extension() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["config.toml", "config.json"] {
            let path = dir.path().join(name);
            Config::default().save(&path).unwrap();
            assert_eq!(Config::load_or_default(&path).unwrap().data.image_size, 128);
        }
    }

    #[test]
    fn test_missing_file_gives_defaults() {
        let config = Config::load_or_default(Path::new("does/not/exist.toml")).unwrap();
        assert_eq!(config.training.epochs, 100);
    }

    #[test]
    fn test_config_validation() {
        let mut config = Config::default();
        config.data.batch_size = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.data.image_size = 100;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.data.channels = 2;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_learning_rate_override() {
        let mut config = Config::default();
        assert_eq!(config.training_config().learning_rate, 1e-3);
        config.training.learning_rate = Some(2e-4);
        assert_eq!(config.training_config().learning_rate, 2e-4);
    }

    #[test]
    fn test_server_addr() {
        let config = ServerConfig::default();
        assert_eq!(config.addr().unwrap().port(), 5000);
    }
}
