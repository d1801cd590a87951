//! Size-driven topology planning for the generator and discriminator
//!
//! The planner is pure: it turns an image size into an ordered list of
//! [`StageDescriptor`]s that `Generator::new` / `Discriminator::new` later
//! interpret into `tch` layers. Keeping the geometry here means the stage
//! arithmetic can be tested without touching libtorch.
//!
//! Both networks start from (or end at) a 4x4 tile. Every stage doubles
//! (generator) or halves (discriminator) the spatial resolution, while the
//! filter width halves or doubles geometrically between a floor and a
//! ceiling.

use serde::{Deserialize, Serialize};

use crate::error::AzulejoError;

/// Spatial size of the tensor the noise is projected onto
pub const BASE_SPATIAL: i64 = 4;

/// Topology strategy
///
/// `Exact` grows the tile straight to the requested size. `Oversampled`
/// runs one extra upsampling stage and area-resizes the result back down.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum TopologyVariant {
    #[default]
    Exact,
    Oversampled,
}

impl TopologyVariant {
    /// Constant subtracted from `log2(size)` to get the stage count
    pub fn stage_offset(self) -> u32 {
        match self {
            TopologyVariant::Exact => 2,
            TopologyVariant::Oversampled => 1,
        }
    }

    /// Adam learning rate used by both networks for this variant
    pub fn learning_rate(self) -> f64 {
        match self {
            TopologyVariant::Exact => 1e-3,
            TopologyVariant::Oversampled => 1e-4,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            TopologyVariant::Exact => "exact",
            TopologyVariant::Oversampled => "oversampled",
        }
    }
}

impl std::str::FromStr for TopologyVariant {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "exact" => Ok(TopologyVariant::Exact),
            "oversampled" => Ok(TopologyVariant::Oversampled),
            other => Err(format!("unknown topology variant '{}'", other)),
        }
    }
}

impl std::fmt::Display for TopologyVariant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Geometry knobs shared by both networks
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TopologyConfig {
    /// Square image size in pixels
    pub image_size: i64,
    /// Number of image channels
    pub channels: i64,
    /// Widest filter count, used for the 4x4 projection
    pub max_filters: i64,
    /// Filter widths never drop below this
    pub min_filters: i64,
    /// Kernel size of every (transposed) convolution
    pub kernel_size: i64,
    /// Strategy used to derive the stage count
    pub variant: TopologyVariant,
}

impl Default for TopologyConfig {
    fn default() -> Self {
        Self {
            image_size: 128,
            channels: 3,
            max_filters: 1024,
            min_filters: 16,
            kernel_size: 3,
            variant: TopologyVariant::Exact,
        }
    }
}

impl TopologyConfig {
    /// Check the preconditions shared by both planners
    pub fn validate(&self) -> Result<(), AzulejoError> {
        let size = self.image_size;
        if size < BASE_SPATIAL || size & (size - 1) != 0 {
            return Err(AzulejoError::InvalidImageSize(size));
        }
        if self.channels < 1 {
            return Err(AzulejoError::InvalidChannels(self.channels));
        }
        if self.kernel_size < 1 || self.kernel_size % 2 == 0 {
            return Err(AzulejoError::InvalidKernel(self.kernel_size));
        }
        if self.min_filters < 1 || self.min_filters > self.max_filters {
            return Err(AzulejoError::InvalidFilterRange {
                min: self.min_filters,
                max: self.max_filters,
            });
        }
        Ok(())
    }

    /// Number of upsampling (or downsampling) stages
    pub fn stage_count(&self) -> usize {
        let log2 = (self.image_size as u64).ilog2();
        log2.saturating_sub(self.variant.stage_offset()) as usize
    }

    /// "Same" padding for the odd kernel sizes accepted by `validate`
    pub fn padding(&self) -> i64 {
        (self.kernel_size - 1) / 2
    }

    /// Filter width at shift `i`, clamped to `[min_filters, max_filters]`
    pub fn filters_at(&self, shift: usize) -> i64 {
        let shifted = if shift >= 63 { 0 } else { self.max_filters >> shift };
        shifted.max(self.min_filters).min(self.max_filters)
    }

    /// Resolution the generator stack produces before any final resize
    pub fn generator_spatial_out(&self) -> i64 {
        BASE_SPATIAL << self.stage_count()
    }
}

/// What a stage does
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageKind {
    /// Dense projection of the noise onto a 4x4 tile, plus norm and activation
    Project,
    /// Transposed convolution that doubles resolution, plus norm and activation
    Upsample,
    /// Final transposed convolution onto image channels with `tanh`
    ToImage,
    /// Strided convolution that halves resolution, plus dropout and activation
    Downsample,
    /// Flatten and dense onto a single real/fake score
    Classify,
}

/// One entry of a network plan
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageDescriptor {
    pub kind: StageKind,
    pub in_filters: i64,
    pub out_filters: i64,
    pub kernel_size: i64,
    pub stride: i64,
    pub spatial_in: i64,
    pub spatial_out: i64,
}

/// Plan the generator: noise of size `noise_dim` to a `channels`-deep image
pub fn generator_plan(
    noise_dim: i64,
    config: &TopologyConfig,
) -> Result<Vec<StageDescriptor>, AzulejoError> {
    config.validate()?;
    let stages = config.stage_count();
    let mut plan = Vec::with_capacity(stages + 2);

    plan.push(StageDescriptor {
        kind: StageKind::Project,
        in_filters: noise_dim,
        out_filters: config.max_filters,
        kernel_size: 1,
        stride: 1,
        spatial_in: 1,
        spatial_out: BASE_SPATIAL,
    });

    let mut filters = config.max_filters;
    let mut spatial = BASE_SPATIAL;
    for i in 1..=stages {
        let next = config.filters_at(i);
        plan.push(StageDescriptor {
            kind: StageKind::Upsample,
            in_filters: filters,
            out_filters: next,
            kernel_size: config.kernel_size,
            stride: 2,
            spatial_in: spatial,
            spatial_out: spatial * 2,
        });
        filters = next;
        spatial *= 2;
    }

    plan.push(StageDescriptor {
        kind: StageKind::ToImage,
        in_filters: filters,
        out_filters: config.channels,
        kernel_size: config.kernel_size,
        stride: 1,
        spatial_in: spatial,
        spatial_out: spatial,
    });

    Ok(plan)
}

/// Plan the discriminator: a `channels`-deep image to a single score
pub fn discriminator_plan(config: &TopologyConfig) -> Result<Vec<StageDescriptor>, AzulejoError> {
    config.validate()?;
    let stages = config.stage_count();
    let mut plan = Vec::with_capacity(stages + 1);

    let mut filters = config.channels;
    let mut spatial = config.image_size;
    for j in 0..stages {
        let next = config.filters_at(stages - j);
        plan.push(StageDescriptor {
            kind: StageKind::Downsample,
            in_filters: filters,
            out_filters: next,
            kernel_size: config.kernel_size,
            stride: 2,
            spatial_in: spatial,
            spatial_out: spatial / 2,
        });
        filters = next;
        spatial /= 2;
    }

    plan.push(StageDescriptor {
        kind: StageKind::Classify,
        in_filters: filters * spatial * spatial,
        out_filters: 1,
        kernel_size: 1,
        stride: 1,
        spatial_in: spatial,
        spatial_out: 1,
    });

    Ok(plan)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(size: i64, variant: TopologyVariant) -> TopologyConfig {
        TopologyConfig {
            image_size: size,
            variant,
            ..Default::default()
        }
    }

    #[test]
    fn test_stage_count() {
        assert_eq!(config(4, TopologyVariant::Exact).stage_count(), 0);
        assert_eq!(config(128, TopologyVariant::Exact).stage_count(), 5);
        assert_eq!(config(128, TopologyVariant::Oversampled).stage_count(), 6);
    }

    #[test]
    fn test_rejects_bad_sizes() {
        for size in [0, 2, 3, 6, 100] {
            let cfg = config(size, TopologyVariant::Exact);
            assert!(generator_plan(100, &cfg).is_err(), "size {}", size);
            assert!(discriminator_plan(&cfg).is_err(), "size {}", size);
        }

        let cfg = TopologyConfig {
            channels: 0,
            ..Default::default()
        };
        assert!(cfg.validate().is_err());

        let cfg = TopologyConfig {
            kernel_size: 4,
            ..Default::default()
        };
        assert!(cfg.validate().is_err());

        let cfg = TopologyConfig {
            min_filters: 2048,
            ..Default::default()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_generator_plan_128() {
        let plan = generator_plan(100, &config(128, TopologyVariant::Exact)).unwrap();
        let widths: Vec<i64> = plan.iter().map(|s| s.out_filters).collect();
        assert_eq!(widths, vec![1024, 512, 256, 128, 64, 32, 3]);
        assert_eq!(plan.last().unwrap().spatial_out, 128);
        assert_eq!(plan[0].kind, StageKind::Project);
        assert_eq!(plan.last().unwrap().kind, StageKind::ToImage);
    }

    #[test]
    fn test_filter_plateau_for_large_images() {
        let plan = generator_plan(100, &config(1024, TopologyVariant::Exact)).unwrap();
        let widths: Vec<i64> = plan
            .iter()
            .filter(|s| s.kind == StageKind::Upsample)
            .map(|s| s.out_filters)
            .collect();
        assert_eq!(widths, vec![512, 256, 128, 64, 32, 16, 16, 16]);
    }

    #[test]
    fn test_discriminator_mirrors_generator() {
        let cfg = config(64, TopologyVariant::Exact);
        let plan = discriminator_plan(&cfg).unwrap();
        let widths: Vec<i64> = plan
            .iter()
            .filter(|s| s.kind == StageKind::Downsample)
            .map(|s| s.out_filters)
            .collect();
        assert_eq!(widths, vec![64, 128, 256, 512]);

        let classify = plan.last().unwrap();
        assert_eq!(classify.kind, StageKind::Classify);
        assert_eq!(classify.in_filters, 512 * 4 * 4);
    }

    #[test]
    fn test_filters_stay_within_bounds() {
        for variant in [TopologyVariant::Exact, TopologyVariant::Oversampled] {
            for exp in 2..=11 {
                let cfg = config(1 << exp, variant);
                let gen = generator_plan(100, &cfg).unwrap();
                let disc = discriminator_plan(&cfg).unwrap();
                for stage in gen.iter().chain(disc.iter()) {
                    if matches!(stage.kind, StageKind::Upsample | StageKind::Downsample) {
                        assert!(stage.out_filters >= cfg.min_filters);
                        assert!(stage.out_filters <= cfg.max_filters);
                    }
                }
            }
        }
    }

    #[test]
    fn test_shapes_line_up() {
        for variant in [TopologyVariant::Exact, TopologyVariant::Oversampled] {
            for exp in 2..=10 {
                let cfg = config(1 << exp, variant);
                let gen = generator_plan(100, &cfg).unwrap();
                let disc = discriminator_plan(&cfg).unwrap();

                // Consecutive stages agree on filters and resolution
                for pair in gen.windows(2) {
                    assert_eq!(pair[0].out_filters, pair[1].in_filters);
                    assert_eq!(pair[0].spatial_out, pair[1].spatial_in);
                }

                let out = gen.last().unwrap();
                assert_eq!(out.spatial_out, cfg.generator_spatial_out());
                assert_eq!(out.out_filters, cfg.channels);
                assert_eq!(disc[0].spatial_in, cfg.image_size);
                match variant {
                    TopologyVariant::Exact => assert_eq!(out.spatial_out, cfg.image_size),
                    TopologyVariant::Oversampled => {
                        assert_eq!(out.spatial_out, cfg.image_size * 2)
                    }
                }
            }
        }
    }

    #[test]
    fn test_variant_parsing() {
        assert_eq!("Exact".parse::<TopologyVariant>(), Ok(TopologyVariant::Exact));
        assert_eq!(
            "oversampled".parse::<TopologyVariant>(),
            Ok(TopologyVariant::Oversampled)
        );
        assert!("keras3".parse::<TopologyVariant>().is_err());
        assert_eq!(TopologyVariant::Exact.learning_rate(), 1e-3);
    }
}
