//! Tile preprocessing for dataset building
//!
//! Every source image is resized to a square and expanded into six tiles:
//! the resized original, three rotations and two mirrors. Azulejos are
//! symmetric patterns, so these are all plausible training samples.

use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::Context;
use image::{imageops::FilterType, DynamicImage};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{info, warn};

/// File name suffixes, in the order [`augment`] returns its tiles
pub const AUGMENTATION_SUFFIXES: [&str; 6] = ["", "_90", "_180", "_270", "_hor", "_ver"];

/// Extension used when a source file has none
const DEFAULT_EXTENSION: &str = "png";

/// One derived tile and the suffix that names it
#[derive(Debug, Clone)]
pub struct AugmentedTile {
    pub suffix: &'static str,
    pub image: DynamicImage,
}

/// Resize `image` to `size`x`size` and derive its rotations and mirrors
///
/// Rotations are clockwise; `_hor` mirrors left/right and `_ver` top/bottom.
pub fn augment(image: &DynamicImage, size: u32) -> Vec<AugmentedTile> {
    let rgb = DynamicImage::ImageRgb8(image.to_rgb8());
    let resized = if rgb.width() == size && rgb.height() == size {
        rgb
    } else {
        rgb.resize_exact(size, size, FilterType::Triangle)
    };

    let tiles = [
        resized.rotate90(),
        resized.rotate180(),
        resized.rotate270(),
        resized.fliph(),
        resized.flipv(),
    ];

    std::iter::once(resized)
        .chain(tiles)
        .zip(AUGMENTATION_SUFFIXES)
        .map(|(image, suffix)| AugmentedTile { suffix, image })
        .collect()
}

/// `<stem>_<H>x<W><suffix>.<ext>`
pub fn tile_file_name(stem: &str, size: u32, suffix: &str, extension: &str) -> String {
    format!("{}_{}x{}{}.{}", stem, size, size, suffix, extension)
}

/// Augment one source file and write its six tiles into `destination`
pub fn preprocess_file(
    path: &Path,
    destination: &Path,
    size: u32,
) -> anyhow::Result<Vec<PathBuf>> {
    let image =
        image::open(path).with_context(|| format!("failed to read image {}", path.display()))?;

    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_default();
    let extension = path
        .extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .unwrap_or_else(|| DEFAULT_EXTENSION.to_string());

    let mut written = Vec::with_capacity(AUGMENTATION_SUFFIXES.len());
    for tile in augment(&image, size) {
        let out = destination.join(tile_file_name(&stem, size, tile.suffix, &extension));
        tile.image
            .save(&out)
            .with_context(|| format!("failed to write {}", out.display()))?;
        written.push(out);
    }

    Ok(written)
}

/// Regular files in `dir`, sorted by name
pub fn list_files(dir: &Path) -> anyhow::Result<Vec<PathBuf>> {
    let mut files: Vec<PathBuf> = std::fs::read_dir(dir)
        .with_context(|| format!("failed to list {}", dir.display()))?
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| p.is_file())
        .collect();
    files.sort();
    Ok(files)
}

/// Build an augmented dataset directory from a directory of source images
///
/// Returns `None` when the source is missing or empty; nothing is written
/// in that case. The destination is created when it does not exist.
pub fn prepare_images(
    source: &Path,
    destination: &Path,
    size: u32,
) -> anyhow::Result<Option<usize>> {
    let start = Instant::now();
    info!("Validating source directory {}", source.display());

    let files = if source.is_dir() { list_files(source)? } else { Vec::new() };
    if files.is_empty() {
        warn!(
            "Source directory {} is missing or has no files, nothing to prepare",
            source.display()
        );
        return Ok(None);
    }

    if destination.exists() {
        info!("Destination directory {} already exists", destination.display());
    } else {
        std::fs::create_dir_all(destination)?;
        info!("Created destination directory {}", destination.display());
    }

    info!(
        "Preparing {} images: {} -> {} ({}x{})",
        files.len(),
        source.display(),
        destination.display(),
        size,
        size
    );

    let pb = ProgressBar::new(files.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("[{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("##-"),
    );

    let mut written = 0;
    for file in &files {
        written += preprocess_file(file, destination, size)?.len();
        pb.inc(1);
    }
    pb.finish_and_clear();

    info!(
        "Wrote {} tiles in {:.2} seconds",
        written,
        start.elapsed().as_secs_f64()
    );
    Ok(Some(written))
}
