//! DataLoader for batching and iterating over training tiles
//!
//! Provides batching for GAN training with support for:
//! - Reshuffling the whole dataset every epoch
//! - Keeping the last incomplete batch
//! - Iteration over batches

use ndarray::{Array4, Axis};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

/// DataLoader for iterating over batched images
pub struct DataLoader {
    /// Full dataset of shape (num_images, channels, height, width)
    data: Array4<f32>,
    /// Batch size
    batch_size: usize,
    /// Whether to shuffle data each epoch
    shuffle: bool,
    /// Current indices for iteration
    indices: Vec<usize>,
    /// Current position in iteration
    current_idx: usize,
    rng: StdRng,
}

impl DataLoader {
    /// Create a new DataLoader
    ///
    /// # Arguments
    ///
    /// * `data` - 4D array of shape (num_images, channels, height, width)
    /// * `batch_size` - Number of images per batch (at least 1)
    /// * `shuffle` - Whether to shuffle data each epoch
    pub fn new(data: Array4<f32>, batch_size: usize, shuffle: bool) -> Self {
        Self::with_rng(data, batch_size, shuffle, StdRng::from_entropy())
    }

    /// Same as [`DataLoader::new`] with a reproducible shuffle order
    pub fn seeded(data: Array4<f32>, batch_size: usize, shuffle: bool, seed: u64) -> Self {
        Self::with_rng(data, batch_size, shuffle, StdRng::seed_from_u64(seed))
    }

    fn with_rng(data: Array4<f32>, batch_size: usize, shuffle: bool, rng: StdRng) -> Self {
        let num_samples = data.shape()[0];
        let indices: Vec<usize> = (0..num_samples).collect();

        let mut loader = Self {
            data,
            batch_size: batch_size.max(1),
            shuffle,
            indices,
            current_idx: 0,
            rng,
        };

        if shuffle {
            loader.shuffle_indices();
        }

        loader
    }

    /// Get the number of batches per epoch, counting the last partial one
    pub fn num_batches(&self) -> usize {
        self.data.shape()[0].div_ceil(self.batch_size)
    }

    /// Get total number of samples
    pub fn num_samples(&self) -> usize {
        self.data.shape()[0]
    }

    /// Get batch size
    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Shuffle indices for a new epoch
    fn shuffle_indices(&mut self) {
        self.indices.shuffle(&mut self.rng);
    }

    /// Reset for new epoch
    pub fn reset(&mut self) {
        self.current_idx = 0;
        if self.shuffle {
            self.shuffle_indices();
        }
    }

    /// Get next batch
    ///
    /// Returns None when epoch is complete
    pub fn next_batch(&mut self) -> Option<Array4<f32>> {
        let num_samples = self.indices.len();
        let start = self.current_idx;

        if start >= num_samples {
            return None;
        }

        let end = (start + self.batch_size).min(num_samples);
        let actual_batch_size = end - start;

        let (_, channels, height, width) = self.data.dim();
        let mut batch = Array4::<f32>::zeros((actual_batch_size, channels, height, width));

        for (batch_idx, &data_idx) in self.indices[start..end].iter().enumerate() {
            batch
                .index_axis_mut(Axis(0), batch_idx)
                .assign(&self.data.index_axis(Axis(0), data_idx));
        }

        self.current_idx = end;
        Some(batch)
    }

    /// Iterate over all batches of a fresh epoch
    pub fn iter(&mut self) -> DataLoaderIter<'_> {
        self.reset();
        DataLoaderIter { loader: self }
    }
}

/// Iterator adapter for DataLoader
pub struct DataLoaderIter<'a> {
    loader: &'a mut DataLoader,
}

impl<'a> Iterator for DataLoaderIter<'a> {
    type Item = Array4<f32>;

    fn next(&mut self) -> Option<Self::Item> {
        self.loader.next_batch()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn indexed_data(n: usize) -> Array4<f32> {
        Array4::from_shape_fn((n, 3, 4, 4), |(i, _, _, _)| i as f32)
    }

    #[test]
    fn test_dataloader_basic() {
        // 10 images, 3 channels, 4x4
        let mut loader = DataLoader::new(Array4::<f32>::zeros((10, 3, 4, 4)), 3, false);

        assert_eq!(loader.num_batches(), 4); // ceil(10/3) = 4
        assert_eq!(loader.num_samples(), 10);

        let sizes: Vec<usize> = loader.iter().map(|b| b.shape()[0]).collect();
        assert_eq!(sizes, vec![3, 3, 3, 1]);
    }

    #[test]
    fn test_every_image_once_per_epoch() {
        let mut loader = DataLoader::seeded(indexed_data(7), 2, true, 42);

        for _ in 0..3 {
            let mut seen: Vec<usize> = loader
                .iter()
                .flat_map(|b| {
                    let channel = b.index_axis(Axis(1), 0);
                    channel.iter().step_by(16).map(|v| *v as usize).collect::<Vec<_>>()
                })
                .collect();
            seen.sort();
            assert_eq!(seen, (0..7).collect::<Vec<_>>());
        }
    }

    #[test]
    fn test_seeded_shuffle_is_reproducible() {
        let epoch = |seed| -> Vec<Array4<f32>> {
            DataLoader::seeded(indexed_data(8), 3, true, seed).iter().collect()
        };
        let (first, second) = (epoch(7), epoch(7));
        assert_eq!(first, second);
    }

    #[test]
    fn test_zero_batch_size_is_clamped() {
        let mut loader = DataLoader::new(indexed_data(2), 0, false);
        assert_eq!(loader.batch_size(), 1);
        assert_eq!(loader.iter().count(), 2);
    }
}
