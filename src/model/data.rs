//! Dataset provider: turns raw image/label records into normalized,
//! batched tensors.
//!
//! The pipeline is a pull model. A [`DataProvider`] asks its
//! [`DatasetRegistry`] for the records of one split, then hands out a
//! [`BatchStream`] — a lazy, restartable, endless sequence of full batches.
//! Images are resized to `patch_size x patch_size` and normalized to
//! `[-1, 1]`; batches are NHWC, `[batch_size, patch_size, patch_size, 3]`.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;

use burn::data::dataloader::batcher::Batcher;
use burn::data::dataset::Dataset;
use burn::prelude::*;
use image::imageops::{self, FilterType};
use image::{ImageReader, RgbImage};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use tracing::{debug, warn};

use crate::error::{GanError, Result};
use crate::model::constants::CHANNELS;
use crate::runtime::Library;

/// Named partition of a dataset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Split {
    Train,
    Validation,
}

impl Split {
    pub fn as_str(&self) -> &'static str {
        match self {
            Split::Train => "train",
            Split::Validation => "validation",
        }
    }
}

impl fmt::Display for Split {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Split {
    type Err = GanError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "train" => Ok(Split::Train),
            "validation" => Ok(Split::Validation),
            other => Err(GanError::SplitNotFound {
                split: other.to_string(),
            }),
        }
    }
}

/// One raw sample: an RGB image of arbitrary dimensions and a class label.
#[derive(Debug, Clone)]
pub struct SampleRecord {
    pub image: RgbImage,
    pub label: i64,
}

/// Source of sample records for a split.
///
/// Implementations may download or otherwise materialize the split on first
/// use. Tests inject deterministic fakes.
pub trait DatasetRegistry: Send + Sync {
    fn load(&self, split: Split) -> Result<Vec<SampleRecord>>;
}

fn is_image_file(path: &Path) -> bool {
    path.extension()
        .and_then(|s| s.to_str())
        .is_some_and(|ext| {
            matches!(
                ext.to_lowercase().as_str(),
                "jpg" | "jpeg" | "png" | "bmp" | "tiff"
            )
        })
}

/// Filesystem registry: `<root>/<split>/<class>/image.*`.
///
/// The label of a record is the index of its class directory in sorted
/// order. Image files placed directly under the split directory form a
/// single class with label 0.
pub struct ImageFolderRegistry {
    root: PathBuf,
}

impl ImageFolderRegistry {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn read_class(dir: &Path, label: i64, records: &mut Vec<SampleRecord>) -> Result<()> {
        for entry in std::fs::read_dir(dir)? {
            let path = entry?.path();
            if !path.is_file() || !is_image_file(&path) {
                continue;
            }
            let decoded = ImageReader::open(&path)
                .ok()
                .and_then(|reader| reader.decode().ok());
            match decoded {
                Some(img) => records.push(SampleRecord {
                    image: img.to_rgb8(),
                    label,
                }),
                None => warn!(path = %path.display(), "skipping undecodable image"),
            }
        }
        Ok(())
    }
}

impl DatasetRegistry for ImageFolderRegistry {
    fn load(&self, split: Split) -> Result<Vec<SampleRecord>> {
        let dir = self.root.join(split.as_str());
        if !dir.is_dir() {
            return Err(GanError::SplitNotFound {
                split: split.to_string(),
            });
        }

        let mut class_dirs: Vec<PathBuf> = std::fs::read_dir(&dir)?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| path.is_dir())
            .collect();
        class_dirs.sort();

        let mut records = Vec::new();
        if class_dirs.is_empty() {
            Self::read_class(&dir, 0, &mut records)?;
        } else {
            for (label, class_dir) in class_dirs.iter().enumerate() {
                Self::read_class(class_dir, label as i64, &mut records)?;
            }
        }

        if records.is_empty() {
            return Err(GanError::EmptySplit {
                split: split.to_string(),
            });
        }
        debug!(split = %split, samples = records.len(), "loaded image folder split");
        Ok(records)
    }
}

/// A resized, normalized sample ready for batching.
///
/// `image` is flat NHWC-ordered (`patch_size * patch_size * 3`) with values
/// in `[-1, 1]`.
#[derive(Debug, Clone)]
pub struct PatchItem {
    pub image: Vec<f32>,
    pub label: f32,
}

/// Records of one split, resized and normalized on access.
#[derive(Debug)]
pub struct PatchDataset {
    records: Arc<Vec<SampleRecord>>,
    patch_size: usize,
}

impl PatchDataset {
    fn new(records: Arc<Vec<SampleRecord>>, patch_size: usize) -> Self {
        Self {
            records,
            patch_size,
        }
    }
}

impl Dataset<PatchItem> for PatchDataset {
    fn len(&self) -> usize {
        self.records.len()
    }

    fn get(&self, index: usize) -> Option<PatchItem> {
        let record = self.records.get(index)?;
        let side = self.patch_size as u32;
        let resized = imageops::resize(&record.image, side, side, FilterType::Triangle);

        let mut image = Vec::with_capacity(self.patch_size * self.patch_size * CHANNELS);
        for pixel in resized.pixels() {
            // Normalize to [-1, 1]
            image.push(pixel[0] as f32 / 127.5 - 1.0);
            image.push(pixel[1] as f32 / 127.5 - 1.0);
            image.push(pixel[2] as f32 / 127.5 - 1.0);
        }

        Some(PatchItem {
            image,
            label: record.label as f32,
        })
    }
}

/// One batch of normalized samples.
#[derive(Clone, Debug)]
pub struct GanBatch<B: Backend> {
    /// Shape: [batch_size, patch_size, patch_size, 3]
    pub images: Tensor<B, 4>,
    /// Shape: [batch_size]
    pub labels: Tensor<B, 1>,
}

#[derive(Clone, Debug)]
pub struct GanBatcher {
    patch_size: usize,
}

impl GanBatcher {
    pub fn new(patch_size: usize) -> Self {
        Self { patch_size }
    }
}

impl<B: Backend> Batcher<B, PatchItem, GanBatch<B>> for GanBatcher {
    fn batch(&self, items: Vec<PatchItem>, device: &B::Device) -> GanBatch<B> {
        let p = self.patch_size;
        let count = items.len();
        let mut labels = Vec::with_capacity(count);
        let image_tensors: Vec<Tensor<B, 4>> = items
            .into_iter()
            .map(|item| {
                labels.push(item.label);
                Tensor::<B, 3>::from_data(
                    TensorData::new(item.image, [p, p, CHANNELS]).convert::<B::FloatElem>(),
                    device,
                )
                .reshape([1, p, p, CHANNELS])
            })
            .collect();
        let images = Tensor::cat(image_tensors, 0);
        let labels = Tensor::<B, 1>::from_data(
            TensorData::new(labels, [count]).convert::<B::FloatElem>(),
            device,
        );
        GanBatch { images, labels }
    }
}

/// Lazy, restartable, endless sequence of full batches from one split.
///
/// Every call to [`iter`](Self::iter) starts an independent pass from the
/// beginning of the split; the sequence cycles, so every batch is full and
/// there are no partial final batches.
#[derive(Debug)]
pub struct BatchStream<B: Backend> {
    dataset: Arc<PatchDataset>,
    batcher: GanBatcher,
    batch_size: usize,
    shuffle_seed: Option<u64>,
    device: B::Device,
}

impl<B: Backend> BatchStream<B> {
    /// Number of distinct samples in the underlying split.
    pub fn num_samples(&self) -> usize {
        self.dataset.len()
    }

    /// Full batches per pass over the split, at least one.
    pub fn batches_per_pass(&self) -> usize {
        (self.dataset.len() / self.batch_size).max(1)
    }

    pub fn iter(&self) -> BatchStreamIter<B> {
        let mut order: Vec<usize> = (0..self.dataset.len()).collect();
        let mut rng = self.shuffle_seed.map(StdRng::seed_from_u64);
        if let Some(rng) = rng.as_mut() {
            order.shuffle(rng);
        }
        BatchStreamIter {
            dataset: Arc::clone(&self.dataset),
            batcher: self.batcher.clone(),
            batch_size: self.batch_size,
            order,
            cursor: 0,
            rng,
            device: self.device.clone(),
        }
    }
}

/// Iterator over a single pass-cycling walk of the split.
pub struct BatchStreamIter<B: Backend> {
    dataset: Arc<PatchDataset>,
    batcher: GanBatcher,
    batch_size: usize,
    order: Vec<usize>,
    cursor: usize,
    rng: Option<StdRng>,
    device: B::Device,
}

impl<B: Backend> Iterator for BatchStreamIter<B> {
    type Item = GanBatch<B>;

    fn next(&mut self) -> Option<GanBatch<B>> {
        let mut items = Vec::with_capacity(self.batch_size);
        while items.len() < self.batch_size {
            if self.cursor == self.order.len() {
                self.cursor = 0;
                if let Some(rng) = self.rng.as_mut() {
                    self.order.shuffle(rng);
                }
            }
            let index = self.order[self.cursor];
            self.cursor += 1;
            if let Some(item) = self.dataset.get(index) {
                items.push(item);
            }
        }
        Some(self.batcher.batch(items, &self.device))
    }
}

/// Builds batch pipelines from a registry.
///
/// Constructed from a [`Library`] handle, so no provider exists before the
/// framework check has passed.
pub struct DataProvider<B: Backend> {
    registry: Arc<dyn DatasetRegistry>,
    device: B::Device,
    shuffle_seed: Option<u64>,
}

impl<B: Backend> DataProvider<B> {
    pub fn new(_library: &Library, registry: Arc<dyn DatasetRegistry>, device: B::Device) -> Self {
        Self {
            registry,
            device,
            shuffle_seed: None,
        }
    }

    /// Shuffle the sample order once per pass, seeded for reproducibility.
    pub fn with_shuffle(mut self, seed: u64) -> Self {
        self.shuffle_seed = Some(seed);
        self
    }

    /// Builds a restartable stream of batches for `split`.
    ///
    /// Images come out shaped `[batch_size, patch_size, patch_size, 3]`
    /// with values in `[-1, 1]`; labels come out shaped `[batch_size]`.
    pub fn provide_dataset(
        &self,
        split: Split,
        batch_size: usize,
        patch_size: usize,
    ) -> Result<BatchStream<B>> {
        if batch_size == 0 {
            return Err(GanError::InvalidConfig(
                "batch_size must be positive".to_string(),
            ));
        }
        if patch_size == 0 {
            return Err(GanError::InvalidConfig(
                "patch_size must be positive".to_string(),
            ));
        }

        let records = self.registry.load(split)?;
        if records.is_empty() {
            return Err(GanError::EmptySplit {
                split: split.to_string(),
            });
        }
        debug!(
            split = %split,
            samples = records.len(),
            batch_size,
            patch_size,
            "building batch stream"
        );
        Ok(BatchStream {
            dataset: Arc::new(PatchDataset::new(Arc::new(records), patch_size)),
            batcher: GanBatcher::new(patch_size),
            batch_size,
            shuffle_seed: self.shuffle_seed,
            device: self.device.clone(),
        })
    }

    /// One materialized pull from a fresh stream.
    ///
    /// Each call builds an independent stream, so re-acquiring a handle is
    /// idempotent: prior pulls never affect later ones.
    pub fn provide_data(
        &self,
        split: Split,
        batch_size: usize,
        patch_size: usize,
    ) -> Result<(Tensor<B, 4>, Tensor<B, 1>)> {
        let stream = self.provide_dataset(split, batch_size, patch_size)?;
        let batch = stream.iter().next().ok_or_else(|| GanError::EmptySplit {
            split: split.to_string(),
        })?;
        Ok((batch.images, batch.labels))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_parses_and_displays() {
        assert_eq!("train".parse::<Split>().unwrap(), Split::Train);
        assert_eq!("validation".parse::<Split>().unwrap(), Split::Validation);
        assert_eq!(Split::Train.to_string(), "train");
        assert!(matches!(
            "test".parse::<Split>(),
            Err(GanError::SplitNotFound { .. })
        ));
    }

    #[test]
    fn filters_by_extension() {
        assert!(is_image_file(Path::new("a/b.PNG")));
        assert!(is_image_file(Path::new("a/b.jpeg")));
        assert!(!is_image_file(Path::new("a/b.txt")));
        assert!(!is_image_file(Path::new("a/b")));
    }

    #[test]
    fn patch_dataset_resizes_and_normalizes() {
        let mut img = RgbImage::new(32, 16);
        for pixel in img.pixels_mut() {
            *pixel = image::Rgb([255, 0, 128]);
        }
        let records = Arc::new(vec![SampleRecord { image: img, label: 7 }]);
        let dataset = PatchDataset::new(records, 8);

        let item = dataset.get(0).unwrap();
        assert_eq!(item.image.len(), 8 * 8 * 3);
        assert_eq!(item.label, 7.0);
        for v in &item.image {
            assert!((-1.0..=1.0).contains(v), "value {v} out of range");
        }
        // Constant-color input survives resizing exactly.
        assert_eq!(item.image[0], 1.0);
        assert_eq!(item.image[1], -1.0);
    }

    #[test]
    fn image_folder_registry_labels_by_sorted_class() {
        let dir = tempfile::tempdir().unwrap();
        for (class, shade) in [("cats", 10u8), ("dogs", 200u8)] {
            let class_dir = dir.path().join("train").join(class);
            std::fs::create_dir_all(&class_dir).unwrap();
            let mut img = RgbImage::new(4, 4);
            for pixel in img.pixels_mut() {
                *pixel = image::Rgb([shade, shade, shade]);
            }
            img.save(class_dir.join("sample.png")).unwrap();
        }

        let registry = ImageFolderRegistry::new(dir.path());
        let mut records = registry.load(Split::Train).unwrap();
        records.sort_by_key(|r| r.label);
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].label, 0); // cats
        assert_eq!(records[1].label, 1); // dogs
        assert_eq!(records[0].image.get_pixel(0, 0).0, [10, 10, 10]);

        assert!(matches!(
            registry.load(Split::Validation),
            Err(GanError::SplitNotFound { .. })
        ));
    }

    #[test]
    fn image_folder_registry_rejects_empty_split() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("train")).unwrap();

        let registry = ImageFolderRegistry::new(dir.path());
        assert!(matches!(
            registry.load(Split::Train),
            Err(GanError::EmptySplit { .. })
        ));
    }
}
