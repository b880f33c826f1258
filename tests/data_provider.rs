//! Dataset provider tests against an injected in-memory registry, so no
//! filesystem or network is touched.

use std::sync::Arc;

use burn::backend::NdArray;
use burn_gan::{DataProvider, DatasetRegistry, GanError, Library, SampleRecord, Split};
use image::RgbImage;

type TestBackend = NdArray;

/// Canned registry: one 32x32 zero image with label 1 per supported split,
/// matching nothing on disk.
struct FakeRegistry {
    splits: Vec<Split>,
}

impl DatasetRegistry for FakeRegistry {
    fn load(&self, split: Split) -> Result<Vec<SampleRecord>, GanError> {
        if !self.splits.contains(&split) {
            return Err(GanError::SplitNotFound {
                split: split.to_string(),
            });
        }
        Ok(vec![SampleRecord {
            image: RgbImage::new(32, 32),
            label: 1,
        }])
    }
}

fn provider() -> DataProvider<TestBackend> {
    let lib = Library::init().expect("framework check should pass");
    let registry = Arc::new(FakeRegistry {
        splits: vec![Split::Train, Split::Validation],
    });
    DataProvider::new(lib, registry, Default::default())
}

fn assert_batch_shapes(batch_size: usize, patch_size: usize) {
    let stream = provider()
        .provide_dataset(Split::Train, batch_size, patch_size)
        .unwrap();
    let batch = stream.iter().next().unwrap();

    assert_eq!(batch.images.dims(), [batch_size, patch_size, patch_size, 3]);
    assert_eq!(batch.labels.dims(), [batch_size]);

    let max_abs: f32 = batch.images.abs().max().into_scalar();
    assert!(max_abs <= 1.0, "image values must lie in [-1, 1]");

    // Zero-valued pixels normalize to exactly -1; labels pass through.
    let labels: Vec<f32> = batch.labels.into_data().to_vec().unwrap();
    assert!(labels.iter().all(|&l| l == 1.0));
}

#[test]
fn provide_dataset_patch_8() {
    assert_batch_shapes(5, 8);
}

#[test]
fn provide_dataset_patch_16() {
    assert_batch_shapes(5, 16);
}

#[test]
fn provide_dataset_builds_for_validation_split() {
    // Construction only; no batch is pulled.
    provider().provide_dataset(Split::Validation, 3, 8).unwrap();
}

#[test]
fn provide_data_matches_provide_dataset_shapes() {
    for patch_size in [8, 16] {
        let (images, labels) = provider().provide_data(Split::Train, 5, patch_size).unwrap();
        assert_eq!(images.dims(), [5, patch_size, patch_size, 3]);
        assert_eq!(labels.dims(), [5]);
        let max_abs: f32 = images.abs().max().into_scalar();
        assert!(max_abs <= 1.0);
    }
}

#[test]
fn provide_data_can_be_reinitialized() {
    // Two pulls from each of two independently acquired handles must all
    // succeed; earlier handles must not poison later ones.
    let data_provider = provider();

    let stream = data_provider
        .provide_dataset(Split::Train, 5, 16)
        .unwrap();
    let mut iter = stream.iter();
    assert!(iter.next().is_some());
    assert!(iter.next().is_some());

    let stream = data_provider
        .provide_dataset(Split::Train, 5, 16)
        .unwrap();
    let mut iter = stream.iter();
    assert!(iter.next().is_some());
    assert!(iter.next().is_some());

    // provide_data itself re-acquires the iterator internally.
    data_provider.provide_data(Split::Train, 5, 16).unwrap();
    data_provider.provide_data(Split::Train, 5, 16).unwrap();
}

#[test]
fn small_splits_still_fill_batches() {
    // The fake registry holds a single record; the stream cycles it.
    let stream = provider().provide_dataset(Split::Train, 5, 8).unwrap();
    assert_eq!(stream.num_samples(), 1);
    assert_eq!(stream.batches_per_pass(), 1);

    let batch = stream.iter().next().unwrap();
    assert_eq!(batch.images.dims(), [5, 8, 8, 3]);
}

#[test]
fn unknown_split_surfaces_registry_error() {
    let lib = Library::init().unwrap();
    let registry = Arc::new(FakeRegistry {
        splits: vec![Split::Train],
    });
    let data_provider = DataProvider::<TestBackend>::new(lib, registry, Default::default());

    let err = data_provider
        .provide_dataset(Split::Validation, 3, 8)
        .unwrap_err();
    assert!(matches!(err, GanError::SplitNotFound { .. }));
}

#[test]
fn zero_sizes_are_rejected() {
    let data_provider = provider();
    assert!(matches!(
        data_provider.provide_dataset(Split::Train, 0, 8),
        Err(GanError::InvalidConfig(_))
    ));
    assert!(matches!(
        data_provider.provide_data(Split::Train, 5, 0),
        Err(GanError::InvalidConfig(_))
    ));
}
