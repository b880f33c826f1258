//! burn-gan: utilities for constructing, training, and evaluating
//! Generative Adversarial Networks on top of the burn framework.
//!
//! Call [`Library::init`] first. Every other entry point is constructed
//! from the handle it returns, so the framework version check cannot be
//! bypassed and a failed check leaves nothing usable behind.
//!
//! ```no_run
//! use std::sync::Arc;
//! use burn::backend::NdArray;
//! use burn_gan::{DataProvider, ImageFolderRegistry, Library, Split};
//!
//! # fn main() -> Result<(), burn_gan::GanError> {
//! let lib = Library::init()?;
//! let registry = Arc::new(ImageFolderRegistry::new("dataset"));
//! let provider = DataProvider::<NdArray>::new(lib, registry, Default::default());
//! let (images, labels) = provider.provide_data(Split::Train, 32, 64)?;
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod model;
pub mod runtime;
pub mod utils;

pub use error::{GanError, Result};
pub use model::data::{
    BatchStream, DataProvider, DatasetRegistry, GanBatch, GanBatcher, ImageFolderRegistry,
    PatchItem, SampleRecord, Split,
};
pub use model::networks::{
    Discriminator, DiscriminatorConfig, Generator, GeneratorConfig, Model, ModelConfig,
};
pub use model::training::{TrainingConfig, train};
pub use runtime::{FrameworkProbe, Library, Version};
