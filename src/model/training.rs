//! Adversarial training loop.
//!
//! Standard non-saturating GAN objective: the discriminator takes `k` steps
//! on real batches against detached generator output, then the generator
//! takes one step toward fooling the discriminator. Labels fed to the
//! discriminator are smoothed for stability.

use burn::{
    grad_clipping::GradientClippingConfig,
    optim::{AdamConfig, GradientsParams, Optimizer},
    prelude::*,
    record::CompactRecorder,
    tensor::{Distribution, ElementConversion, backend::AutodiffBackend},
};
use tracing::info;

use crate::error::{GanError, Result as GanResult};
use crate::model::{
    data::{DataProvider, Split},
    networks::ModelConfig,
};
use crate::utils::nhwc_to_image;

#[derive(Config)]
pub struct TrainingConfig {
    pub model: ModelConfig,
    pub optimizer_g: AdamConfig,
    pub optimizer_d: AdamConfig,

    #[config(default = 100)]
    pub num_epochs: usize,

    #[config(default = 32)]
    pub batch_size: usize,

    #[config(default = 42)]
    pub seed: u64,

    #[config(default = 8e-5)]
    pub gen_learning_rate: f64,

    #[config(default = 2e-5)]
    pub disc_learning_rate: f64,

    #[config(default = 1)]
    pub discriminator_updates: usize,
}

fn create_artifact_dir(artifact_dir: &str) {
    // Remove existing artifacts to keep epoch numbering unambiguous
    std::fs::remove_dir_all(artifact_dir).ok();
    std::fs::create_dir_all(artifact_dir).ok();
}

pub fn train<B: AutodiffBackend>(
    artifact_dir: &str,
    config: TrainingConfig,
    provider: &DataProvider<B>,
    device: B::Device,
) -> GanResult<()> {
    create_artifact_dir(artifact_dir);
    config.save(format!("{artifact_dir}/config.json"))?;

    B::seed(config.seed);

    let patch_size = config.model.generator.patch_size;
    let latent_dim = config.model.generator.latent_dim;

    let stream = provider.provide_dataset(Split::Train, config.batch_size, patch_size)?;
    let batches_per_epoch = stream.batches_per_pass();
    let mut batches = stream.iter();

    let mut generator = config.model.generator.init::<B>(&device)?;
    let mut discriminator = config.model.discriminator.init::<B>(&device)?;

    let mut optim_g = config
        .optimizer_g
        .with_beta_1(0.5)
        .with_beta_2(0.999)
        .init()
        .with_grad_clipping(GradientClippingConfig::Norm(1.0).init());
    let mut optim_d = config
        .optimizer_d
        .with_beta_1(0.5)
        .with_beta_2(0.999)
        .init()
        .with_grad_clipping(GradientClippingConfig::Norm(1.0).init());

    let recorder = CompactRecorder::new();

    for epoch in 1..=config.num_epochs {
        for iteration in 0..batches_per_epoch {
            let Some(batch) = batches.next() else { break };
            let real_images = batch.images;
            let batch_size = real_images.dims()[0];

            let mut loss_d: Tensor<B, 1> = Tensor::zeros([1], &device);

            // --- 1. Train the discriminator --- //
            for _ in 0..config.discriminator_updates {
                let noise = Tensor::<B, 2>::random(
                    [batch_size, latent_dim],
                    Distribution::Normal(0.0, 1.0),
                    &device,
                );

                // Detach the fake images from the generator's graph
                let fake_images = generator.forward(noise).detach();

                let real_scores = discriminator.forward(real_images.clone());
                let fake_scores = discriminator.forward(fake_images);

                let real_targets =
                    smooth_positive_labels(Tensor::<B, 1>::ones([batch_size], &device));
                let fake_targets =
                    smooth_negative_labels(Tensor::<B, 1>::zeros([batch_size], &device));

                loss_d = binary_cross_entropy(real_scores, real_targets)
                    + binary_cross_entropy(fake_scores, fake_targets);

                let grads_d = GradientsParams::from_grads(loss_d.backward(), &discriminator);
                discriminator = optim_d.step(config.disc_learning_rate, discriminator, grads_d);
            }

            // --- 2. Train the generator --- //
            let noise = Tensor::<B, 2>::random(
                [batch_size, latent_dim],
                Distribution::Normal(0.0, 1.0),
                &device,
            );
            let fake_images = generator.forward(noise);
            let fake_scores = discriminator.forward(fake_images);

            // Non-saturating objective: push fake scores toward 1
            let loss_g =
                binary_cross_entropy(fake_scores, Tensor::<B, 1>::ones([batch_size], &device));

            let grads_g = GradientsParams::from_grads(loss_g.backward(), &generator);
            generator = optim_g.step(config.gen_learning_rate, generator, grads_g);

            if iteration % 100 == 0 {
                info!(
                    epoch,
                    iteration,
                    loss_d = loss_d.into_scalar().elem::<f32>(),
                    loss_g = loss_g.into_scalar().elem::<f32>(),
                    "gan step"
                );
            }
        }

        generator
            .clone()
            .save_file(format!("{artifact_dir}/generator-epoch-{epoch}"), &recorder)?;
        discriminator.clone().save_file(
            format!("{artifact_dir}/discriminator-epoch-{epoch}"),
            &recorder,
        )?;

        let noise =
            Tensor::<B, 2>::random([1, latent_dim], Distribution::Normal(0.0, 1.0), &device);
        let sample: Tensor<B, 3> = generator.forward(noise).squeeze(0);
        let image_data: Vec<f32> =
            sample
                .into_data()
                .to_vec()
                .map_err(|e| GanError::TensorRead {
                    message: format!("{e:?}"),
                })?;

        if let Some(img) = nhwc_to_image(&image_data, patch_size, patch_size) {
            img.save(format!("{artifact_dir}/sample-epoch-{epoch}.png"))?;
        }
    }

    Ok(())
}

/// Smooth positive labels into the range 0.8 - 1.2.
fn smooth_positive_labels<B: Backend>(labels: Tensor<B, 1>) -> Tensor<B, 1> {
    let shape = labels.dims();
    let noise =
        Tensor::<B, 1>::random(shape, Distribution::Uniform(0.0, 1.0), &labels.device()) * 0.4;
    labels - 0.2 + noise
}

/// Smooth negative labels into the range 0.0 - 0.3.
fn smooth_negative_labels<B: Backend>(labels: Tensor<B, 1>) -> Tensor<B, 1> {
    let shape = labels.dims();
    let noise =
        Tensor::<B, 1>::random(shape, Distribution::Uniform(0.0, 1.0), &labels.device()) * 0.3;
    labels + noise
}

/// BCE against continuous targets, as label smoothing requires.
fn binary_cross_entropy<B: Backend>(
    predictions: Tensor<B, 1>,
    targets: Tensor<B, 1>,
) -> Tensor<B, 1> {
    let eps = 1e-7; // avoid log(0)
    let predictions = predictions.clamp(eps, 1.0 - eps);

    let loss = targets.clone() * predictions.clone().log()
        + (Tensor::<B, 1>::ones_like(&predictions) - targets)
            * (Tensor::<B, 1>::ones_like(&predictions) - predictions).log();
    -loss.mean()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use burn::backend::{Autodiff, NdArray};
    use image::RgbImage;

    use crate::model::data::{DatasetRegistry, SampleRecord};
    use crate::runtime::Library;

    type TestBackend = Autodiff<NdArray>;

    struct TinyRegistry;

    impl DatasetRegistry for TinyRegistry {
        fn load(&self, split: Split) -> crate::error::Result<Vec<SampleRecord>> {
            match split {
                Split::Train => Ok(vec![
                    SampleRecord {
                        image: RgbImage::new(16, 16),
                        label: 0,
                    },
                    SampleRecord {
                        image: RgbImage::new(16, 16),
                        label: 1,
                    },
                ]),
                Split::Validation => Err(GanError::SplitNotFound {
                    split: split.to_string(),
                }),
            }
        }
    }

    #[test]
    fn smoothed_labels_stay_in_expected_ranges() {
        let device = Default::default();
        let positive = smooth_positive_labels(Tensor::<NdArray, 1>::ones([64], &device));
        let negative = smooth_negative_labels(Tensor::<NdArray, 1>::zeros([64], &device));

        let pos_min: f32 = positive.clone().min().into_scalar();
        let pos_max: f32 = positive.max().into_scalar();
        assert!(pos_min >= 0.8 && pos_max <= 1.2);

        let neg_min: f32 = negative.clone().min().into_scalar();
        let neg_max: f32 = negative.max().into_scalar();
        assert!(neg_min >= 0.0 && neg_max <= 0.3);
    }

    #[test]
    fn bce_prefers_matching_predictions() {
        let device = Default::default();
        let targets = Tensor::<NdArray, 1>::ones([4], &device);
        let good = binary_cross_entropy(
            Tensor::<NdArray, 1>::from_floats([0.9, 0.9, 0.9, 0.9], &device),
            targets.clone(),
        );
        let bad = binary_cross_entropy(
            Tensor::<NdArray, 1>::from_floats([0.1, 0.1, 0.1, 0.1], &device),
            targets,
        );
        let good: f32 = good.into_scalar();
        let bad: f32 = bad.into_scalar();
        assert!(good < bad);
    }

    #[test]
    fn one_epoch_smoke_run() {
        let artifact_dir = tempfile::tempdir().unwrap();
        let device = Default::default();
        let lib = Library::init().unwrap();
        let provider =
            DataProvider::<TestBackend>::new(lib, Arc::new(TinyRegistry), device).with_shuffle(7);

        let mut model = ModelConfig::with_patch_size(8);
        model.generator.base_channels = 16;
        model.generator.latent_dim = 8;
        model.discriminator.base_channels = 8;

        let config = TrainingConfig::new(model, AdamConfig::new(), AdamConfig::new())
            .with_num_epochs(1)
            .with_batch_size(2);

        train::<TestBackend>(
            artifact_dir.path().to_str().unwrap(),
            config,
            &provider,
            Default::default(),
        )
        .unwrap();

        assert!(artifact_dir.path().join("config.json").exists());
        assert!(artifact_dir.path().join("sample-epoch-1.png").exists());
    }
}
