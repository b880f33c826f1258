//! DCGAN-style generator and discriminator, parameterized by patch size.
//!
//! Both networks work on the provider's NHWC layout at their public seam
//! and permute to NCHW internally for the conv stacks. The generator maps
//! a latent vector to a `[batch, patch, patch, 3]` image in `[-1, 1]`; the
//! discriminator maps such an image to a `[batch]` realness score in
//! `[0, 1]`.

use burn::{
    nn::{
        BatchNorm, BatchNormConfig, Dropout, DropoutConfig, LeakyRelu, LeakyReluConfig, Linear,
        LinearConfig, PaddingConfig2d, Relu, Sigmoid, Tanh,
        conv::{Conv2d, Conv2dConfig, ConvTranspose2d, ConvTranspose2dConfig},
    },
    prelude::*,
};

use crate::error::{GanError, Result as GanResult};
use crate::model::constants::{CHANNELS, MIN_PATCH_SIZE};

// Both networks run between a 4x4 base map and the full patch, doubling or
// halving the side per stage.
const BASE_SIDE: usize = 4;

fn resample_stages(patch_size: usize) -> GanResult<usize> {
    if patch_size >= MIN_PATCH_SIZE && patch_size.is_power_of_two() {
        Ok((patch_size / BASE_SIDE).trailing_zeros() as usize)
    } else {
        Err(GanError::InvalidConfig(format!(
            "patch_size must be a power of two >= {MIN_PATCH_SIZE}, got {patch_size}"
        )))
    }
}

#[derive(Module, Debug)]
struct UpsampleBlock<B: Backend> {
    conv: ConvTranspose2d<B>,
    norm: BatchNorm<B, 2>,
}

#[derive(Module, Debug)]
pub struct Generator<B: Backend> {
    project: Linear<B>,
    input_norm: BatchNorm<B, 2>,
    blocks: Vec<UpsampleBlock<B>>,
    output: ConvTranspose2d<B>,
    activation: Relu,
    output_activation: Tanh,
    dropout: Dropout,
    base_channels: usize,
}

#[derive(Config, Debug)]
pub struct GeneratorConfig {
    /// Side length of generated images; a power of two, at least 8.
    pub patch_size: usize,
    #[config(default = 128)]
    pub latent_dim: usize,
    #[config(default = 512)]
    pub base_channels: usize,
    #[config(default = "0.25")]
    pub dropout: f64,
}

impl GeneratorConfig {
    pub fn init<B: Backend>(&self, device: &B::Device) -> GanResult<Generator<B>> {
        let stages = resample_stages(self.patch_size)?;

        let mut blocks = Vec::with_capacity(stages.saturating_sub(1));
        let mut channels = self.base_channels;
        for _ in 1..stages {
            let next = (channels / 2).max(8);
            blocks.push(UpsampleBlock {
                conv: ConvTranspose2dConfig::new([channels, next], [3, 3])
                    .with_stride([2, 2])
                    .with_padding([1, 1])
                    .with_padding_out([1, 1])
                    .init(device),
                norm: BatchNormConfig::new(next).init(device),
            });
            channels = next;
        }

        Ok(Generator {
            project: LinearConfig::new(self.latent_dim, self.base_channels * BASE_SIDE * BASE_SIDE)
                .init(device),
            input_norm: BatchNormConfig::new(self.base_channels).init(device),
            blocks,
            output: ConvTranspose2dConfig::new([channels, CHANNELS], [3, 3])
                .with_stride([2, 2])
                .with_padding([1, 1])
                .with_padding_out([1, 1])
                .init(device),
            activation: Relu,
            output_activation: Tanh::new(),
            dropout: DropoutConfig::new(self.dropout).init(),
            base_channels: self.base_channels,
        })
    }
}

impl<B: Backend> Generator<B> {
    /// Maps latent vectors `[batch, latent_dim]` to NHWC images
    /// `[batch, patch, patch, 3]` with values in `[-1, 1]`.
    pub fn forward(&self, latent: Tensor<B, 2>) -> Tensor<B, 4> {
        let x = self.project.forward(latent);
        let mut x = x.reshape([
            -1,
            self.base_channels as i32,
            BASE_SIDE as i32,
            BASE_SIDE as i32,
        ]);
        x = self.input_norm.forward(x);
        x = self.activation.forward(x);
        x = self.dropout.forward(x);
        for block in &self.blocks {
            x = block.conv.forward(x);
            x = block.norm.forward(x);
            x = self.activation.forward(x);
            x = self.dropout.forward(x);
        }
        x = self.output.forward(x);
        let x = self.output_activation.forward(x);
        x.permute([0, 2, 3, 1])
    }
}

#[derive(Module, Debug)]
struct DownsampleBlock<B: Backend> {
    conv: Conv2d<B>,
    norm: BatchNorm<B, 2>,
}

#[derive(Module, Debug)]
pub struct Discriminator<B: Backend> {
    blocks: Vec<DownsampleBlock<B>>,
    head: Linear<B>,
    activation: LeakyRelu,
    output_activation: Sigmoid,
    dropout: Dropout,
    feature_channels: usize,
}

#[derive(Config, Debug)]
pub struct DiscriminatorConfig {
    /// Side length of scored images; a power of two, at least 8.
    pub patch_size: usize,
    #[config(default = 64)]
    pub base_channels: usize,
    #[config(default = "0.2")]
    pub leaky_relu_slope: f64,
    #[config(default = "0.3")]
    pub dropout: f64,
}

impl DiscriminatorConfig {
    pub fn init<B: Backend>(&self, device: &B::Device) -> GanResult<Discriminator<B>> {
        let stages = resample_stages(self.patch_size)?;

        let mut blocks = Vec::with_capacity(stages);
        let mut channels = CHANNELS;
        let mut width = self.base_channels;
        for _ in 0..stages {
            blocks.push(DownsampleBlock {
                conv: Conv2dConfig::new([channels, width], [4, 4])
                    .with_stride([2, 2])
                    .with_padding(PaddingConfig2d::Explicit(1, 1))
                    .init(device),
                norm: BatchNormConfig::new(width).init(device),
            });
            channels = width;
            width *= 2;
        }

        Ok(Discriminator {
            blocks,
            head: LinearConfig::new(channels * BASE_SIDE * BASE_SIDE, 1).init(device),
            activation: LeakyReluConfig::new()
                .with_negative_slope(self.leaky_relu_slope)
                .init(),
            output_activation: Sigmoid::new(),
            dropout: DropoutConfig::new(self.dropout).init(),
            feature_channels: channels,
        })
    }
}

impl<B: Backend> Discriminator<B> {
    /// Scores NHWC image batches `[batch, patch, patch, 3]`; returns a
    /// `[batch]` realness score in `[0, 1]`.
    pub fn forward(&self, images: Tensor<B, 4>) -> Tensor<B, 1> {
        let mut x = images.permute([0, 3, 1, 2]);
        for block in &self.blocks {
            x = block.conv.forward(x);
            x = block.norm.forward(x);
            x = self.activation.forward(x);
            x = self.dropout.forward(x);
        }
        let x = x.reshape([-1, (self.feature_channels * BASE_SIDE * BASE_SIDE) as i32]);
        let x = self.head.forward(x);
        let scores: Tensor<B, 1> = self.output_activation.forward(x).squeeze(1);
        scores
    }
}

#[derive(Module, Debug)]
pub struct Model<B: Backend> {
    pub generator: Generator<B>,
    pub discriminator: Discriminator<B>,
}

#[derive(Config, Debug)]
pub struct ModelConfig {
    pub generator: GeneratorConfig,
    pub discriminator: DiscriminatorConfig,
}

impl ModelConfig {
    /// Configs for both networks at one patch size.
    pub fn with_patch_size(patch_size: usize) -> Self {
        Self {
            generator: GeneratorConfig::new(patch_size),
            discriminator: DiscriminatorConfig::new(patch_size),
        }
    }

    pub fn init<B: Backend>(&self, device: &B::Device) -> GanResult<Model<B>> {
        Ok(Model {
            generator: self.generator.init(device)?,
            discriminator: self.discriminator.init(device)?,
        })
    }
}
