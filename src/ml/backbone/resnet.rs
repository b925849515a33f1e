// ============================================================
// Layer 5 — Residual Backbones
// ============================================================
// Two networks built from the same BasicBlock:
//
//   CifarResNet (ResNet-20 by default, 3x32x32 input)
//     conv3x3(3→16) → BN → ReLU
//     stage 1: n blocks, 16 planes, stride 1
//     stage 2: n blocks, 32 planes, stride 2
//     stage 3: n blocks, 64 planes, stride 2
//     global average pool → [N, 64]
//
//   ResNet18 (ImageNet layout, any HxW ≥ 32)
//     conv7x7/2(3→64) → BN → ReLU → maxpool3x3/2
//     stages of [2, 2, 2, 2] blocks, 64/128/256/512 planes
//     global average pool → [N, 512]
//
// BasicBlock:
//   out = relu(bn2(conv2(relu(bn1(conv1(x))))) + shortcut(x))
// When the block changes shape the shortcut is either
//   option A: x[:, :, ::2, ::2] zero-padded by planes/4 channels
//             on both sides (no parameters; CIFAR paper choice)
//   option B: 1x1 strided conv + BN projection
//
// Reference: He et al. (2016) Deep Residual Learning, §4.2

use burn::{
    nn::{
        conv::Conv2d,
        pool::{AdaptiveAvgPool2d, AdaptiveAvgPool2dConfig, MaxPool2d, MaxPool2dConfig},
        BatchNorm, BatchNormConfig, PaddingConfig2d,
    },
    prelude::*,
    tensor::activation::relu,
};

use crate::domain::kinds::ShortcutKind;
use crate::ml::backbone::conv2d;

// ─── Option-A shortcut ────────────────────────────────────────────────────────
/// Keep every second row and column, then put `pad` zero channels
/// before and after the existing ones.
pub fn subsample_and_pad<B: Backend>(x: Tensor<B, 4>, pad: usize) -> Tensor<B, 4> {
    let [n, _, h, w] = x.dims();
    let device = x.device();

    let rows = Tensor::<B, 1, Int>::arange_step(0..h as i64, 2, &device);
    let cols = Tensor::<B, 1, Int>::arange_step(0..w as i64, 2, &device);
    let x = x.select(2, rows).select(3, cols);

    let [_, _, h2, w2] = x.dims();
    let zeros = Tensor::<B, 4>::zeros([n, pad, h2, w2], &device);
    Tensor::cat(vec![zeros.clone(), x, zeros], 1)
}

// ─── BasicBlock ───────────────────────────────────────────────────────────────
#[derive(Config, Debug)]
pub struct BasicBlockConfig {
    pub in_planes: usize,
    pub planes:    usize,
    #[config(default = 1)]
    pub stride:    usize,
    #[config(default = "ShortcutKind::A")]
    pub shortcut:  ShortcutKind,
}

impl BasicBlockConfig {
    pub fn init<B: Backend>(&self, device: &B::Device) -> BasicBlock<B> {
        let conv1 = conv2d(self.in_planes, self.planes, 3, self.stride, 1, false, device);
        let conv2 = conv2d(self.planes, self.planes, 3, 1, 1, false, device);

        let reshapes = self.stride != 1 || self.in_planes != self.planes;
        let (projection, pad_channels) = match (reshapes, self.shortcut) {
            (false, _) => (None, 0),
            (true, ShortcutKind::A) => (None, self.planes / 4),
            (true, ShortcutKind::B) => (
                Some(Projection {
                    conv: conv2d(self.in_planes, self.planes, 1, self.stride, 0, false, device),
                    norm: BatchNormConfig::new(self.planes).init(device),
                }),
                0,
            ),
        };

        BasicBlock {
            conv1,
            bn1: BatchNormConfig::new(self.planes).init(device),
            conv2,
            bn2: BatchNormConfig::new(self.planes).init(device),
            projection,
            pad_channels,
        }
    }
}

#[derive(Module, Debug)]
pub struct Projection<B: Backend> {
    pub conv: Conv2d<B>,
    pub norm: BatchNorm<B, 2>,
}

#[derive(Module, Debug)]
pub struct BasicBlock<B: Backend> {
    pub conv1: Conv2d<B>,
    pub bn1:   BatchNorm<B, 2>,
    pub conv2: Conv2d<B>,
    pub bn2:   BatchNorm<B, 2>,
    pub projection: Option<Projection<B>>,
    /// Zero channels added on each side by the option-A shortcut; 0 = identity
    pub pad_channels: usize,
}

impl<B: Backend> BasicBlock<B> {
    pub fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        let out = relu(self.bn1.forward(self.conv1.forward(x.clone())));
        let out = self.bn2.forward(self.conv2.forward(out));

        let shortcut = match &self.projection {
            Some(p) => p.norm.forward(p.conv.forward(x)),
            None if self.pad_channels > 0 => subsample_and_pad(x, self.pad_channels),
            None => x,
        };
        relu(out + shortcut)
    }
}

/// Blocks of one stage; only the first one strides.
fn make_stage<B: Backend>(
    in_planes: &mut usize,
    planes:    usize,
    blocks:    usize,
    stride:    usize,
    shortcut:  ShortcutKind,
    device:    &B::Device,
) -> Vec<BasicBlock<B>> {
    (0..blocks)
        .map(|i| {
            let block = BasicBlockConfig::new(*in_planes, planes)
                .with_stride(if i == 0 { stride } else { 1 })
                .with_shortcut(shortcut)
                .init(device);
            *in_planes = planes;
            block
        })
        .collect()
}

// ─── CifarResNet ──────────────────────────────────────────────────────────────
#[derive(Config, Debug)]
pub struct CifarResNetConfig {
    /// Blocks per stage; [3, 3, 3] is ResNet-20
    #[config(default = "vec![3, 3, 3]")]
    pub num_blocks: Vec<usize>,
    #[config(default = "ShortcutKind::A")]
    pub shortcut:   ShortcutKind,
}

impl CifarResNetConfig {
    pub fn init<B: Backend>(&self, device: &B::Device) -> CifarResNet<B> {
        let mut in_planes = 16;
        let blocks = self.num_blocks
            .iter()
            .zip([(16, 1), (32, 2), (64, 2)])
            .flat_map(|(&n, (planes, stride))| {
                make_stage(&mut in_planes, planes, n, stride, self.shortcut, device)
            })
            .collect();

        CifarResNet {
            conv1: conv2d(3, 16, 3, 1, 1, false, device),
            bn1:   BatchNormConfig::new(16).init(device),
            blocks,
            pool:  AdaptiveAvgPool2dConfig::new([1, 1]).init(),
        }
    }
}

#[derive(Module, Debug)]
pub struct CifarResNet<B: Backend> {
    pub conv1:  Conv2d<B>,
    pub bn1:    BatchNorm<B, 2>,
    pub blocks: Vec<BasicBlock<B>>,
    pub pool:   AdaptiveAvgPool2d,
}

impl<B: Backend> CifarResNet<B> {
    /// images: [N, 3, H, W] → features [N, 64]
    pub fn forward(&self, images: Tensor<B, 4>) -> Tensor<B, 2> {
        let mut x = relu(self.bn1.forward(self.conv1.forward(images)));
        for block in &self.blocks {
            x = block.forward(x);
        }
        self.pool.forward(x).flatten(1, 3)
    }
}

// ─── ResNet18 ─────────────────────────────────────────────────────────────────
#[derive(Config, Debug)]
pub struct ResNet18Config {
    #[config(default = "vec![2, 2, 2, 2]")]
    pub num_blocks: Vec<usize>,
}

impl ResNet18Config {
    pub fn init<B: Backend>(&self, device: &B::Device) -> ResNet18<B> {
        let mut in_planes = 64;
        let blocks = self.num_blocks
            .iter()
            .zip([(64, 1), (128, 2), (256, 2), (512, 2)])
            .flat_map(|(&n, (planes, stride))| {
                make_stage(&mut in_planes, planes, n, stride, ShortcutKind::B, device)
            })
            .collect();

        ResNet18 {
            conv1: conv2d(3, 64, 7, 2, 3, false, device),
            bn1:   BatchNormConfig::new(64).init(device),
            stem_pool: MaxPool2dConfig::new([3, 3])
                .with_strides([2, 2])
                .with_padding(PaddingConfig2d::Explicit(1, 1))
                .init(),
            blocks,
            pool: AdaptiveAvgPool2dConfig::new([1, 1]).init(),
        }
    }
}

#[derive(Module, Debug)]
pub struct ResNet18<B: Backend> {
    pub conv1:     Conv2d<B>,
    pub bn1:       BatchNorm<B, 2>,
    pub stem_pool: MaxPool2d,
    pub blocks:    Vec<BasicBlock<B>>,
    pub pool:      AdaptiveAvgPool2d,
}

impl<B: Backend> ResNet18<B> {
    /// images: [N, 3, H, W] → features [N, 512]
    pub fn forward(&self, images: Tensor<B, 4>) -> Tensor<B, 2> {
        let x = relu(self.bn1.forward(self.conv1.forward(images)));
        let mut x = self.stem_pool.forward(x);
        for block in &self.blocks {
            x = block.forward(x);
        }
        self.pool.forward(x).flatten(1, 3)
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;

    type TB = NdArray;

    #[test]
    fn test_subsample_and_pad_shape_and_zeros() {
        let device = Default::default();
        let x = Tensor::<TB, 4>::ones([1, 16, 8, 8], &device);
        let out = subsample_and_pad(x, 8);
        assert_eq!(out.dims(), [1, 32, 4, 4]);

        let padded: f32 = out.clone().slice([0..1, 0..8, 0..4, 0..4]).abs().sum().into_scalar().elem();
        let kept:   f32 = out.slice([0..1, 8..24, 0..4, 0..4]).sum().into_scalar().elem();
        assert_eq!(padded, 0.0);
        assert_eq!(kept, 16.0 * 16.0);
    }

    #[test]
    fn test_block_shapes_both_options() {
        let device = Default::default();
        let x = Tensor::<TB, 4>::random([2, 16, 8, 8], burn::tensor::Distribution::Default, &device);
        for shortcut in [ShortcutKind::A, ShortcutKind::B] {
            let block = BasicBlockConfig::new(16, 32)
                .with_stride(2)
                .with_shortcut(shortcut)
                .init::<TB>(&device);
            assert_eq!(block.forward(x.clone()).dims(), [2, 32, 4, 4]);
        }
    }

    #[test]
    fn test_option_a_has_no_projection() {
        let device = Default::default();
        let block = BasicBlockConfig::new(16, 32).with_stride(2).init::<TB>(&device);
        assert!(block.projection.is_none());
        assert_eq!(block.pad_channels, 8);
    }

    #[test]
    fn test_resnet20_features() {
        let device = Default::default();
        let net = CifarResNetConfig::new().init::<TB>(&device);
        assert_eq!(net.blocks.len(), 9);
        let x = Tensor::<TB, 4>::random([2, 3, 32, 32], burn::tensor::Distribution::Default, &device);
        assert_eq!(net.forward(x).dims(), [2, 64]);
    }

    #[test]
    fn test_resnet18_features() {
        let device = Default::default();
        let net = ResNet18Config::new().init::<TB>(&device);
        let x = Tensor::<TB, 4>::random([1, 3, 32, 32], burn::tensor::Distribution::Default, &device);
        assert_eq!(net.forward(x).dims(), [1, 512]);
    }
}
