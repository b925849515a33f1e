// ============================================================
// Layer 5 — MobileNetV3-Small Backbone
// ============================================================
// Inverted residual blocks:
//   [expand 1x1 → BN → act]      (skipped when expanded == in)
//   depthwise kxk/stride → BN → act
//   [squeeze-excite]
//   project 1x1 → BN              (no activation)
//   + x                           (stride 1 and in == out only)
//
// act is ReLU or hard-swish per block; squeeze-excite gates
// channels with hard-sigmoid. A 3x3/2 stem of 16 channels and a
// final 1x1 conv to 576 channels + global average pool give the
// 576-wide feature vector.
//
//   hard_sigmoid(x) = relu6(x + 3) / 6
//   hard_swish(x)   = x * hard_sigmoid(x)
//
// Batch norm uses eps 1e-3 and momentum 0.01.
//
// Reference: Howard et al. (2019) Searching for MobileNetV3, Table 2

use burn::{
    nn::{
        conv::Conv2d,
        pool::{AdaptiveAvgPool2d, AdaptiveAvgPool2dConfig},
        BatchNorm, BatchNormConfig,
    },
    prelude::*,
    tensor::activation::relu,
};

use crate::ml::backbone::{conv2d, conv2d_grouped};

pub const FEATURE_CHANNELS: usize = 576;
const STEM_CHANNELS: usize = 16;

/// (in, kernel, expanded, out, squeeze-excite, hard-swish, stride)
const BLOCKS: [(usize, usize, usize, usize, bool, bool, usize); 11] = [
    (16, 3,  16, 16, true,  false, 2),
    (16, 3,  72, 24, false, false, 2),
    (24, 3,  88, 24, false, false, 1),
    (24, 5,  96, 40, true,  true,  2),
    (40, 5, 240, 40, true,  true,  1),
    (40, 5, 240, 40, true,  true,  1),
    (40, 5, 120, 48, true,  true,  1),
    (48, 5, 144, 48, true,  true,  1),
    (48, 5, 288, 96, true,  true,  2),
    (96, 5, 576, 96, true,  true,  1),
    (96, 5, 576, 96, true,  true,  1),
];

pub fn hard_sigmoid<B: Backend, const D: usize>(x: Tensor<B, D>) -> Tensor<B, D> {
    x.add_scalar(3.0).clamp(0.0, 6.0).div_scalar(6.0)
}

pub fn hard_swish<B: Backend, const D: usize>(x: Tensor<B, D>) -> Tensor<B, D> {
    x.clone() * hard_sigmoid(x)
}

/// Round to a multiple of 8, never dropping more than 10%.
pub fn make_divisible(value: usize) -> usize {
    let divisor = 8;
    let rounded = ((value + divisor / 2) / divisor * divisor).max(divisor);
    if (rounded as f64) < 0.9 * value as f64 { rounded + divisor } else { rounded }
}

fn batch_norm<B: Backend>(channels: usize, device: &B::Device) -> BatchNorm<B, 2> {
    BatchNormConfig::new(channels)
        .with_epsilon(1e-3)
        .with_momentum(0.01)
        .init(device)
}

// ─── Building blocks ──────────────────────────────────────────────────────────
#[derive(Module, Debug)]
pub struct ConvBn<B: Backend> {
    pub conv: Conv2d<B>,
    pub norm: BatchNorm<B, 2>,
}

impl<B: Backend> ConvBn<B> {
    fn new(conv: Conv2d<B>, channels: usize, device: &B::Device) -> Self {
        Self { conv, norm: batch_norm(channels, device) }
    }

    fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        self.norm.forward(self.conv.forward(x))
    }
}

#[derive(Module, Debug)]
pub struct SqueezeExcite<B: Backend> {
    pub pool: AdaptiveAvgPool2d,
    pub fc1:  Conv2d<B>,
    pub fc2:  Conv2d<B>,
}

impl<B: Backend> SqueezeExcite<B> {
    fn new(channels: usize, device: &B::Device) -> Self {
        let squeezed = make_divisible(channels / 4);
        Self {
            pool: AdaptiveAvgPool2dConfig::new([1, 1]).init(),
            fc1:  conv2d(channels, squeezed, 1, 1, 0, true, device),
            fc2:  conv2d(squeezed, channels, 1, 1, 0, true, device),
        }
    }

    fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        let dims  = x.dims();
        let scale = relu(self.fc1.forward(self.pool.forward(x.clone())));
        let scale = hard_sigmoid(self.fc2.forward(scale));
        x * scale.expand(dims)
    }
}

#[derive(Module, Debug)]
pub struct InvertedResidual<B: Backend> {
    pub expand:    Option<ConvBn<B>>,
    pub depthwise: ConvBn<B>,
    pub se:        Option<SqueezeExcite<B>>,
    pub project:   ConvBn<B>,
    pub hardswish: bool,
    pub residual:  bool,
}

impl<B: Backend> InvertedResidual<B> {
    fn new(layout: (usize, usize, usize, usize, bool, bool, usize), device: &B::Device) -> Self {
        let (in_ch, kernel, expanded, out_ch, use_se, hardswish, stride) = layout;

        let expand = (expanded != in_ch)
            .then(|| ConvBn::new(conv2d(in_ch, expanded, 1, 1, 0, false, device), expanded, device));
        let depthwise = ConvBn::new(
            conv2d_grouped(expanded, expanded, kernel, stride, (kernel - 1) / 2, expanded, device),
            expanded,
            device,
        );

        Self {
            expand,
            depthwise,
            se: use_se.then(|| SqueezeExcite::new(expanded, device)),
            project: ConvBn::new(conv2d(expanded, out_ch, 1, 1, 0, false, device), out_ch, device),
            hardswish,
            residual: stride == 1 && in_ch == out_ch,
        }
    }

    fn activate(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        if self.hardswish { hard_swish(x) } else { relu(x) }
    }

    pub fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        let mut out = x.clone();
        if let Some(expand) = &self.expand {
            out = self.activate(expand.forward(out));
        }
        out = self.activate(self.depthwise.forward(out));
        if let Some(se) = &self.se {
            out = se.forward(out);
        }
        out = self.project.forward(out);

        if self.residual { out + x } else { out }
    }
}

// ─── MobileNetV3Small ─────────────────────────────────────────────────────────
#[derive(Module, Debug)]
pub struct MobileNetV3Small<B: Backend> {
    pub stem:   ConvBn<B>,
    pub blocks: Vec<InvertedResidual<B>>,
    pub last:   ConvBn<B>,
    pub pool:   AdaptiveAvgPool2d,
}

impl<B: Backend> MobileNetV3Small<B> {
    pub fn new(device: &B::Device) -> Self {
        let last_in = BLOCKS[BLOCKS.len() - 1].3;
        Self {
            stem:   ConvBn::new(conv2d(3, STEM_CHANNELS, 3, 2, 1, false, device), STEM_CHANNELS, device),
            blocks: BLOCKS.iter().map(|&layout| InvertedResidual::new(layout, device)).collect(),
            last:   ConvBn::new(conv2d(last_in, FEATURE_CHANNELS, 1, 1, 0, false, device), FEATURE_CHANNELS, device),
            pool:   AdaptiveAvgPool2dConfig::new([1, 1]).init(),
        }
    }

    /// images: [N, 3, H, W] → features [N, 576]
    pub fn forward(&self, images: Tensor<B, 4>) -> Tensor<B, 2> {
        let mut x = hard_swish(self.stem.forward(images));
        for block in &self.blocks {
            x = block.forward(x);
        }
        let x = hard_swish(self.last.forward(x));
        self.pool.forward(x).flatten(1, 3)
    }
}
