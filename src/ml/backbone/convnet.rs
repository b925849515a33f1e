// ============================================================
// Layer 5 — MNIST Conv Stack
// ============================================================
// Six 5x5 convolutions (padding 2, so spatial size is kept)
// in three stages, each unit being conv → BN → PReLU:
//
//   [N, 1, 28, 28]
//     2 × unit(32)  → maxpool 2 → [N,  32, 14, 14]
//     2 × unit(64)  → maxpool 2 → [N,  64,  7,  7]
//     2 × unit(128) → maxpool 2 → [N, 128,  3,  3]
//   flatten → [N, 1152]
//
// The small embedding MLP that usually follows this stack is
// an EmbedLayer (ml::embed), so DCE heads can read the raw
// 1152-wide features.

use burn::{
    nn::{
        conv::Conv2d,
        pool::{MaxPool2d, MaxPool2dConfig},
        BatchNorm, BatchNormConfig, PRelu, PReluConfig,
    },
    prelude::*,
};

use crate::ml::backbone::conv2d;

const STAGE_WIDTHS: [usize; 3] = [32, 64, 128];

#[derive(Module, Debug)]
pub struct ConvUnit<B: Backend> {
    pub conv: Conv2d<B>,
    pub norm: BatchNorm<B, 2>,
    pub act:  PRelu<B>,
}

impl<B: Backend> ConvUnit<B> {
    fn new(in_channels: usize, out_channels: usize, device: &B::Device) -> Self {
        Self {
            conv: conv2d(in_channels, out_channels, 5, 1, 2, true, device),
            norm: BatchNormConfig::new(out_channels).init(device),
            act:  PReluConfig::new().init(device),
        }
    }

    pub fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        self.act.forward(self.norm.forward(self.conv.forward(x)))
    }
}

#[derive(Config, Debug)]
pub struct ConvNetConfig {
    #[config(default = 1)]
    pub in_channels: usize,
}

impl ConvNetConfig {
    pub fn init<B: Backend>(&self, device: &B::Device) -> ConvNet<B> {
        let mut units   = Vec::with_capacity(2 * STAGE_WIDTHS.len());
        let mut in_ch   = self.in_channels;
        for width in STAGE_WIDTHS {
            units.push(ConvUnit::new(in_ch, width, device));
            units.push(ConvUnit::new(width, width, device));
            in_ch = width;
        }
        ConvNet {
            units,
            pool: MaxPool2dConfig::new([2, 2]).with_strides([2, 2]).init(),
        }
    }
}

#[derive(Module, Debug)]
pub struct ConvNet<B: Backend> {
    /// Two units per stage, stages in order
    pub units: Vec<ConvUnit<B>>,
    pub pool:  MaxPool2d,
}

impl<B: Backend> ConvNet<B> {
    /// images: [N, 1, 28, 28] → features [N, 1152]
    pub fn forward(&self, images: Tensor<B, 4>) -> Tensor<B, 2> {
        let mut x = images;
        for pair in self.units.chunks(2) {
            for unit in pair {
                x = unit.forward(x);
            }
            x = self.pool.forward(x);
        }
        x.flatten(1, 3)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;

    #[test]
    fn test_mnist_features() {
        let device = Default::default();
        let net = ConvNetConfig::new().init::<NdArray>(&device);
        let x = Tensor::<NdArray, 4>::random([2, 1, 28, 28], burn::tensor::Distribution::Default, &device);
        assert_eq!(net.forward(x).dims(), [2, 128 * 3 * 3]);
    }
}
