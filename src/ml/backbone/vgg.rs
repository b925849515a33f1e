// ============================================================
// Layer 5 — VGG-11 Backbone
// ============================================================
// Configuration "A" of Simonyan & Zisserman without batch norm:
//   64 M 128 M 256 256 M 512 512 M 512 512 M
// (numbers = 3x3 conv + ReLU widths, M = 2x2 max pool),
// then adaptive average pooling to 7x7 and the first two
// classifier layers:
//   Linear(512·7·7 → width) → ReLU → Dropout
//   Linear(width → width)   → ReLU → Dropout
// The output of the second block is the feature vector
// (width 4096 by default); the final class projection belongs
// to whichever head sits on top.
//
// Reference: Simonyan & Zisserman (2015) Very Deep Convolutional
//            Networks for Large-Scale Image Recognition

use burn::{
    nn::{
        conv::Conv2d,
        pool::{AdaptiveAvgPool2d, AdaptiveAvgPool2dConfig, MaxPool2d, MaxPool2dConfig},
        Dropout, DropoutConfig, Linear, LinearConfig,
    },
    prelude::*,
    tensor::activation::relu,
};

use crate::ml::{backbone::conv2d, init::kaiming_normal};

const VGG11_STAGES: [&[usize]; 5] = [&[64], &[128], &[256, 256], &[512, 512], &[512, 512]];
const POOLED_SIDE: usize = 7;

#[derive(Config, Debug)]
pub struct Vgg11Config {
    /// Width of the two fully connected feature layers
    #[config(default = 4096)]
    pub width:   usize,
    #[config(default = 0.5)]
    pub dropout: f64,
}

impl Vgg11Config {
    pub fn init<B: Backend>(&self, device: &B::Device) -> Vgg11<B> {
        let mut in_ch = 3;
        let stages = VGG11_STAGES
            .iter()
            .map(|widths| {
                let convs = widths
                    .iter()
                    .map(|&w| {
                        let conv = conv2d(in_ch, w, 3, 1, 1, true, device);
                        in_ch = w;
                        conv
                    })
                    .collect();
                VggStage {
                    convs,
                    pool: MaxPool2dConfig::new([2, 2]).with_strides([2, 2]).init(),
                }
            })
            .collect();

        let flat = in_ch * POOLED_SIDE * POOLED_SIDE;
        Vgg11 {
            stages,
            pool: AdaptiveAvgPool2dConfig::new([POOLED_SIDE, POOLED_SIDE]).init(),
            fc1: LinearConfig::new(flat, self.width).with_initializer(kaiming_normal()).init(device),
            fc2: LinearConfig::new(self.width, self.width).with_initializer(kaiming_normal()).init(device),
            dropout: DropoutConfig::new(self.dropout).init(),
        }
    }
}

#[derive(Module, Debug)]
pub struct VggStage<B: Backend> {
    pub convs: Vec<Conv2d<B>>,
    pub pool:  MaxPool2d,
}

#[derive(Module, Debug)]
pub struct Vgg11<B: Backend> {
    pub stages:  Vec<VggStage<B>>,
    pub pool:    AdaptiveAvgPool2d,
    pub fc1:     Linear<B>,
    pub fc2:     Linear<B>,
    pub dropout: Dropout,
}

impl<B: Backend> Vgg11<B> {
    /// images: [N, 3, H, W] → features [N, width]
    pub fn forward(&self, images: Tensor<B, 4>) -> Tensor<B, 2> {
        let mut x = images;
        for stage in &self.stages {
            for conv in &stage.convs {
                x = relu(conv.forward(x));
            }
            x = stage.pool.forward(x);
        }
        let x = self.pool.forward(x).flatten(1, 3);
        let x = self.dropout.forward(relu(self.fc1.forward(x)));
        self.dropout.forward(relu(self.fc2.forward(x)))
    }
}
