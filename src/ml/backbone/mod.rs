// ============================================================
// Layer 5 — Backbones
// ============================================================
// Feature extractors that turn an image batch [N, C, H, W]
// into a feature matrix [N, F]. The head families never look
// inside; they only need F.
//
//   kind       input      F      module
//   resnet20   3x32x32    64     resnet::CifarResNet
//   conv       1x28x28    1152   convnet::ConvNet
//   resnet     3xHxW      512    resnet::ResNet18
//   vgg        3xHxW      4096   vgg::Vgg11
//   mobilenet  3xHxW      576    mobilenet::MobileNetV3Small
//
// Every Conv2d weight is Kaiming-normal initialised (ml::init).

pub mod convnet;
pub mod mobilenet;
pub mod resnet;
pub mod vgg;

use burn::{
    nn::{conv::{Conv2d, Conv2dConfig}, PaddingConfig2d},
    prelude::*,
};

use crate::domain::kinds::{BackboneKind, ShortcutKind};
use crate::ml::init::kaiming_normal;

use convnet::{ConvNet, ConvNetConfig};
use mobilenet::MobileNetV3Small;
use resnet::{CifarResNet, CifarResNetConfig, ResNet18, ResNet18Config};
use vgg::{Vgg11, Vgg11Config};

/// Square kxk convolution with symmetric padding.
pub(crate) fn conv2d<B: Backend>(
    in_channels:  usize,
    out_channels: usize,
    kernel:       usize,
    stride:       usize,
    padding:      usize,
    bias:         bool,
    device:       &B::Device,
) -> Conv2d<B> {
    Conv2dConfig::new([in_channels, out_channels], [kernel, kernel])
        .with_stride([stride, stride])
        .with_padding(PaddingConfig2d::Explicit(padding, padding))
        .with_bias(bias)
        .with_initializer(kaiming_normal())
        .init(device)
}

/// Grouped convolution without bias (depthwise when groups == channels).
pub(crate) fn conv2d_grouped<B: Backend>(
    in_channels:  usize,
    out_channels: usize,
    kernel:       usize,
    stride:       usize,
    padding:      usize,
    groups:       usize,
    device:       &B::Device,
) -> Conv2d<B> {
    Conv2dConfig::new([in_channels, out_channels], [kernel, kernel])
        .with_stride([stride, stride])
        .with_padding(PaddingConfig2d::Explicit(padding, padding))
        .with_groups(groups)
        .with_bias(false)
        .with_initializer(kaiming_normal())
        .init(device)
}

#[derive(Config, Debug)]
pub struct BackboneConfig {
    pub kind: BackboneKind,
    /// Residual shortcut option of the CIFAR ResNet
    #[config(default = "ShortcutKind::A")]
    pub shortcut:  ShortcutKind,
    /// Width of VGG's fully connected feature layers
    #[config(default = 4096)]
    pub vgg_width: usize,
}

impl BackboneConfig {
    pub fn feature_dim(&self) -> usize {
        match self.kind {
            BackboneKind::Vgg => self.vgg_width,
            kind              => kind.feature_dim(),
        }
    }

    pub fn init<B: Backend>(&self, device: &B::Device) -> Backbone<B> {
        match self.kind {
            BackboneKind::Resnet20 => Backbone::Resnet20(
                CifarResNetConfig::new().with_shortcut(self.shortcut).init(device),
            ),
            BackboneKind::Conv      => Backbone::Conv(ConvNetConfig::new().init(device)),
            BackboneKind::Resnet    => Backbone::Resnet(ResNet18Config::new().init(device)),
            BackboneKind::Vgg       => Backbone::Vgg(Vgg11Config::new().with_width(self.vgg_width).init(device)),
            BackboneKind::Mobilenet => Backbone::Mobilenet(MobileNetV3Small::new(device)),
        }
    }
}

#[derive(Module, Debug)]
pub enum Backbone<B: Backend> {
    Resnet20(CifarResNet<B>),
    Conv(ConvNet<B>),
    Resnet(ResNet18<B>),
    Vgg(Vgg11<B>),
    Mobilenet(MobileNetV3Small<B>),
}

impl<B: Backend> Backbone<B> {
    /// images: [N, C, H, W] → features [N, F]
    pub fn forward(&self, images: Tensor<B, 4>) -> Tensor<B, 2> {
        match self {
            Backbone::Resnet20(net)  => net.forward(images),
            Backbone::Conv(net)      => net.forward(images),
            Backbone::Resnet(net)    => net.forward(images),
            Backbone::Vgg(net)       => net.forward(images),
            Backbone::Mobilenet(net) => net.forward(images),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;

    #[test]
    fn test_feature_dim_follows_config() {
        assert_eq!(BackboneConfig::new(BackboneKind::Vgg).with_vgg_width(128).feature_dim(), 128);
        assert_eq!(BackboneConfig::new(BackboneKind::Resnet20).feature_dim(), 64);
    }

    #[test]
    fn test_enum_dispatch() {
        let device = Default::default();
        let backbone = BackboneConfig::new(BackboneKind::Resnet20).init::<NdArray>(&device);
        assert!(matches!(backbone, Backbone::Resnet20(_)));
        let x = Tensor::<NdArray, 4>::zeros([1, 3, 32, 32], &device);
        assert_eq!(backbone.forward(x).dims(), [1, 64]);
    }
}
