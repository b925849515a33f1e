// ============================================================
// Layer 3 — Experiment Vocabulary
// ============================================================
// Every choice an experiment makes is a closed set of names,
// so each one is an enum with:
//   - FromStr  → parsed from the command line (clap uses it)
//   - Display  → the same name back, for logs and JSON
//   - serde    → stored in train_config.json
//
// Unknown names are rejected with an error that lists the
// accepted spellings.

use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// ─── DatasetKind ──────────────────────────────────────────────────────────────
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DatasetKind {
    /// 3x32x32 colour images, 10 classes
    Cifar10,
    /// 1x28x28 greyscale digits, 10 classes
    Mnist,
}

impl DatasetKind {
    pub const NAMES: &'static [&'static str] = &["cifar10", "mnist"];

    pub fn channels(self) -> usize {
        match self {
            DatasetKind::Cifar10 => 3,
            DatasetKind::Mnist   => 1,
        }
    }

    pub fn image_size(self) -> (usize, usize) {
        match self {
            DatasetKind::Cifar10 => (32, 32),
            DatasetKind::Mnist   => (28, 28),
        }
    }

    pub fn num_classes(self) -> usize {
        10
    }

    /// Where the extracted files live unless --data-dir says otherwise.
    pub fn default_data_dir(self) -> &'static str {
        match self {
            DatasetKind::Cifar10 => "data/cifar-10-batches-bin",
            DatasetKind::Mnist   => "data/mnist",
        }
    }
}

// ─── BackboneKind ─────────────────────────────────────────────────────────────
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackboneKind {
    /// CIFAR ResNet-20 (3 stages of 3 basic blocks)
    Resnet20,
    /// Six-layer MNIST conv stack
    Conv,
    /// ResNet-18
    Resnet,
    /// VGG-11
    Vgg,
    /// MobileNetV3-small
    Mobilenet,
}

impl BackboneKind {
    pub const NAMES: &'static [&'static str] = &["resnet20", "conv", "resnet", "vgg", "mobilenet"];

    /// Width of the feature vector the backbone emits
    pub fn feature_dim(self) -> usize {
        match self {
            BackboneKind::Resnet20  => 64,
            BackboneKind::Conv      => 128 * 3 * 3,
            BackboneKind::Resnet    => 512,
            BackboneKind::Vgg       => 4096,
            BackboneKind::Mobilenet => 576,
        }
    }

    pub fn input_channels(self) -> usize {
        match self {
            BackboneKind::Conv => 1,
            _                  => 3,
        }
    }
}

// ─── HeadFamily ───────────────────────────────────────────────────────────────
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HeadFamily {
    /// Linear classifier + cross entropy
    Softmax,
    /// Distance-to-center logits + center regularisation
    Dce,
    /// Linear classifier + cross entropy + a metric-learning loss
    Ml,
    /// Prototype learning
    Pl,
}

impl HeadFamily {
    pub const NAMES: &'static [&'static str] = &["softmax", "dce", "ml", "pl"];
}

// ─── DistanceKind ─────────────────────────────────────────────────────────────
/// Pairwise comparison used by the prototype head.
/// `DotProduct` is a similarity; it is negated when used as a distance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DistanceKind {
    #[serde(rename = "dotproduct")]
    DotProduct,
    L1,
    L2,
    Linf,
}

impl DistanceKind {
    pub const NAMES: &'static [&'static str] = &["dotproduct", "L1", "L2", "Linf"];
}

// ─── MetricLossKind ───────────────────────────────────────────────────────────
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MetricLossKind {
    Contrastive,
    Triplet,
}

impl MetricLossKind {
    pub const NAMES: &'static [&'static str] = &["contrastive", "triplet"];
}

// ─── ShortcutKind ─────────────────────────────────────────────────────────────
/// How a residual block matches shapes when it downsamples.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ShortcutKind {
    /// Subsample by 2 and zero-pad the extra channels (parameter free)
    A,
    /// 1x1 strided convolution + batch norm
    B,
}

impl ShortcutKind {
    pub const NAMES: &'static [&'static str] = &["A", "B"];
}

// ─── Name <-> enum plumbing ───────────────────────────────────────────────────
// One table per enum, shared by FromStr and Display so the two
// can never disagree.
macro_rules! named_enum {
    ($ty:ty, $what:literal, [$($variant:path => $name:literal),+ $(,)?]) => {
        impl FromStr for $ty {
            type Err = anyhow::Error;

            fn from_str(s: &str) -> Result<Self> {
                match s {
                    $($name => Ok($variant),)+
                    other => bail!(
                        "unknown {} '{}': expected one of {}",
                        $what, other, <$ty>::NAMES.join(", ")
                    ),
                }
            }
        }

        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                let name = match self {
                    $($variant => $name,)+
                };
                f.write_str(name)
            }
        }
    };
}

named_enum!(DatasetKind, "dataset", [
    DatasetKind::Cifar10 => "cifar10",
    DatasetKind::Mnist   => "mnist",
]);

named_enum!(BackboneKind, "backbone", [
    BackboneKind::Resnet20  => "resnet20",
    BackboneKind::Conv      => "conv",
    BackboneKind::Resnet    => "resnet",
    BackboneKind::Vgg       => "vgg",
    BackboneKind::Mobilenet => "mobilenet",
]);

named_enum!(HeadFamily, "head", [
    HeadFamily::Softmax => "softmax",
    HeadFamily::Dce     => "dce",
    HeadFamily::Ml      => "ml",
    HeadFamily::Pl      => "pl",
]);

named_enum!(DistanceKind, "distance", [
    DistanceKind::DotProduct => "dotproduct",
    DistanceKind::L1         => "L1",
    DistanceKind::L2         => "L2",
    DistanceKind::Linf       => "Linf",
]);

named_enum!(MetricLossKind, "metric loss", [
    MetricLossKind::Contrastive => "contrastive",
    MetricLossKind::Triplet     => "triplet",
]);

named_enum!(ShortcutKind, "shortcut option", [
    ShortcutKind::A => "A",
    ShortcutKind::B => "B",
]);
