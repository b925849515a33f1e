// ============================================================
// Layer 3 — Core Traits (Abstractions)
// ============================================================
// The application layer loads images through this trait only,
// so CIFAR-10 and MNIST readers (and any future folder-of-PNGs
// reader) are interchangeable.
//
// Reference: Rust Book §10 (Traits: Defining Shared Behaviour)

use anyhow::Result;
use crate::domain::sample::ImageSample;

/// Which half of a dataset to read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Split {
    Train,
    Test,
}

// ─── SampleSource ─────────────────────────────────────────────────────────────
/// Any component that can produce labelled images.
///
/// Implementations:
///   - Cifar10Loader → CIFAR-10 binary batches
///   - MnistLoader   → MNIST IDX files
pub trait SampleSource {
    /// Read every sample of the requested split.
    fn load_split(&self, split: Split) -> Result<Vec<ImageSample>>;
}
