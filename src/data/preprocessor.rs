// ============================================================
// Layer 4 — Image Preprocessor
// ============================================================
// Turns raw u8 pixels into the f32 values the network sees,
// and (for training only) applies light augmentation.
//
// Normalisation, per channel c:
//     x' = (x / 255 - mean[c]) / std[c]
//
// Augmentation (3-channel datasets only):
//   1. Random horizontal flip with probability 0.5
//   2. Zero-pad 4 pixels on every side, then take a random
//      crop of the original size
// This is the standard recipe for training CIFAR ResNets.
// Digits are left alone: flipping a "2" does not give a "2".
//
// Reference: He et al. (2016) Deep Residual Learning, §4.2

use rand::Rng;

use crate::domain::{kinds::DatasetKind, sample::ImageSample};

const CROP_PADDING: usize = 4;

#[derive(Debug, Clone)]
pub struct Preprocessor {
    mean:    Vec<f32>,
    std:     Vec<f32>,
    augment: bool,
}

impl Preprocessor {
    /// Channel statistics of the dataset's training split.
    pub fn for_dataset(kind: DatasetKind) -> Self {
        match kind {
            DatasetKind::Cifar10 => Self::new(
                vec![0.4914, 0.4822, 0.4465],
                vec![0.2470, 0.2435, 0.2616],
            ),
            DatasetKind::Mnist => Self::new(vec![0.1307], vec![0.3081]),
        }
    }

    pub fn new(mean: Vec<f32>, std: Vec<f32>) -> Self {
        Self { mean, std, augment: false }
    }

    pub fn with_augmentation(mut self, augment: bool) -> Self {
        self.augment = augment;
        self
    }

    /// Normalised CHW floats for one sample, augmented if enabled.
    pub fn process(&self, sample: &ImageSample) -> Vec<f32> {
        if self.augment && sample.channels == 3 {
            let mut rng = rand::thread_rng();
            let flip = rng.gen_bool(0.5);
            let dy   = rng.gen_range(0..=2 * CROP_PADDING);
            let dx   = rng.gen_range(0..=2 * CROP_PADDING);
            self.normalize(&shift_and_flip(sample, dy, dx, flip))
        } else {
            self.normalize(sample)
        }
    }

    pub fn normalize(&self, sample: &ImageSample) -> Vec<f32> {
        let plane = sample.plane_len();
        sample
            .pixels
            .iter()
            .enumerate()
            .map(|(i, &p)| {
                let c = i / plane;
                (p as f32 / 255.0 - self.mean[c]) / self.std[c]
            })
            .collect()
    }
}

/// Crop at offset (dy, dx) of the zero-padded image, optionally mirrored.
/// An offset of (CROP_PADDING, CROP_PADDING) without flip is the identity.
pub fn shift_and_flip(sample: &ImageSample, dy: usize, dx: usize, flip: bool) -> ImageSample {
    let (h, w) = (sample.height, sample.width);
    let mut pixels = vec![0u8; sample.pixels.len()];

    for c in 0..sample.channels {
        for y in 0..h {
            // Row in the original image, or outside it (padding)
            let src_y = (y + dy).checked_sub(CROP_PADDING).filter(|&v| v < h);
            let Some(src_y) = src_y else { continue };
            for x in 0..w {
                let out_x = if flip { w - 1 - x } else { x };
                if let Some(src_x) = (x + dx).checked_sub(CROP_PADDING).filter(|&v| v < w) {
                    pixels[c * h * w + y * w + out_x] = sample.at(c, src_y, src_x);
                }
            }
        }
    }

    ImageSample::new(pixels, sample.label, sample.channels, h, w)
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;

    fn ramp(channels: usize, h: usize, w: usize) -> ImageSample {
        let n = channels * h * w;
        ImageSample::new((0..n).map(|v| v as u8).collect(), 1, channels, h, w)
    }

    #[test]
    fn test_normalize_per_channel() {
        let p = Preprocessor::new(vec![0.0, 1.0], vec![1.0, 0.5]);
        let s = ImageSample::new(vec![255, 0, 255, 0], 0, 2, 1, 2);
        let out = p.normalize(&s);
        assert!((out[0] - 1.0).abs() < 1e-6);
        assert!((out[1] - 0.0).abs() < 1e-6);
        assert!((out[2] - 0.0).abs() < 1e-6);
        assert!((out[3] + 2.0).abs() < 1e-6);
    }

    #[test]
    fn test_centered_crop_is_identity() {
        let s = ramp(3, 6, 6);
        assert_eq!(shift_and_flip(&s, CROP_PADDING, CROP_PADDING, false), s);
    }

    #[test]
    fn test_flip_mirrors_rows() {
        let s = ramp(1, 2, 3);
        let f = shift_and_flip(&s, CROP_PADDING, CROP_PADDING, true);
        assert_eq!(f.pixels, vec![2, 1, 0, 5, 4, 3]);
    }

    #[test]
    fn test_shift_fills_with_zeros() {
        let s = ImageSample::new(vec![9; 9], 0, 1, 3, 3);
        // Crop window starts one row above the image → first row is padding
        let shifted = shift_and_flip(&s, CROP_PADDING - 1, CROP_PADDING, false);
        assert_eq!(&shifted.pixels[0..3], &[0, 0, 0]);
        assert_eq!(&shifted.pixels[3..9], &[9; 6]);
    }

    #[test]
    fn test_mnist_never_augmented() {
        let p = Preprocessor::for_dataset(DatasetKind::Mnist).with_augmentation(true);
        let s = ramp(1, 4, 4);
        assert_eq!(p.process(&s), p.normalize(&s));
    }
}
