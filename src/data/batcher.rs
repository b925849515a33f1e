// ============================================================
// Layer 4 — Image Batcher
// ============================================================
// Implements Burn's Batcher trait to convert a Vec<ImageSample>
// into device tensors.
//
// How batching works here:
//   Input:  Vec of N ImageSamples, each C x H x W bytes
//   Output: ImageBatch with images [N, C, H, W] (f32, normalised)
//           and labels [N] (Int)
//
//   Every sample is normalised (and augmented when training)
//   by the Preprocessor, the floats are concatenated in sample
//   order, and the flat buffer is shaped into [N, C, H, W].
//
// Reference: Burn Book §4 (Batcher)

use burn::{
    data::dataloader::batcher::Batcher,
    prelude::*,
};

use crate::data::preprocessor::Preprocessor;
use crate::domain::sample::ImageSample;

// ─── ImageBatch ───────────────────────────────────────────────────────────────
#[derive(Debug, Clone)]
pub struct ImageBatch<B: Backend> {
    /// Normalised pixels — shape: [batch_size, channels, height, width]
    pub images: Tensor<B, 4>,

    /// Class indices — shape: [batch_size]
    pub labels: Tensor<B, 1, Int>,
}

// ─── ImageBatcher ─────────────────────────────────────────────────────────────
#[derive(Clone, Debug)]
pub struct ImageBatcher<B: Backend> {
    /// The device to create tensors on
    pub device: B::Device,
    preprocessor: Preprocessor,
}

impl<B: Backend> ImageBatcher<B> {
    pub fn new(device: B::Device, preprocessor: Preprocessor) -> Self {
        Self { device, preprocessor }
    }
}

impl<B: Backend> Batcher<ImageSample, ImageBatch<B>> for ImageBatcher<B> {
    fn batch(&self, items: Vec<ImageSample>) -> ImageBatch<B> {
        let batch_size = items.len();
        // All samples of a dataset share one shape
        let (c, h, w) = (items[0].channels, items[0].height, items[0].width);

        let pixels: Vec<f32> = items
            .iter()
            .flat_map(|s| self.preprocessor.process(s))
            .collect();

        let labels: Vec<i64> = items.iter().map(|s| s.label as i64).collect();

        let images = Tensor::<B, 4>::from_data(
            TensorData::new(pixels, [batch_size, c, h, w]),
            &self.device,
        );
        let labels = Tensor::<B, 1, Int>::from_data(
            TensorData::new(labels, [batch_size]),
            &self.device,
        );

        ImageBatch { images, labels }
    }
}
