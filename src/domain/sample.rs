// ============================================================
// Layer 3 — ImageSample Domain Type
// ============================================================
// A single decoded image in channel-major (CHW) byte order
// plus the class index it belongs to.
//
// Both supported datasets store 8-bit pixels, so the raw bytes
// are kept as-is; normalisation to f32 happens in the batcher.
//
// Layout example for a 3x32x32 CIFAR image:
//   pixels[0..1024]    → red plane,   row by row
//   pixels[1024..2048] → green plane
//   pixels[2048..3072] → blue plane

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageSample {
    pub pixels:   Vec<u8>,
    pub label:    usize,
    pub channels: usize,
    pub height:   usize,
    pub width:    usize,
}

impl ImageSample {
    pub fn new(pixels: Vec<u8>, label: usize, channels: usize, height: usize, width: usize) -> Self {
        debug_assert_eq!(pixels.len(), channels * height * width);
        Self { pixels, label, channels, height, width }
    }

    /// Number of values in one channel plane
    pub fn plane_len(&self) -> usize {
        self.height * self.width
    }

    /// Pixel at (channel, row, col)
    pub fn at(&self, c: usize, y: usize, x: usize) -> u8 {
        self.pixels[c * self.plane_len() + y * self.width + x]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chw_indexing() {
        // 2 channels, 2x2: channel 0 = 0..4, channel 1 = 4..8
        let s = ImageSample::new((0u8..8).collect(), 3, 2, 2, 2);
        assert_eq!(s.plane_len(), 4);
        assert_eq!(s.at(0, 1, 0), 2);
        assert_eq!(s.at(1, 0, 1), 5);
    }
}
