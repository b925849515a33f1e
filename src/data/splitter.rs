// ============================================================
// Layer 4 — Train/Validation Splitter
// ============================================================
// Shuffles the training split with a fixed seed and carves off
// a validation set. The seed is part of TrainConfig, so the
// same run configuration always validates on the same images.
//
// Benchmark files are stored grouped or partially sorted by
// class, so splitting without shuffling would give a
// validation set with a skewed label distribution.
//
// Reference: rand crate documentation (SeedableRng, SliceRandom)

use rand::{rngs::StdRng, seq::SliceRandom, SeedableRng};

/// Shuffle `samples` deterministically and split into (train, validation).
///
/// `train_fraction` is clamped to [0, 1]; the split index is rounded.
pub fn split_train_val<T>(mut samples: Vec<T>, train_fraction: f64, seed: u64) -> (Vec<T>, Vec<T>) {
    let mut rng = StdRng::seed_from_u64(seed);
    samples.shuffle(&mut rng);

    let total    = samples.len();
    let fraction = train_fraction.clamp(0.0, 1.0);
    let split_at = (((total as f64) * fraction).round() as usize).min(total);

    let val = samples.split_off(split_at);

    tracing::debug!(
        "Dataset split: {} training, {} validation (seed {})",
        samples.len(), val.len(), seed,
    );

    (samples, val)
}
