// ============================================================
// Layer 4 — Data Pipeline
// ============================================================
// Everything from benchmark files on disk to tensor batches.
//
//   CIFAR-10 .bin / MNIST IDX files
//       │
//       ▼
//   Cifar10Loader / MnistLoader → decode bytes into ImageSamples
//       │
//       ▼
//   split_train_val             → seeded shuffle, train / validation
//       │
//       ▼
//   ImageDataset                → implements Burn's Dataset trait
//       │
//       ▼
//   ImageBatcher + Preprocessor → normalise, augment, stack
//       │
//       ▼
//   DataLoader                  → feeds batches to the training loop
//
// Reference: Burn Book §4 (Datasets and Dataloaders)

/// CIFAR-10 and MNIST binary readers
pub mod loader;

/// Normalisation and training-time augmentation
pub mod preprocessor;

/// Implements Burn's Dataset trait for image samples
pub mod dataset;

/// Implements Burn's Batcher trait to create tensor batches
pub mod batcher;

/// Shuffles and splits data into train/validation sets
pub mod splitter;
