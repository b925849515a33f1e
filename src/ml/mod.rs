// ============================================================
// Layer 5 — ML / Model Layer (Burn)
// ============================================================
// Networks, heads, losses and the loops that train and score them.
//
//   backbone/    — Feature extractors, images → [N, F]
//                  CIFAR ResNet-20, ResNet-18, VGG-11,
//                  MobileNetV3-small, the MNIST conv stack
//
//   embed.rs     — Optional MLP / projection, features → [N, D]
//
//   distance.rs  — Pairwise distances (L1, L2, Linf, dot product)
//   losses.rs    — Shared loss math: gathers, center regulariser,
//                  prototype loss and norm
//   dce.rs       — Learnable class centers
//   prototype.rs — Learnable class prototypes and the PL loss
//   metric.rs    — Contrastive / triplet embedding losses
//
//   model.rs     — The four model families behind one HeadModel
//
//   trainer.rs   — Adam training loop with optional FGSM,
//                  validation, checkpoint and metrics per epoch
//
//   inferencer.rs — Loads a checkpoint and evaluates it
//
// Reference: Burn Book §3 (Building Blocks)
//            Burn Book §5 (Training)

/// Feature extractors
pub mod backbone;

/// Embedding layer between backbone and head
pub mod embed;

/// Kaiming initialiser shared by every conv and linear layer
pub mod init;

/// Pairwise distance kinds
pub mod distance;

/// Loss math used by several heads
pub mod losses;

/// Distance-center (DCE) head
pub mod dce;

/// Prototype-learning (PL) head
pub mod prototype;

/// Metric-learning losses for the ML family
pub mod metric;

/// HeadModel: backbone + embedding + head
pub mod model;

/// Full training loop with validation and checkpointing
pub mod trainer;

/// Checkpoint loading and evaluation
pub mod inferencer;
