// ============================================================
// Layer 6 — Infrastructure Layer
// ============================================================
// Cross-cutting concerns that don't belong in a business layer:
//
//   checkpoint.rs — Saving and loading model weights
//                   Uses Burn's CompactRecorder to serialise
//                   HeadModel parameters to disk. Also saves /
//                   loads TrainConfig as JSON so evaluation can
//                   rebuild the same model.
//
//   metrics.rs    — Training metrics logging
//                   One CSV row per epoch (losses, accuracy)
//                   for learning curves.
//
// Reference: Rust Book §7 (Modules)
//            Rust Book §9 (Error Handling with anyhow)
//            Burn Book §5 (Checkpointing)

/// Model checkpoint saving and loading
pub mod checkpoint;

/// Training metrics CSV logger
pub mod metrics;
