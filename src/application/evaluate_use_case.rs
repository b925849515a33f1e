// ============================================================
// Layer 2 — EvaluateUseCase
// ============================================================
//   Step 1: Rebuild the trained model     (Layer 6 + Layer 5)
//   Step 2: Load the test split           (Layer 4 - data)
//   Step 3: Score it, export embeddings   (Layer 5 - ml)
//
// The dataset kind comes from the saved TrainConfig; only the
// directory can be overridden, e.g. when the checkpoints moved
// to another machine.

use anyhow::{ensure, Result};
use std::path::PathBuf;

use crate::data::{dataset::ImageDataset, loader::source_for};
use crate::domain::traits::Split;
use crate::infra::checkpoint::CheckpointManager;
use crate::ml::inferencer::{EvaluationReport, Inferencer};

type InferBackend = burn::backend::Wgpu;

pub struct EvaluateUseCase {
    checkpoint_dir: String,
    data_dir:       Option<String>,
    embeddings_out: Option<PathBuf>,
}

impl EvaluateUseCase {
    pub fn new(
        checkpoint_dir: String,
        data_dir:       Option<String>,
        embeddings_out: Option<PathBuf>,
    ) -> Self {
        Self { checkpoint_dir, data_dir, embeddings_out }
    }

    pub fn execute(&self) -> Result<EvaluationReport> {
        // ── Step 1: Rebuild model from config + latest weights ────────────────
        let ckpt   = CheckpointManager::new(&self.checkpoint_dir);
        let device = burn::backend::wgpu::WgpuDevice::default();
        let inferencer = Inferencer::<InferBackend>::from_checkpoint(&ckpt, device)?;
        let cfg = inferencer.config();

        // ── Step 2: Load the test split ───────────────────────────────────────
        let data_dir = self.data_dir.as_deref().unwrap_or(&cfg.data_dir);
        tracing::info!("Loading {} test data from '{}'", cfg.dataset, data_dir);
        let samples = source_for(cfg.dataset, data_dir).load_split(Split::Test)?;
        ensure!(!samples.is_empty(), "no test images found in '{}'", data_dir);

        // ── Step 3: Evaluate ──────────────────────────────────────────────────
        let report = inferencer.evaluate(ImageDataset::new(samples), self.embeddings_out.as_deref())?;
        tracing::info!(
            "Evaluated {} images: loss={:.4} acc={:.2}%",
            report.samples, report.loss, report.accuracy * 100.0
        );
        Ok(report)
    }
}
