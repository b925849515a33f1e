// ============================================================
// Layer 2 — TrainUseCase
// ============================================================
// Orchestrates the full training pipeline in order:
//
//   Step 1: Check backbone vs dataset   (Layer 3 - domain)
//   Step 2: Load the training split     (Layer 4 - data)
//   Step 3: Split train/validation      (Layer 4 - data)
//   Step 4: Build datasets              (Layer 4 - data)
//   Step 5: Save config                 (Layer 6 - infra)
//   Step 6: Run training loop           (Layer 5 - ml)
//
// Reference: Burn Book §5 (Training)

use anyhow::{bail, ensure, Result};
use serde::{Deserialize, Serialize};

use crate::data::{
    dataset::ImageDataset,
    loader::source_for,
    splitter::split_train_val,
};
use crate::domain::{
    kinds::{
        BackboneKind, DatasetKind, DistanceKind, HeadFamily, MetricLossKind, ShortcutKind,
    },
    traits::Split,
};
use crate::infra::checkpoint::CheckpointManager;
use crate::ml::{
    backbone::BackboneConfig,
    model::HeadModelConfig,
    trainer::run_training,
};

// ─── Training Configuration ──────────────────────────────────────────────────
// Everything a run depends on. Saved next to the checkpoints so
// `evaluate` can rebuild the same model and preprocessing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainConfig {
    pub dataset:        DatasetKind,
    pub data_dir:       String,
    pub checkpoint_dir: String,

    // ── model ──
    pub backbone:             BackboneKind,
    pub shortcut:             ShortcutKind,
    pub head:                 HeadFamily,
    pub embed_dim:            Option<usize>,
    pub embed_hidden:         Option<usize>,
    pub embed_dropout:        Option<f64>,
    pub dce_dim:              usize,
    pub dce_reg:              f64,
    pub prototypes_per_class: usize,
    pub loss_distance:        DistanceKind,
    pub norm_distance:        DistanceKind,
    pub pred_distance:        DistanceKind,
    pub norm_weight:          f64,
    pub adv_weight:           f64,
    pub metric_loss:          MetricLossKind,
    pub metric_margin:        f64,
    pub metric_weight:        f64,

    // ── optimisation ──
    pub epochs:       usize,
    pub batch_size:   usize,
    pub lr:           f64,
    /// FGSM step; 0 disables adversarial examples
    pub adv_epsilon:  f64,
    pub val_fraction: f64,
    pub seed:         u64,
    pub augment:      bool,
    pub num_workers:  usize,
}

impl Default for TrainConfig {
    fn default() -> Self {
        Self {
            dataset:        DatasetKind::Cifar10,
            data_dir:       DatasetKind::Cifar10.default_data_dir().to_string(),
            checkpoint_dir: "checkpoints".to_string(),

            backbone:             BackboneKind::Resnet20,
            shortcut:             ShortcutKind::A,
            head:                 HeadFamily::Softmax,
            embed_dim:            None,
            embed_hidden:         Some(512),
            embed_dropout:        Some(0.5),
            dce_dim:              2,
            dce_reg:              0.001,
            prototypes_per_class: 2,
            loss_distance:        DistanceKind::L2,
            norm_distance:        DistanceKind::L2,
            pred_distance:        DistanceKind::L2,
            norm_weight:          0.1,
            adv_weight:           0.2,
            metric_loss:          MetricLossKind::Contrastive,
            metric_margin:        0.3,
            metric_weight:        1e-4,

            epochs:       10,
            batch_size:   128,
            lr:           1e-3,
            adv_epsilon:  0.0,
            val_fraction: 0.1,
            seed:         42,
            augment:      true,
            num_workers:  1,
        }
    }
}

impl TrainConfig {
    pub fn model_config(&self) -> HeadModelConfig {
        let backbone = BackboneConfig::new(self.backbone).with_shortcut(self.shortcut);
        HeadModelConfig::new(backbone, self.head)
            .with_num_classes(self.dataset.num_classes())
            .with_embed_dim(self.embed_dim)
            .with_embed_hidden(self.embed_hidden)
            .with_embed_dropout(self.embed_dropout)
            .with_dce_dim(self.dce_dim)
            .with_dce_reg(self.dce_reg)
            .with_prototypes_per_class(self.prototypes_per_class)
            .with_loss_distance(self.loss_distance)
            .with_norm_distance(self.norm_distance)
            .with_pred_distance(self.pred_distance)
            .with_norm_weight(self.norm_weight)
            .with_adv_weight(self.adv_weight)
            .with_metric_loss(self.metric_loss)
            .with_metric_margin(self.metric_margin)
            .with_metric_weight(self.metric_weight)
    }

    /// Rejects combinations that would only fail deep inside a forward pass.
    pub fn validate(&self) -> Result<()> {
        let wanted = self.backbone.input_channels();
        let given  = self.dataset.channels();
        if wanted != given {
            bail!(
                "backbone '{}' expects {}-channel images but dataset '{}' has {}",
                self.backbone, wanted, self.dataset, given
            );
        }
        if self.backbone == BackboneKind::Conv && self.dataset.image_size() != (28, 28) {
            bail!("backbone 'conv' needs 28x28 images");
        }
        ensure!(self.batch_size > 0, "batch size must be positive");
        ensure!(self.prototypes_per_class > 0, "need at least one prototype per class");
        ensure!(
            (0.0..1.0).contains(&self.val_fraction),
            "validation fraction must be in [0, 1), got {}", self.val_fraction
        );
        ensure!(self.adv_epsilon >= 0.0, "adversarial epsilon must be non-negative");
        Ok(())
    }
}

// ─── TrainUseCase ─────────────────────────────────────────────────────────────
pub struct TrainUseCase {
    config: TrainConfig,
}

impl TrainUseCase {
    pub fn new(config: TrainConfig) -> Self {
        Self { config }
    }

    pub fn execute(&self) -> Result<()> {
        let cfg = &self.config;

        // ── Step 1: Check the backbone can read this dataset ──────────────────
        cfg.validate()?;

        // ── Step 2: Load the training split ───────────────────────────────────
        tracing::info!("Loading {} training data from '{}'", cfg.dataset, cfg.data_dir);
        let samples = source_for(cfg.dataset, &cfg.data_dir).load_split(Split::Train)?;
        ensure!(!samples.is_empty(), "no training images found in '{}'", cfg.data_dir);
        tracing::info!("Loaded {} images", samples.len());

        // ── Step 3: Train / validation split ──────────────────────────────────
        let (train_samples, val_samples) =
            split_train_val(samples, 1.0 - cfg.val_fraction, cfg.seed);
        tracing::info!(
            "Split: {} train, {} validation",
            train_samples.len(),
            val_samples.len()
        );

        // ── Step 4: Build Burn datasets ───────────────────────────────────────
        let train_dataset = ImageDataset::new(train_samples);
        let val_dataset   = ImageDataset::new(val_samples);
        tracing::debug!(
            "Train class counts: {:?}",
            train_dataset.class_counts(cfg.dataset.num_classes())
        );

        // ── Step 5: Save config for evaluation ────────────────────────────────
        let ckpt_manager = CheckpointManager::new(&cfg.checkpoint_dir);
        ckpt_manager.save_config(cfg)?;

        // ── Step 6: Run training loop (Layer 5) ───────────────────────────────
        run_training(cfg, train_dataset, val_dataset, ckpt_manager)?;

        Ok(())
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(TrainConfig::default().validate().is_ok());
    }

    #[test]
    fn test_channel_mismatch_rejected() {
        let cfg = TrainConfig { dataset: DatasetKind::Mnist, ..TrainConfig::default() };
        let err = cfg.validate().unwrap_err().to_string();
        assert!(err.contains("3-channel"), "{err}");

        let cfg = TrainConfig { backbone: BackboneKind::Conv, ..TrainConfig::default() };
        assert!(cfg.validate().is_err());

        let cfg = TrainConfig {
            backbone: BackboneKind::Conv,
            dataset:  DatasetKind::Mnist,
            ..TrainConfig::default()
        };
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn test_bad_fractions_rejected() {
        let cfg = TrainConfig { val_fraction: 1.0, ..TrainConfig::default() };
        assert!(cfg.validate().is_err());
        let cfg = TrainConfig { adv_epsilon: -0.1, ..TrainConfig::default() };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_model_config_carries_head_settings() {
        let cfg = TrainConfig {
            head:                 HeadFamily::Pl,
            embed_dim:            Some(32),
            prototypes_per_class: 4,
            loss_distance:        DistanceKind::Linf,
            ..TrainConfig::default()
        };
        let m = cfg.model_config();
        assert_eq!(m.head, HeadFamily::Pl);
        assert_eq!(m.embedding_dim(), 32);
        assert_eq!(m.prototypes_per_class, 4);
        assert_eq!(m.loss_distance, DistanceKind::Linf);
        assert_eq!(m.num_classes, 10);
    }

    #[test]
    fn test_missing_data_dir_fails() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = TrainConfig {
            data_dir:       dir.path().join("nothing").display().to_string(),
            checkpoint_dir: dir.path().join("ckpt").display().to_string(),
            ..TrainConfig::default()
        };
        assert!(TrainUseCase::new(cfg).execute().is_err());
    }
}
