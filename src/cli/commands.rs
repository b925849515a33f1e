// ============================================================
// Layer 1 — CLI Commands and Arguments
// ============================================================
// Defines the two subcommands, `train` and `evaluate`, and all
// their configurable flags.
//
// Enum-valued flags (--backbone, --head, --loss-distance, ...)
// parse through the domain types' FromStr, so a typo lists the
// accepted names.
//
// Reference: Rust Book §12 (Building a CLI Program)

use clap::{Args, Subcommand};
use std::path::PathBuf;

use crate::application::train_use_case::TrainConfig;
use crate::domain::kinds::{
    BackboneKind, DatasetKind, DistanceKind, HeadFamily, MetricLossKind, ShortcutKind,
};

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Train a backbone + head on CIFAR-10 or MNIST
    Train(TrainArgs),

    /// Evaluate the latest checkpoint on the test split
    Evaluate(EvaluateArgs),
}

#[derive(Args, Debug)]
pub struct TrainArgs {
    /// Benchmark to train on: cifar10 or mnist
    #[arg(long, default_value_t = DatasetKind::Cifar10)]
    pub dataset: DatasetKind,

    /// Directory holding the dataset's binary files
    /// [default: data/cifar-10-batches-bin or data/mnist, by --dataset]
    #[arg(long)]
    pub data_dir: Option<String>,

    /// Directory to save checkpoints, config and metrics
    #[arg(long, default_value = "checkpoints")]
    pub checkpoint_dir: String,

    /// Feature extractor: resnet20, conv, resnet, vgg, mobilenet
    #[arg(long, default_value_t = BackboneKind::Resnet20)]
    pub backbone: BackboneKind,

    /// Head family: softmax, dce, ml, pl
    #[arg(long, default_value_t = HeadFamily::Softmax)]
    pub head: HeadFamily,

    /// Residual shortcut of the CIFAR ResNet: A (zero-pad) or B (projection)
    #[arg(long, default_value_t = ShortcutKind::A)]
    pub shortcut: ShortcutKind,

    /// Embedding width; omit to feed backbone features to the head
    #[arg(long)]
    pub embed_dim: Option<usize>,

    /// Hidden width of the embedding MLP; 0 = single linear projection
    #[arg(long, default_value_t = 512)]
    pub embed_hidden: usize,

    /// Dropout inside the embedding MLP; 0 disables it
    #[arg(long, default_value_t = 0.5)]
    pub embed_dropout: f64,

    /// Feature width compared with the DCE centers
    #[arg(long, default_value_t = 2)]
    pub dce_dim: usize,

    /// Weight of the DCE center regularisation
    #[arg(long, default_value_t = 0.001)]
    pub dce_reg: f64,

    /// Prototypes per class for the pl head
    #[arg(long, default_value_t = 2)]
    pub prototypes_per_class: usize,

    /// Distance the prototype loss is computed on
    #[arg(long, default_value_t = DistanceKind::L2)]
    pub loss_distance: DistanceKind,

    /// Distance of the own-class norm terms
    #[arg(long, default_value_t = DistanceKind::L2)]
    pub norm_distance: DistanceKind,

    /// Distance used for prediction scores
    #[arg(long, default_value_t = DistanceKind::L2)]
    pub pred_distance: DistanceKind,

    /// Weight a of the prototype norm term
    #[arg(long, default_value_t = 0.1)]
    pub norm_weight: f64,

    /// Weight b of the adversarial prototype norm term
    #[arg(long, default_value_t = 0.2)]
    pub adv_weight: f64,

    /// FGSM step size for adversarial examples; 0 disables them
    #[arg(long, default_value_t = 0.0)]
    pub adv_epsilon: f64,

    /// Embedding loss of the ml head: contrastive or triplet
    #[arg(long, default_value_t = MetricLossKind::Contrastive)]
    pub metric_loss: MetricLossKind,

    /// Margin a of the metric loss
    #[arg(long, default_value_t = 0.3)]
    pub metric_margin: f64,

    /// Embedding-norm weight b of the metric loss
    #[arg(long, default_value_t = 1e-4)]
    pub metric_weight: f64,

    /// Number of full passes through the training data
    #[arg(long, default_value_t = 10)]
    pub epochs: usize,

    /// Number of images per batch
    #[arg(long, default_value_t = 128)]
    pub batch_size: usize,

    /// Adam learning rate
    #[arg(long, default_value_t = 1e-3)]
    pub lr: f64,

    /// Fraction of the training split held out for validation
    #[arg(long, default_value_t = 0.1)]
    pub val_fraction: f64,

    /// Seed of the train/validation split and loader shuffling
    #[arg(long, default_value_t = 42)]
    pub seed: u64,

    /// Disable random flip + crop on 3-channel data
    #[arg(long)]
    pub no_augment: bool,

    /// Data loader worker threads
    #[arg(long, default_value_t = 1)]
    pub num_workers: usize,
}

/// Convert CLI TrainArgs into the application-layer TrainConfig.
/// The application layer never sees clap types.
impl From<TrainArgs> for TrainConfig {
    fn from(a: TrainArgs) -> Self {
        TrainConfig {
            dataset:        a.dataset,
            data_dir:       a.data_dir.unwrap_or_else(|| a.dataset.default_data_dir().to_string()),
            checkpoint_dir: a.checkpoint_dir,

            backbone:             a.backbone,
            shortcut:             a.shortcut,
            head:                 a.head,
            embed_dim:            a.embed_dim,
            embed_hidden:         Some(a.embed_hidden).filter(|&h| h > 0),
            embed_dropout:        Some(a.embed_dropout).filter(|&p| p > 0.0),
            dce_dim:              a.dce_dim,
            dce_reg:              a.dce_reg,
            prototypes_per_class: a.prototypes_per_class,
            loss_distance:        a.loss_distance,
            norm_distance:        a.norm_distance,
            pred_distance:        a.pred_distance,
            norm_weight:          a.norm_weight,
            adv_weight:           a.adv_weight,
            metric_loss:          a.metric_loss,
            metric_margin:        a.metric_margin,
            metric_weight:        a.metric_weight,

            epochs:       a.epochs,
            batch_size:   a.batch_size,
            lr:           a.lr,
            adv_epsilon:  a.adv_epsilon,
            val_fraction: a.val_fraction,
            seed:         a.seed,
            augment:      !a.no_augment,
            num_workers:  a.num_workers,
        }
    }
}

#[derive(Args, Debug)]
pub struct EvaluateArgs {
    /// Directory where checkpoints were saved during training
    #[arg(long, default_value = "checkpoints")]
    pub checkpoint_dir: String,

    /// Dataset directory; defaults to the one used for training
    #[arg(long)]
    pub data_dir: Option<String>,

    /// Write `label,e0,e1,...` rows for every test image
    #[arg(long)]
    pub embeddings_out: Option<PathBuf>,
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::Cli;
    use clap::Parser;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("metric-heads").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn test_train_defaults_match_config_defaults() {
        let Commands::Train(args) = parse(&["train"]).command else { panic!("expected train") };
        let cfg: TrainConfig = args.into();
        let def = TrainConfig::default();
        assert_eq!(cfg.backbone, def.backbone);
        assert_eq!(cfg.head, def.head);
        assert_eq!(cfg.embed_hidden, def.embed_hidden);
        assert_eq!(cfg.embed_dropout, def.embed_dropout);
        assert_eq!(cfg.batch_size, def.batch_size);
        assert_eq!(cfg.data_dir, def.data_dir);
        assert_eq!(cfg.augment, def.augment);
    }

    #[test]
    fn test_conv6_style_flags() {
        let Commands::Train(args) = parse(&[
            "train", "--dataset", "mnist", "--backbone", "conv", "--head", "pl",
            "--embed-dim", "64", "--embed-dropout", "0", "--loss-distance", "Linf",
            "--no-augment",
        ]).command else { panic!("expected train") };

        let cfg: TrainConfig = args.into();
        assert_eq!(cfg.dataset, DatasetKind::Mnist);
        assert_eq!(cfg.backbone, BackboneKind::Conv);
        assert_eq!(cfg.embed_dim, Some(64));
        assert_eq!(cfg.embed_hidden, Some(512));
        assert_eq!(cfg.embed_dropout, None);
        assert_eq!(cfg.loss_distance, DistanceKind::Linf);
        assert!(!cfg.augment);
        assert_eq!(cfg.data_dir, "data/mnist");
    }

    #[test]
    fn test_explicit_data_dir_wins() {
        let Commands::Train(args) = parse(&[
            "train", "--dataset", "mnist", "--data-dir", "/datasets/mnist-raw",
        ]).command else { panic!("expected train") };
        let cfg: TrainConfig = args.into();
        assert_eq!(cfg.data_dir, "/datasets/mnist-raw");
    }

    #[test]
    fn test_unknown_distance_is_rejected() {
        let res = Cli::try_parse_from(["metric-heads", "train", "--loss-distance", "cosine"]);
        assert!(res.is_err());
    }

    #[test]
    fn test_evaluate_args() {
        let Commands::Evaluate(args) = parse(&[
            "evaluate", "--checkpoint-dir", "runs/pl", "--embeddings-out", "emb.csv",
        ]).command else { panic!("expected evaluate") };
        assert_eq!(args.checkpoint_dir, "runs/pl");
        assert_eq!(args.data_dir, None);
        assert_eq!(args.embeddings_out, Some(PathBuf::from("emb.csv")));
    }
}
