// ============================================================
// Layer 5 — Training Loop
// ============================================================
// Train + validation loop using Burn's DataLoader and Adam.
//
// Per batch:
//   1. (optional) FGSM: x_adv = x + ε · sign(∇_x loss)
//   2. (loss, scores) = model.forward_loss(x, y, x_adv)
//   3. backward, Adam step
//
// Only the prototype head reads x_adv (its adversarial norm
// term); the other families ignore it, so FGSM is skipped for
// them even when ε > 0.
//
// Key Burn insight:
//   - Training uses an AutodiffBackend for gradients
//   - model.valid() returns the model on the inner backend
//   - Validation batcher must also use the inner backend
//   - argmax(1) returns [batch,1] so we flatten before .equal()
//
// Reference: Burn Book §5, Kingma & Ba (2015) Adam
//            Goodfellow et al. (2015) Explaining and Harnessing
//            Adversarial Examples

use anyhow::Result;
use burn::{
    data::dataloader::DataLoaderBuilder,
    module::AutodiffModule,
    optim::{AdamConfig, GradientsParams, Optimizer},
    prelude::*,
    tensor::backend::AutodiffBackend,
};

use crate::application::train_use_case::TrainConfig;
use crate::data::{batcher::ImageBatcher, dataset::ImageDataset, preprocessor::Preprocessor};
use crate::domain::kinds::HeadFamily;
use crate::infra::{
    checkpoint::CheckpointManager,
    metrics::{EpochMetrics, MetricsLogger},
};
use crate::ml::model::HeadModel;

type MyBackend = burn::backend::Autodiff<burn::backend::Wgpu>;

pub fn run_training(
    cfg:           &TrainConfig,
    train_dataset: ImageDataset,
    val_dataset:   ImageDataset,
    ckpt_manager:  CheckpointManager,
) -> Result<()> {
    let device = burn::backend::wgpu::WgpuDevice::default();
    tracing::info!("Using WGPU device: {:?}", device);
    train_loop::<MyBackend>(cfg, train_dataset, val_dataset, &ckpt_manager, device)?;
    Ok(())
}

/// Images shifted one signed-gradient step up the loss.
pub fn fgsm<B: AutodiffBackend>(
    model:   &HeadModel<B>,
    images:  Tensor<B, 4>,
    labels:  Tensor<B, 1, Int>,
    epsilon: f64,
) -> Tensor<B, 4> {
    let x = images.detach().require_grad();
    let (loss, _) = model.forward_loss(x.clone(), labels, None);
    let grads = loss.backward();

    match x.grad(&grads) {
        Some(g) => Tensor::from_inner(x.inner() + g.sign().mul_scalar(epsilon)),
        None    => x.detach(),
    }
}

fn ratio(num: f64, den: usize) -> f64 {
    if den > 0 { num / den as f64 } else { f64::NAN }
}

pub fn train_loop<B: AutodiffBackend>(
    cfg:           &TrainConfig,
    train_dataset: ImageDataset,
    val_dataset:   ImageDataset,
    ckpt_manager:  &CheckpointManager,
    device:        B::Device,
) -> Result<Vec<EpochMetrics>> {

    // ── Build model ───────────────────────────────────────────────────────────
    let model_cfg = cfg.model_config();
    let mut model: HeadModel<B> = model_cfg.init(&device);
    tracing::info!(
        "Model ready: backbone={} head={} embedding_dim={}",
        cfg.backbone, cfg.head, model_cfg.embedding_dim()
    );

    let adversarial = cfg.adv_epsilon > 0.0 && cfg.head == HeadFamily::Pl;
    if cfg.adv_epsilon > 0.0 && !adversarial {
        tracing::warn!("--adv-epsilon only affects the 'pl' head; ignored for '{}'", cfg.head);
    }

    // ── Adam optimiser ────────────────────────────────────────────────────────
    let mut optim = AdamConfig::new().with_epsilon(1e-8).init();

    // ── Data loaders ──────────────────────────────────────────────────────────
    let preprocessor = Preprocessor::for_dataset(cfg.dataset);

    let train_batcher = ImageBatcher::<B>::new(
        device.clone(),
        preprocessor.clone().with_augmentation(cfg.augment),
    );
    let train_loader = DataLoaderBuilder::new(train_batcher)
        .batch_size(cfg.batch_size)
        .shuffle(cfg.seed)
        .num_workers(cfg.num_workers.max(1))
        .build(train_dataset);

    // Inner backend, no autodiff overhead and no augmentation
    let val_batcher = ImageBatcher::<B::InnerBackend>::new(device.clone(), preprocessor);
    let val_loader  = DataLoaderBuilder::new(val_batcher)
        .batch_size(cfg.batch_size)
        .num_workers(cfg.num_workers.max(1))
        .build(val_dataset);

    let metrics_logger = MetricsLogger::new(ckpt_manager.dir())?;
    let mut history    = Vec::with_capacity(cfg.epochs);
    let mut best_val   = f64::INFINITY;

    // ── Epoch loop ────────────────────────────────────────────────────────────
    for epoch in 1..=cfg.epochs {

        // ── Training phase ────────────────────────────────────────────────────
        let mut train_loss_sum = 0.0f64;
        let mut train_batches  = 0usize;

        for batch in train_loader.iter() {
            let adv_images = adversarial.then(|| {
                fgsm(&model, batch.images.clone(), batch.labels.clone(), cfg.adv_epsilon)
            });

            let (loss, _) = model.forward_loss(batch.images, batch.labels, adv_images);

            train_loss_sum += loss.clone().into_scalar().elem::<f64>();
            train_batches  += 1;

            let grads = loss.backward();
            let grads = GradientsParams::from_grads(grads, &model);
            model = optim.step(cfg.lr, model, grads);
        }

        // ── Validation phase ──────────────────────────────────────────────────
        // dropout disabled, batch norm uses its running statistics
        let model_valid = model.valid();

        let mut val_loss_sum  = 0.0f64;
        let mut val_batches   = 0usize;
        let mut correct       = 0usize;
        let mut total_samples = 0usize;

        for batch in val_loader.iter() {
            let (loss, scores) = model_valid.forward_loss(batch.images, batch.labels.clone(), None);
            val_loss_sum += loss.into_scalar().elem::<f64>();
            val_batches  += 1;

            let pred = scores.argmax(1).flatten::<1>(0, 1);
            total_samples += batch.labels.dims()[0];
            correct += pred.equal(batch.labels).int().sum().into_scalar().elem::<i64>() as usize;
        }

        let metrics = EpochMetrics::new(
            epoch,
            ratio(train_loss_sum, train_batches),
            ratio(val_loss_sum, val_batches),
            if total_samples > 0 { correct as f64 / total_samples as f64 } else { 0.0 },
        );

        println!(
            "Epoch {:>3}/{} | train_loss={:.4} | val_loss={:.4} | val_acc={:.1}%",
            epoch, cfg.epochs, metrics.train_loss, metrics.val_loss, metrics.val_acc * 100.0,
        );

        if metrics.is_improvement(best_val) {
            best_val = metrics.val_loss;
            tracing::info!("New best validation loss {:.4} at epoch {}", best_val, epoch);
        }
        metrics_logger.log(&metrics)?;
        history.push(metrics);

        ckpt_manager.save_model(&model, epoch)?;
        tracing::info!("Checkpoint saved for epoch {}", epoch);
    }

    tracing::info!("Training complete!");
    Ok(history)
}
