// ============================================================
// Layer 5 — Inferencer
// ============================================================
// Rebuilds a trained HeadModel from its checkpoint directory and
// scores it on a labelled split:
//
//   loss         mean family loss over the batches
//   accuracy     argmax(scores) == label
//   per class    correct / total for each of the K classes
//
// Optionally streams the embeddings to CSV, one row per image:
//   label,e0,e1,...
// For the DCE head these are its 2-D features, the layout the
// center-loss scatter plots use.

use anyhow::{Context, Result};
use std::{
    fs::File,
    io::{BufWriter, Write},
    path::Path,
};
use burn::{data::dataloader::DataLoaderBuilder, prelude::*};

use crate::application::train_use_case::TrainConfig;
use crate::data::{batcher::ImageBatcher, dataset::ImageDataset, preprocessor::Preprocessor};
use crate::infra::checkpoint::CheckpointManager;
use crate::ml::model::HeadModel;

#[derive(Debug, Clone, PartialEq)]
pub struct ClassAccuracy {
    pub class:   usize,
    pub correct: usize,
    pub total:   usize,
}

impl ClassAccuracy {
    pub fn accuracy(&self) -> f64 {
        if self.total > 0 { self.correct as f64 / self.total as f64 } else { 0.0 }
    }
}

#[derive(Debug, Clone)]
pub struct EvaluationReport {
    pub loss:      f64,
    pub accuracy:  f64,
    pub samples:   usize,
    pub per_class: Vec<ClassAccuracy>,
}

pub struct Inferencer<B: Backend> {
    model:  HeadModel<B>,
    config: TrainConfig,
    device: B::Device,
}

impl<B: Backend> Inferencer<B> {
    pub fn from_checkpoint(ckpt_manager: &CheckpointManager, device: B::Device) -> Result<Self> {
        let config = ckpt_manager.load_config()?;
        let model  = config.model_config().init::<B>(&device);
        let model  = ckpt_manager.load_model(model, &device)?;
        tracing::info!("Model loaded from checkpoint ({} head)", config.head);
        Ok(Self::new(model, config, device))
    }

    pub fn new(model: HeadModel<B>, config: TrainConfig, device: B::Device) -> Self {
        Self { model, config, device }
    }

    pub fn config(&self) -> &TrainConfig {
        &self.config
    }

    pub fn evaluate(&self, dataset: ImageDataset, embeddings_out: Option<&Path>) -> Result<EvaluationReport> {
        let num_classes = self.config.dataset.num_classes();

        // Single-threaded loader keeps the dataset order for the CSV
        let batcher = ImageBatcher::<B>::new(
            self.device.clone(),
            Preprocessor::for_dataset(self.config.dataset),
        );
        let loader = DataLoaderBuilder::new(batcher)
            .batch_size(self.config.batch_size)
            .build(dataset);

        let mut writer = match embeddings_out {
            Some(path) => {
                let file = File::create(path)
                    .with_context(|| format!("Cannot create embeddings file '{}'", path.display()))?;
                tracing::info!("Writing embeddings to '{}'", path.display());
                Some(BufWriter::new(file))
            }
            None => None,
        };

        let mut per_class: Vec<ClassAccuracy> = (0..num_classes)
            .map(|class| ClassAccuracy { class, correct: 0, total: 0 })
            .collect();
        let mut loss_sum = 0.0f64;
        let mut batches  = 0usize;

        for batch in loader.iter() {
            let (loss, output) = self.model.forward_loss_output(batch.images, batch.labels.clone(), None);
            loss_sum += loss.into_scalar().elem::<f64>();
            batches  += 1;

            let labels = to_indices(batch.labels.into_data());
            let preds  = to_indices(output.scores.argmax(1).flatten::<1>(0, 1).into_data());

            for (&label, &pred) in labels.iter().zip(&preds) {
                if let Some(entry) = per_class.get_mut(label) {
                    entry.total += 1;
                    entry.correct += usize::from(label == pred);
                }
            }

            if let Some(w) = writer.as_mut() {
                write_embeddings(w, &labels, output.embeddings)?;
            }
        }

        if let Some(mut w) = writer {
            w.flush().context("Cannot flush embeddings file")?;
        }

        let samples: usize = per_class.iter().map(|c| c.total).sum();
        let correct: usize = per_class.iter().map(|c| c.correct).sum();
        Ok(EvaluationReport {
            loss:     if batches > 0 { loss_sum / batches as f64 } else { f64::NAN },
            accuracy: if samples > 0 { correct as f64 / samples as f64 } else { 0.0 },
            samples,
            per_class,
        })
    }
}

fn to_indices(data: TensorData) -> Vec<usize> {
    data.convert::<i64>()
        .to_vec::<i64>()
        .unwrap_or_default()
        .into_iter()
        .map(|v| v as usize)
        .collect()
}

fn write_embeddings<B: Backend, W: Write>(
    w:          &mut W,
    labels:     &[usize],
    embeddings: Tensor<B, 2>,
) -> Result<()> {
    let [_, dim] = embeddings.dims();
    let values = embeddings
        .into_data()
        .convert::<f32>()
        .to_vec::<f32>()
        .map_err(|e| anyhow::anyhow!("Cannot read embeddings: {e:?}"))?;

    for (label, row) in labels.iter().zip(values.chunks(dim)) {
        write!(w, "{label}")?;
        for v in row {
            write!(w, ",{v:.6}")?;
        }
        writeln!(w)?;
    }
    Ok(())
}
