// ============================================================
// Layer 5 — Model Families
// ============================================================
// Every model is   backbone → [embedding layer] → head
// and differs only in the head and its loss:
//
//   softmax  Linear(D, K)                      CE(logits, y)
//   dce      Linear(D, 2) → PReLU → DceHead    CE(-dist², y) + reg · center_regularization
//   ml       Linear(D, K) + MetricLoss         CE(logits, y) + metric(embeddings, y, a, b)
//   pl       PrototypeHead(C, D, K)            prototype loss + norm terms
//
// HeadModel wraps the four families in one enum module so the
// trainer, the evaluator and the checkpoint code deal with a
// single concrete type whatever the experiment.
//
// Reference: Burn Book §3 (Building Blocks), §5 (Training)

use burn::{
    module::Ignored,
    nn::{loss::CrossEntropyLossConfig, Linear, LinearConfig, PRelu, PReluConfig},
    prelude::*,
};

use crate::domain::kinds::{DistanceKind, HeadFamily, MetricLossKind};
use crate::ml::{
    backbone::{Backbone, BackboneConfig},
    dce::{DceHead, DceHeadConfig},
    embed::{EmbedConfig, EmbedLayer},
    init::kaiming_normal,
    losses::center_regularization,
    metric::MetricLoss,
    prototype::{PrototypeHead, PrototypeHeadConfig},
};

fn cross_entropy<B: Backend>(logits: Tensor<B, 2>, labels: Tensor<B, 1, Int>) -> Tensor<B, 1> {
    CrossEntropyLossConfig::new()
        .init(&logits.device())
        .forward(logits, labels)
}

fn linear<B: Backend>(d_in: usize, d_out: usize, device: &B::Device) -> Linear<B> {
    LinearConfig::new(d_in, d_out)
        .with_initializer(kaiming_normal())
        .init(device)
}

// ─── Configuration ────────────────────────────────────────────────────────────
#[derive(Config, Debug)]
pub struct HeadModelConfig {
    pub backbone: BackboneConfig,
    pub head:     HeadFamily,
    #[config(default = 10)]
    pub num_classes: usize,

    /// Embedding width D; None feeds backbone features to the head
    #[config(default = "None")]
    pub embed_dim:     Option<usize>,
    #[config(default = "Some(512)")]
    pub embed_hidden:  Option<usize>,
    #[config(default = "Some(0.5)")]
    pub embed_dropout: Option<f64>,

    #[config(default = 2)]
    pub dce_dim: usize,
    #[config(default = 0.001)]
    pub dce_reg: f64,

    #[config(default = 2)]
    pub prototypes_per_class: usize,
    #[config(default = "DistanceKind::L2")]
    pub loss_distance: DistanceKind,
    #[config(default = "DistanceKind::L2")]
    pub norm_distance: DistanceKind,
    #[config(default = "DistanceKind::L2")]
    pub pred_distance: DistanceKind,
    #[config(default = 0.1)]
    pub norm_weight: f64,
    #[config(default = 0.2)]
    pub adv_weight:  f64,

    #[config(default = "MetricLossKind::Contrastive")]
    pub metric_loss:   MetricLossKind,
    #[config(default = 0.3)]
    pub metric_margin: f64,
    #[config(default = 1e-4)]
    pub metric_weight: f64,
}

impl HeadModelConfig {
    /// Width of what the trunk hands to the head.
    pub fn embedding_dim(&self) -> usize {
        self.embed_dim.unwrap_or_else(|| self.backbone.feature_dim())
    }

    fn init_trunk<B: Backend>(&self, device: &B::Device) -> Trunk<B> {
        let embed = self.embed_dim.map(|dim| {
            EmbedConfig::new(self.backbone.feature_dim())
                .with_dim(dim)
                .with_hidden(self.embed_hidden)
                .with_dropout(self.embed_dropout)
                .init(device)
        });
        Trunk { backbone: self.backbone.init(device), embed }
    }

    pub fn init<B: Backend>(&self, device: &B::Device) -> HeadModel<B> {
        let trunk = self.init_trunk(device);
        let d = self.embedding_dim();
        let k = self.num_classes;

        match self.head {
            HeadFamily::Softmax => HeadModel::Softmax(SoftmaxModel {
                trunk,
                classifier: linear(d, k, device),
            }),
            HeadFamily::Dce => HeadModel::Dce(DceModel {
                trunk,
                projection: linear(d, self.dce_dim, device),
                activation: PReluConfig::new().init(device),
                dce: DceHeadConfig::new(k, self.dce_dim).init(device),
                reg: self.dce_reg,
            }),
            HeadFamily::Ml => HeadModel::Ml(MetricModel {
                trunk,
                classifier: linear(d, k, device),
                metric: Ignored(MetricLoss {
                    kind:   self.metric_loss,
                    margin: self.metric_margin,
                    weight: self.metric_weight,
                }),
            }),
            HeadFamily::Pl => HeadModel::Pl(PrototypeModel {
                trunk,
                head: PrototypeHeadConfig::new(d, k)
                    .with_per_class(self.prototypes_per_class)
                    .with_loss_distance(self.loss_distance)
                    .with_norm_distance(self.norm_distance)
                    .with_pred_distance(self.pred_distance)
                    .with_norm_weight(self.norm_weight)
                    .with_adv_weight(self.adv_weight)
                    .init(device),
            }),
        }
    }
}

// ─── Trunk ────────────────────────────────────────────────────────────────────
#[derive(Module, Debug)]
pub struct Trunk<B: Backend> {
    pub backbone: Backbone<B>,
    pub embed:    Option<EmbedLayer<B>>,
}

impl<B: Backend> Trunk<B> {
    /// images → embeddings [N, D]
    pub fn forward(&self, images: Tensor<B, 4>) -> Tensor<B, 2> {
        let features = self.backbone.forward(images);
        match &self.embed {
            Some(embed) => embed.forward(features),
            None        => features,
        }
    }
}

// ─── Softmax ──────────────────────────────────────────────────────────────────
#[derive(Module, Debug)]
pub struct SoftmaxModel<B: Backend> {
    pub trunk:      Trunk<B>,
    pub classifier: Linear<B>,
}

pub struct ClassifierOutput<B: Backend> {
    pub logits:     Tensor<B, 2>,
    pub embeddings: Tensor<B, 2>,
}

impl<B: Backend> SoftmaxModel<B> {
    pub fn forward(&self, images: Tensor<B, 4>) -> ClassifierOutput<B> {
        let embeddings = self.trunk.forward(images);
        let logits = self.classifier.forward(embeddings.clone());
        ClassifierOutput { logits, embeddings }
    }

    pub fn loss(&self, logits: Tensor<B, 2>, labels: Tensor<B, 1, Int>) -> Tensor<B, 1> {
        cross_entropy(logits, labels)
    }
}

// ─── DCE ──────────────────────────────────────────────────────────────────────
#[derive(Module, Debug)]
pub struct DceModel<B: Backend> {
    pub trunk:      Trunk<B>,
    pub projection: Linear<B>,
    pub activation: PRelu<B>,
    pub dce:        DceHead<B>,
    /// Weight of the center regularisation term
    pub reg:        f64,
}

pub struct DceOutput<B: Backend> {
    /// Low-dimensional features compared with the centers, [N, dce_dim]
    pub features: Tensor<B, 2>,
    /// [dce_dim, K]
    pub centers:  Tensor<B, 2>,
    /// Negative squared distances, used as logits, [N, K]
    pub logits:   Tensor<B, 2>,
}

impl<B: Backend> DceModel<B> {
    pub fn forward(&self, images: Tensor<B, 4>) -> DceOutput<B> {
        let x = self.trunk.forward(images);
        let features = self.activation.forward(self.projection.forward(x));
        let (centers, logits) = self.dce.forward(features.clone());
        DceOutput { features, centers, logits }
    }

    pub fn loss(&self, output: &DceOutput<B>, labels: Tensor<B, 1, Int>) -> Tensor<B, 1> {
        let ce  = cross_entropy(output.logits.clone(), labels.clone());
        let reg = center_regularization(output.features.clone(), output.centers.clone(), labels);
        ce + reg.mul_scalar(self.reg)
    }
}

// ─── Metric learning ──────────────────────────────────────────────────────────
#[derive(Module, Debug)]
pub struct MetricModel<B: Backend> {
    pub trunk:      Trunk<B>,
    pub classifier: Linear<B>,
    pub metric:     Ignored<MetricLoss>,
}

impl<B: Backend> MetricModel<B> {
    pub fn forward(&self, images: Tensor<B, 4>) -> ClassifierOutput<B> {
        let embeddings = self.trunk.forward(images);
        let logits = self.classifier.forward(embeddings.clone());
        ClassifierOutput { logits, embeddings }
    }

    pub fn loss(&self, output: &ClassifierOutput<B>, labels: Tensor<B, 1, Int>) -> Tensor<B, 1> {
        cross_entropy(output.logits.clone(), labels.clone())
            + self.metric.forward(output.embeddings.clone(), labels)
    }
}

// ─── Prototype learning ───────────────────────────────────────────────────────
#[derive(Module, Debug)]
pub struct PrototypeModel<B: Backend> {
    pub trunk: Trunk<B>,
    pub head:  PrototypeHead<B>,
}

pub struct PrototypeOutput<B: Backend> {
    pub scores:     Tensor<B, 2>,
    pub distance:   Tensor<B, 2>,
    pub embeddings: Tensor<B, 2>,
}

impl<B: Backend> PrototypeModel<B> {
    pub fn forward(&self, images: Tensor<B, 4>) -> PrototypeOutput<B> {
        let embeddings = self.trunk.forward(images);
        let (scores, distance) = self.head.predict(embeddings.clone());
        PrototypeOutput { scores, distance, embeddings }
    }

    pub fn loss(
        &self,
        output:      &PrototypeOutput<B>,
        labels:      Tensor<B, 1, Int>,
        adversarial: Option<Tensor<B, 2>>,
    ) -> Tensor<B, 1> {
        self.head.loss(output.embeddings.clone(), output.distance.clone(), labels, adversarial)
    }
}

// ─── HeadModel ────────────────────────────────────────────────────────────────
#[derive(Module, Debug)]
pub enum HeadModel<B: Backend> {
    Softmax(SoftmaxModel<B>),
    Dce(DceModel<B>),
    Ml(MetricModel<B>),
    Pl(PrototypeModel<B>),
}

/// Class scores (larger = more likely) and the embedding each head exposes.
pub struct HeadOutput<B: Backend> {
    pub scores:     Tensor<B, 2>,
    pub embeddings: Tensor<B, 2>,
}

impl<B: Backend> HeadModel<B> {
    pub fn family(&self) -> HeadFamily {
        match self {
            HeadModel::Softmax(_) => HeadFamily::Softmax,
            HeadModel::Dce(_)     => HeadFamily::Dce,
            HeadModel::Ml(_)      => HeadFamily::Ml,
            HeadModel::Pl(_)      => HeadFamily::Pl,
        }
    }

    /// images → class scores [N, K]
    pub fn forward(&self, images: Tensor<B, 4>) -> Tensor<B, 2> {
        self.forward_output(images).scores
    }

    /// Scores plus embeddings; the DCE embedding is its low-dimensional feature.
    pub fn forward_output(&self, images: Tensor<B, 4>) -> HeadOutput<B> {
        match self {
            HeadModel::Softmax(m) => {
                let out = m.forward(images);
                HeadOutput { scores: out.logits, embeddings: out.embeddings }
            }
            HeadModel::Dce(m) => {
                let out = m.forward(images);
                HeadOutput { scores: out.logits, embeddings: out.features }
            }
            HeadModel::Ml(m) => {
                let out = m.forward(images);
                HeadOutput { scores: out.logits, embeddings: out.embeddings }
            }
            HeadModel::Pl(m) => {
                let out = m.forward(images);
                HeadOutput { scores: out.scores, embeddings: out.embeddings }
            }
        }
    }

    /// (loss [1], scores [N, K]).
    /// `adversarial` images only feed the prototype head's adversarial norm term.
    pub fn forward_loss(
        &self,
        images:      Tensor<B, 4>,
        labels:      Tensor<B, 1, Int>,
        adversarial: Option<Tensor<B, 4>>,
    ) -> (Tensor<B, 1>, Tensor<B, 2>) {
        let (loss, output) = self.forward_loss_output(images, labels, adversarial);
        (loss, output.scores)
    }

    /// Loss together with scores and embeddings from the same forward pass.
    pub fn forward_loss_output(
        &self,
        images:      Tensor<B, 4>,
        labels:      Tensor<B, 1, Int>,
        adversarial: Option<Tensor<B, 4>>,
    ) -> (Tensor<B, 1>, HeadOutput<B>) {
        match self {
            HeadModel::Softmax(m) => {
                let out = m.forward(images);
                let loss = m.loss(out.logits.clone(), labels);
                (loss, HeadOutput { scores: out.logits, embeddings: out.embeddings })
            }
            HeadModel::Dce(m) => {
                let out = m.forward(images);
                let loss = m.loss(&out, labels);
                (loss, HeadOutput { scores: out.logits, embeddings: out.features })
            }
            HeadModel::Ml(m) => {
                let out = m.forward(images);
                let loss = m.loss(&out, labels);
                (loss, HeadOutput { scores: out.logits, embeddings: out.embeddings })
            }
            HeadModel::Pl(m) => {
                let out = m.forward(images);
                let adv = adversarial.map(|x| m.trunk.forward(x));
                let loss = m.loss(&out, labels, adv);
                (loss, HeadOutput { scores: out.scores, embeddings: out.embeddings })
            }
        }
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::{Autodiff, NdArray};
    use crate::domain::kinds::BackboneKind;

    type TB = NdArray;
    type TAD = Autodiff<NdArray>;

    fn labels<B: Backend>(values: &[i64], device: &B::Device) -> Tensor<B, 1, Int> {
        Tensor::from_data(TensorData::new(values.to_vec(), [values.len()]), device)
    }

    fn images<B: Backend>(n: usize, device: &B::Device) -> Tensor<B, 4> {
        Tensor::random([n, 3, 32, 32], burn::tensor::Distribution::Default, device)
    }

    fn config(head: HeadFamily) -> HeadModelConfig {
        HeadModelConfig::new(BackboneConfig::new(BackboneKind::Resnet20), head)
    }

    #[test]
    fn test_every_family_scores_and_loss() {
        let device = Default::default();
        for head in [HeadFamily::Softmax, HeadFamily::Dce, HeadFamily::Ml, HeadFamily::Pl] {
            let model = config(head).init::<TB>(&device);
            assert_eq!(model.family(), head);

            let (loss, scores) = model.forward_loss(images(3, &device), labels(&[0, 4, 4], &device), None);
            assert_eq!(scores.dims(), [3, 10], "{head}");
            let loss: f32 = loss.into_scalar().elem();
            assert!(loss.is_finite() && loss >= 0.0, "{head}: {loss}");
        }
    }

    #[test]
    fn test_embedding_widths() {
        let device = Default::default();

        let dce = config(HeadFamily::Dce).init::<TB>(&device);
        assert_eq!(dce.forward_output(images(2, &device)).embeddings.dims(), [2, 2]);

        let pl = config(HeadFamily::Pl).with_embed_dim(Some(16)).init::<TB>(&device);
        assert_eq!(pl.forward_output(images(2, &device)).embeddings.dims(), [2, 16]);

        let plain = config(HeadFamily::Softmax).init::<TB>(&device);
        assert_eq!(plain.forward_output(images(2, &device)).embeddings.dims(), [2, 64]);
    }

    #[test]
    fn test_prototype_adversarial_term_increases_loss() {
        let device = Default::default();
        let model = config(HeadFamily::Pl).init::<TB>(&device);
        let x = images(2, &device);
        let y = labels(&[1, 2], &device);

        let (clean, _) = model.forward_loss(x.clone(), y.clone(), None);
        let (adv, _)   = model.forward_loss(x.clone(), y, Some(x));
        let clean: f32 = clean.into_scalar().elem();
        let adv:   f32 = adv.into_scalar().elem();
        assert!(adv >= clean);
    }

    #[test]
    fn test_dce_loss_reaches_centers() {
        let device = Default::default();
        let model = config(HeadFamily::Dce).init::<TAD>(&device);
        let (loss, _) = model.forward_loss(images(4, &device), labels(&[0, 1, 2, 3], &device), None);
        let grads = loss.backward();

        let HeadModel::Dce(dce) = &model else { unreachable!() };
        let grad = dce.dce.centers.grad(&grads).expect("centers receive a gradient");
        assert_eq!(grad.dims(), [2, 10]);
    }

    #[test]
    fn test_prototypes_receive_gradient() {
        let device = Default::default();
        let model = config(HeadFamily::Pl).with_prototypes_per_class(3).init::<TAD>(&device);
        let (loss, _) = model.forward_loss(images(2, &device), labels(&[5, 9], &device), None);
        let grads = loss.backward();

        let HeadModel::Pl(pl) = &model else { unreachable!() };
        let grad = pl.head.prototypes.grad(&grads).expect("prototypes receive a gradient");
        assert_eq!(grad.dims(), [30, 64]);
    }
}
