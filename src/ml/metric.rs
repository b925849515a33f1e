// ============================================================
// Layer 5 — Metric-Learning Losses
// ============================================================
// Pair / triplet losses over the embeddings of one batch,
// added on top of cross entropy by the "ml" head family.
//
// Shared call contract:  loss(embeddings, labels, a, b)
//   a → margin
//   b → weight of the mean squared embedding norm
//
// Distances are euclidean between L2-normalised embeddings;
// the norm penalty uses the raw embeddings so it still keeps
// their scale in check.
//
//   contrastive: mean_{pos pairs} d²  +  mean_{neg pairs} relu(a - d)²
//   triplet:     mean_{(i,j,k) valid} relu(d_ij - d_ik + a)
//                (batch-all: every anchor / positive / negative)
//
// A term with no valid pairs or triplets in the batch is 0.
//
// Reference: Hadsell et al. (2006) Dimensionality Reduction by
//              Learning an Invariant Mapping
//            Schroff et al. (2015) FaceNet

use burn::{prelude::*, tensor::activation::relu};

use crate::domain::kinds::MetricLossKind;
use crate::ml::distance::{l2_normalize, squared_euclidean};

const SQRT_EPS: f32 = 1e-12;

/// (same-class pairs without the diagonal, different-class pairs), both [N, N] as 0/1 floats.
fn pair_masks<B: Backend>(labels: Tensor<B, 1, Int>) -> (Tensor<B, 2>, Tensor<B, 2>) {
    let [n] = labels.dims();
    let device = labels.device();

    let rows = labels.clone().unsqueeze_dim::<2>(1).expand([n, n]);
    let cols = labels.unsqueeze::<2>().expand([n, n]);
    let same = rows.equal(cols).float();

    let idx = Tensor::<B, 1, Int>::arange(0..n as i64, &device);
    let eye = idx.clone().unsqueeze_dim::<2>(1).expand([n, n])
        .equal(idx.unsqueeze::<2>().expand([n, n]))
        .float();

    let positive = same.clone() - eye;
    let negative = same.neg().add_scalar(1.0);
    (positive, negative)
}

fn masked_mean<B: Backend, const D: usize>(values: Tensor<B, D>, mask: Tensor<B, D>) -> Tensor<B, 1> {
    let count = mask.clone().sum().clamp_min(1.0);
    (values * mask).sum() / count
}

fn norm_penalty<B: Backend>(embeddings: Tensor<B, 2>) -> Tensor<B, 1> {
    embeddings.powf_scalar(2.0).sum_dim(1).mean()
}

pub fn contrastive_loss<B: Backend>(
    embeddings: Tensor<B, 2>,
    labels:     Tensor<B, 1, Int>,
    margin:     f64,
    weight:     f64,
) -> Tensor<B, 1> {
    let unit = l2_normalize(embeddings.clone());
    let d2   = squared_euclidean(unit.clone(), unit);
    let d    = d2.clone().add_scalar(SQRT_EPS).sqrt();
    let (positive, negative) = pair_masks(labels);

    let pull = masked_mean(d2, positive);
    let push = masked_mean(relu(d.neg().add_scalar(margin)).powf_scalar(2.0), negative);
    pull + push + norm_penalty(embeddings).mul_scalar(weight)
}

pub fn triplet_loss<B: Backend>(
    embeddings: Tensor<B, 2>,
    labels:     Tensor<B, 1, Int>,
    margin:     f64,
    weight:     f64,
) -> Tensor<B, 1> {
    let [n, _] = embeddings.dims();
    let unit = l2_normalize(embeddings.clone());
    let d    = squared_euclidean(unit.clone(), unit).add_scalar(SQRT_EPS).sqrt();
    let (positive, negative) = pair_masks(labels);

    // [i, j, k] = d(anchor i, positive j) - d(anchor i, negative k)
    let d_ap = d.clone().unsqueeze_dim::<3>(2).expand([n, n, n]);
    let d_an = d.unsqueeze_dim::<3>(1).expand([n, n, n]);
    let mask = positive.unsqueeze_dim::<3>(2).expand([n, n, n])
        * negative.unsqueeze_dim::<3>(1).expand([n, n, n]);

    let hinge = relu((d_ap - d_an).add_scalar(margin));
    masked_mean(hinge, mask) + norm_penalty(embeddings).mul_scalar(weight)
}

/// The pluggable metric loss of an "ml" model and its (a, b) arguments.
#[derive(Debug, Clone, Copy)]
pub struct MetricLoss {
    pub kind:   MetricLossKind,
    pub margin: f64,
    pub weight: f64,
}

impl MetricLoss {
    pub fn forward<B: Backend>(&self, embeddings: Tensor<B, 2>, labels: Tensor<B, 1, Int>) -> Tensor<B, 1> {
        match self.kind {
            MetricLossKind::Contrastive => contrastive_loss(embeddings, labels, self.margin, self.weight),
            MetricLossKind::Triplet     => triplet_loss(embeddings, labels, self.margin, self.weight),
        }
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;

    type TB = NdArray;

    fn labels(values: &[i64]) -> Tensor<TB, 1, Int> {
        Tensor::from_data(TensorData::new(values.to_vec(), [values.len()]), &Default::default())
    }

    fn scalar(t: Tensor<TB, 1>) -> f32 {
        t.into_scalar().elem::<f32>()
    }

    #[test]
    fn test_pair_masks() {
        let (pos, neg) = pair_masks(labels(&[0, 0, 1]));
        let pos: Vec<f32> = pos.into_data().to_vec().unwrap();
        let neg: Vec<f32> = neg.into_data().to_vec().unwrap();
        assert_eq!(pos, vec![0.0, 1.0, 0.0, 1.0, 0.0, 0.0, 0.0, 0.0, 0.0]);
        assert_eq!(neg, vec![0.0, 0.0, 1.0, 0.0, 0.0, 1.0, 1.0, 1.0, 0.0]);
    }

    #[test]
    fn test_separated_classes_cost_nothing() {
        // Same direction within a class, orthogonal across classes:
        // d_pos = 0, d_neg = √2 > margin
        let device = Default::default();
        let e = Tensor::<TB, 2>::from_floats([[1.0, 0.0], [2.0, 0.0], [0.0, 1.0], [0.0, 3.0]], &device);
        let y = labels(&[0, 0, 1, 1]);

        assert!(scalar(contrastive_loss(e.clone(), y.clone(), 0.3, 0.0)) < 1e-4);
        assert!(scalar(triplet_loss(e, y, 0.3, 0.0)) < 1e-4);
    }

    #[test]
    fn test_mixed_classes_are_penalised() {
        // Class 0 points in both directions → positive pairs far, negatives close
        let device = Default::default();
        let e = Tensor::<TB, 2>::from_floats([[1.0, 0.0], [0.0, 1.0], [1.0, 0.1]], &device);
        let y = labels(&[0, 0, 1]);

        assert!(scalar(contrastive_loss(e.clone(), y.clone(), 0.3, 0.0)) > 0.1);
        assert!(scalar(triplet_loss(e, y, 0.3, 0.0)) > 0.1);
    }

    // e1 ⟂ e0, e2 points along e0 at twice the length; labels [0, 0, 1].
    // After normalising: d²(0,1) = d²(1,2) = 2, d²(0,2) = 0.
    fn three_points() -> (Tensor<TB, 2>, Tensor<TB, 1, Int>) {
        let device = Default::default();
        let e = Tensor::<TB, 2>::from_floats([[1.0, 0.0], [0.0, 1.0], [2.0, 0.0]], &device);
        (e, labels(&[0, 0, 1]))
    }

    #[test]
    fn test_contrastive_value() {
        let (e, y) = three_points();
        // pull: both ordered positive pairs have d² = 2          → 2
        // push: (0,2),(2,0) have d ≈ 0 → 0.3² each; (1,2),(2,1) have d = √2 → 0
        //       (0.09 + 0.09) / 4                                  → 0.045
        // norm: mean ||e||² = (1 + 1 + 4) / 3 = 2, times 0.1       → 0.2
        let got = scalar(contrastive_loss(e, y, 0.3, 0.1));
        assert!((got - 2.245).abs() < 1e-4, "{got}");
    }

    #[test]
    fn test_triplet_value() {
        let (e, y) = three_points();
        // valid triplets (anchor, positive, negative): (0,1,2) and (1,0,2)
        //   (0,1,2): d01 - d02 + 0.3 = √2 - 0 + 0.3
        //   (1,0,2): d10 - d12 + 0.3 = √2 - √2 + 0.3
        let expected = (2.0f32.sqrt() + 0.6) / 2.0;
        let got = scalar(triplet_loss(e, y, 0.3, 0.0));
        assert!((got - expected).abs() < 1e-4, "{got} vs {expected}");
    }

    #[test]
    fn test_no_pairs_only_norm_term() {
        // All labels distinct → no positive pair, no triplet
        let device = Default::default();
        let e = Tensor::<TB, 2>::from_floats([[3.0, 4.0], [0.0, 5.0]], &device);
        let loss = scalar(triplet_loss(e, labels(&[0, 1]), 0.3, 0.5));
        // mean ||e||² = 25, times 0.5
        assert!((loss - 12.5).abs() < 1e-3);
    }

    #[test]
    fn test_dispatch_by_kind() {
        let device = Default::default();
        let e = Tensor::<TB, 2>::from_floats([[1.0, 0.0], [0.0, 1.0], [1.0, 0.1]], &device);
        let y = labels(&[0, 0, 1]);
        let metric = MetricLoss { kind: MetricLossKind::Triplet, margin: 0.3, weight: 1e-4 };
        let direct = scalar(triplet_loss(e.clone(), y.clone(), 0.3, 1e-4));
        assert!((scalar(metric.forward(e, y)) - direct).abs() < 1e-6);
    }
}
