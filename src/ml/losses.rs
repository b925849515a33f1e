// ============================================================
// Layer 5 — Loss Math
// ============================================================
// Small tensor-algebra helpers the heads are built from.
//
// Notation:
//   N = batch size, K = number of classes, C = prototypes per class
//   dist [N, K]   → distance from each sample to each class
//   labels [N]    → class index per sample
//
// The one-hot "gather" trick:
//   positive entry  = dist[i, y_i]                → [N, 1]
//   negative entries = dist[i, k] for k != y_i    → [N, K-1]
// Negatives keep their column order, which is what a row-major
// boolean-mask gather over a one-hot matrix produces.

use burn::prelude::*;

/// labels [N] → one-hot [N, K] (1 at the label column, 0 elsewhere).
pub fn one_hot<B: Backend>(labels: Tensor<B, 1, Int>, num_classes: usize) -> Tensor<B, 2, Int> {
    let [n] = labels.dims();
    let classes = Tensor::<B, 1, Int>::arange(0..num_classes as i64, &labels.device())
        .unsqueeze::<2>()
        .expand([n, num_classes]);
    let labels = labels.unsqueeze_dim::<2>(1).expand([n, num_classes]);
    classes.equal(labels).int()
}

/// dist [N, K] → dist[i, y_i] as [N, 1].
pub fn gather_positive<B: Backend>(dist: Tensor<B, 2>, labels: Tensor<B, 1, Int>) -> Tensor<B, 2> {
    let [n] = labels.dims();
    dist.gather(1, labels.reshape([n, 1]))
}

/// dist [N, K] → every non-label column, in order, as [N, K-1].
pub fn gather_negative<B: Backend>(dist: Tensor<B, 2>, labels: Tensor<B, 1, Int>) -> Tensor<B, 2> {
    let [n, k] = dist.dims();
    // Column j of the output reads column j, or j+1 once j has reached the label.
    let cols = Tensor::<B, 1, Int>::arange(0..(k - 1) as i64, &dist.device())
        .unsqueeze::<2>()
        .expand([n, k - 1]);
    let labels = labels.unsqueeze_dim::<2>(1).expand([n, k - 1]);
    let shift  = cols.clone().greater_equal(labels).int();
    dist.gather(1, cols + shift)
}

/// [N, C*K] → [N, K]: average the C prototype distances of each class.
/// Column `c*K + k` belongs to class `k`.
pub fn reduce_prototypes<B: Backend>(dist: Tensor<B, 2>, per_class: usize, num_classes: usize) -> Tensor<B, 2> {
    let [n, _] = dist.dims();
    dist.reshape([n, per_class, num_classes])
        .mean_dim(1)
        .reshape([n, num_classes])
}

/// Σ_i ||f_i − c_{y_i}||² / N, with centers stored column-wise as [F, K].
pub fn center_regularization<B: Backend>(
    features: Tensor<B, 2>,
    centers:  Tensor<B, 2>,
    labels:   Tensor<B, 1, Int>,
) -> Tensor<B, 1> {
    let [n, _] = features.dims();
    let own_centers = centers.transpose().select(0, labels); // [N, F]
    (features - own_centers)
        .powf_scalar(2.0)
        .sum()
        .div_scalar(n as f32)
}

/// Mean distance between each sample and its own class.
pub fn prototype_norm<B: Backend>(dist: Tensor<B, 2>, labels: Tensor<B, 1, Int>) -> Tensor<B, 1> {
    gather_positive(dist, labels).mean()
}

/// mean_i log(1 + Σ_{k≠y_i} exp(d_{i,y_i} − d_{i,k}))
///
/// Zero-ish when the own-class distance is far below every
/// other class distance; grows linearly when it is not.
pub fn prototype_loss<B: Backend>(dist: Tensor<B, 2>, labels: Tensor<B, 1, Int>) -> Tensor<B, 1> {
    let [n, k] = dist.dims();
    let pos = gather_positive(dist.clone(), labels.clone()).expand([n, k - 1]);
    let neg = gather_negative(dist, labels); // [N, K-1]
    (pos - neg).exp().sum_dim(1).log1p().mean()
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

    fn floats<const D: usize>(t: Tensor<TB, D>) -> Vec<f32> {
        t.into_data().to_vec::<f32>().unwrap()
    }

    fn scalar(t: Tensor<TB, 1>) -> f32 {
        t.into_scalar().elem::<f32>()
    }

    #[test]
    fn test_one_hot() {
        let oh = one_hot(labels(&[2, 0]), 3);
        let v: Vec<i64> = oh.into_data().convert::<i64>().to_vec().unwrap();
        assert_eq!(v, vec![0, 0, 1, 1, 0, 0]);
    }

    #[test]
    fn test_gather_positive_and_negative() {
        let device = Default::default();
        let dist = Tensor::<TB, 2>::from_floats([[0.0, 1.0, 2.0], [3.0, 4.0, 5.0]], &device);
        let y = labels(&[1, 2]);

        assert_eq!(floats(gather_positive(dist.clone(), y.clone())), vec![1.0, 5.0]);
        let neg = gather_negative(dist, y);
        assert_eq!(neg.dims(), [2, 2]);
        assert_eq!(floats(neg), vec![0.0, 2.0, 3.0, 4.0]);
    }

    #[test]
    fn test_gather_negative_first_class() {
        let device = Default::default();
        let dist = Tensor::<TB, 2>::from_floats([[7.0, 8.0, 9.0, 10.0]], &device);
        assert_eq!(floats(gather_negative(dist, labels(&[0]))), vec![8.0, 9.0, 10.0]);
    }

    #[test]
    fn test_reduce_prototypes_groups_by_class() {
        // C=2, K=3: columns [c0k0, c0k1, c0k2, c1k0, c1k1, c1k2]
        let device = Default::default();
        let dist = Tensor::<TB, 2>::from_floats([[1.0, 2.0, 3.0, 3.0, 4.0, 5.0]], &device);
        assert_eq!(floats(reduce_prototypes(dist, 2, 3)), vec![2.0, 3.0, 4.0]);
    }

    #[test]
    fn test_center_regularization_value() {
        let device = Default::default();
        // Two classes, 2-D features. centers[:, k] is class k's center.
        let centers  = Tensor::<TB, 2>::from_floats([[0.0, 1.0], [0.0, 1.0]], &device);
        let features = Tensor::<TB, 2>::from_floats([[1.0, 0.0], [1.0, 1.0]], &device);
        // sample 0 → class 0 at (0,0): 1;  sample 1 → class 1 at (1,1): 0
        let reg = center_regularization(features, centers, labels(&[0, 1]));
        assert!((scalar(reg) - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_prototype_loss_value() {
        let device = Default::default();
        let dist = Tensor::<TB, 2>::from_floats([[1.0, 2.0, 3.0]], &device);
        let expected = (1.0f32 + (-1.0f32).exp() + (-2.0f32).exp()).ln();
        let got = scalar(prototype_loss(dist, labels(&[0])));
        assert!((got - expected).abs() < 1e-5, "{got} vs {expected}");
    }

    #[test]
    fn test_prototype_loss_prefers_close_own_class() {
        let device = Default::default();
        let good = Tensor::<TB, 2>::from_floats([[0.1, 3.0, 3.0]], &device);
        let bad  = Tensor::<TB, 2>::from_floats([[3.0, 0.1, 3.0]], &device);
        let y = labels(&[0]);
        assert!(scalar(prototype_loss(good, y.clone())) < scalar(prototype_loss(bad, y)));
    }

    #[test]
    fn test_prototype_norm_is_mean_positive() {
        let device = Default::default();
        let dist = Tensor::<TB, 2>::from_floats([[1.0, 2.0], [5.0, 3.0]], &device);
        let norm = scalar(prototype_norm(dist, labels(&[1, 0])));
        assert!((norm - 3.5).abs() < 1e-6);
    }
}
