// ============================================================
// Layer 5 — Pairwise Distances
// ============================================================
// Compares every row of `query` [N, D] with every row of
// `reference` [M, D] and returns an [N, M] matrix where a
// smaller value always means "closer".
//
// Both inputs are L2-normalised first, so distances live on
// the unit hypersphere:
//
//   L2         → ||q - r||²              (squared euclidean)
//   L1         → Σ |q_d - r_d|
//   Linf       → max_d |q_d - r_d|
//   dotproduct → -(q · r)                (similarity, negated)
//
// Squared L2 is expanded as ||q||² + ||r||² - 2 q·r so it is a
// single matmul; the L1 / Linf kinds broadcast to [N, M, D].

use burn::prelude::*;

use crate::domain::kinds::DistanceKind;

const NORM_EPS: f32 = 1e-12;

/// Rescale each row to unit L2 norm.
pub fn l2_normalize<B: Backend>(x: Tensor<B, 2>) -> Tensor<B, 2> {
    let [n, d] = x.dims();
    let norm = x.clone().powf_scalar(2.0).sum_dim(1).sqrt().clamp_min(NORM_EPS);
    x / norm.expand([n, d])
}

/// ||q_i - r_j||² for all i, j, clamped at zero against rounding.
pub fn squared_euclidean<B: Backend>(query: Tensor<B, 2>, reference: Tensor<B, 2>) -> Tensor<B, 2> {
    let [n, _] = query.dims();
    let [m, _] = reference.dims();
    let q_sq  = query.clone().powf_scalar(2.0).sum_dim(1).expand([n, m]);
    let r_sq  = reference.clone().powf_scalar(2.0).sum_dim(1).transpose().expand([n, m]);
    let cross = query.matmul(reference.transpose()).mul_scalar(2.0);
    (q_sq + r_sq - cross).clamp_min(0.0)
}

fn abs_differences<B: Backend>(query: Tensor<B, 2>, reference: Tensor<B, 2>) -> Tensor<B, 3> {
    let [n, d] = query.dims();
    let [m, _] = reference.dims();
    let q = query.unsqueeze_dim::<3>(1).expand([n, m, d]);
    let r = reference.unsqueeze::<3>().expand([n, m, d]);
    (q - r).abs()
}

/// Distances between rows as given, without normalising first.
fn raw_pairwise<B: Backend>(kind: DistanceKind, q: Tensor<B, 2>, r: Tensor<B, 2>) -> Tensor<B, 2> {
    let [n, _] = q.dims();
    let [m, _] = r.dims();

    match kind {
        DistanceKind::L2   => squared_euclidean(q, r),
        DistanceKind::L1   => abs_differences(q, r).sum_dim(2).reshape([n, m]),
        DistanceKind::Linf => abs_differences(q, r).max_dim(2).reshape([n, m]),
        // Similarity is negated so that smaller means closer here too
        DistanceKind::DotProduct => q.matmul(r.transpose()).neg(),
    }
}

/// Pairwise distance of one kind on L2-normalised rows.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Distance {
    pub kind: DistanceKind,
}

impl Distance {
    pub fn new(kind: DistanceKind) -> Self {
        Self { kind }
    }

    pub fn pairwise<B: Backend>(&self, query: Tensor<B, 2>, reference: Tensor<B, 2>) -> Tensor<B, 2> {
        raw_pairwise(self.kind, l2_normalize(query), l2_normalize(reference))
    }
}
