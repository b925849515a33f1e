// ============================================================
// Layer 5 — Prototype Learning (PL) Head
// ============================================================
// C learnable prototypes per class, stored row-wise:
//   prototypes: [C*K, D]   (row c*K + k belongs to class k)
//
// Three distances take part, each configurable:
//   loss distance → the distance the contrastive term is computed on
//   norm distance → the "pull toward own class" penalty
//   pred distance → the scores used for prediction (negated)
// Every distance to the C*K prototypes is averaged over the C
// prototypes of a class, giving one value per class.
//
// Loss for a batch (defaults a = 0.1, b = 0.2):
//   prototype_loss(loss_dist)
//     + a * prototype_norm(norm_dist(x))
//     + b * prototype_norm(norm_dist(x_adv))   if adversarial
//                                              embeddings given
//
// Reference: Yang et al. (2018) Robust Classification with
//            Convolutional Prototype Learning

use burn::{
    module::{Ignored, Param},
    nn::Initializer,
    prelude::*,
};

use crate::domain::kinds::DistanceKind;
use crate::ml::distance::Distance;
use crate::ml::losses::{prototype_loss, prototype_norm, reduce_prototypes};

#[derive(Config, Debug)]
pub struct PrototypeHeadConfig {
    /// Embedding width D
    pub dim:         usize,
    pub num_classes: usize,
    /// Prototypes per class, C
    #[config(default = 2)]
    pub per_class:   usize,
    #[config(default = "DistanceKind::L2")]
    pub loss_distance: DistanceKind,
    #[config(default = "DistanceKind::L2")]
    pub norm_distance: DistanceKind,
    #[config(default = "DistanceKind::L2")]
    pub pred_distance: DistanceKind,
    /// Weight a of the own-class norm term
    #[config(default = 0.1)]
    pub norm_weight: f64,
    /// Weight b of the adversarial norm term
    #[config(default = 0.2)]
    pub adv_weight:  f64,
}

impl PrototypeHeadConfig {
    pub fn init<B: Backend>(&self, device: &B::Device) -> PrototypeHead<B> {
        let prototypes = Initializer::Normal { mean: 0.0, std: 1.0 }
            .init([self.per_class * self.num_classes, self.dim], device);

        PrototypeHead {
            prototypes,
            per_class:   self.per_class,
            num_classes: self.num_classes,
            norm_weight: self.norm_weight,
            adv_weight:  self.adv_weight,
            distances: Ignored(PrototypeDistances {
                loss: Distance::new(self.loss_distance),
                norm: Distance::new(self.norm_distance),
                pred: Distance::new(self.pred_distance),
            }),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct PrototypeDistances {
    pub loss: Distance,
    pub norm: Distance,
    pub pred: Distance,
}

#[derive(Module, Debug)]
pub struct PrototypeHead<B: Backend> {
    pub prototypes:  Param<Tensor<B, 2>>,
    pub per_class:   usize,
    pub num_classes: usize,
    pub norm_weight: f64,
    pub adv_weight:  f64,
    pub distances:   Ignored<PrototypeDistances>,
}

impl<B: Backend> PrototypeHead<B> {
    fn class_distance(&self, distance: &Distance, x: Tensor<B, 2>) -> Tensor<B, 2> {
        let raw = distance.pairwise(x, self.prototypes.val());
        reduce_prototypes(raw, self.per_class, self.num_classes)
    }

    /// x: [N, D] → (scores [N, K], loss distance [N, K])
    pub fn predict(&self, x: Tensor<B, 2>) -> (Tensor<B, 2>, Tensor<B, 2>) {
        let distance = self.class_distance(&self.distances.loss, x.clone());
        let scores   = self.class_distance(&self.distances.pred, x).neg();
        (scores, distance)
    }

    pub fn loss(
        &self,
        x:           Tensor<B, 2>,
        distance:    Tensor<B, 2>,
        labels:      Tensor<B, 1, Int>,
        adversarial: Option<Tensor<B, 2>>,
    ) -> Tensor<B, 1> {
        let norm_dist = self.class_distance(&self.distances.norm, x);
        let pl_norm   = prototype_norm(norm_dist, labels.clone());
        let mut loss  = prototype_loss(distance, labels.clone()) + pl_norm.mul_scalar(self.norm_weight);

        if let Some(x_adv) = adversarial {
            let adv_dist = self.class_distance(&self.distances.norm, x_adv);
            loss = loss + prototype_norm(adv_dist, labels).mul_scalar(self.adv_weight);
        }
        loss
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

    #[test]
    fn test_predict_shapes() {
        let device = Default::default();
        let head = PrototypeHeadConfig::new(8, 10).with_per_class(3).init::<TB>(&device);
        assert_eq!(head.prototypes.val().dims(), [30, 8]);

        let x = Tensor::<TB, 2>::random([4, 8], burn::tensor::Distribution::Default, &device);
        let (scores, distance) = head.predict(x);
        assert_eq!(scores.dims(),   [4, 10]);
        assert_eq!(distance.dims(), [4, 10]);
    }

    #[test]
    fn test_scores_are_negated_distance_when_kinds_match() {
        let device = Default::default();
        let head = PrototypeHeadConfig::new(4, 3).init::<TB>(&device);
        let x = Tensor::<TB, 2>::random([2, 4], burn::tensor::Distribution::Default, &device);
        let (scores, distance) = head.predict(x);
        let sum: f32 = (scores + distance).abs().sum().into_scalar().elem();
        assert!(sum < 1e-5);
    }

    #[test]
    fn test_sample_on_own_prototypes_is_predicted() {
        let device = Default::default();
        let head = PrototypeHeadConfig::new(4, 3).with_per_class(1).init::<TB>(&device);
        // Prototype row 1 is class 1's only prototype
        let x = head.prototypes.val().slice([1..2, 0..4]);
        let (scores, _) = head.predict(x);
        let best: Vec<i64> = scores.argmax(1).into_data().convert::<i64>().to_vec().unwrap();
        assert_eq!(best, vec![1]);
    }

    #[test]
    fn test_adversarial_term_adds_loss() {
        let device = Default::default();
        let head = PrototypeHeadConfig::new(4, 3).init::<TB>(&device);
        let x     = Tensor::<TB, 2>::random([2, 4], burn::tensor::Distribution::Default, &device);
        let x_adv = Tensor::<TB, 2>::random([2, 4], burn::tensor::Distribution::Default, &device);
        let y = labels(&[0, 2]);

        let (_, distance) = head.predict(x.clone());
        let clean: f32 = head.loss(x.clone(), distance.clone(), y.clone(), None).into_scalar().elem();
        let adv:   f32 = head.loss(x, distance, y, Some(x_adv)).into_scalar().elem();
        // The norm term is a mean of non-negative distances
        assert!(adv >= clean);
        assert!(clean.is_finite());
    }
}
