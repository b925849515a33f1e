// ============================================================
// Layer 5 — DCE (Distance Center Entropy) Head
// ============================================================
// One learnable center per class, stored column-wise:
//   centers: [feat_dim, K]
//
// Logits are negative squared euclidean distances to the
// centers, so cross entropy on them pulls each feature toward
// its own center and away from the rest:
//
//   logits[i, k] = -(||x_i||² + ||c_k||² - 2 x_i·c_k)
//                = -||x_i - c_k||²
//
// The center regulariser in ml::losses adds an explicit
// pull term on top of that.
//
// Reference: Yang et al. (2018) Robust Classification with
//            Convolutional Prototype Learning

use burn::{
    module::Param,
    nn::Initializer,
    prelude::*,
};

use crate::ml::init::kaiming_normal;

#[derive(Config, Debug)]
pub struct DceHeadConfig {
    pub num_classes: usize,
    pub feat_dim:    usize,
    /// Kaiming-normal centers; standard normal otherwise
    #[config(default = true)]
    pub init_weight: bool,
}

impl DceHeadConfig {
    pub fn init<B: Backend>(&self, device: &B::Device) -> DceHead<B> {
        let shape = [self.feat_dim, self.num_classes];
        let centers = if self.init_weight {
            // Second axis is the fan-in of a [feat_dim, K] matrix
            kaiming_normal().init_with(shape, Some(self.num_classes), Some(self.feat_dim), device)
        } else {
            Initializer::Normal { mean: 0.0, std: 1.0 }.init(shape, device)
        };
        DceHead { centers }
    }
}

#[derive(Module, Debug)]
pub struct DceHead<B: Backend> {
    pub centers: Param<Tensor<B, 2>>,
}

impl<B: Backend> DceHead<B> {
    /// x: [N, feat_dim] → (centers [feat_dim, K], logits [N, K])
    pub fn forward(&self, x: Tensor<B, 2>) -> (Tensor<B, 2>, Tensor<B, 2>) {
        let centers = self.centers.val();

        let [n, _] = x.dims();
        let [_, k] = centers.dims();
        let features_square = x.clone().powf_scalar(2.0).sum_dim(1).expand([n, k]);
        let centers_square  = centers.clone().powf_scalar(2.0).sum_dim(0).expand([n, k]);
        let features_into_centers = x.matmul(centers.clone()).mul_scalar(2.0);

        let dist = features_square + centers_square - features_into_centers;
        (centers, dist.neg())
    }
}
