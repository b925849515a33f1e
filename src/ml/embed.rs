// ============================================================
// Layer 5 — Embedding Layer
// ============================================================
// Maps backbone features to a lower-dimensional embedding.
//
//   with a hidden layer:   emb(dropout(prelu(lin(x))))
//                          lin: d_in → hidden, emb: hidden → dim
//   without:               emb(x), a single linear projection
//
// Dropout is optional because the MNIST conv head uses the
// same MLP without it.

use burn::{
    nn::{Dropout, DropoutConfig, Linear, LinearConfig, PRelu, PReluConfig},
    prelude::*,
};

use crate::ml::init::kaiming_normal;

#[derive(Config, Debug)]
pub struct EmbedConfig {
    pub d_in: usize,
    #[config(default = 64)]
    pub dim:  usize,
    /// Width of the hidden layer; None = linear projection
    #[config(default = "Some(512)")]
    pub hidden:  Option<usize>,
    #[config(default = "Some(0.5)")]
    pub dropout: Option<f64>,
}

impl EmbedConfig {
    pub fn init<B: Backend>(&self, device: &B::Device) -> EmbedLayer<B> {
        let linear = |i: usize, o: usize| -> Linear<B> {
            LinearConfig::new(i, o).with_initializer(kaiming_normal()).init(device)
        };
        match self.hidden {
            Some(hidden) => EmbedLayer {
                lin:     Some(linear(self.d_in, hidden)),
                act:     Some(PReluConfig::new().init(device)),
                dropout: self.dropout.filter(|&p| p > 0.0).map(|p| DropoutConfig::new(p).init()),
                emb:     linear(hidden, self.dim),
            },
            None => EmbedLayer {
                lin:     None,
                act:     None,
                dropout: None,
                emb:     linear(self.d_in, self.dim),
            },
        }
    }
}

#[derive(Module, Debug)]
pub struct EmbedLayer<B: Backend> {
    pub lin:     Option<Linear<B>>,
    pub act:     Option<PRelu<B>>,
    pub dropout: Option<Dropout>,
    pub emb:     Linear<B>,
}

impl<B: Backend> EmbedLayer<B> {
    pub fn forward(&self, x: Tensor<B, 2>) -> Tensor<B, 2> {
        let mut x = x;
        if let Some(lin) = &self.lin {
            x = lin.forward(x);
        }
        if let Some(act) = &self.act {
            x = act.forward(x);
        }
        if let Some(dropout) = &self.dropout {
            x = dropout.forward(x);
        }
        self.emb.forward(x)
    }
}
