use crate::util::OutDim;
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize, Serialize, PartialEq, Clone)]
/// Configuration of [`Mlp`](super::Mlp).
pub struct MlpConfig {
    pub(super) in_dim: usize,
    pub(super) units: Vec<usize>,
    pub(super) out_dim: usize,
}

impl MlpConfig {
    /// Creates configuration of MLP.
    ///
    /// * `units` - Sizes of hidden layers. If empty, the network is a linear classifier.
    /// * `out_dim` - Number of classes.
    pub fn new(in_dim: usize, units: Vec<usize>, out_dim: usize) -> Self {
        Self {
            in_dim,
            units,
            out_dim,
        }
    }
}

impl Default for MlpConfig {
    fn default() -> Self {
        Self::new(2, vec![64, 64], 10)
    }
}

impl OutDim for MlpConfig {
    fn get_out_dim(&self) -> usize {
        self.out_dim
    }
}
