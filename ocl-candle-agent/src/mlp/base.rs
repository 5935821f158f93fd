use super::MlpConfig;
use crate::model::SubModel1;
use anyhow::Result;
use candle_core::{Device, Tensor};
use candle_nn::{linear, Linear, Module, VarBuilder};

/// Returns vector of linear modules from [`MlpConfig`].
///
/// With no hidden units, a single linear layer maps inputs to logits.
fn create_linear_layers(prefix: &str, vs: VarBuilder, config: &MlpConfig) -> Result<Vec<Linear>> {
    let dims = std::iter::once(config.in_dim)
        .chain(config.units.iter().copied())
        .chain(std::iter::once(config.out_dim))
        .collect::<Vec<_>>();
    let vs = vs.pp(prefix);

    dims.windows(2)
        .enumerate()
        .map(|(i, w)| -> Result<Linear> {
            Ok(linear(w[0], w[1], vs.pp(format!("ln{}", i)))?)
        })
        .collect()
}

/// Multilayer perceptron classifier with ReLU activation function.
///
/// The output of the last layer is returned as raw logits.
pub struct Mlp {
    device: Device,
    layers: Vec<Linear>,
}

impl Mlp {
    /// Returns the number of linear layers.
    pub fn n_layers(&self) -> usize {
        self.layers.len()
    }
}

impl SubModel1 for Mlp {
    type Config = MlpConfig;
    type Input = Tensor;
    type Output = Tensor;

    fn build(vs: VarBuilder, config: Self::Config) -> Result<Self> {
        let device = vs.device().clone();
        let layers = create_linear_layers("mlp", vs, &config)?;

        Ok(Self { device, layers })
    }

    fn forward(&self, xs: &Self::Input) -> Result<Tensor> {
        let mut xs = xs.to_device(&self.device)?;
        let n_layers = self.layers.len();

        for (i, layer) in self.layers.iter().enumerate() {
            xs = layer.forward(&xs)?;
            if i + 1 < n_layers {
                xs = xs.relu()?;
            }
        }

        Ok(xs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use candle_core::DType;
    use candle_nn::VarMap;

    #[test]
    fn test_mlp_shapes_and_names() -> Result<()> {
        let varmap = VarMap::new();
        let vb = VarBuilder::from_varmap(&varmap, DType::F32, &Device::Cpu);
        let mlp = Mlp::build(vb, MlpConfig::new(4, vec![8, 6], 3))?;
        assert_eq!(mlp.n_layers(), 3);

        let xs = Tensor::zeros((5, 4), DType::F32, &Device::Cpu)?;
        assert_eq!(mlp.forward(&xs)?.dims(), &[5, 3]);

        let mut names = varmap.data().lock().unwrap().keys().cloned().collect::<Vec<_>>();
        names.sort();
        assert_eq!(
            names,
            vec![
                "mlp.ln0.bias",
                "mlp.ln0.weight",
                "mlp.ln1.bias",
                "mlp.ln1.weight",
                "mlp.ln2.bias",
                "mlp.ln2.weight",
            ]
        );
        Ok(())
    }

    #[test]
    fn test_linear_classifier() -> Result<()> {
        let varmap = VarMap::new();
        let vb = VarBuilder::from_varmap(&varmap, DType::F32, &Device::Cpu);
        let mlp = Mlp::build(vb, MlpConfig::new(2, vec![], 2))?;
        assert_eq!(mlp.n_layers(), 1);
        assert_eq!(varmap.all_vars().len(), 2);
        Ok(())
    }
}
