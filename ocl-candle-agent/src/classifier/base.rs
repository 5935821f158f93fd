use super::ClassifierConfig;
use crate::{
    grad::GradLayout,
    model::SubModel1,
    opt::Optimizer,
    util::{labels_to_tensor, param_stats, OutDim},
};
use anyhow::{Context, Result};
use candle_core::{backprop::GradStore, DType, Device, Tensor, D};
use candle_nn::{loss::cross_entropy, VarBuilder, VarMap};
use log::info;
use ocl_core::record::Record;
use serde::{de::DeserializeOwned, Serialize};
use std::path::Path;

/// A network, its parameters and the optimizer updating them.
///
/// Gradients are not kept inside the classifier. [`Classifier::backward`]
/// returns a fresh [`GradStore`] for a loss, which may be inspected or
/// rewritten before it is passed to [`Classifier::step`]. Each backward pass
/// therefore starts from zeroed gradients.
pub struct Classifier<P>
where
    P: SubModel1<Input = Tensor, Output = Tensor>,
    P::Config: DeserializeOwned + Serialize + OutDim + Clone,
{
    device: Device,
    varmap: VarMap,
    model: P,
    opt: Optimizer,
    layout: GradLayout,
    out_dim: usize,
}

impl<P> Classifier<P>
where
    P: SubModel1<Input = Tensor, Output = Tensor>,
    P::Config: DeserializeOwned + Serialize + OutDim + Clone,
{
    /// Constructs [`Classifier`].
    pub fn build(config: ClassifierConfig<P::Config>, device: Device) -> Result<Self> {
        let model_config = config.model_config.context("model_config is not set.")?;
        let out_dim = model_config.get_out_dim();
        let varmap = VarMap::new();
        let model = {
            let vb = VarBuilder::from_varmap(&varmap, DType::F32, &device);
            P::build(vb, model_config)?
        };
        let opt = config.opt_config.build(varmap.all_vars())?;
        let layout = GradLayout::new(&varmap)?;

        Ok(Self {
            device,
            varmap,
            model,
            opt,
            layout,
            out_dim,
        })
    }

    /// Returns the logits for a batch of inputs.
    pub fn forward(&self, x: &Tensor) -> Result<Tensor> {
        self.model.forward(&x.to_device(&self.device)?)
    }

    /// Returns the mean cross entropy loss on a batch of inputs and labels.
    pub fn loss(&self, x: &Tensor, y: &[u32]) -> Result<Tensor> {
        let logits = self.forward(x)?;
        self.loss_from_logits(&logits, y)
    }

    /// Returns the mean cross entropy loss of logits against labels.
    pub fn loss_from_logits(&self, logits: &Tensor, y: &[u32]) -> Result<Tensor> {
        let target = labels_to_tensor(y, &self.device)?;
        Ok(cross_entropy(logits, &target)?)
    }

    /// Returns the predicted class of each input.
    pub fn predict_labels(&self, x: &Tensor) -> Result<Vec<u32>> {
        let logits = self.forward(x)?.detach();
        Ok(logits.argmax(D::Minus1)?.to_device(&Device::Cpu)?.to_vec1()?)
    }

    /// Computes the gradients of `loss` with respect to the parameters.
    pub fn backward(&self, loss: &Tensor) -> Result<GradStore> {
        Ok(loss.backward()?)
    }

    /// Updates the parameters with the given gradients.
    pub fn step(&mut self, grads: &GradStore) -> Result<()> {
        self.opt.step(grads)
    }

    /// Layout of the parameters used to flatten gradients.
    pub fn layout(&self) -> &GradLayout {
        &self.layout
    }

    /// Number of scalar parameters.
    pub fn n_params(&self) -> usize {
        self.layout.numel()
    }

    /// Number of classes.
    pub fn out_dim(&self) -> usize {
        self.out_dim
    }

    /// Device the parameters live on.
    pub fn device(&self) -> &Device {
        &self.device
    }

    /// Variables of the network.
    pub fn varmap(&self) -> &VarMap {
        &self.varmap
    }

    /// Mean and standard deviation of every parameter.
    pub fn param_stats(&self) -> Result<Record> {
        param_stats(&self.varmap)
    }

    /// Saves the parameters to a safetensors file.
    pub fn save<T: AsRef<Path>>(&self, path: T) -> Result<()> {
        self.varmap.save(&path)?;
        info!("Save classifier to {:?}", path.as_ref());
        Ok(())
    }

    /// Loads the parameters from a safetensors file.
    pub fn load<T: AsRef<Path>>(&mut self, path: T) -> Result<()> {
        self.varmap.load(&path)?;
        info!("Load classifier from {:?}", path.as_ref());
        Ok(())
    }
}
