//! AGEM agent implemented with candle.
use crate::{
    er::Er,
    grad::{dot, project},
    method::Method,
    model::SubModel1,
    util::OutDim,
    AgentConfig, TensorBatch,
};
use anyhow::{bail, Result};
use candle_core::Tensor;
use log::{debug, trace};
use ocl_core::{
    record::{Record, RecordValue},
    Agent, IncomingBatch,
};
use serde::{de::DeserializeOwned, Serialize};
use std::path::Path;

/// How the incoming and replay gradients are combined.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AgemVariant {
    /// The (possibly projected) incoming gradient is applied.
    Agem,

    /// The replay gradient is added to the (possibly projected) incoming gradient.
    AgemPp,
}

/// Result of [`combine`].
pub struct Combined {
    /// Gradient vector to be installed on the model.
    pub grad: Tensor,

    /// Inner product of the incoming and replay gradients.
    pub dot_p: f32,

    /// `true` if the incoming gradient was projected.
    pub projected: bool,
}

/// Combines the flattened incoming gradient `grad_inc` and replay gradient
/// `grad_re` into the gradient vector applied by the optimizer.
///
/// The incoming gradient is projected onto the plane orthogonal to
/// `grad_re` only when the two conflict, i.e. their inner product is
/// negative. A zero inner product is not a conflict.
pub fn combine(variant: AgemVariant, grad_inc: &Tensor, grad_re: &Tensor) -> Result<Combined> {
    let dot_p = dot(grad_inc, grad_re)?;
    let projected = dot_p < 0.;
    let grad = match projected {
        true => {
            debug!(
                "Project incoming gradient: dot_p = {}, |g_inc| = {}, |g_re| = {}",
                dot_p,
                dot(grad_inc, grad_inc)?.sqrt(),
                dot(grad_re, grad_re)?.sqrt()
            );
            project(grad_inc, grad_re)?
        }
        false => grad_inc.clone(),
    };
    let grad = match variant {
        AgemVariant::Agem => grad,
        AgemVariant::AgemPp => (grad + grad_re)?,
    };

    Ok(Combined {
        grad,
        dot_p,
        projected,
    })
}

#[cfg_attr(doc, aquamarine::aquamarine)]
/// Averaged gradient episodic memory (AGEM) agent implemented with candle.
///
/// The gradient of the incoming batch is computed alone. When replay is
/// active, the gradient of a batch sampled from the buffer is computed
/// separately and the two are merged with [`combine`] before the optimizer
/// step. Both gradients and the installed vector of the last iteration are
/// kept and can be inspected with [`Agem::grad_inc`], [`Agem::grad_re`] and
/// [`Agem::installed_grad`].
///
/// Replay conditions, buffer handling and bookkeeping are shared with
/// [`Er`].
///
/// # One iteration with replay
///
/// ```mermaid
/// graph TD
///     A[loss on incoming batch] -->|backward| B[grad_inc]
///     C[loss on replay batch] -->|backward| D[grad_re]
///     B --> E{dot_p < 0}
///     D --> E
///     E -->|yes| F[project grad_inc]
///     E -->|no| G[grad_inc]
///     F --> H[install and step]
///     G --> H
/// ```
pub struct Agem<P>
where
    P: SubModel1<Input = Tensor, Output = Tensor>,
    P::Config: DeserializeOwned + Serialize + OutDim + std::fmt::Debug + PartialEq + Clone,
{
    base: Er<P>,
    variant: AgemVariant,
    grad_inc: Option<Tensor>,
    grad_re: Option<Tensor>,
    installed: Option<Tensor>,
}

impl<P> Agem<P>
where
    P: SubModel1<Input = Tensor, Output = Tensor>,
    P::Config: DeserializeOwned + Serialize + OutDim + std::fmt::Debug + PartialEq + Clone,
{
    /// Constructs AGEM agent.
    ///
    /// The variant is selected by the method in `config`, which must be
    /// [`Method::Agem`] or [`Method::AgemPp`].
    pub fn build(config: AgentConfig<P>) -> Result<Self> {
        let variant = match config.method {
            Method::Agem => AgemVariant::Agem,
            Method::AgemPp => AgemVariant::AgemPp,
            Method::Er => bail!("AGEM agent cannot be built for method {:?}", config.method),
        };

        Ok(Self {
            base: Er::build(config)?,
            variant,
            grad_inc: None,
            grad_re: None,
            installed: None,
        })
    }

    /// Returns how gradients are combined.
    pub fn variant(&self) -> AgemVariant {
        self.variant
    }

    /// Returns the agent without gradient surgery sharing the classifier and buffer.
    pub fn base(&self) -> &Er<P> {
        &self.base
    }

    /// Flattened incoming gradient of the last iteration with replay.
    pub fn grad_inc(&self) -> Option<&Tensor> {
        self.grad_inc.as_ref()
    }

    /// Flattened replay gradient of the last iteration with replay.
    pub fn grad_re(&self) -> Option<&Tensor> {
        self.grad_re.as_ref()
    }

    /// Gradient vector installed on the model at the last iteration with replay.
    pub fn installed_grad(&self) -> Option<&Tensor> {
        self.installed.as_ref()
    }

    fn update(&mut self, x: &Tensor, y: &[u32]) -> Result<Record> {
        let mut record = Record::empty();

        let loss_inc = self.base.classifier.loss(x, y)?;
        let loss_inc_value = loss_inc.to_scalar::<f32>()?;
        trace!("loss_inc = {}", loss_inc_value);
        record.insert("loss_inc", RecordValue::Scalar(loss_inc_value));
        let mut grads = self.base.classifier.backward(&loss_inc)?;

        if self.base.rehearse() {
            let (x_re, y_re) = self.base.sample_replay()?;
            let classifier = &self.base.classifier;
            let layout = classifier.layout();

            // Each backward pass returns fresh gradients, so the incoming
            // gradient survives only in `grad_inc` from here on.
            let grad_inc = layout.flatten(&grads)?;
            let loss_re = classifier.loss(&x_re, &y_re)?;
            grads = classifier.backward(&loss_re)?;
            let grad_re = layout.flatten(&grads)?;

            let combined = combine(self.variant, &grad_inc, &grad_re)?;
            layout.restore(&mut grads, &combined.grad)?;

            let loss_re_value = loss_re.to_scalar::<f32>()?;
            trace!("loss_re = {}", loss_re_value);
            record.insert("loss_re", RecordValue::Scalar(loss_re_value));
            record.insert("dot_p", RecordValue::Scalar(combined.dot_p));
            record.insert(
                "projected",
                RecordValue::Scalar(if combined.projected { 1. } else { 0. }),
            );

            self.grad_inc = Some(grad_inc);
            self.grad_re = Some(grad_re);
            self.installed = Some(combined.grad);
        }

        self.base.classifier.step(&grads)?;

        Ok(record)
    }
}

impl<P> Agent for Agem<P>
where
    P: SubModel1<Input = Tensor, Output = Tensor>,
    P::Config: DeserializeOwned + Serialize + OutDim + std::fmt::Debug + PartialEq + Clone,
{
    type Input = TensorBatch;
    type Output = Tensor;

    fn train(&mut self) {
        self.base.train();
    }

    fn eval(&mut self) {
        self.base.eval();
    }

    fn is_train(&self) -> bool {
        self.base.is_train()
    }

    fn observe(&mut self, batch: IncomingBatch<TensorBatch>) -> Result<Record> {
        self.base.set_task(batch.task)?;
        let x = batch
            .x
            .as_tensor()?
            .to_device(self.base.classifier.device())?;

        let mut record = Record::empty();
        for _ in 0..self.base.n_iters {
            record = self.update(&x, &batch.y)?;
        }

        self.base.finish_step(batch, record)
    }

    fn predict(&self, x: &TensorBatch) -> Result<Tensor> {
        self.base.predict(x)
    }

    fn predict_labels(&self, x: &TensorBatch) -> Result<Vec<u32>> {
        self.base.predict_labels(x)
    }

    fn buffer_len(&self) -> usize {
        self.base.buffer_len()
    }

    fn buffer_n_bits(&self) -> usize {
        self.base.buffer_n_bits()
    }

    fn model_n_bits(&self) -> usize {
        self.base.model_n_bits()
    }

    fn save_params(&self, path: &Path) -> Result<()> {
        self.base.save_params(path)
    }

    fn load_params(&mut self, path: &Path) -> Result<()> {
        self.base.load_params(path)
    }
}
