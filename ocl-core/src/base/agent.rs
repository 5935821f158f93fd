//! Agent.
use super::IncomingBatch;
use crate::record::Record;
use anyhow::Result;
use std::path::Path;

/// Represents a classifier trained online on a stream of tasks.
///
/// An agent owns its model, optimizer and replay buffer. The outer training
/// loop hands it one minibatch at a time through [`Agent::observe`]; the agent
/// decides how the incoming data and replayed data are combined into a single
/// parameter update, then offers the incoming examples to its buffer.
pub trait Agent {
    /// A batch of inputs.
    type Input;

    /// Output of the model for a batch of inputs, typically logits.
    type Output;

    /// Set the agent to training mode.
    fn train(&mut self);

    /// Set the agent to evaluation mode.
    fn eval(&mut self);

    /// Return if it is in training mode.
    fn is_train(&self) -> bool;

    /// Performs one training step on an incoming minibatch.
    ///
    /// The task id of `batch` becomes the current task of the agent. Task ids
    /// must be non-decreasing over a run; a smaller task id than the one of
    /// the previous step is rejected with
    /// [`OclError::TaskIdDecreased`](crate::error::OclError::TaskIdDecreased).
    ///
    /// The returned record holds diagnostics of the step, e.g. loss values.
    fn observe(&mut self, batch: IncomingBatch<Self::Input>) -> Result<Record>;

    /// Computes the output of the model without touching the buffer or the optimizer.
    fn predict(&self, x: &Self::Input) -> Result<Self::Output>;

    /// Returns the predicted class of each input in the batch.
    fn predict_labels(&self, x: &Self::Input) -> Result<Vec<u32>>;

    /// Number of examples currently held in the replay buffer.
    fn buffer_len(&self) -> usize;

    /// Estimated size of the buffer contents in bits.
    fn buffer_n_bits(&self) -> usize;

    /// Size of the model parameters in bits.
    fn model_n_bits(&self) -> usize;

    /// Save the parameters of the agent in the given directory.
    fn save_params(&self, path: &Path) -> Result<()>;

    /// Load the parameters of the agent from the given directory.
    fn load_params(&mut self, path: &Path) -> Result<()>;
}
