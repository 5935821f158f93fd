//! Task streams.
use super::LabeledBatch;
use anyhow::Result;

/// A source of minibatches split into tasks.
///
/// Implementations are provided by the user: dataset loading and task
/// sampling are outside of this library.
pub trait TaskStream {
    /// A batch of inputs.
    type Input;

    /// The number of tasks in the stream.
    fn n_tasks(&self) -> usize;

    /// Returns the minibatches of a task in the order they are presented.
    fn batches(&mut self, task: usize) -> Result<Vec<LabeledBatch<Self::Input>>>;
}
