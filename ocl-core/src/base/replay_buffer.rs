//! Replay buffer interface for continual learning.
//!
//! This module defines the interfaces of buffers retaining past examples.
//! A buffer is filled with incoming minibatches and replays stored examples
//! to the agent, which mixes them into its updates to mitigate catastrophic
//! forgetting.
use anyhow::Result;

/// Interface for buffers that store examples from the training stream.
///
/// # Examples
///
/// ```ignore
/// struct SimpleBuffer<T> {
///     items: Vec<T>,
/// }
///
/// impl<T> ExperienceBufferBase for SimpleBuffer<T> {
///     type Item = T;
///
///     fn push(&mut self, tr: T) -> Result<()> {
///         self.items.push(tr);
///         Ok(())
///     }
///
///     fn len(&self) -> usize {
///         self.items.len()
///     }
/// }
/// ```
pub trait ExperienceBufferBase {
    /// The type of items pushed into the buffer.
    type Item;

    /// Offers the examples of `tr` to the buffer.
    ///
    /// Depending on the insertion policy, an offered example may be discarded.
    fn push(&mut self, tr: Self::Item) -> Result<()>;

    /// Returns the current number of examples in the buffer.
    fn len(&self) -> usize;

    /// Returns `true` if the buffer holds no example.
    ///
    /// Callers must skip replay-dependent logic in this case.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Interface for replay buffers that generate batches for training.
pub trait ReplayBufferBase {
    /// Configuration parameters for the replay buffer.
    type Config: Clone;

    /// The type of batch generated for training.
    type Batch;

    /// Builds a new replay buffer from the given configuration.
    fn build(config: &Self::Config) -> Self;

    /// Samples a batch of at most `size` stored examples.
    ///
    /// If `exclude_task` is given, examples of that task are never returned.
    ///
    /// # Errors
    ///
    /// Sampling from an empty buffer is a precondition violation and fails.
    fn sample(&mut self, size: usize, exclude_task: Option<usize>) -> Result<Self::Batch>;
}
