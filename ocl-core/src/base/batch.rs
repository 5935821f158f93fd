//! Batches of examples.
use anyhow::Result;

/// Column storage for the inputs of examples.
///
/// A replay buffer keeps the inputs of all stored examples in one value of a
/// type implementing this trait, created with a fixed capacity, and writes or
/// reads individual rows of it. The same type is used for batches taken from
/// the buffer.
pub trait BatchBase: Sized {
    /// Builds storage with a capacity.
    fn new(capacity: usize) -> Self;

    /// Copies row `src` of `data` into row `dest` of `self`.
    ///
    /// `dest` is at most the number of rows written so far, so a storage may
    /// grow lazily.
    fn set(&mut self, dest: usize, data: &Self, src: usize) -> Result<()>;

    /// Takes the rows at the given indices.
    fn sample(&self, ixs: &[usize]) -> Result<Self>;

    /// Returns the number of rows held in a batch.
    fn len(&self) -> usize;

    /// Returns the size of one row in bits.
    fn row_bits(&self) -> usize;
}

/// A minibatch handed to [`Agent::observe`](crate::Agent::observe).
///
/// All examples of an incoming batch share the task id `task`.
#[derive(Clone, Debug)]
pub struct IncomingBatch<X> {
    /// Inputs.
    pub x: X,

    /// Class labels.
    pub y: Vec<u32>,

    /// Task id.
    pub task: usize,
}

impl<X> IncomingBatch<X> {
    /// Constructs an incoming batch.
    pub fn new(x: X, y: Vec<u32>, task: usize) -> Self {
        Self { x, y, task }
    }

    /// Returns the number of examples.
    pub fn len(&self) -> usize {
        self.y.len()
    }

    /// Returns `true` if the batch has no example.
    pub fn is_empty(&self) -> bool {
        self.y.is_empty()
    }
}

/// A batch of examples `(input, label, task_id)`, e.g. sampled from a replay buffer.
#[derive(Clone, Debug)]
pub struct ExampleBatch<X> {
    /// Inputs.
    pub x: X,

    /// Class labels.
    pub y: Vec<u32>,

    /// Task id of each example.
    pub task: Vec<usize>,
}

impl<X> ExampleBatch<X> {
    /// Returns the number of examples.
    pub fn len(&self) -> usize {
        self.y.len()
    }

    /// Returns `true` if the batch has no example.
    pub fn is_empty(&self) -> bool {
        self.y.is_empty()
    }

    /// Unpack the data `(x, y, task)`.
    pub fn unpack(self) -> (X, Vec<u32>, Vec<usize>) {
        (self.x, self.y, self.task)
    }
}

/// A batch of inputs and labels without task information, as produced by a
/// [`TaskStream`](crate::TaskStream).
#[derive(Clone, Debug)]
pub struct LabeledBatch<X> {
    /// Inputs.
    pub x: X,

    /// Class labels.
    pub y: Vec<u32>,
}

impl<X> LabeledBatch<X> {
    /// Tags the batch with a task id.
    pub fn with_task(self, task: usize) -> IncomingBatch<X> {
        IncomingBatch::new(self.x, self.y, task)
    }
}
