//! Replay buffer with reservoir insertion.
//!
//! [`ReservoirBuffer`] keeps a uniform random sample of every example offered
//! to it, whatever the task boundaries of the stream are. Inputs are stored in
//! a user-provided [`BatchBase`](crate::BatchBase) while labels and task ids
//! are kept in plain vectors.
//!
//! # Examples
//!
//! ```ignore
//! let config = ReservoirBufferConfig::default()
//!     .per_class_budget(20)
//!     .n_classes(10)
//!     .seed(42);
//! let mut buffer = ReservoirBuffer::<TensorBatch>::build(&config);
//!
//! buffer.push(IncomingBatch::new(x, y, task))?;
//! let batch = buffer.sample(10, None)?;
//! ```
mod base;
mod config;
pub use base::ReservoirBuffer;
pub use config::ReservoirBufferConfig;
