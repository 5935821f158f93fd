#![warn(missing_docs)]
//! Core components for online continual learning.
//!
//! A classifier is trained on a stream of minibatches tagged with task ids.
//! An [`Agent`] decides, at every minibatch, how incoming data and examples
//! replayed from a [`ReservoirBuffer`] are combined into a parameter update.
//! This crate is independent of any tensor backend: agents and input storage
//! are provided by backend crates such as `ocl-candle-agent`.
pub mod error;
pub mod record;

mod base;
pub use base::{
    Agent, BatchBase, ExampleBatch, ExperienceBufferBase, IncomingBatch, LabeledBatch,
    ReplayBufferBase, TaskStream,
};

mod reservoir_buffer;
pub use reservoir_buffer::{ReservoirBuffer, ReservoirBufferConfig};

mod evaluator;
pub use evaluator::{avg_accuracy, avg_forgetting, Evaluator};

mod trainer;
pub use trainer::{Trainer, TrainerConfig};
