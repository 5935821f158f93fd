//! Core functionalities.
mod agent;
mod batch;
mod replay_buffer;
mod stream;
pub use agent::Agent;
pub use batch::{BatchBase, ExampleBatch, IncomingBatch, LabeledBatch};
pub use replay_buffer::{ExperienceBufferBase, ReplayBufferBase};
pub use stream::TaskStream;
