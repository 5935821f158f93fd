//! Online continual learning in Rust.
//!
//! This crate collects the following crates and a synthetic task stream for
//! running them end to end:
//!
//! * [ocl-core](https://crates.io/crates/ocl-core) provides traits and data
//!   structures independent of tensor backends: the agent contract, the
//!   reservoir replay buffer, records, the task-stream trainer and evaluator.
//! * [ocl-candle-agent](https://crates.io/crates/ocl-candle-agent) includes
//!   experience replay (ER), AGEM and AGEM++ agents based on
//!   [candle](https://crates.io/crates/candle-core).
//!
//! The `split_gaussian` example trains an agent of the chosen method on
//! [`stream::SplitGaussian`].
pub use ocl_candle_agent as candle_agent;
pub use ocl_core as core;
pub mod stream;
