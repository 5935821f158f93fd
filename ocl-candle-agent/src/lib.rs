//! Continual learning agents implemented with [candle](https://crates.io/crates/candle-core).
//!
//! * [`er::Er`] trains on the incoming batch concatenated with a batch replayed
//!   from a reservoir buffer.
//! * [`agem::Agem`] computes the gradients of incoming and replayed data
//!   separately and projects the incoming gradient when the two conflict.
//!   Its AGEM++ variant adds the replay gradient back to the projected one.
//!
//! [`method::ContinualAgent`] wraps the closed set of methods behind one type
//! selected by [`method::Method`] in the agent configuration.
pub mod agem;
pub mod classifier;
mod config;
pub mod er;
pub mod grad;
pub mod method;
pub mod mlp;
pub mod model;
pub mod opt;
mod tensor_batch;
pub mod util;
pub use config::AgentConfig;
use serde::{Deserialize, Serialize};
pub use tensor_batch::TensorBatch;

#[derive(Clone, Debug, Copy, Deserialize, Serialize, PartialEq)]
/// Device for using candle.
///
/// This enum is added because [`candle_core::Device`] does not support serialization.
pub enum Device {
    /// The main CPU device.
    Cpu,

    /// A GPU device with CUDA.
    Cuda(usize),

    /// A GPU device with Metal.
    Metal(usize),
}

impl From<&candle_core::Device> for Device {
    fn from(device: &candle_core::Device) -> Self {
        match device.location() {
            candle_core::DeviceLocation::Cpu => Self::Cpu,
            candle_core::DeviceLocation::Cuda { gpu_id } => Self::Cuda(gpu_id),
            candle_core::DeviceLocation::Metal { gpu_id } => Self::Metal(gpu_id),
        }
    }
}

impl Device {
    /// Opens the corresponding [`candle_core::Device`].
    pub fn build(self) -> candle_core::Result<candle_core::Device> {
        match self {
            Self::Cpu => Ok(candle_core::Device::Cpu),
            Self::Cuda(n) => candle_core::Device::new_cuda(n),
            Self::Metal(n) => candle_core::Device::new_metal(n),
        }
    }
}
