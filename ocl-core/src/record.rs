//! Types and traits for recording diagnostics and evaluation results.
//!
//! Agents return a [`Record`] from every training step, and the
//! [`Trainer`](crate::Trainer) hands records of steps and evaluations to a
//! [`Recorder`].
//!
//! # Basic Usage
//!
//! ```rust
//! use ocl_core::record::{Record, RecordValue};
//!
//! // following values are obtained with some process in reality
//! let loss_inc = 0.7f32;
//! let accs = vec![91f32, 85.0, 78.0];
//!
//! let mut record = Record::empty();
//! record.insert("loss_inc", RecordValue::Scalar(loss_inc));
//! record.insert("accs", RecordValue::Array1(accs));
//! ```
mod base;
mod buffered_recorder;
mod log_recorder;
mod recorder;

pub use base::{Record, RecordValue};
pub use buffered_recorder::BufferedRecorder;
pub use log_recorder::LogRecorder;
pub use recorder::Recorder;
