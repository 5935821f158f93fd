//! Classifier trained by continual learning agents.
mod base;
mod config;
pub use base::Classifier;
pub use config::ClassifierConfig;
