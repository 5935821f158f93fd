//! Averaged gradient episodic memory (AGEM) agent and its AGEM++ variant.
mod base;
pub use base::{combine, Agem, AgemVariant, Combined};
