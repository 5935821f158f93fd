//! Experience replay (ER) agent.
mod base;
pub use base::Er;
