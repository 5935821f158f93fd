//! Configuration of [`ReservoirBuffer`](super::ReservoirBuffer).
use anyhow::Result;
use log::info;
use serde::{Deserialize, Serialize};
use std::{
    default::Default,
    fs::File,
    io::{BufReader, Write},
    path::Path,
};

/// Configuration of [`ReservoirBuffer`](super::ReservoirBuffer).
///
/// The capacity of the buffer is `per_class_budget * n_classes`. A budget of
/// zero gives a buffer that stays empty for the whole run, which is how a
/// setting without replay is expressed.
///
/// # Examples
///
/// ```rust
/// use ocl_core::ReservoirBufferConfig;
///
/// let config = ReservoirBufferConfig::default()
///     .per_class_budget(20)
///     .n_classes(10)
///     .seed(42);
/// assert_eq!(config.capacity(), 200);
/// ```
#[derive(Debug, Deserialize, Serialize, PartialEq, Clone)]
pub struct ReservoirBufferConfig {
    /// Number of slots per class.
    pub per_class_budget: usize,

    /// Number of classes over the whole stream.
    pub n_classes: usize,

    /// Random seed used for insertion and sampling.
    pub seed: u64,
}

impl Default for ReservoirBufferConfig {
    fn default() -> Self {
        Self {
            per_class_budget: 20,
            n_classes: 10,
            seed: 42,
        }
    }
}

impl ReservoirBufferConfig {
    /// Sets the number of slots per class.
    pub fn per_class_budget(mut self, per_class_budget: usize) -> Self {
        self.per_class_budget = per_class_budget;
        self
    }

    /// Sets the number of classes.
    pub fn n_classes(mut self, n_classes: usize) -> Self {
        self.n_classes = n_classes;
        self
    }

    /// Sets the random seed.
    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Returns the capacity of the buffer.
    pub fn capacity(&self) -> usize {
        self.per_class_budget * self.n_classes
    }

    /// Loads the configuration from a YAML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path_ = path.as_ref().to_owned();
        let file = File::open(path)?;
        let rdr = BufReader::new(file);
        let b = serde_yaml::from_reader(rdr)?;
        info!("Load config of reservoir buffer from {:?}", path_);
        Ok(b)
    }

    /// Saves the configuration to a YAML file.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path_ = path.as_ref().to_owned();
        let mut file = File::create(path)?;
        file.write_all(serde_yaml::to_string(&self)?.as_bytes())?;
        info!("Save config of reservoir buffer into {:?}", path_);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempdir::TempDir;

    #[test]
    fn test_serde_reservoir_buffer_config() -> Result<()> {
        let config = ReservoirBufferConfig::default()
            .per_class_budget(5)
            .n_classes(100)
            .seed(7);

        let dir = TempDir::new("reservoir_buffer_config")?;
        let path = dir.path().join("reservoir_buffer_config.yaml");
        config.save(&path)?;
        let config_ = ReservoirBufferConfig::load(&path)?;
        assert_eq!(config, config_);
        assert_eq!(config_.capacity(), 500);
        Ok(())
    }
}
