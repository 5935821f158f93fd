//! Synthetic task streams.
use anyhow::{ensure, Result};
use candle_core::{Device, Tensor};
use log::info;
use ocl_candle_agent::TensorBatch;
use ocl_core::{LabeledBatch, TaskStream};
use rand::{rngs::StdRng, seq::SliceRandom, SeedableRng};
use rand_distr::{Distribution, Normal};
use serde::{Deserialize, Serialize};
use std::{
    fs::File,
    io::{BufReader, Write},
    path::Path,
};

/// Configuration of [`SplitGaussian`].
#[derive(Debug, Deserialize, Serialize, PartialEq, Clone)]
pub struct SplitGaussianConfig {
    /// Number of tasks.
    pub n_tasks: usize,

    /// Number of classes introduced by each task.
    pub classes_per_task: usize,

    /// Dimension of inputs.
    pub dim: usize,

    /// Number of examples per class in a task.
    pub n_per_class: usize,

    /// Number of examples in a batch.
    pub batch_size: usize,

    /// Distance scale of the class means from the origin.
    pub spread: f32,

    /// Standard deviation of the examples around their class mean.
    pub noise: f32,

    /// Seed of the class means.
    pub seed: u64,

    /// Seed of the examples.
    pub sample_seed: u64,
}

impl Default for SplitGaussianConfig {
    fn default() -> Self {
        Self {
            n_tasks: 5,
            classes_per_task: 2,
            dim: 16,
            n_per_class: 100,
            batch_size: 10,
            spread: 2.0,
            noise: 1.0,
            seed: 42,
            sample_seed: 0,
        }
    }
}

impl SplitGaussianConfig {
    /// Sets the number of tasks.
    pub fn n_tasks(mut self, v: usize) -> Self {
        self.n_tasks = v;
        self
    }

    /// Sets the number of classes per task.
    pub fn classes_per_task(mut self, v: usize) -> Self {
        self.classes_per_task = v;
        self
    }

    /// Sets the dimension of inputs.
    pub fn dim(mut self, v: usize) -> Self {
        self.dim = v;
        self
    }

    /// Sets the number of examples per class in a task.
    pub fn n_per_class(mut self, v: usize) -> Self {
        self.n_per_class = v;
        self
    }

    /// Sets the batch size.
    pub fn batch_size(mut self, v: usize) -> Self {
        self.batch_size = v;
        self
    }

    /// Sets the distance scale of the class means.
    pub fn spread(mut self, v: f32) -> Self {
        self.spread = v;
        self
    }

    /// Sets the standard deviation of examples.
    pub fn noise(mut self, v: f32) -> Self {
        self.noise = v;
        self
    }

    /// Sets the seed of the class means.
    pub fn seed(mut self, v: u64) -> Self {
        self.seed = v;
        self
    }

    /// Sets the seed of the examples.
    pub fn sample_seed(mut self, v: u64) -> Self {
        self.sample_seed = v;
        self
    }

    /// Total number of classes over the stream.
    pub fn n_classes(&self) -> usize {
        self.n_tasks * self.classes_per_task
    }

    /// Loads the configuration from a YAML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path_ = path.as_ref().to_owned();
        let file = File::open(path)?;
        let rdr = BufReader::new(file);
        let b = serde_yaml::from_reader(rdr)?;
        info!("Load config of stream from {:?}", path_);
        Ok(b)
    }

    /// Saves the configuration as a YAML file.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path_ = path.as_ref().to_owned();
        let mut file = File::create(path)?;
        file.write_all(serde_yaml::to_string(&self)?.as_bytes())?;
        info!("Save config of stream into {:?}", path_);
        Ok(())
    }
}

/// A class-incremental stream of Gaussian blobs.
///
/// Every class has a fixed mean drawn from the seed of the configuration.
/// Task `t` holds the classes `t * classes_per_task .. (t + 1) * classes_per_task`
/// with the examples shuffled across classes. Two streams sharing `seed` but
/// not `sample_seed` have the same classes and different examples, e.g. for
/// training and evaluation.
pub struct SplitGaussian {
    config: SplitGaussianConfig,
    means: Vec<Vec<f32>>,
}

impl SplitGaussian {
    /// Builds the stream.
    pub fn build(config: SplitGaussianConfig) -> Result<Self> {
        ensure!(config.batch_size > 0, "batch_size must be positive");
        let mut rng = StdRng::seed_from_u64(config.seed);
        let normal = Normal::new(0.0, config.spread)?;
        let means = (0..config.n_classes())
            .map(|_| (0..config.dim).map(|_| normal.sample(&mut rng)).collect())
            .collect();

        Ok(Self { config, means })
    }

    /// Returns the configuration.
    pub fn config(&self) -> &SplitGaussianConfig {
        &self.config
    }
}

impl TaskStream for SplitGaussian {
    type Input = TensorBatch;

    fn n_tasks(&self) -> usize {
        self.config.n_tasks
    }

    fn batches(&mut self, task: usize) -> Result<Vec<LabeledBatch<TensorBatch>>> {
        ensure!(task < self.config.n_tasks, "No task {} in the stream", task);
        let c = &self.config;
        let mut rng = StdRng::seed_from_u64(c.sample_seed.wrapping_add(task as u64));
        let normal = Normal::new(0.0, c.noise)?;

        let mut labels = (task * c.classes_per_task..(task + 1) * c.classes_per_task)
            .flat_map(|k| std::iter::repeat(k as u32).take(c.n_per_class))
            .collect::<Vec<_>>();
        labels.shuffle(&mut rng);

        labels
            .chunks(c.batch_size)
            .map(|y| -> Result<LabeledBatch<TensorBatch>> {
                let x = y
                    .iter()
                    .flat_map(|&k| self.means[k as usize].iter())
                    .map(|m| m + normal.sample(&mut rng))
                    .collect::<Vec<_>>();
                let x = Tensor::from_vec(x, (y.len(), c.dim), &Device::Cpu)?;
                Ok(LabeledBatch {
                    x: TensorBatch::from_tensor(x),
                    y: y.to_vec(),
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ocl_core::BatchBase;

    fn config() -> SplitGaussianConfig {
        SplitGaussianConfig::default()
            .n_tasks(3)
            .dim(4)
            .n_per_class(5)
            .batch_size(4)
    }

    #[test]
    fn test_batches_of_task() -> Result<()> {
        let mut stream = SplitGaussian::build(config())?;
        let batches = stream.batches(1)?;

        // 10 examples in batches of 4
        assert_eq!(batches.len(), 3);
        assert_eq!(batches[2].y.len(), 2);
        for b in batches.iter() {
            assert_eq!(b.x.len(), b.y.len());
            assert_eq!(b.x.as_tensor()?.dims()[1], 4);
            assert!(b.y.iter().all(|&y| y == 2 || y == 3));
        }
        assert!(stream.batches(3).is_err());
        Ok(())
    }

    #[test]
    fn test_streams_share_means() -> Result<()> {
        let s1 = SplitGaussian::build(config())?;
        let s2 = SplitGaussian::build(config().sample_seed(7))?;
        assert_eq!(s1.means, s2.means);

        let mut s1 = s1;
        let mut s2 = s2;
        let x1 = s1.batches(0)?.remove(0).x.into_tensor()?.to_vec2::<f32>()?;
        let x2 = s2.batches(0)?.remove(0).x.into_tensor()?.to_vec2::<f32>()?;
        assert_ne!(x1, x2);

        // same seeds, same examples
        let x3 = s1.batches(0)?.remove(0).x.into_tensor()?.to_vec2::<f32>()?;
        assert_eq!(x1, x3);
        Ok(())
    }

    #[test]
    fn test_negative_scale_is_rejected() -> Result<()> {
        assert!(SplitGaussian::build(config().spread(-1.0)).is_err());

        let mut stream = SplitGaussian::build(config().noise(-0.5))?;
        assert!(stream.batches(0).is_err());
        Ok(())
    }
}
