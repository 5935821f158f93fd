//! Reservoir replay buffer.
use super::ReservoirBufferConfig;
use crate::{
    error::OclError, BatchBase, ExampleBatch, ExperienceBufferBase, IncomingBatch,
    ReplayBufferBase,
};
use anyhow::{ensure, Result};
use rand::{rngs::StdRng, seq::index, Rng, SeedableRng};

/// Bits used to account for a label and a task id of a stored example.
const LABEL_TASK_BITS: usize = 2 * 32;

/// A fixed-capacity store of past examples with reservoir insertion.
///
/// While the buffer is not full, offered examples are appended. Once it is
/// full, the `n`-th offered example replaces a uniformly random slot with
/// probability `capacity / n` and is discarded otherwise. At any point the
/// buffer therefore holds a uniform random sample of the stream seen so far.
///
/// The buffer is never cleared. Sampling draws without replacement.
pub struct ReservoirBuffer<X>
where
    X: BatchBase,
{
    /// Maximum number of examples that can be stored.
    capacity: usize,

    /// Number of examples ever offered to the buffer.
    n_seen: usize,

    /// Current number of stored examples.
    size: usize,

    /// Storage for inputs.
    x: X,

    /// Storage for labels.
    y: Vec<u32>,

    /// Storage for task ids.
    task: Vec<usize>,

    rng: StdRng,
}

impl<X> ReservoirBuffer<X>
where
    X: BatchBase,
{
    /// Offers one example, row `row` of `data`, to the buffer.
    ///
    /// Returns the slot the example was written to, or `None` if it was
    /// discarded. The count of offered examples is incremented in both cases.
    pub fn add(&mut self, data: &X, row: usize, label: u32, task: usize) -> Result<Option<usize>> {
        self.n_seen += 1;

        let slot = if self.size < self.capacity {
            Some(self.size)
        } else {
            let j = self.rng.gen_range(0..self.n_seen);
            if j < self.capacity {
                Some(j)
            } else {
                None
            }
        };

        if let Some(slot) = slot {
            self.x.set(slot, data, row)?;
            self.y[slot] = label;
            self.task[slot] = task;
            if slot == self.size {
                self.size += 1;
            }
        }

        Ok(slot)
    }

    /// Returns the capacity of the buffer.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Returns the number of examples ever offered to the buffer.
    pub fn n_seen(&self) -> usize {
        self.n_seen
    }

    /// Returns the labels of the stored examples.
    pub fn labels(&self) -> &[u32] {
        &self.y[..self.size]
    }

    /// Returns the task ids of the stored examples.
    pub fn tasks(&self) -> &[usize] {
        &self.task[..self.size]
    }

    /// Estimated size of the stored examples in bits.
    ///
    /// This is the number of stored examples times the size of an input row
    /// plus a label and a task id.
    pub fn n_bits(&self) -> usize {
        match self.size {
            0 => 0,
            n => n * (self.x.row_bits() + LABEL_TASK_BITS),
        }
    }
}

impl<X> ExperienceBufferBase for ReservoirBuffer<X>
where
    X: BatchBase,
{
    type Item = IncomingBatch<X>;

    fn len(&self) -> usize {
        self.size
    }

    /// Offers every example of the batch, one at a time in batch order.
    fn push(&mut self, tr: Self::Item) -> Result<()> {
        ensure!(
            tr.x.len() == tr.y.len(),
            "Inputs and labels differ in length: {} vs {}",
            tr.x.len(),
            tr.y.len()
        );

        for (row, &label) in tr.y.iter().enumerate() {
            self.add(&tr.x, row, label, tr.task)?;
        }

        Ok(())
    }
}

impl<X> ReplayBufferBase for ReservoirBuffer<X>
where
    X: BatchBase,
{
    type Config = ReservoirBufferConfig;
    type Batch = ExampleBatch<X>;

    fn build(config: &Self::Config) -> Self {
        let capacity = config.capacity();

        Self {
            capacity,
            n_seen: 0,
            size: 0,
            x: X::new(capacity),
            y: vec![0; capacity],
            task: vec![0; capacity],
            rng: StdRng::seed_from_u64(config.seed),
        }
    }

    /// Draws `min(size, n)` distinct examples uniformly at random, where `n`
    /// is the number of eligible stored examples.
    fn sample(&mut self, size: usize, exclude_task: Option<usize>) -> Result<Self::Batch> {
        if self.size == 0 {
            return Err(OclError::EmptyBuffer.into());
        }

        let candidates = match exclude_task {
            None => (0..self.size).collect::<Vec<_>>(),
            Some(t) => {
                let ixs = (0..self.size)
                    .filter(|&i| self.task[i] != t)
                    .collect::<Vec<_>>();
                if ixs.is_empty() {
                    return Err(OclError::NoEligibleExamples { task: t }.into());
                }
                ixs
            }
        };

        let amount = size.min(candidates.len());
        let ixs = index::sample(&mut self.rng, candidates.len(), amount)
            .into_iter()
            .map(|i| candidates[i])
            .collect::<Vec<_>>();

        Ok(ExampleBatch {
            x: self.x.sample(&ixs)?,
            y: ixs.iter().map(|&i| self.y[i]).collect(),
            task: ixs.iter().map(|&i| self.task[i]).collect(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    /// Rows of `f32` vectors.
    struct Rows(Vec<Vec<f32>>);

    impl BatchBase for Rows {
        fn new(capacity: usize) -> Self {
            Self(Vec::with_capacity(capacity))
        }

        fn set(&mut self, dest: usize, data: &Self, src: usize) -> Result<()> {
            let row = data.0[src].clone();
            if dest == self.0.len() {
                self.0.push(row);
            } else {
                self.0[dest] = row;
            }
            Ok(())
        }

        fn sample(&self, ixs: &[usize]) -> Result<Self> {
            Ok(Self(ixs.iter().map(|&i| self.0[i].clone()).collect()))
        }

        fn len(&self) -> usize {
            self.0.len()
        }

        fn row_bits(&self) -> usize {
            self.0.first().map_or(0, |r| r.len() * 32)
        }
    }

    fn batch(ids: std::ops::Range<u32>, task: usize) -> IncomingBatch<Rows> {
        let x = Rows(ids.clone().map(|i| vec![i as f32; 3]).collect());
        IncomingBatch::new(x, ids.collect(), task)
    }

    fn buffer(per_class_budget: usize, n_classes: usize, seed: u64) -> ReservoirBuffer<Rows> {
        let config = ReservoirBufferConfig::default()
            .per_class_budget(per_class_budget)
            .n_classes(n_classes)
            .seed(seed);
        ReservoirBuffer::build(&config)
    }

    #[test]
    fn test_size_never_exceeds_capacity() -> Result<()> {
        let mut buffer = buffer(3, 2, 0);
        for i in 0..50 {
            buffer.push(batch(i * 4..i * 4 + 4, i as usize / 10))?;
            assert!(buffer.len() <= 6);
        }
        assert_eq!(buffer.len(), 6);
        assert_eq!(buffer.n_seen(), 200);
        Ok(())
    }

    #[test]
    fn test_fill_without_eviction() -> Result<()> {
        let mut buffer = buffer(2, 2, 0);
        buffer.push(batch(0..2, 0))?;
        buffer.push(batch(2..4, 0))?;
        assert_eq!(buffer.len(), 4);
        assert_eq!(buffer.n_seen(), 4);
        assert_eq!(buffer.labels(), &[0, 1, 2, 3]);
        assert_eq!(buffer.tasks(), &[0, 0, 0, 0]);
        assert_eq!(buffer.x.0[3], vec![3.0; 3]);
        Ok(())
    }

    #[test]
    fn test_zero_budget_stays_empty() -> Result<()> {
        let mut buffer = buffer(0, 10, 0);
        buffer.push(batch(0..10, 0))?;
        assert!(buffer.is_empty());
        assert_eq!(buffer.n_seen(), 10);
        assert_eq!(buffer.n_bits(), 0);
        Ok(())
    }

    #[test]
    fn test_sample_from_empty_buffer_fails() {
        let mut buffer = buffer(2, 2, 0);
        let err = buffer.sample(1, None).err().unwrap();
        assert_eq!(err.downcast_ref::<OclError>(), Some(&OclError::EmptyBuffer));
    }

    #[test]
    fn test_sample_without_replacement() -> Result<()> {
        let mut buffer = buffer(5, 2, 1);
        buffer.push(batch(0..6, 0))?;

        let b = buffer.sample(4, None)?;
        assert_eq!(b.len(), 4);
        assert_eq!(b.x.len(), 4);
        let ys = b.y.iter().collect::<HashSet<_>>();
        assert_eq!(ys.len(), 4);
        for (x, y) in b.x.0.iter().zip(b.y.iter()) {
            assert_eq!(x[0], *y as f32);
        }

        // Asking for more than stored returns everything once.
        let b = buffer.sample(100, None)?;
        assert_eq!(b.len(), 6);
        assert_eq!(b.y.iter().collect::<HashSet<_>>().len(), 6);
        Ok(())
    }

    #[test]
    fn test_sample_excluding_task() -> Result<()> {
        let mut buffer = buffer(5, 2, 1);
        buffer.push(batch(0..3, 0))?;
        buffer.push(batch(3..5, 1))?;

        let b = buffer.sample(10, Some(0))?;
        assert_eq!(b.len(), 2);
        assert!(b.task.iter().all(|&t| t == 1));

        let mut buffer = self::buffer(5, 2, 1);
        buffer.push(batch(0..3, 0))?;
        let err = buffer.sample(10, Some(0)).err().unwrap();
        assert_eq!(
            err.downcast_ref::<OclError>(),
            Some(&OclError::NoEligibleExamples { task: 0 })
        );
        Ok(())
    }

    #[test]
    fn test_inclusion_probability_is_uniform() -> Result<()> {
        const CAPACITY: usize = 5;
        const N: u32 = 20;
        const N_RUNS: u64 = 2000;

        let mut counts = vec![0usize; N as usize];
        for seed in 0..N_RUNS {
            let mut buffer = buffer(CAPACITY, 1, seed);
            for i in 0..N {
                buffer.push(batch(i..i + 1, (i / 5) as usize))?;
            }
            for &y in buffer.labels() {
                counts[y as usize] += 1;
            }
        }

        let expected = CAPACITY as f32 / N as f32;
        for c in counts {
            let p = c as f32 / N_RUNS as f32;
            assert!((p - expected).abs() < 0.05, "p = {}, expected = {}", p, expected);
        }
        Ok(())
    }

    #[test]
    fn test_n_bits() -> Result<()> {
        let mut buffer = buffer(2, 2, 0);
        buffer.push(batch(0..3, 0))?;
        assert_eq!(buffer.n_bits(), 3 * (3 * 32 + 64));
        Ok(())
    }
}
