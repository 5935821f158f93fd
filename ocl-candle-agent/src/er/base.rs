//! Experience replay (ER) agent implemented with candle.
use crate::{
    classifier::Classifier, model::SubModel1, util::OutDim, AgentConfig, Device, TensorBatch,
};
use anyhow::Result;
use candle_core::Tensor;
use log::{info, trace};
use ocl_core::{
    error::OclError,
    record::{Record, RecordValue},
    Agent, ExperienceBufferBase, IncomingBatch, ReplayBufferBase, ReservoirBuffer,
};
use serde::{de::DeserializeOwned, Serialize};
use std::{fs, path::Path};

/// Name of the file holding the parameters of the classifier.
const PARAMS_FILE: &str = "classifier.safetensors";

/// Experience replay (ER) agent implemented with candle.
///
/// At every iteration, the incoming batch is concatenated with a batch
/// sampled from the reservoir buffer and one cross entropy loss is minimized
/// on the joint batch. The incoming examples are offered to the buffer after
/// the update.
///
/// Replay is skipped while the buffer is empty, and, unless the agent runs
/// task-free, during task 0.
///
/// `P` is the type parameter of the classifier network.
pub struct Er<P>
where
    P: SubModel1<Input = Tensor, Output = Tensor>,
    P::Config: DeserializeOwned + Serialize + OutDim + std::fmt::Debug + PartialEq + Clone,
{
    pub(crate) classifier: Classifier<P>,
    pub(crate) buffer: ReservoirBuffer<TensorBatch>,
    pub(crate) buffer_batch_size: usize,
    pub(crate) task_free: bool,
    pub(crate) n_iters: usize,
    pub(crate) record_verbose_level: usize,
    task: Option<usize>,
    train: bool,
}

impl<P> Er<P>
where
    P: SubModel1<Input = Tensor, Output = Tensor>,
    P::Config: DeserializeOwned + Serialize + OutDim + std::fmt::Debug + PartialEq + Clone,
{
    /// Constructs ER agent.
    pub fn build(config: AgentConfig<P>) -> Result<Self> {
        let device = config.device.unwrap_or(Device::Cpu).build()?;
        let classifier = Classifier::build(config.classifier_config, device)?;
        let buffer = ReservoirBuffer::build(&config.buffer_config);
        info!(
            "Build agent with {} parameters and a buffer of capacity {}",
            classifier.n_params(),
            buffer.capacity()
        );

        Ok(Self {
            classifier,
            buffer,
            buffer_batch_size: config.buffer_batch_size,
            task_free: config.task_free,
            n_iters: config.n_iters,
            record_verbose_level: config.record_verbose_level,
            task: None,
            train: true,
        })
    }

    /// Returns the task id of the last step, if any.
    pub fn task(&self) -> Option<usize> {
        self.task
    }

    /// Returns the classifier.
    pub fn classifier(&self) -> &Classifier<P> {
        &self.classifier
    }

    /// Returns the replay buffer.
    pub fn buffer(&self) -> &ReservoirBuffer<TensorBatch> {
        &self.buffer
    }

    /// Records the task id of the current step.
    pub(crate) fn set_task(&mut self, task: usize) -> Result<()> {
        if let Some(current) = self.task {
            if task < current {
                return Err(OclError::TaskIdDecreased {
                    current,
                    given: task,
                }
                .into());
            }
        }
        if self.task != Some(task) {
            info!("Start training on task {}", task);
        }
        self.task = Some(task);
        Ok(())
    }

    /// Returns `true` if the current step replays examples from the buffer.
    pub(crate) fn rehearse(&self) -> bool {
        !self.buffer.is_empty()
            && self.buffer_batch_size > 0
            && (self.task_free || self.task.map_or(false, |t| t > 0))
    }

    /// Samples inputs and labels from the buffer.
    pub(crate) fn sample_replay(&mut self) -> Result<(Tensor, Vec<u32>)> {
        let batch = self.buffer.sample(self.buffer_batch_size, None)?;
        let (x, y, _) = batch.unpack();
        let x = x.into_tensor()?.to_device(self.classifier.device())?;
        Ok((x, y))
    }

    /// Offers the incoming examples to the buffer and completes the record of the step.
    pub(crate) fn finish_step(
        &mut self,
        batch: IncomingBatch<TensorBatch>,
        record: Record,
    ) -> Result<Record> {
        self.buffer.push(batch)?;

        let mut record = record;
        record.insert("n_seen", RecordValue::Scalar(self.buffer.n_seen() as f32));
        if self.record_verbose_level >= 2 {
            record = record.merge(self.classifier.param_stats()?);
        }
        Ok(record)
    }

    fn update(&mut self, x: &Tensor, y: &[u32]) -> Result<Record> {
        let mut record = Record::empty();

        let loss = if self.rehearse() {
            let (x_re, y_re) = self.sample_replay()?;
            let n = y.len();
            let x_cat = Tensor::cat(&[x, &x_re], 0)?;
            let y_cat = [y, y_re.as_slice()].concat();
            let logits = self.classifier.forward(&x_cat)?;
            let loss = self.classifier.loss_from_logits(&logits, &y_cat)?;

            let logits = logits.detach();
            let loss_inc = self.classifier.loss_from_logits(&logits.narrow(0, 0, n)?, y)?;
            let loss_re = self
                .classifier
                .loss_from_logits(&logits.narrow(0, n, y_re.len())?, &y_re)?;
            record.insert("loss_inc", RecordValue::Scalar(loss_inc.to_scalar()?));
            record.insert("loss_re", RecordValue::Scalar(loss_re.to_scalar()?));
            loss
        } else {
            let loss = self.classifier.loss(x, y)?;
            record.insert("loss_inc", RecordValue::Scalar(loss.to_scalar()?));
            loss
        };

        let loss_value = loss.to_scalar::<f32>()?;
        trace!("loss = {}", loss_value);
        record.insert("loss", RecordValue::Scalar(loss_value));

        let grads = self.classifier.backward(&loss)?;
        self.classifier.step(&grads)?;

        Ok(record)
    }
}

impl<P> Agent for Er<P>
where
    P: SubModel1<Input = Tensor, Output = Tensor>,
    P::Config: DeserializeOwned + Serialize + OutDim + std::fmt::Debug + PartialEq + Clone,
{
    type Input = TensorBatch;
    type Output = Tensor;

    fn train(&mut self) {
        self.train = true;
    }

    fn eval(&mut self) {
        self.train = false;
    }

    fn is_train(&self) -> bool {
        self.train
    }

    fn observe(&mut self, batch: IncomingBatch<TensorBatch>) -> Result<Record> {
        self.set_task(batch.task)?;
        let x = batch.x.as_tensor()?.to_device(self.classifier.device())?;

        let mut record = Record::empty();
        for _ in 0..self.n_iters {
            record = self.update(&x, &batch.y)?;
        }

        self.finish_step(batch, record)
    }

    fn predict(&self, x: &TensorBatch) -> Result<Tensor> {
        Ok(self.classifier.forward(x.as_tensor()?)?.detach())
    }

    fn predict_labels(&self, x: &TensorBatch) -> Result<Vec<u32>> {
        self.classifier.predict_labels(x.as_tensor()?)
    }

    fn buffer_len(&self) -> usize {
        self.buffer.len()
    }

    fn buffer_n_bits(&self) -> usize {
        self.buffer.n_bits()
    }

    fn model_n_bits(&self) -> usize {
        self.classifier.n_params() * 32
    }

    /// Save model parameters in the given directory.
    ///
    /// The parameters of the classifier are saved as `classifier.safetensors`.
    fn save_params(&self, path: &Path) -> Result<()> {
        fs::create_dir_all(path)?;
        self.classifier.save(path.join(PARAMS_FILE))
    }

    /// Load model parameters in the given directory.
    fn load_params(&mut self, path: &Path) -> Result<()> {
        self.classifier.load(path.join(PARAMS_FILE))
    }
}
