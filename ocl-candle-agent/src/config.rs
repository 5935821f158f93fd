//! Configuration of continual learning agents.
use crate::{classifier::ClassifierConfig, method::Method, model::SubModel1, util::OutDim, Device};
use anyhow::Result;
use candle_core::Tensor;
use log::info;
use ocl_core::ReservoirBufferConfig;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::{
    fs::File,
    io::{BufReader, Write},
    marker::PhantomData,
    path::Path,
};

/// Configuration of [`Er`](crate::er::Er) and [`Agem`](crate::agem::Agem) agents.
///
/// `P` is the type parameter of the classifier network.
#[derive(Deserialize, Serialize)]
pub struct AgentConfig<P>
where
    P: SubModel1<Input = Tensor, Output = Tensor>,
    P::Config: DeserializeOwned + Serialize + OutDim + std::fmt::Debug + PartialEq + Clone,
{
    /// Continual learning method.
    pub method: Method,

    /// Configuration of the classifier.
    pub classifier_config: ClassifierConfig<P::Config>,

    /// Configuration of the replay buffer.
    pub buffer_config: ReservoirBufferConfig,

    /// Number of examples replayed at every iteration.
    pub buffer_batch_size: usize,

    /// If `true`, replay starts at the first step regardless of the task id.
    pub task_free: bool,

    /// Number of optimization iterations on each incoming batch.
    pub n_iters: usize,

    /// Device of the classifier. The CPU is used if not given.
    pub device: Option<Device>,

    /// Parameter statistics are added to the records of `observe` if `>= 2`.
    pub record_verbose_level: usize,

    #[serde(skip)]
    pub phantom: PhantomData<P>,
}

impl<P> Clone for AgentConfig<P>
where
    P: SubModel1<Input = Tensor, Output = Tensor>,
    P::Config: DeserializeOwned + Serialize + OutDim + std::fmt::Debug + PartialEq + Clone,
{
    fn clone(&self) -> Self {
        Self {
            method: self.method,
            classifier_config: self.classifier_config.clone(),
            buffer_config: self.buffer_config.clone(),
            buffer_batch_size: self.buffer_batch_size,
            task_free: self.task_free,
            n_iters: self.n_iters,
            device: self.device,
            record_verbose_level: self.record_verbose_level,
            phantom: PhantomData,
        }
    }
}

impl<P> PartialEq for AgentConfig<P>
where
    P: SubModel1<Input = Tensor, Output = Tensor>,
    P::Config: DeserializeOwned + Serialize + OutDim + std::fmt::Debug + PartialEq + Clone,
{
    fn eq(&self, other: &Self) -> bool {
        self.method == other.method
            && self.classifier_config == other.classifier_config
            && self.buffer_config == other.buffer_config
            && self.buffer_batch_size == other.buffer_batch_size
            && self.task_free == other.task_free
            && self.n_iters == other.n_iters
            && self.device == other.device
            && self.record_verbose_level == other.record_verbose_level
    }
}

impl<P> std::fmt::Debug for AgentConfig<P>
where
    P: SubModel1<Input = Tensor, Output = Tensor>,
    P::Config: DeserializeOwned + Serialize + OutDim + std::fmt::Debug + PartialEq + Clone,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AgentConfig")
            .field("method", &self.method)
            .field("classifier_config", &self.classifier_config)
            .field("buffer_config", &self.buffer_config)
            .field("buffer_batch_size", &self.buffer_batch_size)
            .field("task_free", &self.task_free)
            .field("n_iters", &self.n_iters)
            .field("device", &self.device)
            .field("record_verbose_level", &self.record_verbose_level)
            .finish()
    }
}

impl<P> Default for AgentConfig<P>
where
    P: SubModel1<Input = Tensor, Output = Tensor>,
    P::Config: DeserializeOwned + Serialize + OutDim + std::fmt::Debug + PartialEq + Clone,
{
    fn default() -> Self {
        Self {
            method: Method::Er,
            classifier_config: Default::default(),
            buffer_config: Default::default(),
            buffer_batch_size: 10,
            task_free: false,
            n_iters: 1,
            device: None,
            record_verbose_level: 0,
            phantom: PhantomData,
        }
    }
}

impl<P> AgentConfig<P>
where
    P: SubModel1<Input = Tensor, Output = Tensor>,
    P::Config: DeserializeOwned + Serialize + OutDim + std::fmt::Debug + PartialEq + Clone,
{
    /// Sets the continual learning method.
    pub fn method(mut self, v: Method) -> Self {
        self.method = v;
        self
    }

    /// Sets the configuration of the classifier.
    pub fn classifier_config(mut self, v: ClassifierConfig<P::Config>) -> Self {
        self.classifier_config = v;
        self
    }

    /// Sets the configuration of the replay buffer.
    pub fn buffer_config(mut self, v: ReservoirBufferConfig) -> Self {
        self.buffer_config = v;
        self
    }

    /// Sets the number of replayed examples per iteration.
    pub fn buffer_batch_size(mut self, v: usize) -> Self {
        self.buffer_batch_size = v;
        self
    }

    /// Sets task-free mode.
    pub fn task_free(mut self, v: bool) -> Self {
        self.task_free = v;
        self
    }

    /// Sets the number of iterations per incoming batch.
    pub fn n_iters(mut self, v: usize) -> Self {
        self.n_iters = v;
        self
    }

    /// Sets device.
    pub fn device(mut self, device: &candle_core::Device) -> Self {
        self.device = Some(device.into());
        self
    }

    /// Sets the verbose level of records.
    pub fn record_verbose_level(mut self, v: usize) -> Self {
        self.record_verbose_level = v;
        self
    }

    /// Loads [`AgentConfig`] from YAML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path_ = path.as_ref().to_owned();
        let file = File::open(path)?;
        let rdr = BufReader::new(file);
        let b = serde_yaml::from_reader(rdr)?;
        info!("Load config of agent from {:?}", path_);
        Ok(b)
    }

    /// Saves [`AgentConfig`] to YAML file.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path_ = path.as_ref().to_owned();
        let mut file = File::create(path)?;
        file.write_all(serde_yaml::to_string(&self)?.as_bytes())?;
        info!("Save config of agent into {:?}", path_);
        Ok(())
    }
}
