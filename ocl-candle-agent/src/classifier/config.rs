use crate::{opt::OptimizerConfig, util::OutDim};
use anyhow::Result;
use log::info;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::{
    fs::File,
    io::{BufReader, Write},
    path::Path,
};

#[derive(Debug, Deserialize, Serialize, PartialEq, Clone)]
/// Configuration of [`Classifier`](super::Classifier).
pub struct ClassifierConfig<C>
where
    C: OutDim,
{
    pub(super) model_config: Option<C>,
    pub(super) opt_config: OptimizerConfig,
}

impl<C> Default for ClassifierConfig<C>
where
    C: OutDim,
{
    fn default() -> Self {
        Self {
            model_config: None,
            opt_config: OptimizerConfig::default(),
        }
    }
}

impl<C> ClassifierConfig<C>
where
    C: DeserializeOwned + Serialize + OutDim,
{
    /// Sets configurations of the network.
    pub fn model_config(mut self, v: C) -> Self {
        self.model_config = Some(v);
        self
    }

    /// Sets optimizer configuration.
    pub fn opt_config(mut self, v: OptimizerConfig) -> Self {
        self.opt_config = v;
        self
    }

    /// Constructs [`ClassifierConfig`] from YAML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path_ = path.as_ref().to_owned();
        let file = File::open(path)?;
        let rdr = BufReader::new(file);
        let b = serde_yaml::from_reader(rdr)?;
        info!("Load config of classifier from {:?}", path_);
        Ok(b)
    }

    /// Saves [`ClassifierConfig`] as a YAML file.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path_ = path.as_ref().to_owned();
        let mut file = File::create(path)?;
        file.write_all(serde_yaml::to_string(&self)?.as_bytes())?;
        info!("Save config of classifier into {:?}", path_);
        Ok(())
    }
}
