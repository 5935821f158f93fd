//! Closed set of continual learning methods.
use crate::{agem::Agem, er::Er, model::SubModel1, util::OutDim, AgentConfig, TensorBatch};
use anyhow::Result;
use candle_core::Tensor;
use ocl_core::{record::Record, Agent, IncomingBatch};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::path::Path;

/// Continual learning method.
#[derive(Clone, Copy, Debug, Deserialize, Serialize, PartialEq, Eq)]
pub enum Method {
    /// Experience replay.
    Er,

    /// Averaged gradient episodic memory.
    Agem,

    /// AGEM adding the replay gradient to the projected incoming gradient.
    AgemPp,
}

impl std::str::FromStr for Method {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "er" => Ok(Self::Er),
            "agem" => Ok(Self::Agem),
            "agem++" | "agempp" | "agem_pp" => Ok(Self::AgemPp),
            _ => Err(anyhow::anyhow!("Unknown method: {}", s)),
        }
    }
}

/// An agent of one of the methods in [`Method`].
///
/// `P` is the type parameter of the classifier network.
pub enum ContinualAgent<P>
where
    P: SubModel1<Input = Tensor, Output = Tensor>,
    P::Config: DeserializeOwned + Serialize + OutDim + std::fmt::Debug + PartialEq + Clone,
{
    /// Experience replay agent.
    Er(Er<P>),

    /// AGEM or AGEM++ agent.
    Agem(Agem<P>),
}

impl<P> ContinualAgent<P>
where
    P: SubModel1<Input = Tensor, Output = Tensor>,
    P::Config: DeserializeOwned + Serialize + OutDim + std::fmt::Debug + PartialEq + Clone,
{
    /// Constructs the agent of the method given in `config`.
    pub fn build(config: AgentConfig<P>) -> Result<Self> {
        match config.method {
            Method::Er => Ok(Self::Er(Er::build(config)?)),
            Method::Agem | Method::AgemPp => Ok(Self::Agem(Agem::build(config)?)),
        }
    }

    /// Returns the method of the agent.
    pub fn method(&self) -> Method {
        match self {
            Self::Er(_) => Method::Er,
            Self::Agem(agent) => match agent.variant() {
                crate::agem::AgemVariant::Agem => Method::Agem,
                crate::agem::AgemVariant::AgemPp => Method::AgemPp,
            },
        }
    }
}

impl<P> Agent for ContinualAgent<P>
where
    P: SubModel1<Input = Tensor, Output = Tensor>,
    P::Config: DeserializeOwned + Serialize + OutDim + std::fmt::Debug + PartialEq + Clone,
{
    type Input = TensorBatch;
    type Output = Tensor;

    fn train(&mut self) {
        match self {
            Self::Er(agent) => agent.train(),
            Self::Agem(agent) => agent.train(),
        }
    }

    fn eval(&mut self) {
        match self {
            Self::Er(agent) => agent.eval(),
            Self::Agem(agent) => agent.eval(),
        }
    }

    fn is_train(&self) -> bool {
        match self {
            Self::Er(agent) => agent.is_train(),
            Self::Agem(agent) => agent.is_train(),
        }
    }

    fn observe(&mut self, batch: IncomingBatch<TensorBatch>) -> Result<Record> {
        match self {
            Self::Er(agent) => agent.observe(batch),
            Self::Agem(agent) => agent.observe(batch),
        }
    }

    fn predict(&self, x: &TensorBatch) -> Result<Tensor> {
        match self {
            Self::Er(agent) => agent.predict(x),
            Self::Agem(agent) => agent.predict(x),
        }
    }

    fn predict_labels(&self, x: &TensorBatch) -> Result<Vec<u32>> {
        match self {
            Self::Er(agent) => agent.predict_labels(x),
            Self::Agem(agent) => agent.predict_labels(x),
        }
    }

    fn buffer_len(&self) -> usize {
        match self {
            Self::Er(agent) => agent.buffer_len(),
            Self::Agem(agent) => agent.buffer_len(),
        }
    }

    fn buffer_n_bits(&self) -> usize {
        match self {
            Self::Er(agent) => agent.buffer_n_bits(),
            Self::Agem(agent) => agent.buffer_n_bits(),
        }
    }

    fn model_n_bits(&self) -> usize {
        match self {
            Self::Er(agent) => agent.model_n_bits(),
            Self::Agem(agent) => agent.model_n_bits(),
        }
    }

    fn save_params(&self, path: &Path) -> Result<()> {
        match self {
            Self::Er(agent) => agent.save_params(path),
            Self::Agem(agent) => agent.save_params(path),
        }
    }

    fn load_params(&mut self, path: &Path) -> Result<()> {
        match self {
            Self::Er(agent) => agent.load_params(path),
            Self::Agem(agent) => agent.load_params(path),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_method() -> Result<()> {
        assert_eq!("ER".parse::<Method>()?, Method::Er);
        assert_eq!("agem".parse::<Method>()?, Method::Agem);
        assert_eq!("agem++".parse::<Method>()?, Method::AgemPp);
        assert!("ewc".parse::<Method>().is_err());
        Ok(())
    }
}
