//! Utilities.
use anyhow::{anyhow, Result};
use candle_core::{Device, Tensor};
use candle_nn::VarMap;
use ocl_core::record::{Record, RecordValue};

/// Interface for handling output dimensions.
pub trait OutDim {
    /// Returns the output dimension.
    fn get_out_dim(&self) -> usize;
}

/// Converts class labels into a `u32` tensor of shape `[batch_size]`.
pub fn labels_to_tensor(y: &[u32], device: &Device) -> Result<Tensor> {
    Ok(Tensor::from_slice(y, (y.len(),), device)?)
}

/// Returns the standard deviation of a tensor.
pub fn std(t: &Tensor) -> Result<f32> {
    Ok(t
        .broadcast_sub(&t.mean_all()?)?
        .powf(2f64)?
        .mean_all()?
        .sqrt()?
        .to_vec0::<f32>()?)
}

/// Returns the mean and standard deviation of the parameters.
pub fn param_stats(varmap: &VarMap) -> Result<Record> {
    let mut record = Record::empty();
    let data = varmap
        .data()
        .lock()
        .map_err(|_| anyhow!("Failed to lock the variables"))?;

    for (k, v) in data.iter() {
        let m: f32 = v.mean_all()?.to_vec0()?;
        record.insert(format!("{}_mean", k), RecordValue::Scalar(m));
        record.insert(format!("{}_std", k), RecordValue::Scalar(std(v.as_tensor())?));
    }

    Ok(record)
}

#[cfg(test)]
mod tests {
    use super::*;
    use candle_core::DType;
    use candle_nn::Init;

    #[test]
    fn test_param_stats() -> Result<()> {
        let vm = VarMap::new();
        vm.get((4,), "w", Init::Const(0.), DType::F32, &Device::Cpu)?;
        let t = Tensor::from_slice(&[1f32, 3., 1., 3.], (4,), &Device::Cpu)?;
        vm.data().lock().unwrap().get("w").unwrap().set(&t)?;

        let record = param_stats(&vm)?;
        assert_eq!(record.get_scalar("w_mean")?, 2.);
        assert!((record.get_scalar("w_std")? - 1.).abs() < 1e-6);
        Ok(())
    }
}
