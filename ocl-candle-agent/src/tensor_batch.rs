use anyhow::{anyhow, Result};
use candle_core::{Device, Tensor};
use ocl_core::BatchBase;

/// Inputs of examples held in a single [`Tensor`] whose first axis is the row.
///
/// Storage created with [`BatchBase::new`] is allocated on the CPU at the
/// first write, with the shape `[capacity, row_shape..]` and the dtype of the
/// written data.
///
/// [`Tensor`]: https://docs.rs/candle-core/0.8.4/candle_core/struct.Tensor.html
#[derive(Clone, Debug)]
pub struct TensorBatch {
    buf: Option<Tensor>,
    capacity: usize,
}

impl TensorBatch {
    /// Wraps a tensor of shape `[batch_size, ..]`.
    pub fn from_tensor(t: Tensor) -> Self {
        let capacity = t.dims().first().copied().unwrap_or(0);
        Self {
            buf: Some(t),
            capacity,
        }
    }

    /// Returns the inner tensor.
    pub fn into_tensor(self) -> Result<Tensor> {
        self.buf.ok_or_else(|| anyhow!("TensorBatch is not allocated"))
    }

    /// Returns a reference to the inner tensor.
    pub fn as_tensor(&self) -> Result<&Tensor> {
        self.buf
            .as_ref()
            .ok_or_else(|| anyhow!("TensorBatch is not allocated"))
    }
}

impl BatchBase for TensorBatch {
    fn new(capacity: usize) -> Self {
        Self {
            buf: None,
            capacity,
        }
    }

    fn set(&mut self, dest: usize, data: &Self, src: usize) -> Result<()> {
        let data = data
            .buf
            .as_ref()
            .ok_or_else(|| anyhow!("Source TensorBatch is not allocated"))?;
        let row = data.narrow(0, src, 1)?.contiguous()?.to_device(&Device::Cpu)?;

        let buf = match self.buf.take() {
            Some(buf) => buf,
            None => {
                let mut shape = data.dims().to_vec();
                shape[0] = self.capacity;
                Tensor::zeros(shape, data.dtype(), &Device::Cpu)?
            }
        };
        buf.slice_set(&row, 0, dest)?;
        self.buf = Some(buf);

        Ok(())
    }

    fn sample(&self, ixs: &[usize]) -> Result<Self> {
        let buf = self
            .buf
            .as_ref()
            .ok_or_else(|| anyhow!("TensorBatch is not allocated"))?;
        let capacity = ixs.len();
        let ixs = {
            let ixs = ixs.iter().map(|x| *x as u32).collect::<Vec<_>>();
            Tensor::from_vec(ixs, &[capacity], buf.device())?
        };

        Ok(Self {
            buf: Some(buf.index_select(&ixs, 0)?),
            capacity,
        })
    }

    fn len(&self) -> usize {
        match &self.buf {
            Some(buf) => buf.dims().first().copied().unwrap_or(0),
            None => 0,
        }
    }

    fn row_bits(&self) -> usize {
        match &self.buf {
            Some(buf) => {
                let n = buf.dims().iter().skip(1).product::<usize>();
                n * buf.dtype().size_in_bytes() * 8
            }
            None => 0,
        }
    }
}

impl From<Tensor> for TensorBatch {
    fn from(t: Tensor) -> Self {
        Self::from_tensor(t)
    }
}
