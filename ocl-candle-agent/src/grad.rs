//! Gradients of a model as single flat vectors.
//!
//! A [`GradLayout`] fixes an order of the trainable variables of a model, so
//! that the gradients in a [`GradStore`] can be concatenated into one vector
//! and written back segment by segment. The same layout must be used for
//! flattening and restoring.
use anyhow::{anyhow, ensure, Result};
use candle_core::{backprop::GradStore, DType, Device, Tensor, Var};
use candle_nn::VarMap;

/// Order and sizes of the trainable variables of a model.
pub struct GradLayout {
    vars: Vec<(String, Var)>,
    numel: usize,
}

impl GradLayout {
    /// Builds a layout of the variables in `varmap`, ordered by name.
    pub fn new(varmap: &VarMap) -> Result<Self> {
        let vars = varmap
            .data()
            .lock()
            .map_err(|_| anyhow!("Failed to lock the variables"))?
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        Ok(Self::from_named_vars(vars))
    }

    /// Builds a layout of the given variables, ordered by name.
    pub fn from_named_vars(mut vars: Vec<(String, Var)>) -> Self {
        vars.sort_by(|a, b| a.0.cmp(&b.0));
        let numel = vars.iter().map(|(_, v)| v.elem_count()).sum();
        Self { vars, numel }
    }

    /// Total number of scalar parameters.
    pub fn numel(&self) -> usize {
        self.numel
    }

    /// Names of the variables in layout order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.vars.iter().map(|(k, _)| k.as_str())
    }

    /// Concatenates the gradients of all variables into a vector of length
    /// [`GradLayout::numel`].
    ///
    /// A variable with no gradient in `grads` contributes zeros.
    pub fn flatten(&self, grads: &GradStore) -> Result<Tensor> {
        if self.vars.is_empty() {
            return Ok(Tensor::zeros((0,), DType::F32, &Device::Cpu)?);
        }

        let segs = self
            .vars
            .iter()
            .map(|(_, var)| -> Result<Tensor> {
                let t = var.as_tensor();
                match grads.get(t) {
                    Some(g) => Ok(g.flatten_all()?),
                    None => Ok(Tensor::zeros((t.elem_count(),), t.dtype(), t.device())?),
                }
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Tensor::cat(&segs, 0)?)
    }

    /// Overwrites the gradient of every variable with the corresponding
    /// segment of `flat`, reshaped to the shape of the variable.
    pub fn restore(&self, grads: &mut GradStore, flat: &Tensor) -> Result<()> {
        ensure!(
            flat.elem_count() == self.numel,
            "Gradient vector has {} elements, expected {}",
            flat.elem_count(),
            self.numel
        );

        let flat = flat.flatten_all()?;
        let mut offset = 0;
        for (_, var) in self.vars.iter() {
            let t = var.as_tensor();
            let n = t.elem_count();
            let seg = flat.narrow(0, offset, n)?.reshape(t.shape())?;
            grads.insert(t, seg);
            offset += n;
        }

        Ok(())
    }
}

/// Inner product of two vectors.
pub fn dot(a: &Tensor, b: &Tensor) -> Result<f32> {
    Ok((a * b)?.sum_all()?.to_scalar::<f32>()?)
}

/// Removes from `g_inc` its component along `g_re`.
///
/// Returns `g_inc - (g_inc·g_re / g_re·g_re) g_re`, which is orthogonal to
/// `g_re`. If `g_re` is zero, `g_inc` is returned unchanged.
pub fn project(g_inc: &Tensor, g_re: &Tensor) -> Result<Tensor> {
    let rr = dot(g_re, g_re)?;
    if rr == 0.0 {
        return Ok(g_inc.clone());
    }
    let coef = dot(g_inc, g_re)? / rr;
    Ok((g_inc - g_re.affine(coef as f64, 0.)?)?)
}
