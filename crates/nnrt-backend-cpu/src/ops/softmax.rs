use std::sync::Arc;

use nnrt::{Kernel, KernelResult, Tensor};

use super::utils::{f32_values, require_float};

/// Softmax over the innermost axis with temperature `beta`.
pub struct SoftmaxKernel {
    input: Arc<Tensor>,
    output: Arc<Tensor>,
    beta: f32,
}

impl SoftmaxKernel {
    pub fn configure(input: Arc<Tensor>, output: Arc<Tensor>, beta: f32) -> KernelResult<Self> {
        require_float("Softmax", &[&input, &output])?;
        Ok(Self {
            input,
            output,
            beta,
        })
    }
}

impl Kernel for SoftmaxKernel {
    fn name(&self) -> &'static str {
        "Softmax"
    }

    fn execute(&mut self) -> KernelResult<()> {
        let dims = self.input.resolved_dims()?;
        let inner = dims.last().copied().unwrap_or(1).max(1);
        let data = self.input.data()?;
        let x = f32_values("Softmax", &data)?;

        let mut result = Vec::with_capacity(x.len());
        for row in x.chunks(inner) {
            let max = row.iter().copied().fold(f32::NEG_INFINITY, f32::max);
            let exps: Vec<f32> = row.iter().map(|&v| ((v - max) * self.beta).exp()).collect();
            let sum: f32 = exps.iter().sum();
            result.extend(exps.iter().map(|e| e / sum));
        }
        self.output.store(result.into())
    }
}
