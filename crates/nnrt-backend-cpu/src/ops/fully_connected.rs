use std::sync::Arc;

use nnrt::ir::Activation;
use nnrt::{Kernel, KernelError, KernelResult, Tensor};

use super::utils::{apply_activation, f32_values, require_float};

/// `output[b, u] = act(sum_k input[b, k] * weight[u, k] + bias[u])`.
///
/// The input is flattened into rows of the weight depth.
pub struct FullyConnectedKernel {
    input: Arc<Tensor>,
    weight: Arc<Tensor>,
    bias: Option<Arc<Tensor>>,
    output: Arc<Tensor>,
    activation: Activation,
}

impl FullyConnectedKernel {
    pub fn configure(
        input: Arc<Tensor>,
        weight: Arc<Tensor>,
        bias: Option<Arc<Tensor>>,
        output: Arc<Tensor>,
        activation: Activation,
    ) -> KernelResult<Self> {
        let tensors: Vec<&Tensor> = [&input, &weight, &output]
            .into_iter()
            .chain(bias.as_ref())
            .map(Arc::as_ref)
            .collect();
        require_float("FullyConnected", &tensors)?;
        Ok(Self {
            input,
            weight,
            bias,
            output,
            activation,
        })
    }
}

impl Kernel for FullyConnectedKernel {
    fn name(&self) -> &'static str {
        "FullyConnected"
    }

    fn execute(&mut self) -> KernelResult<()> {
        let weight_dims = self.weight.resolved_dims()?;
        let [units, depth] = <[usize; 2]>::try_from(weight_dims.as_slice())
            .map_err(|_| KernelError::execution("FullyConnected", "weight must be rank 2"))?;
        let input = self.input.data()?;
        let weight = self.weight.data()?;
        let x = f32_values("FullyConnected", &input)?;
        let w = f32_values("FullyConnected", &weight)?;
        if depth == 0 || x.len() % depth != 0 {
            return Err(KernelError::execution(
                "FullyConnected",
                format!("{} inputs do not split into rows of {depth}", x.len()),
            ));
        }
        let bias = match &self.bias {
            Some(bias) => Some(bias.data()?),
            None => None,
        };
        let b = match &bias {
            Some(data) => Some(f32_values("FullyConnected", data)?),
            None => None,
        };

        let batches = x.len() / depth;
        let mut result = Vec::with_capacity(batches * units);
        for row in x.chunks_exact(depth) {
            for (u, w_row) in w.chunks_exact(depth).enumerate() {
                let dot: f32 = row.iter().zip(w_row).map(|(a, b)| a * b).sum();
                let biased = dot + b.and_then(|b| b.get(u).copied()).unwrap_or(0.0);
                result.push(apply_activation(biased, self.activation));
            }
        }
        self.output.store(result.into())
    }
}
