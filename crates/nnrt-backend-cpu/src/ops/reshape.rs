use std::sync::Arc;

use nnrt::{Kernel, KernelError, KernelResult, Tensor};

use super::utils::expect_dtype;

/// Shares the input buffer with an output of another shape. Serves Reshape,
/// Squeeze and ExpandDims; element order never changes.
pub struct ReshapeKernel {
    input: Arc<Tensor>,
    output: Arc<Tensor>,
    name: &'static str,
}

impl ReshapeKernel {
    pub fn configure(
        input: Arc<Tensor>,
        output: Arc<Tensor>,
        name: &'static str,
    ) -> KernelResult<Self> {
        expect_dtype(name, &output, input.dtype())?;
        Ok(Self {
            input,
            output,
            name,
        })
    }
}

impl Kernel for ReshapeKernel {
    fn name(&self) -> &'static str {
        self.name
    }

    fn execute(&mut self) -> KernelResult<()> {
        let data = self.input.data()?;
        let expected: usize = self.output.resolved_dims()?.iter().product();
        if data.len() != expected {
            return Err(KernelError::execution(
                self.name,
                format!("cannot view {} elements as {expected}", data.len()),
            ));
        }
        self.output.store(data)
    }
}
