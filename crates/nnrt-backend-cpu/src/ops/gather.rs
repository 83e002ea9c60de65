use std::sync::Arc;

use nnrt::{Kernel, KernelError, KernelResult, Tensor};

use super::utils::{expect_dtype, index_values, store_gathered};

/// `output = input[..., indices, ...]` along `axis`; negative indices are rejected.
pub struct GatherKernel {
    input: Arc<Tensor>,
    indices: Arc<Tensor>,
    output: Arc<Tensor>,
    axis: usize,
}

impl GatherKernel {
    pub fn configure(
        input: Arc<Tensor>,
        indices: Arc<Tensor>,
        output: Arc<Tensor>,
        axis: usize,
    ) -> KernelResult<Self> {
        expect_dtype("Gather", &output, input.dtype())?;
        Ok(Self {
            input,
            indices,
            output,
            axis,
        })
    }
}

impl Kernel for GatherKernel {
    fn name(&self) -> &'static str {
        "Gather"
    }

    fn execute(&mut self) -> KernelResult<()> {
        let dims = self.input.resolved_dims()?;
        if self.axis >= dims.len() {
            return Err(KernelError::execution("Gather", "axis out of range"));
        }
        let outer: usize = dims[..self.axis].iter().product();
        let inner: usize = dims[self.axis + 1..].iter().product();
        let axis_len = dims[self.axis];
        let picks = index_values("Gather", &self.indices)?;

        let mut offsets = Vec::with_capacity(outer * picks.len() * inner);
        for o in 0..outer {
            for &pick in &picks {
                let pick = usize::try_from(pick)
                    .ok()
                    .filter(|p| *p < axis_len)
                    .ok_or_else(|| {
                        KernelError::execution(
                            "Gather",
                            format!("index {pick} out of range for extent {axis_len}"),
                        )
                    })?;
                let base = (o * axis_len + pick) * inner;
                offsets.extend(base..base + inner);
            }
        }
        store_gathered("Gather", &self.input.data()?, &offsets, &self.output)
    }
}
