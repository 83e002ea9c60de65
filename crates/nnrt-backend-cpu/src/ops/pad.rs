use std::sync::Arc;

use nnrt::{Kernel, KernelError, KernelResult, Tensor};

use super::utils::{compute_strides, expect_dtype, index_values, MultiIndex};

/// Zero padding; amounts come from a `[rank, 2]` operand read at run time.
pub struct PadKernel {
    input: Arc<Tensor>,
    paddings: Arc<Tensor>,
    output: Arc<Tensor>,
}

impl PadKernel {
    pub fn configure(
        input: Arc<Tensor>,
        paddings: Arc<Tensor>,
        output: Arc<Tensor>,
    ) -> KernelResult<Self> {
        expect_dtype("Pad", &output, input.dtype())?;
        Ok(Self {
            input,
            paddings,
            output,
        })
    }
}

impl Kernel for PadKernel {
    fn name(&self) -> &'static str {
        "Pad"
    }

    fn execute(&mut self) -> KernelResult<()> {
        let dims = self.input.resolved_dims()?;
        let pads = index_values("Pad", &self.paddings)?;
        if pads.len() != dims.len() * 2 || pads.iter().any(|p| *p < 0) {
            return Err(KernelError::execution(
                "Pad",
                format!("invalid paddings {pads:?} for rank {}", dims.len()),
            ));
        }
        let before: Vec<usize> = pads.iter().step_by(2).map(|&p| p as usize).collect();
        let out_dims = self.output.resolved_dims()?;
        let strides = compute_strides(&dims);
        let offsets: Vec<Option<usize>> = MultiIndex::new(&out_dims)
            .map(|coords| {
                let mut offset = 0;
                for (axis, coord) in coords.iter().enumerate() {
                    let source = coord.checked_sub(before[axis])?;
                    if source >= dims[axis] {
                        return None;
                    }
                    offset += source * strides[axis];
                }
                Some(offset)
            })
            .collect();
        let padded = self
            .input
            .data()?
            .gather_or_zero(&offsets)
            .ok_or_else(|| KernelError::execution("Pad", "source offset out of range"))?;
        self.output.store(padded)
    }
}
