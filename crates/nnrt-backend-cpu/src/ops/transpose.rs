use std::sync::Arc;

use nnrt::shape_inference::transpose_permutation;
use nnrt::{Kernel, KernelError, KernelResult, Tensor};

use super::utils::{compute_strides, expect_dtype, store_gathered, MultiIndex};

pub struct TransposeKernel {
    input: Arc<Tensor>,
    output: Arc<Tensor>,
    perm: Vec<i32>,
}

impl TransposeKernel {
    pub fn configure(input: Arc<Tensor>, output: Arc<Tensor>, perm: Vec<i32>) -> KernelResult<Self> {
        expect_dtype("Transpose", &output, input.dtype())?;
        Ok(Self {
            input,
            output,
            perm,
        })
    }
}

impl Kernel for TransposeKernel {
    fn name(&self) -> &'static str {
        "Transpose"
    }

    fn execute(&mut self) -> KernelResult<()> {
        let dims = self.input.resolved_dims()?;
        let perm = transpose_permutation(&self.perm, dims.len())
            .map_err(|reason| KernelError::execution("Transpose", reason))?;
        let strides = compute_strides(&dims);
        let out_dims: Vec<usize> = perm.iter().map(|&p| dims[p]).collect();
        let offsets: Vec<usize> = MultiIndex::new(&out_dims)
            .map(|coords| {
                coords
                    .iter()
                    .zip(&perm)
                    .map(|(coord, axis)| coord * strides[*axis])
                    .sum()
            })
            .collect();
        store_gathered("Transpose", &self.input.data()?, &offsets, &self.output)
    }
}
