use std::sync::Arc;

use nnrt::ir::{DataType, TensorData};
use nnrt::{Kernel, KernelError, KernelResult, Tensor};

use super::utils::{
    broadcast_offset, compute_strides, expect_dtype, store_gathered, unravel_index,
};

/// `output = condition ? on_true : on_false` with broadcasting of all three.
pub struct SelectKernel {
    condition: Arc<Tensor>,
    on_true: Arc<Tensor>,
    on_false: Arc<Tensor>,
    output: Arc<Tensor>,
}

impl SelectKernel {
    pub fn configure(
        condition: Arc<Tensor>,
        on_true: Arc<Tensor>,
        on_false: Arc<Tensor>,
        output: Arc<Tensor>,
    ) -> KernelResult<Self> {
        expect_dtype("Select", &condition, DataType::Bool8)?;
        expect_dtype("Select", &on_false, on_true.dtype())?;
        expect_dtype("Select", &output, on_true.dtype())?;
        Ok(Self {
            condition,
            on_true,
            on_false,
            output,
        })
    }
}

impl Kernel for SelectKernel {
    fn name(&self) -> &'static str {
        "Select"
    }

    fn execute(&mut self) -> KernelResult<()> {
        let out_dims = self.output.resolved_dims()?;
        let cond_dims = self.condition.resolved_dims()?;
        let true_dims = self.on_true.resolved_dims()?;
        let false_dims = self.on_false.resolved_dims()?;
        let (cond_strides, true_strides, false_strides) = (
            compute_strides(&cond_dims),
            compute_strides(&true_dims),
            compute_strides(&false_dims),
        );

        let condition = self.condition.data()?;
        let flags = condition
            .as_bool()
            .ok_or_else(|| KernelError::execution("Select", "condition must be boolean"))?;
        let on_true = self.on_true.data()?;
        let true_len = on_true.len();
        let joined = TensorData::concat(&[on_true, self.on_false.data()?])
            .ok_or_else(|| KernelError::execution("Select", "value types differ"))?;

        let total: usize = out_dims.iter().product();
        let offsets: Vec<usize> = (0..total)
            .map(|flat| {
                let coords = unravel_index(flat, &out_dims);
                if flags[broadcast_offset(&coords, &cond_dims, &cond_strides)] != 0 {
                    broadcast_offset(&coords, &true_dims, &true_strides)
                } else {
                    true_len + broadcast_offset(&coords, &false_dims, &false_strides)
                }
            })
            .collect();
        store_gathered("Select", &joined, &offsets, &self.output)
    }
}
