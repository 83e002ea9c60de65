//! Kernels whose output is generated rather than derived element-wise:
//! Shape, Fill and Range.

use std::sync::Arc;

use nnrt::ir::TensorData;
use nnrt::shape_inference::range_length;
use nnrt::{Kernel, KernelError, KernelResult, Tensor};

pub struct ShapeKernel {
    input: Arc<Tensor>,
    output: Arc<Tensor>,
}

impl ShapeKernel {
    pub fn configure(input: Arc<Tensor>, output: Arc<Tensor>) -> KernelResult<Self> {
        Ok(Self { input, output })
    }
}

impl Kernel for ShapeKernel {
    fn name(&self) -> &'static str {
        "Shape"
    }

    fn execute(&mut self) -> KernelResult<()> {
        let dims: Vec<f64> = self
            .input
            .resolved_dims()?
            .iter()
            .map(|&d| d as f64)
            .collect();
        self.output
            .store(TensorData::from_f64(self.output.dtype(), &dims))
    }
}

fn scalar(kernel: &'static str, tensor: &Tensor) -> KernelResult<f64> {
    tensor
        .data()?
        .to_f64_vec()
        .first()
        .copied()
        .ok_or_else(|| KernelError::execution(kernel, format!("{} is empty", tensor.index())))
}

/// Broadcasts a scalar value operand over the output shape.
pub struct FillKernel {
    value: Arc<Tensor>,
    output: Arc<Tensor>,
}

impl FillKernel {
    pub fn configure(value: Arc<Tensor>, output: Arc<Tensor>) -> KernelResult<Self> {
        Ok(Self { value, output })
    }
}

impl Kernel for FillKernel {
    fn name(&self) -> &'static str {
        "Fill"
    }

    fn execute(&mut self) -> KernelResult<()> {
        let value = scalar("Fill", &self.value)?;
        let len: usize = self.output.resolved_dims()?.iter().product();
        self.output
            .store(TensorData::from_f64(self.output.dtype(), &vec![value; len]))
    }
}

pub struct RangeKernel {
    start: Arc<Tensor>,
    limit: Arc<Tensor>,
    delta: Arc<Tensor>,
    output: Arc<Tensor>,
}

impl RangeKernel {
    pub fn configure(
        start: Arc<Tensor>,
        limit: Arc<Tensor>,
        delta: Arc<Tensor>,
        output: Arc<Tensor>,
    ) -> KernelResult<Self> {
        Ok(Self {
            start,
            limit,
            delta,
            output,
        })
    }
}

impl Kernel for RangeKernel {
    fn name(&self) -> &'static str {
        "Range"
    }

    fn execute(&mut self) -> KernelResult<()> {
        let start = scalar("Range", &self.start)?;
        let limit = scalar("Range", &self.limit)?;
        let delta = scalar("Range", &self.delta)?;
        let len = range_length(start, limit, delta)
            .map_err(|reason| KernelError::execution("Range", reason))?;
        let values: Vec<f64> = (0..len).map(|i| start + i as f64 * delta).collect();
        self.output
            .store(TensorData::from_f64(self.output.dtype(), &values))
    }
}
