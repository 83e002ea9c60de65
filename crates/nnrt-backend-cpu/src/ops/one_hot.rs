use std::sync::Arc;

use nnrt::ir::TensorData;
use nnrt::{Kernel, KernelResult, Tensor};

use super::utils::{index_values, reject_quantized, MultiIndex};

pub struct OneHotKernel {
    indices: Arc<Tensor>,
    output: Arc<Tensor>,
    depth: usize,
    on_value: f32,
    off_value: f32,
    /// Position of the depth axis in the output.
    axis: usize,
}

impl OneHotKernel {
    pub fn configure(
        indices: Arc<Tensor>,
        output: Arc<Tensor>,
        depth: u32,
        on_value: f32,
        off_value: f32,
        axis: usize,
    ) -> KernelResult<Self> {
        reject_quantized("OneHot", &[&output])?;
        Ok(Self {
            indices,
            output,
            depth: depth as usize,
            on_value,
            off_value,
            axis,
        })
    }
}

impl Kernel for OneHotKernel {
    fn name(&self) -> &'static str {
        "OneHot"
    }

    fn execute(&mut self) -> KernelResult<()> {
        let dims = self.indices.resolved_dims()?;
        let picks = index_values("OneHot", &self.indices)?;
        let split = self.axis.min(dims.len());
        let outer: usize = dims[..split].iter().product();
        let inner: usize = dims[split..].iter().product();

        let mut values = Vec::with_capacity(outer * self.depth * inner);
        for coords in MultiIndex::new(&[outer, self.depth, inner]) {
            let (o, d, i) = (coords[0], coords[1], coords[2]);
            let hot = picks[o * inner + i] == d as i64;
            values.push(f64::from(if hot { self.on_value } else { self.off_value }));
        }
        self.output
            .store(TensorData::from_f64(self.output.dtype(), &values))
    }
}
