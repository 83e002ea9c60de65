use std::sync::Arc;

use nnrt::ir::TensorData;
use nnrt::{Kernel, KernelError, KernelResult, Tensor};

use super::utils::{expect_dtype, store_gathered};

/// Source offsets that interleave `parts` along one axis.
///
/// Part `k` contributes `extents[k] * inner` consecutive elements to every
/// one of the `outer` blocks of the output; parts are laid end to end in the
/// joined source buffer.
fn interleave(extents: &[usize], outer: usize, inner: usize) -> Vec<usize> {
    let mut bases = Vec::with_capacity(extents.len());
    let mut offset = 0;
    for extent in extents {
        bases.push(offset);
        offset += extent * inner * outer;
    }
    let mut indices = Vec::with_capacity(offset);
    for o in 0..outer {
        for (extent, base) in extents.iter().zip(&bases) {
            let block = extent * inner;
            indices.extend((0..block).map(|a| base + o * block + a));
        }
    }
    indices
}

/// Concat joins along an existing axis; Pack stacks along a new one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinMode {
    Concat,
    Pack,
}

pub struct ConcatKernel {
    inputs: Vec<Arc<Tensor>>,
    output: Arc<Tensor>,
    axis: usize,
    mode: JoinMode,
}

impl ConcatKernel {
    /// `axis` is already resolved against the output rank.
    pub fn configure(
        inputs: Vec<Arc<Tensor>>,
        output: Arc<Tensor>,
        axis: usize,
        mode: JoinMode,
    ) -> KernelResult<Self> {
        let name = Self::kernel_name(mode);
        if inputs.is_empty() {
            return Err(KernelError::execution(name, "needs at least one input"));
        }
        for input in &inputs {
            expect_dtype(name, input, output.dtype())?;
        }
        Ok(Self {
            inputs,
            output,
            axis,
            mode,
        })
    }

    fn kernel_name(mode: JoinMode) -> &'static str {
        match mode {
            JoinMode::Concat => "Concat",
            JoinMode::Pack => "Pack",
        }
    }
}

impl Kernel for ConcatKernel {
    fn name(&self) -> &'static str {
        Self::kernel_name(self.mode)
    }

    fn execute(&mut self) -> KernelResult<()> {
        let out_dims = self.output.resolved_dims()?;
        if self.axis >= out_dims.len() {
            return Err(KernelError::execution(
                self.name(),
                format!("axis {} out of range for {out_dims:?}", self.axis),
            ));
        }
        let outer: usize = out_dims[..self.axis].iter().product();
        let inner: usize = out_dims[self.axis + 1..].iter().product();

        let mut extents = Vec::with_capacity(self.inputs.len());
        let mut parts = Vec::with_capacity(self.inputs.len());
        for input in &self.inputs {
            extents.push(match self.mode {
                JoinMode::Concat => input.resolved_dims()?[self.axis],
                JoinMode::Pack => 1,
            });
            parts.push(input.data()?);
        }
        let joined = TensorData::concat(&parts)
            .ok_or_else(|| KernelError::execution(self.name(), "inputs mix element types"))?;
        store_gathered(
            self.name(),
            &joined,
            &interleave(&extents, outer, inner),
            &self.output,
        )
    }
}

/// Split cuts an axis into pieces; Unpack removes it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SplitMode {
    Split,
    Unpack,
}

pub struct SplitKernel {
    input: Arc<Tensor>,
    outputs: Vec<Arc<Tensor>>,
    axis: usize,
    mode: SplitMode,
}

impl SplitKernel {
    /// `axis` is already resolved against the input rank.
    pub fn configure(
        input: Arc<Tensor>,
        outputs: Vec<Arc<Tensor>>,
        axis: usize,
        mode: SplitMode,
    ) -> KernelResult<Self> {
        let name = Self::kernel_name(mode);
        for output in &outputs {
            expect_dtype(name, output, input.dtype())?;
        }
        Ok(Self {
            input,
            outputs,
            axis,
            mode,
        })
    }

    fn kernel_name(mode: SplitMode) -> &'static str {
        match mode {
            SplitMode::Split => "Split",
            SplitMode::Unpack => "Unpack",
        }
    }
}

impl Kernel for SplitKernel {
    fn name(&self) -> &'static str {
        Self::kernel_name(self.mode)
    }

    fn execute(&mut self) -> KernelResult<()> {
        let dims = self.input.resolved_dims()?;
        if self.axis >= dims.len() {
            return Err(KernelError::execution(
                self.name(),
                format!("axis {} out of range for {dims:?}", self.axis),
            ));
        }
        let outer: usize = dims[..self.axis].iter().product();
        let inner: usize = dims[self.axis + 1..].iter().product();
        let axis_len = dims[self.axis];
        let data = self.input.data()?;

        let mut start = 0;
        for output in &self.outputs {
            let extent = match self.mode {
                SplitMode::Split => output.resolved_dims()?[self.axis],
                SplitMode::Unpack => 1,
            };
            if start + extent > axis_len {
                return Err(KernelError::execution(
                    self.name(),
                    "outputs exceed the input extent",
                ));
            }
            let mut indices = Vec::with_capacity(outer * extent * inner);
            for o in 0..outer {
                let base = (o * axis_len + start) * inner;
                indices.extend(base..base + extent * inner);
            }
            store_gathered(self.name(), &data, &indices, output)?;
            start += extent;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interleave_alternates_blocks() {
        // Two [2, 1] and [2, 2] parts joined on axis 1.
        assert_eq!(interleave(&[1, 2], 2, 1), vec![0, 2, 3, 1, 4, 5]);
    }
}
