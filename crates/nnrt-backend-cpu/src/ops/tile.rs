use std::sync::Arc;

use nnrt::ir::normalize_axis;
use nnrt::{Kernel, KernelError, KernelResult, Tensor};

use super::utils::{compute_strides, expect_dtype, index_values, store_gathered, MultiIndex};

pub struct TileKernel {
    input: Arc<Tensor>,
    output: Arc<Tensor>,
}

impl TileKernel {
    pub fn configure(input: Arc<Tensor>, output: Arc<Tensor>) -> KernelResult<Self> {
        expect_dtype("Tile", &output, input.dtype())?;
        Ok(Self { input, output })
    }
}

impl Kernel for TileKernel {
    fn name(&self) -> &'static str {
        "Tile"
    }

    fn execute(&mut self) -> KernelResult<()> {
        let dims = self.input.resolved_dims()?;
        let out_dims = self.output.resolved_dims()?;
        if out_dims.len() != dims.len() {
            return Err(KernelError::execution("Tile", "output rank differs from input"));
        }
        let strides = compute_strides(&dims);
        let offsets: Vec<usize> = MultiIndex::new(&out_dims)
            .map(|coords| {
                coords
                    .iter()
                    .zip(&dims)
                    .zip(&strides)
                    .map(|((coord, dim), stride)| (coord % dim) * stride)
                    .sum()
            })
            .collect();
        store_gathered("Tile", &self.input.data()?, &offsets, &self.output)
    }
}

/// Reverses the axes listed in the axis operand.
pub struct ReverseKernel {
    input: Arc<Tensor>,
    axes: Arc<Tensor>,
    output: Arc<Tensor>,
}

impl ReverseKernel {
    pub fn configure(input: Arc<Tensor>, axes: Arc<Tensor>, output: Arc<Tensor>) -> KernelResult<Self> {
        expect_dtype("Reverse", &output, input.dtype())?;
        Ok(Self {
            input,
            axes,
            output,
        })
    }
}

impl Kernel for ReverseKernel {
    fn name(&self) -> &'static str {
        "Reverse"
    }

    fn execute(&mut self) -> KernelResult<()> {
        let dims = self.input.resolved_dims()?;
        let mut flipped = vec![false; dims.len()];
        for axis in index_values("Reverse", &self.axes)? {
            let axis = normalize_axis(axis, dims.len())
                .map_err(|err| KernelError::execution("Reverse", err.to_string()))?;
            flipped[axis] = true;
        }
        let strides = compute_strides(&dims);
        let offsets: Vec<usize> = MultiIndex::new(&dims)
            .map(|coords| {
                coords
                    .iter()
                    .enumerate()
                    .map(|(axis, coord)| {
                        let source = if flipped[axis] {
                            dims[axis] - 1 - coord
                        } else {
                            *coord
                        };
                        source * strides[axis]
                    })
                    .sum()
            })
            .collect();
        store_gathered("Reverse", &self.input.data()?, &offsets, &self.output)
    }
}
