use std::sync::Arc;

use nnrt::ir::StridedSliceParams;
use nnrt::shape_inference::strided_slice_plan;
use nnrt::{Kernel, KernelError, KernelResult, Tensor};

use super::utils::{compute_strides, expect_dtype, index_values, store_gathered, MultiIndex};

/// Offsets of the box starting at `begins` with extents `sizes`, row-major.
fn box_offsets(dims: &[usize], begins: &[usize], sizes: &[usize]) -> Vec<usize> {
    let strides = compute_strides(dims);
    MultiIndex::new(sizes)
        .map(|coords| {
            coords
                .iter()
                .zip(begins)
                .zip(&strides)
                .map(|((coord, begin), stride)| (coord + begin) * stride)
                .sum()
        })
        .collect()
}

pub struct SliceKernel {
    input: Arc<Tensor>,
    begins: Arc<Tensor>,
    sizes: Arc<Tensor>,
    output: Arc<Tensor>,
}

impl SliceKernel {
    pub fn configure(
        input: Arc<Tensor>,
        begins: Arc<Tensor>,
        sizes: Arc<Tensor>,
        output: Arc<Tensor>,
    ) -> KernelResult<Self> {
        expect_dtype("Slice", &output, input.dtype())?;
        Ok(Self {
            input,
            begins,
            sizes,
            output,
        })
    }
}

impl Kernel for SliceKernel {
    fn name(&self) -> &'static str {
        "Slice"
    }

    fn execute(&mut self) -> KernelResult<()> {
        let dims = self.input.resolved_dims()?;
        let begins = index_values("Slice", &self.begins)?;
        let sizes = index_values("Slice", &self.sizes)?;
        if begins.len() != dims.len() || sizes.len() != dims.len() {
            return Err(KernelError::execution("Slice", "begins/sizes must match input rank"));
        }
        let mut starts = Vec::with_capacity(dims.len());
        let mut extents = Vec::with_capacity(dims.len());
        for ((dim, begin), size) in dims.iter().zip(&begins).zip(&sizes) {
            let dim = *dim as i64;
            let size = if *size == -1 { dim - begin } else { *size };
            if *begin < 0 || size < 0 || begin + size > dim {
                return Err(KernelError::execution(
                    "Slice",
                    format!("slice [{begin}, +{size}) exceeds extent {dim}"),
                ));
            }
            starts.push(*begin as usize);
            extents.push(size as usize);
        }
        store_gathered(
            "Slice",
            &self.input.data()?,
            &box_offsets(&dims, &starts, &extents),
            &self.output,
        )
    }
}

pub struct StridedSliceKernel {
    input: Arc<Tensor>,
    starts: Arc<Tensor>,
    ends: Arc<Tensor>,
    strides: Arc<Tensor>,
    output: Arc<Tensor>,
    params: StridedSliceParams,
}

impl StridedSliceKernel {
    pub fn configure(
        input: Arc<Tensor>,
        starts: Arc<Tensor>,
        ends: Arc<Tensor>,
        strides: Arc<Tensor>,
        output: Arc<Tensor>,
        params: StridedSliceParams,
    ) -> KernelResult<Self> {
        expect_dtype("StridedSlice", &output, input.dtype())?;
        Ok(Self {
            input,
            starts,
            ends,
            strides,
            output,
            params,
        })
    }
}

impl Kernel for StridedSliceKernel {
    fn name(&self) -> &'static str {
        "StridedSlice"
    }

    fn execute(&mut self) -> KernelResult<()> {
        let dims = self.input.resolved_dims()?;
        let plan = strided_slice_plan(
            &dims,
            &index_values("StridedSlice", &self.starts)?,
            &index_values("StridedSlice", &self.ends)?,
            &index_values("StridedSlice", &self.strides)?,
            &self.params,
        )
        .map_err(|reason| KernelError::execution("StridedSlice", reason))?;
        let strides = compute_strides(&dims);
        let lens: Vec<usize> = plan.iter().map(|axis| axis.len).collect();
        let offsets: Vec<usize> = MultiIndex::new(&lens)
            .map(|coords| {
                coords
                    .iter()
                    .zip(&plan)
                    .zip(&strides)
                    .map(|((coord, axis), stride)| {
                        (axis.begin + *coord as i64 * axis.stride) as usize * stride
                    })
                    .sum()
            })
            .collect();
        store_gathered("StridedSlice", &self.input.data()?, &offsets, &self.output)
    }
}
