use std::sync::Arc;

use nnrt::ir::{DataType, ReduceKind, TensorData};
use nnrt::{Kernel, KernelError, KernelResult, Tensor};

use super::utils::{compute_strides, reject_quantized, unravel_index};

fn kernel_name(kind: ReduceKind) -> &'static str {
    match kind {
        ReduceKind::Sum => "ReduceSum",
        ReduceKind::Prod => "ReduceProd",
        ReduceKind::Max => "ReduceMax",
        ReduceKind::Min => "ReduceMin",
        ReduceKind::All => "ReduceAll",
        ReduceKind::Any => "ReduceAny",
        ReduceKind::Mean => "Mean",
    }
}

fn identity(kind: ReduceKind) -> f64 {
    match kind {
        ReduceKind::Sum | ReduceKind::Mean | ReduceKind::Any => 0.0,
        ReduceKind::Prod | ReduceKind::All => 1.0,
        ReduceKind::Max => f64::NEG_INFINITY,
        ReduceKind::Min => f64::INFINITY,
    }
}

fn combine(kind: ReduceKind, acc: f64, value: f64) -> f64 {
    match kind {
        ReduceKind::Sum | ReduceKind::Mean => acc + value,
        ReduceKind::Prod => acc * value,
        ReduceKind::Max => acc.max(value),
        ReduceKind::Min => acc.min(value),
        ReduceKind::All => f64::from(u8::from(acc != 0.0 && value != 0.0)),
        ReduceKind::Any => f64::from(u8::from(acc != 0.0 || value != 0.0)),
    }
}

/// Reduction over the flagged axes. Accumulates in `f64` and converts to the
/// output element type at the end.
pub struct ReduceKernel {
    input: Arc<Tensor>,
    output: Arc<Tensor>,
    kind: ReduceKind,
    mask: Vec<bool>,
}

impl ReduceKernel {
    /// `mask` flags the reduced axes of the input.
    pub fn configure(
        input: Arc<Tensor>,
        output: Arc<Tensor>,
        kind: ReduceKind,
        mask: Vec<bool>,
    ) -> KernelResult<Self> {
        let name = kernel_name(kind);
        reject_quantized(name, &[&input, &output])?;
        let logical = matches!(kind, ReduceKind::All | ReduceKind::Any);
        if logical != (input.dtype() == DataType::Bool8) {
            return Err(KernelError::not_implemented(
                name,
                format!("unsupported element type {}", input.dtype()),
            ));
        }
        Ok(Self {
            input,
            output,
            kind,
            mask,
        })
    }
}

impl Kernel for ReduceKernel {
    fn name(&self) -> &'static str {
        kernel_name(self.kind)
    }

    fn execute(&mut self) -> KernelResult<()> {
        let dims = self.input.resolved_dims()?;
        if dims.len() != self.mask.len() {
            return Err(KernelError::execution(self.name(), "axes do not match input rank"));
        }
        let kept: Vec<usize> = dims
            .iter()
            .zip(&self.mask)
            .map(|(dim, reduced)| if *reduced { 1 } else { *dim })
            .collect();
        let kept_strides = compute_strides(&kept);
        let values = self.input.data()?.to_f64_vec();

        let mut acc = vec![identity(self.kind); kept.iter().product()];
        for (flat, value) in values.iter().enumerate() {
            let coords = unravel_index(flat, &dims);
            let slot: usize = coords
                .iter()
                .zip(&self.mask)
                .zip(&kept_strides)
                .map(|((coord, reduced), stride)| if *reduced { 0 } else { coord * stride })
                .sum();
            acc[slot] = combine(self.kind, acc[slot], *value);
        }
        if self.kind == ReduceKind::Mean {
            let count = (values.len() / acc.len().max(1)).max(1) as f64;
            for value in &mut acc {
                *value /= count;
            }
        }
        self.output
            .store(TensorData::from_f64(self.output.dtype(), &acc))
    }
}

/// Index of the largest element along `axis`; the first one wins ties.
pub struct ArgMaxKernel {
    input: Arc<Tensor>,
    output: Arc<Tensor>,
    axis: usize,
}

impl ArgMaxKernel {
    pub fn configure(input: Arc<Tensor>, output: Arc<Tensor>, axis: usize) -> KernelResult<Self> {
        reject_quantized("ArgMax", &[&input])?;
        if !matches!(output.dtype(), DataType::Int32 | DataType::Int64) {
            return Err(KernelError::execution(
                "ArgMax",
                format!("output must be an integer tensor, got {}", output.dtype()),
            ));
        }
        Ok(Self {
            input,
            output,
            axis,
        })
    }
}

impl Kernel for ArgMaxKernel {
    fn name(&self) -> &'static str {
        "ArgMax"
    }

    fn execute(&mut self) -> KernelResult<()> {
        let dims = self.input.resolved_dims()?;
        if self.axis >= dims.len() {
            return Err(KernelError::execution("ArgMax", "axis out of range"));
        }
        let outer: usize = dims[..self.axis].iter().product();
        let inner: usize = dims[self.axis + 1..].iter().product();
        let axis_len = dims[self.axis];
        let values = self.input.data()?.to_f64_vec();

        let mut result = Vec::with_capacity(outer * inner);
        for o in 0..outer {
            for i in 0..inner {
                let mut best = 0usize;
                for a in 1..axis_len {
                    if values[(o * axis_len + a) * inner + i]
                        > values[(o * axis_len + best) * inner + i]
                    {
                        best = a;
                    }
                }
                result.push(best as f64);
            }
        }
        self.output
            .store(TensorData::from_f64(self.output.dtype(), &result))
    }
}
