use std::collections::HashSet;
use std::sync::Arc;

use nnrt::backend::{GenerateError, GenerateResult, TensorBuilder, TensorRegistry};
use nnrt::ir::operation::slot;
use nnrt::ir::{convert_dims, convert_indices, Graph, Layout, OpKind, OperandIndex};
use nnrt::{KernelError, Tensor};
use tracing::debug;

/// Host tensors for the CPU backend, always laid out NHWC.
///
/// Rank-4 operands declared in another frontend layout are re-shaped (and
/// constant data reordered) on registration, except convolution kernels whose
/// `[out, kh, kw, in]` format does not depend on the feature layout.
pub struct CpuTensorBuilder {
    registry: Arc<TensorRegistry>,
    dynamic: bool,
}

impl CpuTensorBuilder {
    pub const LAYOUT: Layout = Layout::NHWC;

    /// Registers a tensor for every operand of `graph`.
    ///
    /// Operands without a fully known shape become dynamic tensors when
    /// `dynamic` is set and are rejected otherwise.
    pub fn build(graph: &Graph, dynamic: bool) -> GenerateResult<Self> {
        let frontend = graph.layout();
        let kernels = convolution_kernels(graph);
        let mut registry = TensorRegistry::new();
        let mut dynamic_count = 0usize;

        for (index, operand) in graph.operands() {
            let type_info = operand.type_info().clone();
            let from = if kernels.contains(&index) {
                Self::LAYOUT
            } else {
                frontend
            };
            let tensor = match (operand.shape().known_dims(), operand.data()) {
                (Some(dims), Some(data)) => {
                    let data = match convert_indices(&dims, from, Self::LAYOUT) {
                        Some(indices) => data.gather(&indices).ok_or(KernelError::BufferMismatch {
                            operand: index,
                            reason: "constant does not match its shape".into(),
                        })?,
                        None => data.as_ref().clone(),
                    };
                    let dims = convert_dims(&dims, from, Self::LAYOUT);
                    Tensor::new_constant(index, type_info, dims, Self::LAYOUT, data)
                }
                (Some(dims), None) => Tensor::new_static(
                    index,
                    type_info,
                    convert_dims(&dims, from, Self::LAYOUT),
                    Self::LAYOUT,
                ),
                (None, _) if dynamic => {
                    dynamic_count += 1;
                    Tensor::new_dynamic(index, type_info, Self::LAYOUT)
                }
                (None, _) => {
                    return Err(GenerateError::DynamicTensorUnsupported {
                        operand: index,
                        backend: "cpu".to_string(),
                    })
                }
            };
            let tensor = if graph.is_boundary(index) {
                tensor.pinned()
            } else {
                tensor
            };
            registry.insert(tensor);
        }
        debug!(
            tensors = registry.len(),
            dynamic = dynamic_count,
            ?frontend,
            "registered cpu tensors"
        );
        Ok(Self {
            registry: Arc::new(registry),
            dynamic,
        })
    }
}

fn convolution_kernels(graph: &Graph) -> HashSet<OperandIndex> {
    graph
        .operations()
        .filter(|(_, op)| {
            matches!(
                op.kind(),
                OpKind::Conv2D(_) | OpKind::DepthwiseConv2D(_)
            )
        })
        .map(|(_, op)| op.input(slot::conv::KERNEL))
        .collect()
}

impl TensorBuilder for CpuTensorBuilder {
    fn supports_dynamic_tensor(&self) -> bool {
        self.dynamic
    }

    fn backend_layout(&self) -> Layout {
        Self::LAYOUT
    }

    fn registry(&self) -> &Arc<TensorRegistry> {
        &self.registry
    }
}
