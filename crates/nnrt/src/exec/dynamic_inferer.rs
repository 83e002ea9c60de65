use std::sync::Arc;

use tracing::trace;

use crate::backend::dynamic::DynamicTensorManager;
use crate::backend::tensor_registry::TensorRegistry;
use crate::ir::{Graph, Layout, OpKind, OperandIndex, OperationIndex};
use crate::shape_inference::{
    check_output_count, infer_output_shapes, ShapeInferenceError, ShapeSource,
};

use super::sequence::ShapeInference;

/// Current tensor shapes and buffer contents as a shape source.
struct TensorShapes<'a> {
    registry: &'a TensorRegistry,
}

impl ShapeSource for TensorShapes<'_> {
    fn dims(&self, index: OperandIndex) -> Option<Vec<usize>> {
        self.registry.get(index)?.dims()
    }

    fn values(&self, index: OperandIndex) -> Option<Vec<f64>> {
        let data = self.registry.get(index)?.data().ok()?;
        Some(data.to_f64_vec())
    }
}

/// Run-time shape inference over backend tensors.
///
/// Operations whose outputs are all static are skipped. Otherwise the output
/// shapes are computed from the inputs' current shapes (and, for
/// value-dependent opcodes, their contents) and applied through the
/// dynamic tensor manager, which also allocates the buffers.
pub struct DynamicShapeInferer {
    graph: Arc<Graph>,
    manager: DynamicTensorManager,
    backend_layout: Layout,
}

impl DynamicShapeInferer {
    pub fn new(graph: Arc<Graph>, manager: DynamicTensorManager, backend_layout: Layout) -> Self {
        Self {
            graph,
            manager,
            backend_layout,
        }
    }
}

impl ShapeInference for DynamicShapeInferer {
    fn infer(&mut self, index: OperationIndex) -> Result<(), ShapeInferenceError> {
        let operation = self.graph.operation(index)?;
        let registry = self.manager.registry();
        let dynamic_output = operation.outputs().iter().copied().find(|output| {
            registry
                .get(*output)
                .map(|tensor| tensor.is_dynamic())
                .unwrap_or(false)
        });
        let Some(first_dynamic) = dynamic_output else {
            return Ok(());
        };

        let src = TensorShapes { registry };
        let inferred =
            infer_output_shapes(operation, self.graph.layout(), self.backend_layout, &src)?;
        let Some(shapes) = inferred else {
            // Custom kernels size their own outputs.
            if matches!(operation.kind(), OpKind::Custom { .. }) {
                return Ok(());
            }
            return Err(ShapeInferenceError::Unresolved {
                op: operation.name(),
                operand: first_dynamic,
            });
        };
        check_output_count(operation, &shapes)?;
        for (output, dims) in operation.outputs().iter().zip(shapes) {
            trace!(operation = %index, operand = %output, ?dims, "dynamic shape");
            self.manager.apply_shape(*output, dims)?;
        }
        Ok(())
    }
}
