//! Kernel generation: lowering each operation of an op sequence into a kernel.
//!
//! Backends implement [`KernelGenerator`] with one exhaustive `match` over
//! [`OpKind`](crate::ir::OpKind). [`generate_sequence`] drives it, appends the
//! kernels to a function sequence and records the tensor references each
//! kernel holds.

use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, trace};

use crate::exec::dynamic_inferer::DynamicShapeInferer;
use crate::exec::sequence::{
    DynamicFunctionSequence, FunctionSequence, KernelEntry, StaticFunctionSequence,
};
use crate::ir::index::defined;
use crate::ir::{
    resolve_axis, AxisError, FeatureShape, Graph, GraphError, Layout, OpSequence,
    OpSequenceIndex, Operand, OperandIndex, Operation, OperationIndex, PaddingError,
};

use super::dynamic::DynamicTensorManager;
use super::kernel::{Kernel, KernelError};
use super::tensor::Tensor;
use super::tensor_registry::TensorRegistry;

#[derive(Debug, Error)]
pub enum GenerateError {
    #[error("operation {operation} ({opcode}) is malformed: {reason}")]
    Malformed {
        operation: OperationIndex,
        opcode: &'static str,
        reason: String,
    },
    #[error("backend `{backend}` cannot lower {opcode} (operation {operation})")]
    Unsupported {
        operation: OperationIndex,
        opcode: &'static str,
        backend: String,
    },
    #[error(
        "operation {operation} ({opcode}) is layout dependent; frontend {frontend:?} differs from backend {backend:?}"
    )]
    LayoutMismatch {
        operation: OperationIndex,
        opcode: &'static str,
        frontend: Layout,
        backend: Layout,
    },
    #[error("op sequence {sequence:?} is {sequence_layout:?} but the graph's tensors are {graph_layout:?}")]
    SequenceLayout {
        sequence: OpSequenceIndex,
        sequence_layout: Layout,
        graph_layout: Layout,
    },
    #[error("unknown custom operation `{id}`")]
    UnknownCustomOp { id: String },
    #[error("no tensor is bound to {0}")]
    MissingTensor(OperandIndex),
    #[error("{operand} has an unknown shape and backend `{backend}` has no dynamic tensors")]
    DynamicTensorUnsupported {
        operand: OperandIndex,
        backend: String,
    },
    #[error(transparent)]
    Padding(#[from] PaddingError),
    #[error(transparent)]
    Axis(#[from] AxisError),
    #[error(transparent)]
    Graph(#[from] GraphError),
    #[error(transparent)]
    Kernel(#[from] KernelError),
}

pub type GenerateResult<T> = Result<T, GenerateError>;

/// Backend side of tensor management: capability flag plus operand lookup.
pub trait TensorBuilder: Send + Sync {
    fn supports_dynamic_tensor(&self) -> bool;

    /// Layout backend tensors store rank-4 data in.
    fn backend_layout(&self) -> Layout;

    fn registry(&self) -> &Arc<TensorRegistry>;

    fn at(&self, index: OperandIndex) -> Option<Arc<Tensor>> {
        self.registry().get(index)
    }

    fn dynamic_tensor_manager(&self) -> DynamicTensorManager {
        DynamicTensorManager::new(Arc::clone(self.registry()))
    }
}

/// Read-only view handed to a lowering routine for one operation.
pub struct LoweringContext<'a> {
    graph: &'a Graph,
    tensors: &'a dyn TensorBuilder,
    layout: Layout,
    operation: OperationIndex,
}

impl<'a> LoweringContext<'a> {
    pub fn new(
        graph: &'a Graph,
        tensors: &'a dyn TensorBuilder,
        layout: Layout,
        operation: OperationIndex,
    ) -> Self {
        Self {
            graph,
            tensors,
            layout,
            operation,
        }
    }

    pub fn graph(&self) -> &'a Graph {
        self.graph
    }

    /// Layout of the op sequence being lowered.
    pub fn layout(&self) -> Layout {
        self.layout
    }

    pub fn backend_layout(&self) -> Layout {
        self.tensors.backend_layout()
    }

    pub fn operation_index(&self) -> OperationIndex {
        self.operation
    }

    pub fn operand(&self, index: OperandIndex) -> GenerateResult<&'a Operand> {
        Ok(self.graph.operand(index)?)
    }

    pub fn tensor(&self, index: OperandIndex) -> GenerateResult<Arc<Tensor>> {
        self.tensors
            .at(index)
            .ok_or(GenerateError::MissingTensor(index))
    }

    /// `None` for an undefined optional slot; never a placeholder tensor.
    pub fn optional_tensor(&self, index: OperandIndex) -> GenerateResult<Option<Arc<Tensor>>> {
        if index.is_undefined() {
            return Ok(None);
        }
        self.tensor(index).map(Some)
    }

    pub fn tensors(&self, indices: &[OperandIndex]) -> GenerateResult<Vec<Arc<Tensor>>> {
        indices.iter().map(|index| self.tensor(*index)).collect()
    }

    /// Feature-map view of a rank-4 operand in the op sequence layout.
    ///
    /// `None` while any extent is unknown.
    pub fn feature_shape(&self, index: OperandIndex) -> GenerateResult<Option<FeatureShape>> {
        let operand = self.operand(index)?;
        if operand.shape().rank() != 4 {
            return Err(self.malformed(format!(
                "{index} must be rank 4, got {}",
                operand.shape()
            )));
        }
        Ok(FeatureShape::from_shape(operand.shape(), self.layout))
    }

    /// Normalizes `axis` and maps it from the op sequence layout to the backend one.
    pub fn resolve_axis(&self, axis: i32, rank: usize) -> GenerateResult<usize> {
        Ok(resolve_axis(
            i64::from(axis),
            rank,
            self.layout,
            self.backend_layout(),
        )?)
    }

    pub fn malformed(&self, reason: impl Into<String>) -> GenerateError {
        let opcode = self
            .graph
            .operation(self.operation)
            .map(|op| op.name())
            .unwrap_or("unknown");
        GenerateError::Malformed {
            operation: self.operation,
            opcode,
            reason: reason.into(),
        }
    }

    /// Fails when `operation` touches a rank-4 operand while the op sequence and
    /// backend layouts differ. Used by lowerings whose semantics are positional.
    pub fn require_layout_agnostic(&self, operation: &Operation) -> GenerateResult<()> {
        if self.layout.matches(self.backend_layout()) {
            return Ok(());
        }
        let touches_rank4 = defined(operation.inputs())
            .chain(operation.outputs().iter().copied())
            .any(|index| {
                self.graph
                    .operand(index)
                    .map(|operand| operand.shape().rank() == 4)
                    .unwrap_or(false)
            });
        if touches_rank4 {
            return Err(GenerateError::LayoutMismatch {
                operation: self.operation,
                opcode: operation.name(),
                frontend: self.layout,
                backend: self.backend_layout(),
            });
        }
        Ok(())
    }
}

/// Per-backend lowering of IR operations.
pub trait KernelGenerator: Send + Sync {
    fn backend_name(&self) -> &str;

    /// Builds the configured kernel for `operation`. Implementations must not
    /// touch reference counts; [`generate_sequence`] owns that bookkeeping.
    fn lower(
        &self,
        ctx: &LoweringContext<'_>,
        operation: &Operation,
    ) -> GenerateResult<Box<dyn Kernel>>;
}

/// Lowers every operation of `op_seq` in order into one function sequence.
///
/// The sequence flavour follows the backend capability flag. After each kernel
/// is appended, every defined input and every output with a bound tensor gets
/// one reference per occurrence. Any failure aborts the whole sequence.
pub fn generate_sequence(
    graph: &Arc<Graph>,
    op_seq: &OpSequence,
    generator: &dyn KernelGenerator,
    tensors: &Arc<dyn TensorBuilder>,
) -> GenerateResult<Box<dyn FunctionSequence>> {
    let mut sequence: Box<dyn FunctionSequence> = if tensors.supports_dynamic_tensor() {
        let manager = tensors.dynamic_tensor_manager();
        let inferer =
            DynamicShapeInferer::new(Arc::clone(graph), manager.clone(), tensors.backend_layout());
        Box::new(DynamicFunctionSequence::new(Box::new(inferer), manager))
    } else {
        Box::new(StaticFunctionSequence::new(Arc::clone(tensors.registry())))
    };
    debug!(
        backend = generator.backend_name(),
        operations = op_seq.len(),
        layout = ?op_seq.layout(),
        dynamic = tensors.supports_dynamic_tensor(),
        "generating kernels"
    );

    for &index in op_seq.operations() {
        let operation = graph.operation(index)?;
        operation
            .validate()
            .map_err(|reason| GenerateError::Malformed {
                operation: index,
                opcode: operation.name(),
                reason,
            })?;
        let ctx = LoweringContext::new(graph, tensors.as_ref(), op_seq.layout(), index);
        let kernel = generator.lower(&ctx, operation)?;
        trace!(operation = %index, kernel = kernel.name(), "lowered");

        let operands: Vec<OperandIndex> = defined(operation.inputs())
            .chain(operation.outputs().iter().copied())
            .collect();
        for operand in &operands {
            if let Some(tensor) = tensors.at(*operand) {
                tensor.increase_ref();
            }
        }
        sequence.append(KernelEntry::new(index, kernel, operands));
    }
    Ok(sequence)
}
