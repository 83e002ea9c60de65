use std::sync::Arc;

use thiserror::Error;
use tracing::trace;

use crate::backend::dynamic::DynamicTensorManager;
use crate::backend::kernel::{Kernel, KernelError};
use crate::backend::tensor_registry::TensorRegistry;
use crate::ir::{OperandIndex, OperationIndex};
use crate::shape_inference::ShapeInferenceError;

#[derive(Debug, Error)]
pub enum ExecuteError {
    #[error("kernel for operation {operation} failed")]
    Kernel {
        operation: OperationIndex,
        #[source]
        source: KernelError,
    },
    #[error("shape inference for operation {operation} failed")]
    ShapeInference {
        operation: OperationIndex,
        #[source]
        source: ShapeInferenceError,
    },
    #[error("graph has no input at position {0}")]
    UnknownInput(usize),
    #[error("graph has no output at position {0}")]
    UnknownOutput(usize),
    #[error("input {position} expects shape {expected:?}, got {actual:?}")]
    InputShape {
        position: usize,
        expected: Vec<usize>,
        actual: Vec<usize>,
    },
    #[error("input {0} was not set before run")]
    MissingInput(usize),
    #[error(transparent)]
    Tensor(#[from] KernelError),
}

pub type ExecuteResult<T> = Result<T, ExecuteError>;

/// One generated kernel together with the operands it holds references on.
pub struct KernelEntry {
    operation: OperationIndex,
    kernel: Box<dyn Kernel>,
    operands: Vec<OperandIndex>,
}

impl KernelEntry {
    pub fn new(
        operation: OperationIndex,
        kernel: Box<dyn Kernel>,
        operands: Vec<OperandIndex>,
    ) -> Self {
        Self {
            operation,
            kernel,
            operands,
        }
    }

    pub fn operation(&self) -> OperationIndex {
        self.operation
    }

    pub fn name(&self) -> &'static str {
        self.kernel.name()
    }

    /// Defined inputs then outputs, one entry per occurrence.
    pub fn operands(&self) -> &[OperandIndex] {
        &self.operands
    }

    fn execute(&mut self) -> ExecuteResult<()> {
        self.kernel
            .execute()
            .map_err(|source| ExecuteError::Kernel {
                operation: self.operation,
                source,
            })
    }
}

/// Ordered kernels of one op sequence.
pub trait FunctionSequence: Send {
    fn append(&mut self, entry: KernelEntry);

    /// Runs every kernel once in generation order.
    fn run(&mut self) -> ExecuteResult<()>;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn kernel_names(&self) -> Vec<&'static str>;

    fn is_dynamic(&self) -> bool;
}

/// Kernels over fully known shapes, executed back to back.
pub struct StaticFunctionSequence {
    entries: Vec<KernelEntry>,
    registry: Arc<TensorRegistry>,
}

impl StaticFunctionSequence {
    pub fn new(registry: Arc<TensorRegistry>) -> Self {
        Self {
            entries: Vec::new(),
            registry,
        }
    }
}

impl FunctionSequence for StaticFunctionSequence {
    fn append(&mut self, entry: KernelEntry) {
        self.entries.push(entry);
    }

    fn run(&mut self) -> ExecuteResult<()> {
        for entry in &mut self.entries {
            trace!(operation = %entry.operation, kernel = entry.name(), "execute");
            entry.execute()?;
            for operand in self.registry.drop_references(&entry.operands) {
                self.registry.release(operand);
            }
        }
        Ok(())
    }

    fn len(&self) -> usize {
        self.entries.len()
    }

    fn kernel_names(&self) -> Vec<&'static str> {
        self.entries.iter().map(KernelEntry::name).collect()
    }

    fn is_dynamic(&self) -> bool {
        false
    }
}

/// Resolves the output shapes of one operation right before its kernel runs.
pub trait ShapeInference: Send {
    fn infer(&mut self, operation: OperationIndex) -> Result<(), ShapeInferenceError>;
}

/// Sequence for backends with dynamic tensors: every kernel is preceded by a
/// shape inference step for its operation.
pub struct DynamicFunctionSequence {
    entries: Vec<KernelEntry>,
    inferer: Box<dyn ShapeInference>,
    manager: DynamicTensorManager,
}

impl DynamicFunctionSequence {
    pub fn new(inferer: Box<dyn ShapeInference>, manager: DynamicTensorManager) -> Self {
        Self {
            entries: Vec::new(),
            inferer,
            manager,
        }
    }
}

impl FunctionSequence for DynamicFunctionSequence {
    fn append(&mut self, entry: KernelEntry) {
        self.entries.push(entry);
    }

    fn run(&mut self) -> ExecuteResult<()> {
        for entry in &mut self.entries {
            let operation = entry.operation;
            self.inferer
                .infer(operation)
                .map_err(|source| ExecuteError::ShapeInference { operation, source })?;
            trace!(operation = %operation, kernel = entry.name(), "execute");
            entry.execute()?;
            let registry = self.manager.registry();
            for operand in registry.drop_references(&entry.operands) {
                self.manager.deallocate(operand)?;
            }
        }
        Ok(())
    }

    fn len(&self) -> usize {
        self.entries.len()
    }

    fn kernel_names(&self) -> Vec<&'static str> {
        self.entries.iter().map(KernelEntry::name).collect()
    }

    fn is_dynamic(&self) -> bool {
        true
    }
}

impl std::fmt::Debug for dyn FunctionSequence {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FunctionSequence")
            .field("dynamic", &self.is_dynamic())
            .field("kernels", &self.kernel_names())
            .finish()
    }
}
