use std::sync::Arc;

use tracing::trace;

use crate::ir::OperandIndex;

use super::kernel::{KernelError, KernelResult};
use super::tensor_registry::TensorRegistry;

/// Resolves shapes of dynamic tensors and owns their buffers.
#[derive(Debug, Clone)]
pub struct DynamicTensorManager {
    registry: Arc<TensorRegistry>,
}

impl DynamicTensorManager {
    pub fn new(registry: Arc<TensorRegistry>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &Arc<TensorRegistry> {
        &self.registry
    }

    /// Fixes the extents of `index` and allocates a matching buffer.
    ///
    /// Static tensors only accept their declared shape and keep their buffer.
    pub fn apply_shape(&self, index: OperandIndex, dims: Vec<usize>) -> KernelResult<()> {
        let tensor = self
            .registry
            .get(index)
            .ok_or(KernelError::UnknownTensor { operand: index })?;
        if !tensor.is_dynamic() {
            return tensor.set_dims(dims);
        }
        trace!(operand = %index, ?dims, "resolved dynamic shape");
        tensor.set_dims(dims)?;
        tensor.allocate()
    }

    pub fn deallocate(&self, index: OperandIndex) -> KernelResult<()> {
        let tensor = self
            .registry
            .get(index)
            .ok_or(KernelError::UnknownTensor { operand: index })?;
        tensor.release();
        Ok(())
    }
}
