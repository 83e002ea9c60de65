use std::collections::HashMap;
use std::sync::Arc;

use tracing::trace;

use crate::ir::OperandIndex;

use super::tensor::Tensor;

/// Operand to tensor mapping of one compiled graph.
#[derive(Debug, Default)]
pub struct TensorRegistry {
    tensors: HashMap<OperandIndex, Arc<Tensor>>,
}

impl TensorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, tensor: Tensor) -> Arc<Tensor> {
        let tensor = Arc::new(tensor);
        self.tensors.insert(tensor.index(), Arc::clone(&tensor));
        tensor
    }

    pub fn get(&self, index: OperandIndex) -> Option<Arc<Tensor>> {
        self.tensors.get(&index).cloned()
    }

    pub fn contains(&self, index: OperandIndex) -> bool {
        self.tensors.contains_key(&index)
    }

    pub fn len(&self) -> usize {
        self.tensors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tensors.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&OperandIndex, &Arc<Tensor>)> {
        self.tensors.iter()
    }

    /// Resets every live count to its generation-time total.
    pub fn rearm_all(&self) {
        for tensor in self.tensors.values() {
            tensor.rearm();
        }
    }

    /// Drops one reference per listed occurrence.
    ///
    /// Returns the operands whose count reached zero; freeing them is up to the caller.
    pub fn drop_references(&self, operands: &[OperandIndex]) -> Vec<OperandIndex> {
        let mut exhausted = Vec::new();
        for index in operands {
            let Some(tensor) = self.tensors.get(index) else {
                continue;
            };
            if tensor.decrease_ref() {
                trace!(operand = %index, pinned = tensor.is_pinned(), "reference count reached zero");
                exhausted.push(*index);
            }
        }
        exhausted
    }

    /// Frees the buffer of `index` unless it is pinned.
    pub fn release(&self, index: OperandIndex) {
        if let Some(tensor) = self.tensors.get(&index) {
            tensor.release();
        }
    }
}
