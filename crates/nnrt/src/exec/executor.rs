use std::sync::Arc;

use tracing::debug;

use crate::backend::generator::TensorBuilder;
use crate::backend::kernel::KernelError;
use crate::backend::tensor::Tensor;
use crate::ir::{convert_dims, convert_indices, Graph, Layout, OperandIndex, TensorData};

use super::sequence::{ExecuteError, ExecuteResult, FunctionSequence};

/// A compiled program: the function sequences of every op sequence, in order,
/// plus the tensors they operate on.
///
/// Boundary data is exchanged in the graph's layout; rank-4 buffers are
/// reordered to and from the backend layout on the way in and out.
pub struct Executor {
    graph: Arc<Graph>,
    tensors: Arc<dyn TensorBuilder>,
    sequences: Vec<Box<dyn FunctionSequence>>,
}

impl Executor {
    pub fn new(
        graph: Arc<Graph>,
        tensors: Arc<dyn TensorBuilder>,
        sequences: Vec<Box<dyn FunctionSequence>>,
    ) -> Self {
        Self {
            graph,
            tensors,
            sequences,
        }
    }

    pub fn graph(&self) -> &Arc<Graph> {
        &self.graph
    }

    pub fn sequences(&self) -> &[Box<dyn FunctionSequence>] {
        &self.sequences
    }

    /// Kernel names across all sequences in execution order.
    pub fn kernel_names(&self) -> Vec<&'static str> {
        self.sequences
            .iter()
            .flat_map(|sequence| sequence.kernel_names())
            .collect()
    }

    pub fn is_dynamic(&self) -> bool {
        self.sequences.iter().any(|sequence| sequence.is_dynamic())
    }

    pub fn tensor(&self, index: OperandIndex) -> Option<Arc<Tensor>> {
        self.tensors.at(index)
    }

    fn frontend_layout(&self) -> Layout {
        self.graph.layout()
    }

    fn boundary_tensor(&self, index: OperandIndex) -> ExecuteResult<Arc<Tensor>> {
        self.tensors
            .at(index)
            .ok_or(ExecuteError::Tensor(KernelError::UnknownTensor { operand: index }))
    }

    /// Binds the graph input at `position` to `data` shaped `dims`.
    ///
    /// Static inputs must match their declared shape; dynamic inputs take
    /// whatever shape is supplied.
    pub fn set_input(
        &mut self,
        position: usize,
        dims: &[usize],
        data: TensorData,
    ) -> ExecuteResult<()> {
        let index = *self
            .graph
            .inputs()
            .get(position)
            .ok_or(ExecuteError::UnknownInput(position))?;
        let tensor = self.boundary_tensor(index)?;
        let frontend = self.frontend_layout();

        let expected_len: usize = dims.iter().product();
        if data.len() != expected_len {
            return Err(KernelError::BufferMismatch {
                operand: index,
                reason: format!("{} elements for shape {dims:?}", data.len()),
            }
            .into());
        }

        let backend_dims = convert_dims(dims, frontend, tensor.layout());
        if tensor.is_dynamic() {
            tensor.set_dims(backend_dims)?;
        } else if tensor.dims().as_deref() != Some(backend_dims.as_slice()) {
            let expected = tensor
                .dims()
                .map(|declared| convert_dims(&declared, tensor.layout(), frontend))
                .unwrap_or_default();
            return Err(ExecuteError::InputShape {
                position,
                expected,
                actual: dims.to_vec(),
            });
        }

        let data = match convert_indices(dims, frontend, tensor.layout()) {
            Some(indices) => data.gather(&indices).ok_or(KernelError::BufferMismatch {
                operand: index,
                reason: "layout conversion out of range".into(),
            })?,
            None => data,
        };
        tensor.store(data)?;
        Ok(())
    }

    /// Runs every sequence once. Inputs must have been set.
    pub fn run(&mut self) -> ExecuteResult<()> {
        for (position, index) in self.graph.inputs().iter().enumerate() {
            let tensor = self.boundary_tensor(*index)?;
            if !tensor.has_buffer() {
                return Err(ExecuteError::MissingInput(position));
            }
        }
        self.tensors.registry().rearm_all();
        debug!(sequences = self.sequences.len(), "run");
        for sequence in &mut self.sequences {
            sequence.run()?;
        }
        Ok(())
    }

    /// Shape and contents of the graph output at `position`, in the graph layout.
    pub fn output(&self, position: usize) -> ExecuteResult<(Vec<usize>, TensorData)> {
        let index = *self
            .graph
            .outputs()
            .get(position)
            .ok_or(ExecuteError::UnknownOutput(position))?;
        let tensor = self.boundary_tensor(index)?;
        let dims = tensor.resolved_dims()?;
        let data = tensor.data()?;
        let frontend = self.frontend_layout();
        let data = match convert_indices(&dims, tensor.layout(), frontend) {
            Some(indices) => data.gather(&indices).ok_or(KernelError::BufferMismatch {
                operand: index,
                reason: "layout conversion out of range".into(),
            })?,
            None => data,
        };
        Ok((convert_dims(&dims, tensor.layout(), frontend), data))
    }
}

impl std::fmt::Debug for Executor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Executor")
            .field("sequences", &self.sequences)
            .finish_non_exhaustive()
    }
}
