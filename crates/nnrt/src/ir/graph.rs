use std::collections::VecDeque;

use thiserror::Error;

use super::data::TensorData;
use super::index::{deduplicated, defined, OpSequenceIndex, OperandIndex, OperandIndexSequence, OperationIndex};
use super::layout::Layout;
use super::operand::Operand;
use super::operation::Operation;
use super::types::{Shape, TypeInfo};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GraphError {
    #[error("unknown operand {0}")]
    UnknownOperand(OperandIndex),
    #[error("unknown operation {0}")]
    UnknownOperation(OperationIndex),
    #[error("constant for {operand} holds {actual} elements, shape requires {expected}")]
    ConstantLength {
        operand: OperandIndex,
        expected: usize,
        actual: usize,
    },
    #[error("constant for {operand} is {actual}, operand is declared {expected}")]
    ConstantType {
        operand: OperandIndex,
        expected: super::types::DataType,
        actual: super::types::DataType,
    },
    #[error("constant operand {0} must have a fully known shape")]
    ConstantShape(OperandIndex),
    #[error("graph contains a cycle through operation {0}")]
    Cycle(OperationIndex),
}

/// Ordered run of operations sharing one memory layout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpSequence {
    layout: Layout,
    operations: Vec<OperationIndex>,
}

impl OpSequence {
    pub fn new(layout: Layout) -> Self {
        Self {
            layout,
            operations: Vec::new(),
        }
    }

    pub fn with_operations(layout: Layout, operations: Vec<OperationIndex>) -> Self {
        Self { layout, operations }
    }

    pub fn layout(&self) -> Layout {
        self.layout
    }

    pub fn operations(&self) -> &[OperationIndex] {
        &self.operations
    }

    pub fn append(&mut self, operation: OperationIndex) {
        self.operations.push(operation);
    }

    pub fn len(&self) -> usize {
        self.operations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OpSequences {
    sequences: Vec<OpSequence>,
}

impl OpSequences {
    pub fn push(&mut self, sequence: OpSequence) -> OpSequenceIndex {
        self.sequences.push(sequence);
        OpSequenceIndex(self.sequences.len() as u32 - 1)
    }

    pub fn get(&self, index: OpSequenceIndex) -> Option<&OpSequence> {
        self.sequences.get(index.0 as usize)
    }

    pub fn iter(&self) -> impl Iterator<Item = (OpSequenceIndex, &OpSequence)> {
        self.sequences
            .iter()
            .enumerate()
            .map(|(i, seq)| (OpSequenceIndex(i as u32), seq))
    }

    pub fn len(&self) -> usize {
        self.sequences.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sequences.is_empty()
    }
}

/// Operand and operation arenas plus graph boundary and op sequences.
#[derive(Debug, Clone, Default)]
pub struct Graph {
    operands: Vec<Operand>,
    operations: Vec<Operation>,
    inputs: OperandIndexSequence,
    outputs: OperandIndexSequence,
    layout: Layout,
    op_seqs: OpSequences,
}

impl Graph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_layout(layout: Layout) -> Self {
        Self {
            layout,
            ..Self::default()
        }
    }

    /// Frontend layout of the model.
    pub fn layout(&self) -> Layout {
        self.layout
    }

    pub fn add_operand(&mut self, shape: Shape, type_info: TypeInfo) -> OperandIndex {
        self.operands.push(Operand::new(shape, type_info));
        OperandIndex(self.operands.len() as u32 - 1)
    }

    /// Attaches a constant buffer. The operand shape must be fully known.
    pub fn set_operand_data(
        &mut self,
        index: OperandIndex,
        data: TensorData,
    ) -> Result<(), GraphError> {
        let operand = self.operand_mut(index)?;
        let expected = operand
            .shape()
            .num_elements()
            .ok_or(GraphError::ConstantShape(index))?;
        if data.len() != expected {
            return Err(GraphError::ConstantLength {
                operand: index,
                expected,
                actual: data.len(),
            });
        }
        if data.dtype() != operand.type_info().dtype {
            return Err(GraphError::ConstantType {
                operand: index,
                expected: operand.type_info().dtype,
                actual: data.dtype(),
            });
        }
        operand.set_data(data);
        Ok(())
    }

    /// Adds a constant operand in one step.
    pub fn add_constant(
        &mut self,
        shape: Shape,
        type_info: TypeInfo,
        data: TensorData,
    ) -> Result<OperandIndex, GraphError> {
        let index = self.add_operand(shape, type_info);
        self.set_operand_data(index, data)?;
        Ok(index)
    }

    /// Appends an operation after checking that every referenced operand exists.
    pub fn add_operation(&mut self, operation: Operation) -> Result<OperationIndex, GraphError> {
        for index in defined(operation.inputs()).chain(defined(operation.outputs())) {
            if index.as_usize() >= self.operands.len() {
                return Err(GraphError::UnknownOperand(index));
            }
        }
        self.operations.push(operation);
        Ok(OperationIndex(self.operations.len() as u32 - 1))
    }

    pub fn add_input(&mut self, index: OperandIndex) {
        self.inputs.push(index);
    }

    pub fn add_output(&mut self, index: OperandIndex) {
        self.outputs.push(index);
    }

    pub fn inputs(&self) -> &[OperandIndex] {
        &self.inputs
    }

    pub fn outputs(&self) -> &[OperandIndex] {
        &self.outputs
    }

    pub fn is_boundary(&self, index: OperandIndex) -> bool {
        self.inputs.contains(&index) || self.outputs.contains(&index)
    }

    /// Derives def/use edges from the operation operand lists.
    pub fn finish_building(&mut self) {
        for (i, operation) in self.operations.iter().enumerate() {
            let op_index = OperationIndex(i as u32);
            for index in defined(operation.inputs()) {
                if let Some(operand) = self.operands.get_mut(index.as_usize()) {
                    operand.insert_use(op_index);
                }
            }
            for index in defined(operation.outputs()) {
                if let Some(operand) = self.operands.get_mut(index.as_usize()) {
                    operand.set_def(op_index);
                }
            }
        }
    }

    pub fn operand(&self, index: OperandIndex) -> Result<&Operand, GraphError> {
        self.operands
            .get(index.as_usize())
            .ok_or(GraphError::UnknownOperand(index))
    }

    pub fn operand_mut(&mut self, index: OperandIndex) -> Result<&mut Operand, GraphError> {
        self.operands
            .get_mut(index.as_usize())
            .ok_or(GraphError::UnknownOperand(index))
    }

    pub fn operation(&self, index: OperationIndex) -> Result<&Operation, GraphError> {
        self.operations
            .get(index.as_usize())
            .ok_or(GraphError::UnknownOperation(index))
    }

    pub fn operands(&self) -> impl Iterator<Item = (OperandIndex, &Operand)> {
        self.operands
            .iter()
            .enumerate()
            .map(|(i, operand)| (OperandIndex(i as u32), operand))
    }

    pub fn operations(&self) -> impl Iterator<Item = (OperationIndex, &Operation)> {
        self.operations
            .iter()
            .enumerate()
            .map(|(i, operation)| (OperationIndex(i as u32), operation))
    }

    pub fn operand_count(&self) -> usize {
        self.operands.len()
    }

    pub fn operation_count(&self) -> usize {
        self.operations.len()
    }

    pub fn op_sequences(&self) -> &OpSequences {
        &self.op_seqs
    }

    pub fn add_op_sequence(&mut self, sequence: OpSequence) -> OpSequenceIndex {
        self.op_seqs.push(sequence)
    }

    /// Kahn ordering over def/use edges; ties resolve by operation index.
    pub fn topological_order(&self) -> Result<Vec<OperationIndex>, GraphError> {
        let mut pending = vec![0usize; self.operations.len()];
        for (i, operation) in self.operations.iter().enumerate() {
            pending[i] = defined(operation.inputs())
                .filter(|index| {
                    self.operand(*index)
                        .ok()
                        .and_then(|operand| operand.def())
                        .is_some()
                })
                .count();
        }

        let mut ready: VecDeque<usize> = (0..self.operations.len())
            .filter(|&i| pending[i] == 0)
            .collect();
        let mut order = Vec::with_capacity(self.operations.len());
        while let Some(i) = ready.pop_front() {
            order.push(OperationIndex(i as u32));
            for output in deduplicated(self.operations[i].outputs()) {
                if output.is_undefined() {
                    continue;
                }
                let Ok(operand) = self.operand(output) else {
                    continue;
                };
                for user in operand.uses() {
                    let Some(operation) = self.operations.get(user.as_usize()) else {
                        continue;
                    };
                    let hits = operation.inputs().iter().filter(|s| **s == output).count();
                    let count = &mut pending[user.as_usize()];
                    let before = *count;
                    *count = before.saturating_sub(hits);
                    if before > 0 && *count == 0 {
                        ready.push_back(user.as_usize());
                    }
                }
            }
        }

        if order.len() != self.operations.len() {
            let stuck = (0..self.operations.len())
                .find(|i| !order.contains(&OperationIndex(*i as u32)))
                .unwrap_or_default();
            return Err(GraphError::Cycle(OperationIndex(stuck as u32)));
        }
        Ok(order)
    }

    /// Builds one op sequence in topological order when the importer supplied none.
    pub fn linearize(&mut self) -> Result<(), GraphError> {
        if !self.op_seqs.is_empty() {
            return Ok(());
        }
        let order = self.topological_order()?;
        self.op_seqs
            .push(OpSequence::with_operations(self.layout, order));
        Ok(())
    }
}
