use std::sync::Arc;

use smallvec::SmallVec;

use super::data::TensorData;
use super::index::OperationIndex;
use super::types::{Shape, TypeInfo};

/// A typed, shaped value in the graph.
///
/// Graph inputs and constants have no defining operation; every other operand
/// is produced by exactly one operation once the graph is consistent.
#[derive(Debug, Clone)]
pub struct Operand {
    shape: Shape,
    type_info: TypeInfo,
    data: Option<Arc<TensorData>>,
    def: Option<OperationIndex>,
    uses: SmallVec<[OperationIndex; 4]>,
}

impl Operand {
    pub fn new(shape: Shape, type_info: TypeInfo) -> Self {
        Self {
            shape,
            type_info,
            data: None,
            def: None,
            uses: SmallVec::new(),
        }
    }

    pub fn shape(&self) -> &Shape {
        &self.shape
    }

    pub fn shape_mut(&mut self) -> &mut Shape {
        &mut self.shape
    }

    pub fn type_info(&self) -> &TypeInfo {
        &self.type_info
    }

    pub fn data(&self) -> Option<&Arc<TensorData>> {
        self.data.as_ref()
    }

    pub fn is_constant(&self) -> bool {
        self.data.is_some()
    }

    pub(crate) fn set_data(&mut self, data: TensorData) {
        self.data = Some(Arc::new(data));
    }

    pub fn def(&self) -> Option<OperationIndex> {
        self.def
    }

    pub fn set_def(&mut self, def: OperationIndex) {
        self.def = Some(def);
    }

    pub fn unset_def(&mut self) {
        self.def = None;
    }

    pub fn uses(&self) -> &[OperationIndex] {
        &self.uses
    }

    pub fn has_use(&self, operation: OperationIndex) -> bool {
        self.uses.contains(&operation)
    }

    /// Records `operation` as a consumer. The use set holds each operation once.
    pub fn insert_use(&mut self, operation: OperationIndex) {
        if !self.uses.contains(&operation) {
            self.uses.push(operation);
        }
    }

    pub fn remove_use(&mut self, operation: OperationIndex) {
        self.uses.retain(|u| *u != operation);
    }
}
