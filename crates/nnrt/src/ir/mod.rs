//! Graph intermediate representation.
//!
//! Operands and operations are stored in index-addressed arenas owned by a
//! [`Graph`]. Def/use edges are derived once by [`Graph::finish_building`] and are
//! checked, not enforced, by [`crate::verifier`].

pub mod data;
pub mod graph;
pub mod index;
pub mod layout;
pub mod operand;
pub mod operation;
pub mod padding;
pub mod types;

pub use data::TensorData;
pub use graph::{Graph, GraphError, OpSequence, OpSequences};
pub use index::{OpSequenceIndex, OperandIndex, OperandIndexSequence, OperationIndex};
pub use layout::{
    convert_dims, convert_indices, normalize_axis, resolve_axis, AxisError, FeatureShape, Layout,
};
pub use operand::Operand;
pub use operation::{
    slot, ComparisonType, Conv2DParams, DepthwiseConv2DParams, OpKind, Operation, Pool2DParams,
    ReduceKind, StridedSliceParams,
};
pub use padding::{calculate_padding, ExplicitPadding, Padding, PaddingError};
pub use types::{Activation, DataType, Dim, QuantParams, Shape, Stride, TypeInfo};
