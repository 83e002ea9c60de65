use std::ops::RangeInclusive;
use std::sync::Arc;

use super::index::{OperandIndex, OperandIndexSequence};
use super::padding::Padding;
use super::types::{Activation, Stride};

/// Named input positions per opcode.
pub mod slot {
    pub const INPUT: usize = 0;

    pub mod conv {
        pub const INPUT: usize = 0;
        pub const KERNEL: usize = 1;
        pub const BIAS: usize = 2;
    }

    pub mod fully_connected {
        pub const INPUT: usize = 0;
        pub const WEIGHT: usize = 1;
        pub const BIAS: usize = 2;
    }

    pub mod binary {
        pub const LHS: usize = 0;
        pub const RHS: usize = 1;
    }

    pub mod fill {
        pub const SHAPE: usize = 0;
        pub const VALUE: usize = 1;
    }

    pub mod reshape {
        pub const INPUT: usize = 0;
        pub const SHAPE: usize = 1;
    }

    pub mod gather {
        pub const INPUT: usize = 0;
        pub const INDICES: usize = 1;
    }

    pub mod expand_dims {
        pub const INPUT: usize = 0;
        pub const AXIS: usize = 1;
    }

    pub mod pad {
        pub const INPUT: usize = 0;
        pub const PAD: usize = 1;
    }

    pub mod select {
        pub const CONDITION: usize = 0;
        pub const INPUT_TRUE: usize = 1;
        pub const INPUT_FALSE: usize = 2;
    }

    pub mod slice {
        pub const INPUT: usize = 0;
        pub const BEGINS: usize = 1;
        pub const SIZES: usize = 2;
    }

    pub mod strided_slice {
        pub const INPUT: usize = 0;
        pub const STARTS: usize = 1;
        pub const ENDS: usize = 2;
        pub const STRIDES: usize = 3;
    }

    pub mod reverse {
        pub const INPUT: usize = 0;
        pub const AXIS: usize = 1;
    }

    pub mod range {
        pub const START: usize = 0;
        pub const LIMIT: usize = 1;
        pub const DELTA: usize = 2;
    }

    pub mod tile {
        pub const INPUT: usize = 0;
        pub const MULTIPLES: usize = 1;
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Conv2DParams {
    pub padding: Padding,
    pub stride: Stride,
    pub activation: Activation,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DepthwiseConv2DParams {
    pub padding: Padding,
    pub stride: Stride,
    pub multiplier: u32,
    pub activation: Activation,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Pool2DParams {
    pub padding: Padding,
    pub stride: Stride,
    pub kernel_height: u32,
    pub kernel_width: u32,
    pub activation: Activation,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComparisonType {
    Equal,
    NotEqual,
    Greater,
    GreaterEqual,
    Less,
    LessEqual,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReduceKind {
    Sum,
    Prod,
    Max,
    Min,
    All,
    Any,
    Mean,
}

/// Bit masks follow the TensorFlow convention, bit `i` addressing axis `i`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StridedSliceParams {
    pub begin_mask: i32,
    pub end_mask: i32,
    pub shrink_axis_mask: i32,
}

/// Opcode together with its parameters.
#[derive(Debug, Clone, PartialEq)]
pub enum OpKind {
    Conv2D(Conv2DParams),
    DepthwiseConv2D(DepthwiseConv2DParams),
    MaxPool2D(Pool2DParams),
    AvgPool2D(Pool2DParams),
    Concat { axis: i32 },
    Fill,
    FullyConnected { activation: Activation },
    /// `new_shape` is used when no shape operand is supplied.
    Reshape { new_shape: Option<Vec<i32>> },
    /// Empty `dims` removes every unit dimension.
    Squeeze { dims: Vec<i32> },
    Softmax { beta: f32 },
    Add { activation: Activation },
    Sub { activation: Activation },
    Mul { activation: Activation },
    Div { activation: Activation },
    Pow,
    SquaredDifference,
    Max,
    Min,
    Comparison(ComparisonType),
    Gather { axis: i32 },
    OneHot { depth: u32, on_value: f32, off_value: f32, axis: i32 },
    Custom { id: String, userdata: Arc<[u8]> },
    Exp,
    ExpandDims,
    Logistic,
    Tanh,
    Pack { axis: i32, num: u32 },
    Unpack { axis: i32, num: u32 },
    Pad,
    Cast,
    /// Empty `perm` reverses the dimensions.
    Transpose { perm: Vec<i32> },
    Reduce { kind: ReduceKind, axes: Vec<i32>, keep_dims: bool },
    ReLU,
    Select,
    Slice,
    StridedSlice(StridedSliceParams),
    Split { axis: i32, num_splits: u32 },
    Abs,
    Sin,
    Cos,
    Rsqrt,
    Neg,
    Log,
    Round,
    LogicalNot,
    LogicalOr,
    Shape,
    Reverse,
    ArgMax { axis: i32 },
    ZerosLike,
    Range,
    Tile,
    ResizeBilinear { height: u32, width: u32 },
    BatchMatMul { adj_x: bool, adj_y: bool },
}

const ANY: RangeInclusive<usize> = 0..=usize::MAX;

fn exactly(n: usize) -> RangeInclusive<usize> {
    n..=n
}

impl OpKind {
    pub fn name(&self) -> &'static str {
        match self {
            OpKind::Conv2D(_) => "Conv2D",
            OpKind::DepthwiseConv2D(_) => "DepthwiseConv2D",
            OpKind::MaxPool2D(_) => "MaxPool2D",
            OpKind::AvgPool2D(_) => "AvgPool2D",
            OpKind::Concat { .. } => "Concat",
            OpKind::Fill => "Fill",
            OpKind::FullyConnected { .. } => "FullyConnected",
            OpKind::Reshape { .. } => "Reshape",
            OpKind::Squeeze { .. } => "Squeeze",
            OpKind::Softmax { .. } => "Softmax",
            OpKind::Add { .. } => "Add",
            OpKind::Sub { .. } => "Sub",
            OpKind::Mul { .. } => "Mul",
            OpKind::Div { .. } => "Div",
            OpKind::Pow => "Pow",
            OpKind::SquaredDifference => "SquaredDifference",
            OpKind::Max => "Max",
            OpKind::Min => "Min",
            OpKind::Comparison(_) => "Comparison",
            OpKind::Gather { .. } => "Gather",
            OpKind::OneHot { .. } => "OneHot",
            OpKind::Custom { .. } => "Custom",
            OpKind::Exp => "Exp",
            OpKind::ExpandDims => "ExpandDims",
            OpKind::Logistic => "Logistic",
            OpKind::Tanh => "Tanh",
            OpKind::Pack { .. } => "Pack",
            OpKind::Unpack { .. } => "Unpack",
            OpKind::Pad => "Pad",
            OpKind::Cast => "Cast",
            OpKind::Transpose { .. } => "Transpose",
            OpKind::Reduce { kind, .. } => match kind {
                ReduceKind::Sum => "ReduceSum",
                ReduceKind::Prod => "ReduceProd",
                ReduceKind::Max => "ReduceMax",
                ReduceKind::Min => "ReduceMin",
                ReduceKind::All => "ReduceAll",
                ReduceKind::Any => "ReduceAny",
                ReduceKind::Mean => "Mean",
            },
            OpKind::ReLU => "ReLU",
            OpKind::Select => "Select",
            OpKind::Slice => "Slice",
            OpKind::StridedSlice(_) => "StridedSlice",
            OpKind::Split { .. } => "Split",
            OpKind::Abs => "Abs",
            OpKind::Sin => "Sin",
            OpKind::Cos => "Cos",
            OpKind::Rsqrt => "Rsqrt",
            OpKind::Neg => "Neg",
            OpKind::Log => "Log",
            OpKind::Round => "Round",
            OpKind::LogicalNot => "LogicalNot",
            OpKind::LogicalOr => "LogicalOr",
            OpKind::Shape => "Shape",
            OpKind::Reverse => "Reverse",
            OpKind::ArgMax { .. } => "ArgMax",
            OpKind::ZerosLike => "ZerosLike",
            OpKind::Range => "Range",
            OpKind::Tile => "Tile",
            OpKind::ResizeBilinear { .. } => "ResizeBilinear",
            OpKind::BatchMatMul { .. } => "BatchMatMul",
        }
    }

    /// Accepted number of input operands.
    pub fn input_arity(&self) -> RangeInclusive<usize> {
        match self {
            OpKind::Conv2D(_) | OpKind::DepthwiseConv2D(_) => exactly(3),
            OpKind::FullyConnected { .. } => 2..=3,
            OpKind::Reshape { .. } => 1..=2,
            OpKind::Concat { .. } => 1..=usize::MAX,
            OpKind::Pack { num, .. } => exactly(*num as usize),
            OpKind::Custom { .. } => ANY,
            OpKind::Select | OpKind::Slice | OpKind::Range => exactly(3),
            OpKind::StridedSlice(_) => exactly(4),
            OpKind::Fill
            | OpKind::Add { .. }
            | OpKind::Sub { .. }
            | OpKind::Mul { .. }
            | OpKind::Div { .. }
            | OpKind::Pow
            | OpKind::SquaredDifference
            | OpKind::Max
            | OpKind::Min
            | OpKind::Comparison(_)
            | OpKind::Gather { .. }
            | OpKind::ExpandDims
            | OpKind::Pad
            | OpKind::LogicalOr
            | OpKind::Reverse
            | OpKind::Tile
            | OpKind::BatchMatMul { .. } => exactly(2),
            OpKind::MaxPool2D(_)
            | OpKind::AvgPool2D(_)
            | OpKind::Squeeze { .. }
            | OpKind::Softmax { .. }
            | OpKind::OneHot { .. }
            | OpKind::Exp
            | OpKind::Logistic
            | OpKind::Tanh
            | OpKind::Unpack { .. }
            | OpKind::Cast
            | OpKind::Transpose { .. }
            | OpKind::Reduce { .. }
            | OpKind::ReLU
            | OpKind::Split { .. }
            | OpKind::Abs
            | OpKind::Sin
            | OpKind::Cos
            | OpKind::Rsqrt
            | OpKind::Neg
            | OpKind::Log
            | OpKind::Round
            | OpKind::LogicalNot
            | OpKind::Shape
            | OpKind::ArgMax { .. }
            | OpKind::ZerosLike
            | OpKind::ResizeBilinear { .. } => exactly(1),
        }
    }

    /// Accepted number of output operands.
    pub fn output_arity(&self) -> RangeInclusive<usize> {
        match self {
            OpKind::Unpack { num, .. } => exactly(*num as usize),
            OpKind::Split { num_splits, .. } => exactly(*num_splits as usize),
            OpKind::Custom { .. } => 1..=usize::MAX,
            _ => exactly(1),
        }
    }

    /// Whether the input at `slot` may hold [`OperandIndex::UNDEFINED`].
    pub fn is_optional_input(&self, slot: usize) -> bool {
        matches!(self, OpKind::FullyConnected { .. } if slot == slot::fully_connected::BIAS)
    }
}

/// An operation node: opcode, parameters and operand slots.
#[derive(Debug, Clone, PartialEq)]
pub struct Operation {
    kind: OpKind,
    inputs: OperandIndexSequence,
    outputs: OperandIndexSequence,
}

impl Operation {
    pub fn new(
        kind: OpKind,
        inputs: impl IntoIterator<Item = OperandIndex>,
        outputs: impl IntoIterator<Item = OperandIndex>,
    ) -> Self {
        Self {
            kind,
            inputs: inputs.into_iter().collect(),
            outputs: outputs.into_iter().collect(),
        }
    }

    pub fn kind(&self) -> &OpKind {
        &self.kind
    }

    pub fn name(&self) -> &'static str {
        self.kind.name()
    }

    pub fn inputs(&self) -> &[OperandIndex] {
        &self.inputs
    }

    pub fn outputs(&self) -> &[OperandIndex] {
        &self.outputs
    }

    /// Operand at input `slot`; absent trailing slots read as undefined.
    pub fn input(&self, slot: usize) -> OperandIndex {
        self.inputs
            .get(slot)
            .copied()
            .unwrap_or(OperandIndex::UNDEFINED)
    }

    pub fn output(&self, index: usize) -> OperandIndex {
        self.outputs
            .get(index)
            .copied()
            .unwrap_or(OperandIndex::UNDEFINED)
    }

    /// Checks slot counts and required slots against the opcode definition.
    pub fn validate(&self) -> Result<(), String> {
        let inputs = self.kind.input_arity();
        if !inputs.contains(&self.inputs.len()) {
            return Err(format!(
                "{} takes {}..={} inputs, got {}",
                self.name(),
                inputs.start(),
                inputs.end(),
                self.inputs.len()
            ));
        }
        let outputs = self.kind.output_arity();
        if !outputs.contains(&self.outputs.len()) {
            return Err(format!(
                "{} takes {}..={} outputs, got {}",
                self.name(),
                outputs.start(),
                outputs.end(),
                self.outputs.len()
            ));
        }
        for (slot, index) in self.inputs.iter().enumerate() {
            if index.is_undefined() && !self.kind.is_optional_input(slot) {
                return Err(format!("{} input slot {slot} is required", self.name()));
            }
        }
        if let Some(slot) = self.outputs.iter().position(|o| o.is_undefined()) {
            return Err(format!("{} output {slot} is undefined", self.name()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn idx(n: u32) -> OperandIndex {
        OperandIndex(n)
    }

    #[test]
    fn fully_connected_bias_is_optional() {
        let op = Operation::new(
            OpKind::FullyConnected {
                activation: Activation::None,
            },
            [idx(0), idx(1), OperandIndex::UNDEFINED],
            [idx(2)],
        );
        op.validate().expect("bias slot may be undefined");
        assert!(op.input(slot::fully_connected::BIAS).is_undefined());
    }

    #[test]
    fn arity_violations_are_reported() {
        let op = Operation::new(
            OpKind::Add {
                activation: Activation::None,
            },
            [idx(0)],
            [idx(1)],
        );
        let err = op.validate().expect_err("add needs two inputs");
        assert!(err.contains("Add"), "{err}");

        let split = Operation::new(
            OpKind::Split {
                axis: 0,
                num_splits: 3,
            },
            [idx(0)],
            [idx(1), idx(2)],
        );
        assert!(split.validate().is_err());
    }

    #[test]
    fn conv_bias_is_required() {
        let op = Operation::new(
            OpKind::Conv2D(Conv2DParams {
                padding: Padding::Valid,
                stride: Stride::default(),
                activation: Activation::None,
            }),
            [idx(0), idx(1), OperandIndex::UNDEFINED],
            [idx(2)],
        );
        assert!(op.validate().is_err());
    }
}
