use std::sync::Arc;

use nnrt::backend::{
    CustomKernelConfigParams, CustomKernelRegistry, CustomTypeInfo, GenerateError,
    GenerateResult, KernelGenerator, LoweringContext,
};
use nnrt::ir::index::defined;
use nnrt::ir::operation::slot;
use nnrt::ir::{
    calculate_padding, Activation, ExplicitPadding, OpKind, OperandIndex, Operation, Padding,
    Stride,
};
use nnrt::shape_inference::reduction_mask;
use nnrt::{Kernel, Tensor};

use crate::ops::{
    ArgMaxKernel, ArithmeticType, BinaryArithmeticKernel, CastKernel, ComparisonKernel,
    ConcatKernel, ConvolutionKernel, DepthwiseConvolutionKernel, ElementwiseUnaryKernel,
    FillKernel, FullyConnectedKernel, GatherKernel, JoinMode, LogicalNotKernel,
    LogicalOrKernel, OneHotKernel, PadKernel, PoolKernel, PoolType, RangeKernel, ReduceKernel,
    ReshapeKernel, ReverseKernel, SelectKernel, ShapeKernel, SliceKernel, SoftmaxKernel,
    SplitKernel, SplitMode, StridedSliceKernel, TileKernel, TransposeKernel, UnaryType,
    ZerosLikeKernel,
};

/// Lowers IR operations onto the reference kernels.
pub struct CpuKernelGenerator {
    custom: Arc<CustomKernelRegistry>,
}

impl CpuKernelGenerator {
    pub fn new(custom: Arc<CustomKernelRegistry>) -> Self {
        Self { custom }
    }

    fn unsupported(ctx: &LoweringContext<'_>, operation: &Operation) -> GenerateError {
        GenerateError::Unsupported {
            operation: ctx.operation_index(),
            opcode: operation.name(),
            backend: "cpu".to_string(),
        }
    }

    /// Rejects operations whose meaning depends on element positions when the
    /// op sequence layout differs from NHWC. Window ops and axis-carrying
    /// joins translate themselves; element-wise ops are position independent.
    fn check_layout(ctx: &LoweringContext<'_>, operation: &Operation) -> GenerateResult<()> {
        match operation.kind() {
            OpKind::Conv2D(_)
            | OpKind::DepthwiseConv2D(_)
            | OpKind::MaxPool2D(_)
            | OpKind::AvgPool2D(_)
            | OpKind::Concat { .. }
            | OpKind::Split { .. }
            | OpKind::Exp
            | OpKind::Logistic
            | OpKind::Tanh
            | OpKind::ReLU
            | OpKind::Abs
            | OpKind::Sin
            | OpKind::Cos
            | OpKind::Rsqrt
            | OpKind::Neg
            | OpKind::Log
            | OpKind::Round
            | OpKind::LogicalNot
            | OpKind::Cast
            | OpKind::ZerosLike => Ok(()),
            OpKind::Add { .. }
            | OpKind::Sub { .. }
            | OpKind::Mul { .. }
            | OpKind::Div { .. }
            | OpKind::Pow
            | OpKind::SquaredDifference
            | OpKind::Max
            | OpKind::Min
            | OpKind::Comparison(_)
            | OpKind::LogicalOr
            | OpKind::Select => {
                // Equal ranks broadcast identically in either layout.
                let mut ranks = defined(operation.inputs())
                    .chain(operation.outputs().iter().copied())
                    .map(|index| ctx.operand(index).map(|operand| operand.shape().rank()));
                let first = ranks.next().transpose()?;
                for rank in ranks {
                    if Some(rank?) != first {
                        return ctx.require_layout_agnostic(operation);
                    }
                }
                Ok(())
            }
            _ => ctx.require_layout_agnostic(operation),
        }
    }

    /// Padding amounts, when every extent is already known.
    fn explicit_padding(
        ctx: &LoweringContext<'_>,
        operation: &Operation,
        padding: &Padding,
        stride: &Stride,
        window: Option<(usize, usize)>,
    ) -> GenerateResult<Option<ExplicitPadding>> {
        let ifm = ctx.feature_shape(operation.input(slot::INPUT))?;
        let ofm = ctx.feature_shape(operation.output(0))?;
        match (ifm, ofm, window) {
            (Some(ifm), Some(ofm), Some((width, height))) => Ok(Some(calculate_padding(
                padding, &ifm, &ofm, stride, width, height,
            )?)),
            _ => Ok(None),
        }
    }

    /// `(width, height)` of a convolution kernel operand.
    fn kernel_window(
        ctx: &LoweringContext<'_>,
        operation: &Operation,
    ) -> GenerateResult<Option<(usize, usize)>> {
        let shape = ctx.operand(operation.input(slot::conv::KERNEL))?.shape();
        if shape.rank() != 4 {
            return Err(ctx.malformed(format!("kernel must be rank 4, got {shape}")));
        }
        Ok(shape.known_dims().map(|dims| (dims[2], dims[1])))
    }

    fn rank(ctx: &LoweringContext<'_>, index: OperandIndex) -> GenerateResult<usize> {
        Ok(ctx.operand(index)?.shape().rank())
    }

    fn lower_custom(
        &self,
        ctx: &LoweringContext<'_>,
        operation: &Operation,
        id: &str,
        userdata: &Arc<[u8]>,
    ) -> GenerateResult<Box<dyn Kernel>> {
        let inputs = ctx.tensors(&defined(operation.inputs()).collect::<Vec<_>>())?;
        let outputs = ctx.tensors(operation.outputs())?;
        let describe = |tensor: &Arc<Tensor>| CustomTypeInfo {
            shape: tensor.dims().unwrap_or_default(),
            dtype: tensor.dtype(),
        };
        let input_types = inputs.iter().map(describe).collect();
        let output_types = outputs.iter().map(describe).collect();
        self.custom.build(
            id,
            CustomKernelConfigParams {
                input_types,
                inputs,
                output_types,
                outputs,
                userdata: Arc::clone(userdata),
            },
        )
    }
}

impl KernelGenerator for CpuKernelGenerator {
    fn backend_name(&self) -> &str {
        "cpu"
    }

    fn lower(
        &self,
        ctx: &LoweringContext<'_>,
        operation: &Operation,
    ) -> GenerateResult<Box<dyn Kernel>> {
        Self::check_layout(ctx, operation)?;
        let input = |slot: usize| ctx.tensor(operation.input(slot));
        let output = || ctx.tensor(operation.output(0));
        let arithmetic = |op: ArithmeticType, activation: Activation| -> GenerateResult<Box<dyn Kernel>> {
            Ok(Box::new(BinaryArithmeticKernel::configure(
                input(slot::binary::LHS)?,
                input(slot::binary::RHS)?,
                output()?,
                op,
                activation,
            )?))
        };
        let unary = |op: UnaryType| -> GenerateResult<Box<dyn Kernel>> {
            Ok(Box::new(ElementwiseUnaryKernel::configure(
                input(slot::INPUT)?,
                output()?,
                op,
            )?))
        };
        let reshape = |slot: usize, name: &'static str| -> GenerateResult<Box<dyn Kernel>> {
            Ok(Box::new(ReshapeKernel::configure(input(slot)?, output()?, name)?))
        };

        let kernel: Box<dyn Kernel> = match operation.kind() {
            OpKind::Conv2D(params) => {
                let window = Self::kernel_window(ctx, operation)?;
                let explicit = Self::explicit_padding(
                    ctx,
                    operation,
                    &params.padding,
                    &params.stride,
                    window,
                )?;
                Box::new(ConvolutionKernel::configure(
                    input(slot::conv::INPUT)?,
                    input(slot::conv::KERNEL)?,
                    input(slot::conv::BIAS)?,
                    output()?,
                    params,
                    explicit,
                )?)
            }
            OpKind::DepthwiseConv2D(params) => {
                let window = Self::kernel_window(ctx, operation)?;
                let explicit = Self::explicit_padding(
                    ctx,
                    operation,
                    &params.padding,
                    &params.stride,
                    window,
                )?;
                Box::new(DepthwiseConvolutionKernel::configure(
                    input(slot::conv::INPUT)?,
                    input(slot::conv::KERNEL)?,
                    input(slot::conv::BIAS)?,
                    output()?,
                    params,
                    explicit,
                )?)
            }
            OpKind::MaxPool2D(params) | OpKind::AvgPool2D(params) => {
                let pool = if matches!(operation.kind(), OpKind::MaxPool2D(_)) {
                    PoolType::Max
                } else {
                    PoolType::Avg
                };
                let window = (params.kernel_width as usize, params.kernel_height as usize);
                let explicit = Self::explicit_padding(
                    ctx,
                    operation,
                    &params.padding,
                    &params.stride,
                    Some(window),
                )?;
                Box::new(PoolKernel::configure(
                    input(slot::INPUT)?,
                    output()?,
                    pool,
                    params,
                    explicit,
                )?)
            }
            OpKind::Concat { axis } => {
                let rank = Self::rank(ctx, operation.output(0))?;
                Box::new(ConcatKernel::configure(
                    ctx.tensors(operation.inputs())?,
                    output()?,
                    ctx.resolve_axis(*axis, rank)?,
                    JoinMode::Concat,
                )?)
            }
            OpKind::Pack { axis, .. } => {
                let rank = Self::rank(ctx, operation.output(0))?;
                Box::new(ConcatKernel::configure(
                    ctx.tensors(operation.inputs())?,
                    output()?,
                    ctx.resolve_axis(*axis, rank)?,
                    JoinMode::Pack,
                )?)
            }
            OpKind::Split { axis, .. } => {
                let rank = Self::rank(ctx, operation.input(slot::INPUT))?;
                Box::new(SplitKernel::configure(
                    input(slot::INPUT)?,
                    ctx.tensors(operation.outputs())?,
                    ctx.resolve_axis(*axis, rank)?,
                    SplitMode::Split,
                )?)
            }
            OpKind::Unpack { axis, .. } => {
                let rank = Self::rank(ctx, operation.input(slot::INPUT))?;
                Box::new(SplitKernel::configure(
                    input(slot::INPUT)?,
                    ctx.tensors(operation.outputs())?,
                    ctx.resolve_axis(*axis, rank)?,
                    SplitMode::Unpack,
                )?)
            }
            OpKind::Fill => Box::new(FillKernel::configure(input(slot::fill::VALUE)?, output()?)?),
            OpKind::FullyConnected { activation } => Box::new(FullyConnectedKernel::configure(
                input(slot::fully_connected::INPUT)?,
                input(slot::fully_connected::WEIGHT)?,
                ctx.optional_tensor(operation.input(slot::fully_connected::BIAS))?,
                output()?,
                *activation,
            )?),
            OpKind::Reshape { .. } => reshape(slot::reshape::INPUT, "Reshape")?,
            OpKind::Squeeze { .. } => reshape(slot::INPUT, "Squeeze")?,
            OpKind::ExpandDims => reshape(slot::expand_dims::INPUT, "ExpandDims")?,
            OpKind::Softmax { beta } => {
                Box::new(SoftmaxKernel::configure(input(slot::INPUT)?, output()?, *beta)?)
            }
            OpKind::Add { activation } => arithmetic(ArithmeticType::Add, *activation)?,
            OpKind::Sub { activation } => arithmetic(ArithmeticType::Sub, *activation)?,
            OpKind::Mul { activation } => arithmetic(ArithmeticType::Mul, *activation)?,
            OpKind::Div { activation } => arithmetic(ArithmeticType::Div, *activation)?,
            OpKind::Pow => arithmetic(ArithmeticType::Pow, Activation::None)?,
            OpKind::SquaredDifference => {
                arithmetic(ArithmeticType::SquaredDifference, Activation::None)?
            }
            OpKind::Max => arithmetic(ArithmeticType::Max, Activation::None)?,
            OpKind::Min => arithmetic(ArithmeticType::Min, Activation::None)?,
            OpKind::Comparison(comparison) => Box::new(ComparisonKernel::configure(
                input(slot::binary::LHS)?,
                input(slot::binary::RHS)?,
                output()?,
                *comparison,
            )?),
            OpKind::LogicalOr => Box::new(LogicalOrKernel::configure(
                input(slot::binary::LHS)?,
                input(slot::binary::RHS)?,
                output()?,
            )?),
            OpKind::LogicalNot => {
                Box::new(LogicalNotKernel::configure(input(slot::INPUT)?, output()?)?)
            }
            OpKind::Gather { axis } => {
                let rank = Self::rank(ctx, operation.input(slot::gather::INPUT))?;
                Box::new(GatherKernel::configure(
                    input(slot::gather::INPUT)?,
                    input(slot::gather::INDICES)?,
                    output()?,
                    ctx.resolve_axis(*axis, rank)?,
                )?)
            }
            OpKind::OneHot {
                depth,
                on_value,
                off_value,
                axis,
            } => {
                let rank = Self::rank(ctx, operation.input(slot::INPUT))? + 1;
                Box::new(OneHotKernel::configure(
                    input(slot::INPUT)?,
                    output()?,
                    *depth,
                    *on_value,
                    *off_value,
                    ctx.resolve_axis(*axis, rank)?,
                )?)
            }
            OpKind::Custom { id, userdata } => self.lower_custom(ctx, operation, id, userdata)?,
            OpKind::Exp => unary(UnaryType::Exp)?,
            OpKind::Logistic => unary(UnaryType::Logistic)?,
            OpKind::Tanh => unary(UnaryType::Tanh)?,
            OpKind::ReLU => unary(UnaryType::ReLU)?,
            OpKind::Abs => unary(UnaryType::Abs)?,
            OpKind::Sin => unary(UnaryType::Sin)?,
            OpKind::Cos => unary(UnaryType::Cos)?,
            OpKind::Rsqrt => unary(UnaryType::Rsqrt)?,
            OpKind::Neg => unary(UnaryType::Neg)?,
            OpKind::Log => unary(UnaryType::Log)?,
            OpKind::Round => unary(UnaryType::Round)?,
            OpKind::Pad => Box::new(PadKernel::configure(
                input(slot::pad::INPUT)?,
                input(slot::pad::PAD)?,
                output()?,
            )?),
            OpKind::Cast => Box::new(CastKernel::configure(input(slot::INPUT)?, output()?)?),
            OpKind::Transpose { perm } => Box::new(TransposeKernel::configure(
                input(slot::INPUT)?,
                output()?,
                perm.clone(),
            )?),
            OpKind::Reduce { kind, axes, .. } => {
                let rank = Self::rank(ctx, operation.input(slot::INPUT))?;
                Box::new(ReduceKernel::configure(
                    input(slot::INPUT)?,
                    output()?,
                    *kind,
                    reduction_mask(axes, rank)?,
                )?)
            }
            OpKind::ArgMax { axis } => {
                let rank = Self::rank(ctx, operation.input(slot::INPUT))?;
                Box::new(ArgMaxKernel::configure(
                    input(slot::INPUT)?,
                    output()?,
                    ctx.resolve_axis(*axis, rank)?,
                )?)
            }
            OpKind::Select => Box::new(SelectKernel::configure(
                input(slot::select::CONDITION)?,
                input(slot::select::INPUT_TRUE)?,
                input(slot::select::INPUT_FALSE)?,
                output()?,
            )?),
            OpKind::Slice => Box::new(SliceKernel::configure(
                input(slot::slice::INPUT)?,
                input(slot::slice::BEGINS)?,
                input(slot::slice::SIZES)?,
                output()?,
            )?),
            OpKind::StridedSlice(params) => Box::new(StridedSliceKernel::configure(
                input(slot::strided_slice::INPUT)?,
                input(slot::strided_slice::STARTS)?,
                input(slot::strided_slice::ENDS)?,
                input(slot::strided_slice::STRIDES)?,
                output()?,
                *params,
            )?),
            OpKind::Shape => Box::new(ShapeKernel::configure(input(slot::INPUT)?, output()?)?),
            OpKind::Reverse => Box::new(ReverseKernel::configure(
                input(slot::reverse::INPUT)?,
                input(slot::reverse::AXIS)?,
                output()?,
            )?),
            OpKind::ZerosLike => Box::new(ZerosLikeKernel::configure(output()?)?),
            OpKind::Range => Box::new(RangeKernel::configure(
                input(slot::range::START)?,
                input(slot::range::LIMIT)?,
                input(slot::range::DELTA)?,
                output()?,
            )?),
            OpKind::Tile => Box::new(TileKernel::configure(input(slot::tile::INPUT)?, output()?)?),
            OpKind::ResizeBilinear { .. } | OpKind::BatchMatMul { .. } => {
                return Err(Self::unsupported(ctx, operation))
            }
        };
        Ok(kernel)
    }
}
