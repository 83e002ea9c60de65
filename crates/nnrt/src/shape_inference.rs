//! Output shape rules per opcode.
//!
//! The same rules serve the compile-time pass over graph operands and the
//! run-time pass over backend tensors; only the [`ShapeSource`] differs.
//! A rule answers `Ok(None)` while some shape or value it depends on is still
//! unknown.

use thiserror::Error;
use tracing::{debug, trace};

use crate::backend::kernel::KernelError;
use crate::ir::index::defined;
use crate::ir::operation::slot;
use crate::ir::padding::output_extent;
use crate::ir::{
    normalize_axis, resolve_axis, AxisError, FeatureShape, Graph, GraphError, Layout, OpKind,
    OperandIndex, Operation, OperationIndex, Shape, StridedSliceParams,
};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ShapeInferenceError {
    #[error("{op}: {reason}")]
    Invalid { op: &'static str, reason: String },
    #[error(transparent)]
    Axis(#[from] AxisError),
    #[error(transparent)]
    Graph(#[from] GraphError),
    #[error("inferred shape {inferred:?} for {operand} conflicts with declared {declared}")]
    Conflict {
        operand: OperandIndex,
        declared: Shape,
        inferred: Vec<usize>,
    },
    #[error(transparent)]
    Tensor(#[from] KernelError),
    #[error("shape of {operand} produced by {op} cannot be resolved")]
    Unresolved { op: &'static str, operand: OperandIndex },
}

pub type ShapeResult<T> = Result<T, ShapeInferenceError>;

/// Read access to operand shapes and to values of shape-carrying operands.
pub trait ShapeSource {
    fn dims(&self, index: OperandIndex) -> Option<Vec<usize>>;

    /// Element values, when the operand content is known at this point.
    fn values(&self, index: OperandIndex) -> Option<Vec<f64>>;
}

macro_rules! known {
    ($value:expr) => {
        match $value {
            Some(value) => value,
            None => return Ok(None),
        }
    };
}

/// Numpy-style broadcast of two shapes.
pub fn broadcast_shapes(lhs: &[usize], rhs: &[usize]) -> Option<Vec<usize>> {
    let rank = lhs.len().max(rhs.len());
    let mut out = Vec::with_capacity(rank);
    for i in 0..rank {
        let a = (i + lhs.len())
            .checked_sub(rank)
            .map(|j| lhs[j])
            .unwrap_or(1);
        let b = (i + rhs.len())
            .checked_sub(rank)
            .map(|j| rhs[j])
            .unwrap_or(1);
        out.push(match (a, b) {
            (a, b) if a == b => a,
            (1, b) => b,
            (a, 1) => a,
            _ => return None,
        });
    }
    Some(out)
}

/// Resolved begin/stride/extent of one strided-slice axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SliceAxis {
    pub begin: i64,
    pub stride: i64,
    pub len: usize,
    pub shrink: bool,
}

/// Computes per-axis slice bounds with TensorFlow mask semantics.
pub fn strided_slice_plan(
    dims: &[usize],
    starts: &[i64],
    ends: &[i64],
    strides: &[i64],
    params: &StridedSliceParams,
) -> Result<Vec<SliceAxis>, String> {
    let rank = dims.len();
    if starts.len() != rank || ends.len() != rank || strides.len() != rank {
        return Err(format!(
            "starts/ends/strides must have {rank} entries, got {}/{}/{}",
            starts.len(),
            ends.len(),
            strides.len()
        ));
    }
    let mut plan = Vec::with_capacity(rank);
    for axis in 0..rank {
        let dim = dims[axis] as i64;
        let stride = strides[axis];
        if stride == 0 {
            return Err(format!("stride of axis {axis} is zero"));
        }
        let bit = 1i32 << axis;
        let clamp = |value: i64| {
            let value = if value < 0 { value + dim } else { value };
            if stride > 0 {
                value.clamp(0, dim)
            } else {
                value.clamp(-1, dim - 1)
            }
        };
        let begin = if params.begin_mask & bit != 0 {
            if stride > 0 {
                0
            } else {
                dim - 1
            }
        } else {
            clamp(starts[axis])
        };
        let shrink = params.shrink_axis_mask & bit != 0;
        let end = if shrink {
            begin + stride.signum()
        } else if params.end_mask & bit != 0 {
            if stride > 0 {
                dim
            } else {
                -1
            }
        } else {
            clamp(ends[axis])
        };
        let span = if stride > 0 { end - begin } else { begin - end };
        let len = if span <= 0 {
            0
        } else {
            (span + stride.abs() - 1) / stride.abs()
        };
        plan.push(SliceAxis {
            begin,
            stride,
            len: len as usize,
            shrink,
        });
    }
    Ok(plan)
}

fn to_i64(values: &[f64]) -> Vec<i64> {
    values.iter().map(|&v| v as i64).collect()
}

/// Infers every output shape of `operation`.
///
/// `dims_layout` is the layout the source reports rank-4 shapes in; axis
/// parameters written against `frontend` are translated into it.
pub fn infer_output_shapes(
    operation: &Operation,
    frontend: Layout,
    dims_layout: Layout,
    src: &dyn ShapeSource,
) -> ShapeResult<Option<Vec<Vec<usize>>>> {
    let op = operation.name();
    let invalid = |reason: String| ShapeInferenceError::Invalid { op, reason };
    let dims = |slot: usize| src.dims(operation.input(slot));
    let single =
        |shape: Vec<usize>| -> ShapeResult<Option<Vec<Vec<usize>>>> { Ok(Some(vec![shape])) };

    match operation.kind() {
        OpKind::Conv2D(params) => {
            let ifm = known!(dims(slot::conv::INPUT));
            let ker = known!(dims(slot::conv::KERNEL));
            let ifm = FeatureShape::from_dims(&ifm, dims_layout)
                .ok_or_else(|| invalid("input must be rank 4".into()))?;
            if ker.len() != 4 {
                return Err(invalid("kernel must be [out, kh, kw, in]".into()));
            }
            let h = output_extent(&params.padding, ifm.h, ker[1], params.stride.vertical, true)
                .ok_or_else(|| invalid("kernel taller than padded input".into()))?;
            let w = output_extent(&params.padding, ifm.w, ker[2], params.stride.horizontal, false)
                .ok_or_else(|| invalid("kernel wider than padded input".into()))?;
            single(FeatureShape::new(ifm.n, h, w, ker[0]).to_dims(dims_layout).to_vec())
        }
        OpKind::DepthwiseConv2D(params) => {
            let ifm = known!(dims(slot::conv::INPUT));
            let ker = known!(dims(slot::conv::KERNEL));
            let ifm = FeatureShape::from_dims(&ifm, dims_layout)
                .ok_or_else(|| invalid("input must be rank 4".into()))?;
            if ker.len() != 4 {
                return Err(invalid("kernel must be [1, kh, kw, out]".into()));
            }
            let h = output_extent(&params.padding, ifm.h, ker[1], params.stride.vertical, true)
                .ok_or_else(|| invalid("kernel taller than padded input".into()))?;
            let w = output_extent(&params.padding, ifm.w, ker[2], params.stride.horizontal, false)
                .ok_or_else(|| invalid("kernel wider than padded input".into()))?;
            single(FeatureShape::new(ifm.n, h, w, ker[3]).to_dims(dims_layout).to_vec())
        }
        OpKind::MaxPool2D(params) | OpKind::AvgPool2D(params) => {
            let ifm = known!(dims(slot::INPUT));
            let ifm = FeatureShape::from_dims(&ifm, dims_layout)
                .ok_or_else(|| invalid("input must be rank 4".into()))?;
            let h = output_extent(
                &params.padding,
                ifm.h,
                params.kernel_height as usize,
                params.stride.vertical,
                true,
            )
            .ok_or_else(|| invalid("window taller than padded input".into()))?;
            let w = output_extent(
                &params.padding,
                ifm.w,
                params.kernel_width as usize,
                params.stride.horizontal,
                false,
            )
            .ok_or_else(|| invalid("window wider than padded input".into()))?;
            single(FeatureShape::new(ifm.n, h, w, ifm.c).to_dims(dims_layout).to_vec())
        }
        OpKind::Add { .. }
        | OpKind::Sub { .. }
        | OpKind::Mul { .. }
        | OpKind::Div { .. }
        | OpKind::Pow
        | OpKind::SquaredDifference
        | OpKind::Max
        | OpKind::Min
        | OpKind::Comparison(_)
        | OpKind::LogicalOr => {
            let lhs = known!(dims(slot::binary::LHS));
            let rhs = known!(dims(slot::binary::RHS));
            let out = broadcast_shapes(&lhs, &rhs)
                .ok_or_else(|| invalid(format!("cannot broadcast {lhs:?} with {rhs:?}")))?;
            single(out)
        }
        OpKind::Select => {
            let cond = known!(dims(slot::select::CONDITION));
            let on_true = known!(dims(slot::select::INPUT_TRUE));
            let on_false = known!(dims(slot::select::INPUT_FALSE));
            let out = broadcast_shapes(&on_true, &on_false)
                .and_then(|values| broadcast_shapes(&cond, &values))
                .ok_or_else(|| invalid("condition and values do not broadcast".into()))?;
            single(out)
        }
        OpKind::Softmax { .. }
        | OpKind::Exp
        | OpKind::Logistic
        | OpKind::Tanh
        | OpKind::Cast
        | OpKind::ReLU
        | OpKind::Abs
        | OpKind::Sin
        | OpKind::Cos
        | OpKind::Rsqrt
        | OpKind::Neg
        | OpKind::Log
        | OpKind::Round
        | OpKind::LogicalNot
        | OpKind::ZerosLike
        | OpKind::Reverse => single(known!(dims(slot::INPUT))),
        OpKind::FullyConnected { .. } => {
            let input = known!(dims(slot::fully_connected::INPUT));
            let weight = known!(dims(slot::fully_connected::WEIGHT));
            if weight.len() != 2 {
                return Err(invalid("weight must be [units, depth]".into()));
            }
            let total: usize = input.iter().product();
            let depth = weight[1];
            if depth == 0 || total % depth != 0 {
                return Err(invalid(format!(
                    "input of {total} elements does not split into rows of {depth}"
                )));
            }
            single(vec![total / depth, weight[0]])
        }
        OpKind::Reshape { new_shape } => {
            let input = known!(dims(slot::reshape::INPUT));
            let requested = if !operation.input(slot::reshape::SHAPE).is_undefined() {
                to_i64(&known!(src.values(operation.input(slot::reshape::SHAPE))))
            } else {
                match new_shape {
                    Some(shape) => shape.iter().map(|&d| i64::from(d)).collect(),
                    None => return Ok(None),
                }
            };
            let total: usize = input.iter().product();
            single(resolve_reshape(&requested, total).map_err(invalid)?)
        }
        OpKind::Squeeze { dims: squeeze } => {
            let input = known!(dims(slot::INPUT));
            let mut remove = vec![false; input.len()];
            if squeeze.is_empty() {
                for (flag, dim) in remove.iter_mut().zip(&input) {
                    *flag = *dim == 1;
                }
            } else {
                for axis in squeeze {
                    let axis = normalize_axis(i64::from(*axis), input.len())?;
                    if input[axis] != 1 {
                        return Err(invalid(format!("axis {axis} has extent {}", input[axis])));
                    }
                    remove[axis] = true;
                }
            }
            single(
                input
                    .iter()
                    .zip(remove)
                    .filter(|(_, drop)| !drop)
                    .map(|(dim, _)| *dim)
                    .collect(),
            )
        }
        OpKind::ExpandDims => {
            let mut input = known!(dims(slot::expand_dims::INPUT));
            let axis = known!(src.values(operation.input(slot::expand_dims::AXIS)));
            let axis = *axis
                .first()
                .ok_or_else(|| invalid("axis operand is empty".into()))?;
            let axis = normalize_axis(axis as i64, input.len() + 1)?;
            input.insert(axis, 1);
            single(input)
        }
        OpKind::Fill => {
            let shape = known!(src.values(operation.input(slot::fill::SHAPE)));
            let out = shape
                .iter()
                .map(|&d| usize::try_from(d as i64).map_err(|_| invalid(format!("negative extent {d}"))))
                .collect::<Result<Vec<_>, _>>()?;
            single(out)
        }
        OpKind::Concat { axis } => {
            let mut shapes = Vec::with_capacity(operation.inputs().len());
            for index in operation.inputs() {
                shapes.push(known!(src.dims(*index)));
            }
            let first = shapes
                .first()
                .cloned()
                .ok_or_else(|| invalid("no inputs".into()))?;
            let axis = resolve_axis(i64::from(*axis), first.len(), frontend, dims_layout)?;
            let mut out = first.clone();
            out[axis] = 0;
            for shape in &shapes {
                let matches = shape.len() == first.len()
                    && shape
                        .iter()
                        .zip(&first)
                        .enumerate()
                        .all(|(i, (a, b))| i == axis || a == b);
                if !matches {
                    return Err(invalid(format!("{shape:?} does not concat with {first:?}")));
                }
                out[axis] += shape[axis];
            }
            single(out)
        }
        OpKind::Pack { axis, num } => {
            let mut shapes = Vec::with_capacity(operation.inputs().len());
            for index in operation.inputs() {
                shapes.push(known!(src.dims(*index)));
            }
            let first = shapes
                .first()
                .cloned()
                .ok_or_else(|| invalid("no inputs".into()))?;
            if shapes.iter().any(|shape| *shape != first) {
                return Err(invalid("inputs must share one shape".into()));
            }
            let axis = resolve_axis(i64::from(*axis), first.len() + 1, frontend, dims_layout)?;
            let mut out = first;
            out.insert(axis, *num as usize);
            single(out)
        }
        OpKind::Unpack { axis, num } => {
            let mut input = known!(dims(slot::INPUT));
            let axis = resolve_axis(i64::from(*axis), input.len(), frontend, dims_layout)?;
            if input[axis] != *num as usize {
                return Err(invalid(format!(
                    "axis {axis} has extent {}, expected {num}",
                    input[axis]
                )));
            }
            input.remove(axis);
            Ok(Some(vec![input; *num as usize]))
        }
        OpKind::Split { axis, num_splits } => {
            let mut input = known!(dims(slot::INPUT));
            let axis = resolve_axis(i64::from(*axis), input.len(), frontend, dims_layout)?;
            let splits = *num_splits as usize;
            if splits == 0 || input[axis] % splits != 0 {
                return Err(invalid(format!(
                    "extent {} is not divisible into {num_splits} parts",
                    input[axis]
                )));
            }
            input[axis] /= splits;
            Ok(Some(vec![input; splits]))
        }
        OpKind::Gather { axis } => {
            let input = known!(dims(slot::gather::INPUT));
            let indices = known!(dims(slot::gather::INDICES));
            let axis = normalize_axis(i64::from(*axis), input.len())?;
            let mut out = input[..axis].to_vec();
            out.extend_from_slice(&indices);
            out.extend_from_slice(&input[axis + 1..]);
            single(out)
        }
        OpKind::OneHot { depth, axis, .. } => {
            let mut indices = known!(dims(slot::INPUT));
            let rank = indices.len() + 1;
            let axis = if *axis == -1 {
                indices.len()
            } else {
                normalize_axis(i64::from(*axis), rank)?
            };
            indices.insert(axis, *depth as usize);
            single(indices)
        }
        OpKind::Pad => {
            let input = known!(dims(slot::pad::INPUT));
            let pads = to_i64(&known!(src.values(operation.input(slot::pad::PAD))));
            if pads.len() != input.len() * 2 {
                return Err(invalid(format!(
                    "paddings must be [{}, 2], got {} values",
                    input.len(),
                    pads.len()
                )));
            }
            let mut out = Vec::with_capacity(input.len());
            for (i, dim) in input.iter().enumerate() {
                let (before, after) = (pads[2 * i], pads[2 * i + 1]);
                if before < 0 || after < 0 {
                    return Err(invalid("negative padding".into()));
                }
                out.push(dim + before as usize + after as usize);
            }
            single(out)
        }
        OpKind::Transpose { perm } => {
            let input = known!(dims(slot::INPUT));
            let perm = transpose_permutation(perm, input.len()).map_err(invalid)?;
            single(perm.iter().map(|&p| input[p]).collect())
        }
        OpKind::Reduce {
            axes, keep_dims, ..
        } => {
            let input = known!(dims(slot::INPUT));
            let reduced = reduction_mask(axes, input.len())?;
            let mut out = Vec::with_capacity(input.len());
            for (dim, reduce) in input.iter().zip(&reduced) {
                if !reduce {
                    out.push(*dim);
                } else if *keep_dims {
                    out.push(1);
                }
            }
            single(out)
        }
        OpKind::Slice => {
            let input = known!(dims(slot::slice::INPUT));
            let begins = to_i64(&known!(src.values(operation.input(slot::slice::BEGINS))));
            let sizes = to_i64(&known!(src.values(operation.input(slot::slice::SIZES))));
            if begins.len() != input.len() || sizes.len() != input.len() {
                return Err(invalid("begins/sizes must match input rank".into()));
            }
            let mut out = Vec::with_capacity(input.len());
            for (i, dim) in input.iter().enumerate() {
                let dim = *dim as i64;
                let begin = begins[i];
                let size = if sizes[i] == -1 { dim - begin } else { sizes[i] };
                if begin < 0 || size < 0 || begin + size > dim {
                    return Err(invalid(format!("slice [{begin}, +{size}) exceeds extent {dim}")));
                }
                out.push(size as usize);
            }
            single(out)
        }
        OpKind::StridedSlice(params) => {
            let input = known!(dims(slot::strided_slice::INPUT));
            let starts = to_i64(&known!(src.values(operation.input(slot::strided_slice::STARTS))));
            let ends = to_i64(&known!(src.values(operation.input(slot::strided_slice::ENDS))));
            let strides =
                to_i64(&known!(src.values(operation.input(slot::strided_slice::STRIDES))));
            let plan =
                strided_slice_plan(&input, &starts, &ends, &strides, params).map_err(invalid)?;
            single(plan.iter().filter(|a| !a.shrink).map(|a| a.len).collect())
        }
        OpKind::Shape => {
            let input = known!(dims(slot::INPUT));
            single(vec![input.len()])
        }
        OpKind::ArgMax { axis } => {
            let mut input = known!(dims(slot::INPUT));
            let axis = normalize_axis(i64::from(*axis), input.len())?;
            input.remove(axis);
            single(input)
        }
        OpKind::Range => {
            let start = known!(src.values(operation.input(slot::range::START)));
            let limit = known!(src.values(operation.input(slot::range::LIMIT)));
            let delta = known!(src.values(operation.input(slot::range::DELTA)));
            let (Some(start), Some(limit), Some(delta)) =
                (start.first(), limit.first(), delta.first())
            else {
                return Err(invalid("start/limit/delta must be scalars".into()));
            };
            single(vec![range_length(*start, *limit, *delta).map_err(invalid)?])
        }
        OpKind::Tile => {
            let input = known!(dims(slot::tile::INPUT));
            let multiples = to_i64(&known!(src.values(operation.input(slot::tile::MULTIPLES))));
            if multiples.len() != input.len() || multiples.iter().any(|m| *m < 0) {
                return Err(invalid("multiples must be non-negative, one per axis".into()));
            }
            single(
                input
                    .iter()
                    .zip(&multiples)
                    .map(|(dim, m)| dim * *m as usize)
                    .collect(),
            )
        }
        OpKind::ResizeBilinear { height, width } => {
            let input = known!(dims(slot::INPUT));
            let ifm = FeatureShape::from_dims(&input, dims_layout)
                .ok_or_else(|| invalid("input must be rank 4".into()))?;
            single(
                FeatureShape::new(ifm.n, *height as usize, *width as usize, ifm.c)
                    .to_dims(dims_layout)
                    .to_vec(),
            )
        }
        OpKind::BatchMatMul { adj_x, adj_y } => {
            let lhs = known!(dims(slot::binary::LHS));
            let rhs = known!(dims(slot::binary::RHS));
            if lhs.len() < 2 || rhs.len() < 2 {
                return Err(invalid("operands must be at least rank 2".into()));
            }
            let (lb, lm) = lhs.split_at(lhs.len() - 2);
            let (rb, rm) = rhs.split_at(rhs.len() - 2);
            let (m, k) = if *adj_x { (lm[1], lm[0]) } else { (lm[0], lm[1]) };
            let (k2, n) = if *adj_y { (rm[1], rm[0]) } else { (rm[0], rm[1]) };
            if k != k2 {
                return Err(invalid(format!("contracting extents {k} and {k2} differ")));
            }
            let mut out = broadcast_shapes(lb, rb)
                .ok_or_else(|| invalid("batch dimensions do not broadcast".into()))?;
            out.extend([m, n]);
            single(out)
        }
        OpKind::Custom { .. } => Ok(None),
    }
}

/// Resolves a requested reshape with at most one `-1` wildcard.
pub fn resolve_reshape(requested: &[i64], total: usize) -> Result<Vec<usize>, String> {
    let mut wildcard = None;
    let mut known = 1usize;
    let mut out = Vec::with_capacity(requested.len());
    for (i, &dim) in requested.iter().enumerate() {
        match dim {
            -1 if wildcard.is_none() => {
                wildcard = Some(i);
                out.push(0);
            }
            d if d >= 0 => {
                known *= d as usize;
                out.push(d as usize);
            }
            d => return Err(format!("invalid extent {d} in reshape")),
        }
    }
    match wildcard {
        Some(i) => {
            if known == 0 || total % known != 0 {
                return Err(format!("cannot infer wildcard for {total} elements"));
            }
            out[i] = total / known;
        }
        None if known != total => {
            return Err(format!("reshape of {total} elements into {out:?}"));
        }
        None => {}
    }
    Ok(out)
}

/// Normalized permutation; empty means reversed axes.
pub fn transpose_permutation(perm: &[i32], rank: usize) -> Result<Vec<usize>, String> {
    if perm.is_empty() {
        return Ok((0..rank).rev().collect());
    }
    if perm.len() != rank {
        return Err(format!("perm has {} entries for rank {rank}", perm.len()));
    }
    let mut seen = vec![false; rank];
    let mut out = Vec::with_capacity(rank);
    for &p in perm {
        let axis = normalize_axis(i64::from(p), rank).map_err(|e| e.to_string())?;
        if std::mem::replace(&mut seen[axis], true) {
            return Err(format!("axis {axis} repeats in perm"));
        }
        out.push(axis);
    }
    Ok(out)
}

/// Per-axis reduction flags; empty `axes` reduces every axis.
pub fn reduction_mask(axes: &[i32], rank: usize) -> Result<Vec<bool>, AxisError> {
    if axes.is_empty() {
        return Ok(vec![true; rank]);
    }
    let mut mask = vec![false; rank];
    for axis in axes {
        mask[normalize_axis(i64::from(*axis), rank)?] = true;
    }
    Ok(mask)
}

pub fn range_length(start: f64, limit: f64, delta: f64) -> Result<usize, String> {
    if delta == 0.0 {
        return Err("delta must be non-zero".into());
    }
    if (limit > start && delta < 0.0) || (limit < start && delta > 0.0) {
        return Err(format!("delta {delta} never reaches {limit} from {start}"));
    }
    Ok(((limit - start) / delta).abs().ceil() as usize)
}

struct GraphShapes<'a> {
    graph: &'a Graph,
}

impl ShapeSource for GraphShapes<'_> {
    fn dims(&self, index: OperandIndex) -> Option<Vec<usize>> {
        self.graph.operand(index).ok()?.shape().known_dims()
    }

    fn values(&self, index: OperandIndex) -> Option<Vec<f64>> {
        let operand = self.graph.operand(index).ok()?;
        operand.data().map(|data| data.to_f64_vec())
    }
}

/// Compile-time propagation of operand shapes in topological order.
///
/// Every declared output gets exactly one inferred shape.
pub(crate) fn check_output_count(
    operation: &Operation,
    shapes: &[Vec<usize>],
) -> ShapeResult<()> {
    if shapes.len() != operation.outputs().len() {
        return Err(ShapeInferenceError::Invalid {
            op: operation.name(),
            reason: format!(
                "inferred {} output shapes for {} declared outputs",
                shapes.len(),
                operation.outputs().len()
            ),
        });
    }
    Ok(())
}

/// Outputs whose shape depends on an unknown shape or on a non-constant value
/// stay unknown and later become dynamic tensors.
pub struct StaticShapeInferer;

impl StaticShapeInferer {
    /// Returns the number of operands left with unknown extents.
    pub fn run(graph: &mut Graph) -> ShapeResult<usize> {
        let frontend = graph.layout();
        for index in graph.topological_order()? {
            let operation = graph.operation(index)?.clone();
            let inferred = {
                let src = GraphShapes { graph };
                infer_output_shapes(&operation, frontend, frontend, &src)?
            };
            Self::apply(graph, index, &operation, inferred)?;
        }
        let dynamic = graph
            .operands()
            .filter(|(_, operand)| !operand.shape().is_fully_known())
            .count();
        debug!(dynamic, "static shape inference finished");
        Ok(dynamic)
    }

    fn apply(
        graph: &mut Graph,
        index: OperationIndex,
        operation: &Operation,
        inferred: Option<Vec<Vec<usize>>>,
    ) -> ShapeResult<()> {
        match inferred {
            Some(shapes) => {
                check_output_count(operation, &shapes)?;
                for (output, dims) in operation.outputs().iter().zip(shapes) {
                    let operand = graph.operand_mut(*output)?;
                    let shape = operand.shape_mut();
                    if shape.is_fully_known() {
                        if shape.known_dims().as_deref() != Some(dims.as_slice()) {
                            return Err(ShapeInferenceError::Conflict {
                                operand: *output,
                                declared: shape.clone(),
                                inferred: dims,
                            });
                        }
                    } else {
                        trace!(operation = %index, operand = %output, ?dims, "inferred shape");
                        *shape = Shape::new(dims);
                    }
                }
            }
            None => {
                let input_unknown = defined(operation.inputs()).any(|input| {
                    graph
                        .operand(input)
                        .map(|operand| !operand.shape().is_fully_known())
                        .unwrap_or(false)
                });
                if input_unknown {
                    for output in operation.outputs() {
                        graph.operand_mut(*output)?.shape_mut().make_unknown();
                    }
                }
            }
        }
        Ok(())
    }
}
