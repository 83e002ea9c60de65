//! Numeric checks of the reference kernels through compiled one- or two-op graphs.

mod common;

use common::{assert_close, f32s, run, GraphBuilder};
use nnrt::ir::{
    Activation, ComparisonType, Conv2DParams, DataType, DepthwiseConv2DParams, OpKind,
    OperandIndex, Padding, Pool2DParams, ReduceKind, StridedSliceParams, Stride,
};
use nnrt::{CompileError, TensorData};
use proptest::prelude::*;

const F32: DataType = DataType::Float32;
const I32: DataType = DataType::Int32;

fn iota(n: usize) -> Vec<f32> {
    (1..=n).map(|v| v as f32).collect()
}

#[test]
fn conv2d_valid_sums_each_window() -> anyhow::Result<()> {
    let mut b = GraphBuilder::new();
    let x = b.input(&[1, 3, 3, 1], F32);
    let kernel = b.constant(&[1, 2, 2, 1], vec![1.0f32; 4]);
    let bias = b.constant(&[1], vec![0.0f32]);
    let y = b.output(4, F32);
    b.op(
        OpKind::Conv2D(Conv2DParams {
            padding: Padding::Valid,
            stride: Stride::default(),
            activation: Activation::None,
        }),
        [x, kernel, bias],
        [y],
    );

    let out = run(b, vec![(vec![1, 3, 3, 1], iota(9).into())])?;
    assert_eq!(out[0].0, vec![1, 2, 2, 1]);
    assert_eq!(f32s(&out[0].1), vec![12.0, 16.0, 24.0, 28.0]);
    Ok(())
}

#[test]
fn conv2d_same_padding_with_fused_relu() -> anyhow::Result<()> {
    let mut b = GraphBuilder::new();
    let x = b.input(&[1, 3, 3, 1], F32);
    let kernel = b.constant(&[1, 3, 3, 1], vec![1.0f32; 9]);
    let bias = b.constant(&[1], vec![-5.0f32]);
    let y = b.output(4, F32);
    b.op(
        OpKind::Conv2D(Conv2DParams {
            padding: Padding::Same,
            stride: Stride::default(),
            activation: Activation::Relu,
        }),
        [x, kernel, bias],
        [y],
    );

    let out = run(b, vec![(vec![1, 3, 3, 1], vec![1.0f32; 9].into())])?;
    assert_eq!(out[0].0, vec![1, 3, 3, 1]);
    // Window coverage is 4 at corners, 6 on edges and 9 in the centre.
    assert_eq!(
        f32s(&out[0].1),
        vec![0.0, 1.0, 0.0, 1.0, 4.0, 1.0, 0.0, 1.0, 0.0]
    );
    Ok(())
}

#[test]
fn depthwise_conv_scales_each_channel() -> anyhow::Result<()> {
    let mut b = GraphBuilder::new();
    let x = b.input(&[1, 1, 2, 2], F32);
    let kernel = b.constant(&[1, 1, 1, 2], vec![2.0f32, 3.0]);
    let bias = b.constant(&[2], vec![0.5f32, 0.0]);
    let y = b.output(4, F32);
    b.op(
        OpKind::DepthwiseConv2D(DepthwiseConv2DParams {
            padding: Padding::Valid,
            stride: Stride::default(),
            multiplier: 1,
            activation: Activation::None,
        }),
        [x, kernel, bias],
        [y],
    );

    let out = run(b, vec![(vec![1, 1, 2, 2], iota(4).into())])?;
    assert_eq!(out[0].0, vec![1, 1, 2, 2]);
    assert_eq!(f32s(&out[0].1), vec![2.5, 6.0, 6.5, 12.0]);
    Ok(())
}

#[test]
fn pooling_ignores_padded_elements() -> anyhow::Result<()> {
    let mut b = GraphBuilder::new();
    let x = b.input(&[1, 2, 2, 1], F32);
    let max = b.output(4, F32);
    let avg = b.output(4, F32);
    let window = |padding, stride| Pool2DParams {
        padding,
        stride,
        kernel_height: 2,
        kernel_width: 2,
        activation: Activation::None,
    };
    b.op(
        OpKind::MaxPool2D(window(Padding::Valid, Stride::new(2, 2))),
        [x],
        [max],
    );
    b.op(
        OpKind::AvgPool2D(window(Padding::Same, Stride::new(1, 1))),
        [x],
        [avg],
    );

    let out = run(b, vec![(vec![1, 2, 2, 1], vec![1.0f32, 5.0, 3.0, 2.0].into())])?;
    assert_eq!(out[0].0, vec![1, 1, 1, 1]);
    assert_eq!(f32s(&out[0].1), vec![5.0]);
    assert_eq!(out[1].0, vec![1, 2, 2, 1]);
    assert_close(&f32s(&out[1].1), &[2.75, 3.5, 2.5, 2.0]);
    Ok(())
}

#[test]
fn fully_connected_with_and_without_bias() -> anyhow::Result<()> {
    let mut b = GraphBuilder::new();
    let x = b.input(&[1, 3], F32);
    let weight = b.constant(&[2, 3], vec![1.0f32, 0.0, 1.0, 0.0, 1.0, 0.0]);
    let bias = b.constant(&[2], vec![0.5f32, -1.0]);
    let with_bias = b.output(2, F32);
    let without_bias = b.output(2, F32);
    let fc = || OpKind::FullyConnected {
        activation: Activation::None,
    };
    b.op(fc(), [x, weight, bias], [with_bias]);
    b.op(fc(), [x, weight, OperandIndex::UNDEFINED], [without_bias]);

    let out = run(b, vec![(vec![1, 3], iota(3).into())])?;
    assert_eq!(out[0].0, vec![1, 2]);
    assert_eq!(f32s(&out[0].1), vec![4.5, 1.0]);
    assert_eq!(f32s(&out[1].1), vec![4.0, 2.0]);
    Ok(())
}

#[test]
fn softmax_normalises_the_last_axis() -> anyhow::Result<()> {
    let mut b = GraphBuilder::new();
    let x = b.input(&[2, 3], F32);
    let y = b.output(2, F32);
    b.op(OpKind::Softmax { beta: 1.0 }, [x], [y]);

    let out = run(
        b,
        vec![(vec![2, 3], vec![1.0f32, 2.0, 3.0, 0.0, 0.0, 0.0].into())],
    )?;
    let third = 1.0 / 3.0;
    assert_close(
        &f32s(&out[0].1),
        &[0.090_030_57, 0.244_728_47, 0.665_240_96, third, third, third],
    );
    Ok(())
}

#[test]
fn gather_and_reshape() -> anyhow::Result<()> {
    let mut b = GraphBuilder::new();
    let x = b.input(&[3, 2], F32);
    let indices = b.constant(&[2], vec![2i32, 0]);
    let gathered = b.output(2, F32);
    let reshaped = b.output(1, F32);
    b.op(OpKind::Gather { axis: 0 }, [x, indices], [gathered]);
    b.op(
        OpKind::Reshape {
            new_shape: Some(vec![-1]),
        },
        [gathered],
        [reshaped],
    );

    let out = run(b, vec![(vec![3, 2], iota(6).into())])?;
    assert_eq!(out[0].0, vec![2, 2]);
    assert_eq!(f32s(&out[0].1), vec![5.0, 6.0, 1.0, 2.0]);
    assert_eq!(out[1].0, vec![4]);
    assert_eq!(f32s(&out[1].1), vec![5.0, 6.0, 1.0, 2.0]);
    Ok(())
}

#[test]
fn reductions_and_argmax() -> anyhow::Result<()> {
    let mut b = GraphBuilder::new();
    let x = b.input(&[2, 3], F32);
    let sum = b.output(1, F32);
    let mean = b.output(2, F32);
    let argmax = b.output(1, I32);
    b.op(
        OpKind::Reduce {
            kind: ReduceKind::Sum,
            axes: vec![1],
            keep_dims: false,
        },
        [x],
        [sum],
    );
    b.op(
        OpKind::Reduce {
            kind: ReduceKind::Mean,
            axes: vec![0],
            keep_dims: true,
        },
        [x],
        [mean],
    );
    b.op(OpKind::ArgMax { axis: -1 }, [x], [argmax]);

    let out = run(
        b,
        vec![(vec![2, 3], vec![1.0f32, 2.0, 3.0, 6.0, 5.0, 4.0].into())],
    )?;
    assert_eq!(out[0].0, vec![2]);
    assert_eq!(f32s(&out[0].1), vec![6.0, 15.0]);
    assert_eq!(out[1].0, vec![1, 3]);
    assert_eq!(f32s(&out[1].1), vec![3.5, 3.5, 3.5]);
    assert_eq!(out[2].1.as_i32(), Some(&[2, 0][..]));
    Ok(())
}

#[test]
fn transpose_and_tile() -> anyhow::Result<()> {
    let mut b = GraphBuilder::new();
    let x = b.input(&[2, 3], F32);
    let multiples = b.constant(&[2], vec![1i32, 2]);
    let transposed = b.output(2, F32);
    let tiled = b.output(2, F32);
    b.op(OpKind::Transpose { perm: vec![1, 0] }, [x], [transposed]);
    b.op(OpKind::Tile, [x, multiples], [tiled]);

    let out = run(b, vec![(vec![2, 3], iota(6).into())])?;
    assert_eq!(out[0].0, vec![3, 2]);
    assert_eq!(f32s(&out[0].1), vec![1.0, 4.0, 2.0, 5.0, 3.0, 6.0]);
    assert_eq!(out[1].0, vec![2, 6]);
    assert_eq!(
        f32s(&out[1].1),
        vec![1.0, 2.0, 3.0, 1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 4.0, 5.0, 6.0]
    );
    Ok(())
}

#[test]
fn split_then_pack() -> anyhow::Result<()> {
    let mut b = GraphBuilder::new();
    let x = b.input(&[4], F32);
    let (lo, hi) = (b.value(1, F32), b.value(1, F32));
    let packed = b.output(2, F32);
    b.op(
        OpKind::Split {
            axis: 0,
            num_splits: 2,
        },
        [x],
        [lo, hi],
    );
    b.op(OpKind::Pack { axis: 1, num: 2 }, [lo, hi], [packed]);

    let out = run(b, vec![(vec![4], iota(4).into())])?;
    assert_eq!(out[0].0, vec![2, 2]);
    assert_eq!(f32s(&out[0].1), vec![1.0, 3.0, 2.0, 4.0]);
    Ok(())
}

#[test]
fn pad_and_strided_slice() -> anyhow::Result<()> {
    let mut b = GraphBuilder::new();
    let x = b.input(&[5], F32);
    let paddings = b.constant(&[1, 2], vec![1i32, 2]);
    let starts = b.constant(&[1], vec![1i32]);
    let ends = b.constant(&[1], vec![5i32]);
    let strides = b.constant(&[1], vec![2i32]);
    let padded = b.output(1, F32);
    let sliced = b.output(1, F32);
    b.op(OpKind::Pad, [x, paddings], [padded]);
    b.op(
        OpKind::StridedSlice(StridedSliceParams::default()),
        [x, starts, ends, strides],
        [sliced],
    );

    let out = run(b, vec![(vec![5], vec![0.0f32, 1.0, 2.0, 3.0, 4.0].into())])?;
    assert_eq!(out[0].0, vec![8]);
    assert_eq!(
        f32s(&out[0].1),
        vec![0.0, 0.0, 1.0, 2.0, 3.0, 4.0, 0.0, 0.0]
    );
    assert_eq!(out[1].0, vec![2]);
    assert_eq!(f32s(&out[1].1), vec![1.0, 3.0]);
    Ok(())
}

#[test]
fn comparison_feeds_select() -> anyhow::Result<()> {
    let mut b = GraphBuilder::new();
    let lhs = b.input(&[3], F32);
    let rhs = b.input(&[3], F32);
    let mask = b.output(1, DataType::Bool8);
    let picked = b.output(1, F32);
    b.op(
        OpKind::Comparison(ComparisonType::Greater),
        [lhs, rhs],
        [mask],
    );
    b.op(OpKind::Select, [mask, lhs, rhs], [picked]);

    let out = run(
        b,
        vec![
            (vec![3], vec![1.0f32, 5.0, 3.0].into()),
            (vec![3], vec![2.0f32, 2.0, 3.0].into()),
        ],
    )?;
    assert_eq!(out[0].1.as_bool(), Some(&[0u8, 1, 0][..]));
    assert_eq!(f32s(&out[1].1), vec![2.0, 5.0, 3.0]);
    Ok(())
}

#[test]
fn one_hot_and_cast() -> anyhow::Result<()> {
    let mut b = GraphBuilder::new();
    let indices = b.input(&[3], I32);
    let hot = b.output(2, F32);
    let cast = b.output(1, F32);
    b.op(
        OpKind::OneHot {
            depth: 3,
            on_value: 1.0,
            off_value: 0.0,
            axis: -1,
        },
        [indices],
        [hot],
    );
    b.op(OpKind::Cast, [indices], [cast]);

    let out = run(b, vec![(vec![3], vec![0i32, 2, 1].into())])?;
    assert_eq!(out[0].0, vec![3, 3]);
    assert_eq!(
        f32s(&out[0].1),
        vec![1.0, 0.0, 0.0, 0.0, 0.0, 1.0, 0.0, 1.0, 0.0]
    );
    assert_eq!(f32s(&out[1].1), vec![0.0, 2.0, 1.0]);
    Ok(())
}

#[test]
fn generated_tensors() -> anyhow::Result<()> {
    let mut b = GraphBuilder::new();
    let x = b.input(&[2, 3], F32);
    let start = b.constant(&[1], vec![0i32]);
    let limit = b.constant(&[1], vec![5i32]);
    let delta = b.constant(&[1], vec![2i32]);
    let dims = b.constant(&[2], vec![2i32, 2]);
    let value = b.constant(&[1], vec![1.5f32]);
    let range = b.output(1, I32);
    let filled = b.output(2, F32);
    let shape = b.output(1, I32);
    let zeros = b.output(2, F32);
    b.op(OpKind::Range, [start, limit, delta], [range]);
    b.op(OpKind::Fill, [dims, value], [filled]);
    b.op(OpKind::Shape, [x], [shape]);
    b.op(OpKind::ZerosLike, [x], [zeros]);

    let out = run(b, vec![(vec![2, 3], iota(6).into())])?;
    assert_eq!(out[0].1.as_i32(), Some(&[0, 2, 4][..]));
    assert_eq!(out[1].0, vec![2, 2]);
    assert_eq!(f32s(&out[1].1), vec![1.5; 4]);
    assert_eq!(out[2].1.as_i32(), Some(&[2, 3][..]));
    assert_eq!(f32s(&out[3].1), vec![0.0; 6]);
    Ok(())
}

#[test]
fn integer_division_by_zero_fails_at_run_time() -> anyhow::Result<()> {
    let mut b = GraphBuilder::new();
    let x = b.input(&[2], I32);
    let zero = b.constant(&[1], vec![0i32]);
    let y = b.output(1, I32);
    b.op(
        OpKind::Div {
            activation: Activation::None,
        },
        [x, zero],
        [y],
    );

    let mut executor = b.compile()?;
    executor.set_input(0, &[2], TensorData::from(vec![4i32, 2]))?;
    assert!(executor.run().is_err());
    Ok(())
}

#[test]
fn valid_window_larger_than_input_is_rejected() {
    let mut b = GraphBuilder::new();
    let x = b.input(&[1, 2, 2, 1], F32);
    let y = b.output(4, F32);
    b.op(
        OpKind::MaxPool2D(Pool2DParams {
            padding: Padding::Valid,
            stride: Stride::default(),
            kernel_height: 3,
            kernel_width: 3,
            activation: Activation::None,
        }),
        [x],
        [y],
    );

    let err = b
        .compile()
        .expect_err("3x3 window over a 2x2 input")
        .downcast::<CompileError>()
        .expect("compile error");
    assert!(matches!(err, CompileError::ShapeInference(_)), "{err}");
}

#[test]
fn split_with_missing_outputs_is_rejected() {
    let mut b = GraphBuilder::new();
    let x = b.input(&[6], F32);
    let first = b.output(1, F32);
    let second = b.output(1, F32);
    b.op(
        OpKind::Split {
            axis: 0,
            num_splits: 3,
        },
        [x],
        [first, second],
    );

    let err = b
        .compile()
        .expect_err("three parts, two outputs")
        .downcast::<CompileError>()
        .expect("compile error");
    assert!(matches!(err, CompileError::ShapeInference(_)), "{err}");
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    /// A rank-1 operand broadcasts against a scalar-like constant element-wise.
    #[test]
    fn broadcast_add_matches_scalar_addition(
        values in prop::collection::vec(-1.0e3f32..1.0e3, 1..16),
        offset in -1.0e3f32..1.0e3,
    ) {
        let mut b = GraphBuilder::new();
        let x = b.input(&[values.len()], F32);
        let c = b.constant(&[1], vec![offset]);
        let y = b.output(1, F32);
        b.op(OpKind::Add { activation: Activation::None }, [x, c], [y]);

        let out = run(b, vec![(vec![values.len()], values.clone().into())])
            .expect("graph runs");
        let expected: Vec<f32> = values.iter().map(|v| v + offset).collect();
        prop_assert_eq!(f32s(&out[0].1), expected);
    }
}
