//! Graphs whose shapes are only known once inputs arrive.

mod common;

use common::{assert_close, f32s, GraphBuilder};
use nnrt::ir::{Activation, DataType, OpKind};
use nnrt::TensorData;

const F32: DataType = DataType::Float32;
const I32: DataType = DataType::Int32;

#[test]
fn reshape_follows_a_runtime_shape_operand() -> anyhow::Result<()> {
    let mut b = GraphBuilder::new();
    let x = b.input(&[2, 3], F32);
    let shape = b.input(&[2], I32);
    let y = b.output(2, F32);
    b.op(OpKind::Reshape { new_shape: None }, [x, shape], [y]);

    let mut executor = b.compile()?;
    assert!(executor.is_dynamic());
    let values: Vec<f32> = (0..6).map(|v| v as f32).collect();
    executor.set_input(0, &[2, 3], TensorData::from(values.clone()))?;

    for (requested, expected) in [(vec![3i32, -1], vec![3, 2]), (vec![1, 6], vec![1, 6])] {
        executor.set_input(1, &[2], TensorData::from(requested))?;
        executor.run()?;
        let (dims, data) = executor.output(0)?;
        assert_eq!(dims, expected);
        assert_eq!(f32s(&data), values);
    }
    Ok(())
}

#[test]
fn dynamic_input_flows_through_a_chain() -> anyhow::Result<()> {
    let mut b = GraphBuilder::new();
    let x = b.dynamic_input(2, F32);
    let one = b.constant(&[1], vec![1.0f32]);
    let shifted = b.value(2, F32);
    let y = b.output(2, F32);
    b.op(
        OpKind::Sub {
            activation: Activation::None,
        },
        [x, one],
        [shifted],
    );
    b.op(OpKind::Softmax { beta: 1.0 }, [shifted], [y]);

    let mut executor = b.compile()?;
    assert_eq!(executor.kernel_names(), vec!["Sub", "Softmax"]);

    executor.set_input(0, &[1, 2], TensorData::from(vec![3.0f32, 3.0]))?;
    executor.run()?;
    let (dims, data) = executor.output(0)?;
    assert_eq!(dims, vec![1, 2]);
    assert_close(&f32s(&data), &[0.5, 0.5]);

    let intermediate = executor.tensor(shifted).expect("tensor");
    assert!(intermediate.is_dynamic());
    assert_eq!(intermediate.dims(), None);

    executor.set_input(0, &[3, 1], TensorData::from(vec![1.0f32, 2.0, 3.0]))?;
    executor.run()?;
    let (dims, data) = executor.output(0)?;
    assert_eq!(dims, vec![3, 1]);
    assert_close(&f32s(&data), &[1.0, 1.0, 1.0]);
    Ok(())
}

#[test]
fn shape_values_computed_at_run_time_size_later_outputs() -> anyhow::Result<()> {
    let mut b = GraphBuilder::new();
    let x = b.dynamic_input(1, F32);
    let value = b.constant(&[1], vec![7.0f32]);
    let dims = b.value(1, I32);
    let filled = b.output(1, F32);
    b.op(OpKind::Shape, [x], [dims]);
    b.op(OpKind::Fill, [dims, value], [filled]);

    let mut executor = b.compile()?;
    for len in [2usize, 5] {
        executor.set_input(0, &[len], TensorData::from(vec![0.0f32; len]))?;
        executor.run()?;
        let (out_dims, data) = executor.output(0)?;
        assert_eq!(out_dims, vec![len]);
        assert_eq!(f32s(&data), vec![7.0; len]);
    }
    Ok(())
}
