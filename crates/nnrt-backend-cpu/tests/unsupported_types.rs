//! Element types a kernel has no numeric path for fail with `NotImplemented`.

mod common;

use common::GraphBuilder;
use nnrt::backend::GenerateError;
use nnrt::ir::{Activation, DataType, OpKind, ReduceKind, TypeInfo};
use nnrt::{CompileError, KernelError};

fn not_implemented_kernel(err: &CompileError) -> Option<&'static str> {
    match err {
        CompileError::Generate(GenerateError::Kernel(KernelError::NotImplemented {
            kernel, ..
        })) => Some(*kernel),
        _ => None,
    }
}

fn add_graph(type_info: TypeInfo) -> GraphBuilder {
    let mut b = GraphBuilder::new();
    let x = b.typed_input(&[2], type_info);
    let y = b.typed_input(&[2], type_info);
    let z = b.output(1, type_info.dtype);
    b.op(
        OpKind::Add {
            activation: Activation::None,
        },
        [x, y],
        [z],
    );
    b
}

#[test]
fn boolean_add_is_not_implemented() {
    let err = add_graph(TypeInfo::new(DataType::Bool8))
        .compile()
        .expect_err("no boolean arithmetic")
        .downcast::<CompileError>()
        .expect("compile error");
    assert_eq!(not_implemented_kernel(&err), Some("Add"));
}

#[test]
fn quantized_add_is_not_implemented() {
    let err = add_graph(TypeInfo::quantized(DataType::QuantUint8Asymm, 0.5, 128))
        .compile()
        .expect_err("no quantized arithmetic")
        .downcast::<CompileError>()
        .expect("compile error");
    assert_eq!(not_implemented_kernel(&err), Some("Add"));
}

#[test]
fn integer_exp_is_not_implemented() {
    let mut b = GraphBuilder::new();
    let x = b.input(&[3], DataType::Int32);
    let y = b.output(1, DataType::Int32);
    b.op(OpKind::Exp, [x], [y]);

    let err = b
        .compile()
        .expect_err("exp has no integer variant")
        .downcast::<CompileError>()
        .expect("compile error");
    assert_eq!(not_implemented_kernel(&err), Some("Exp"));
}

#[test]
fn quantized_exp_is_not_implemented() {
    let quant = TypeInfo::quantized(DataType::QuantUint8Asymm, 0.1, 0);
    let mut b = GraphBuilder::new();
    let x = b.typed_input(&[3], quant);
    let y = b.output(1, DataType::QuantUint8Asymm);
    b.op(OpKind::Exp, [x], [y]);

    let err = b
        .compile()
        .expect_err("no quantized exp")
        .downcast::<CompileError>()
        .expect("compile error");
    assert_eq!(not_implemented_kernel(&err), Some("Exp"));
}

#[test]
fn boolean_sum_is_not_implemented() {
    let mut b = GraphBuilder::new();
    let x = b.input(&[2, 2], DataType::Bool8);
    let y = b.output(1, DataType::Bool8);
    b.op(
        OpKind::Reduce {
            kind: ReduceKind::Sum,
            axes: vec![1],
            keep_dims: false,
        },
        [x],
        [y],
    );

    let err = b
        .compile()
        .expect_err("sum needs numbers")
        .downcast::<CompileError>()
        .expect("compile error");
    assert_eq!(not_implemented_kernel(&err), Some("ReduceSum"));
}

#[test]
fn integer_softmax_is_not_implemented() {
    let mut b = GraphBuilder::new();
    let x = b.input(&[1, 2], DataType::Int32);
    let y = b.output(2, DataType::Int32);
    b.op(OpKind::Softmax { beta: 1.0 }, [x], [y]);

    let err = b
        .compile()
        .expect_err("softmax is float only")
        .downcast::<CompileError>()
        .expect("compile error");
    assert_eq!(not_implemented_kernel(&err), Some("Softmax"));
}
