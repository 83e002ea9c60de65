#![allow(dead_code)]

use nnrt::ir::{DataType, Graph, Layout, OpKind, Operation, OperandIndex, Shape, TypeInfo};
use nnrt::{Compiler, CompilerOptions, Executor, TensorData};
use nnrt_backend_cpu::CpuBackend;

/// Small graph builder for kernel tests. Outputs are declared with unknown
/// extents so static shape inference fills them in.
pub struct GraphBuilder {
    graph: Graph,
}

impl GraphBuilder {
    pub fn new() -> Self {
        Self::with_layout(Layout::NHWC)
    }

    pub fn with_layout(layout: Layout) -> Self {
        Self {
            graph: Graph::with_layout(layout),
        }
    }

    pub fn input(&mut self, dims: &[usize], dtype: DataType) -> OperandIndex {
        let index = self
            .graph
            .add_operand(Shape::new(dims.iter().copied()), TypeInfo::new(dtype));
        self.graph.add_input(index);
        index
    }

    pub fn typed_input(&mut self, dims: &[usize], type_info: TypeInfo) -> OperandIndex {
        let index = self
            .graph
            .add_operand(Shape::new(dims.iter().copied()), type_info);
        self.graph.add_input(index);
        index
    }

    pub fn dynamic_input(&mut self, rank: usize, dtype: DataType) -> OperandIndex {
        let index = self
            .graph
            .add_operand(Shape::unknown(rank), TypeInfo::new(dtype));
        self.graph.add_input(index);
        index
    }

    pub fn constant(&mut self, dims: &[usize], data: impl Into<TensorData>) -> OperandIndex {
        let data = data.into();
        self.graph
            .add_constant(
                Shape::new(dims.iter().copied()),
                TypeInfo::new(data.dtype()),
                data,
            )
            .expect("constant matches its shape")
    }

    pub fn value(&mut self, rank: usize, dtype: DataType) -> OperandIndex {
        self.graph
            .add_operand(Shape::unknown(rank), TypeInfo::new(dtype))
    }

    pub fn output(&mut self, rank: usize, dtype: DataType) -> OperandIndex {
        let index = self.value(rank, dtype);
        self.graph.add_output(index);
        index
    }

    pub fn op(
        &mut self,
        kind: OpKind,
        inputs: impl IntoIterator<Item = OperandIndex>,
        outputs: impl IntoIterator<Item = OperandIndex>,
    ) -> &mut Self {
        self.graph
            .add_operation(Operation::new(kind, inputs, outputs))
            .expect("operands exist");
        self
    }

    pub fn finish(mut self) -> Graph {
        self.graph.finish_building();
        self.graph
    }

    pub fn compile(self) -> anyhow::Result<Executor> {
        Ok(Compiler::new(CompilerOptions::default()).compile_with(self.finish(), &CpuBackend::new())?)
    }
}

/// Compiles, feeds `inputs` in order, runs once and collects every output.
pub fn run(
    builder: GraphBuilder,
    inputs: Vec<(Vec<usize>, TensorData)>,
) -> anyhow::Result<Vec<(Vec<usize>, TensorData)>> {
    let mut executor = builder.compile()?;
    for (position, (dims, data)) in inputs.into_iter().enumerate() {
        executor.set_input(position, &dims, data)?;
    }
    executor.run()?;
    let mut outputs = Vec::new();
    for position in 0..executor.graph().outputs().len() {
        outputs.push(executor.output(position)?);
    }
    Ok(outputs)
}

pub fn f32s(data: &TensorData) -> Vec<f32> {
    data.as_f32().expect("f32 tensor").to_vec()
}

pub fn assert_close(actual: &[f32], expected: &[f32]) {
    assert_eq!(actual.len(), expected.len(), "{actual:?} vs {expected:?}");
    for (a, e) in actual.iter().zip(expected) {
        assert!((a - e).abs() <= 1e-5, "{actual:?} vs {expected:?}");
    }
}
