mod common;

use std::sync::{Arc, Mutex};

use common::{f32s, GraphBuilder};
use nnrt::backend::{CustomKernelConfigParams, CustomKernelRegistry, CustomTypeInfo, GenerateError};
use nnrt::ir::{DataType, OpKind};
use nnrt::{CompileError, Compiler, Kernel, KernelError, KernelResult, Tensor, TensorData};
use nnrt_backend_cpu::CpuBackend;

/// Multiplies its input by a factor carried in the operation userdata.
struct Scale {
    input: Arc<Tensor>,
    output: Arc<Tensor>,
    factor: f32,
}

impl Kernel for Scale {
    fn name(&self) -> &'static str {
        "Scale"
    }

    fn execute(&mut self) -> KernelResult<()> {
        let data = self.input.data()?;
        let values = data
            .as_f32()
            .ok_or_else(|| KernelError::execution("Scale", "expects f32"))?;
        let scaled: Vec<f32> = values.iter().map(|v| v * self.factor).collect();
        self.output.store(scaled.into())
    }
}

/// Emits its input twice; sizes its own output.
struct Repeat {
    input: Arc<Tensor>,
    output: Arc<Tensor>,
}

impl Kernel for Repeat {
    fn name(&self) -> &'static str {
        "Repeat"
    }

    fn execute(&mut self) -> KernelResult<()> {
        let data = self.input.data()?;
        let len = data.len();
        self.output.set_dims(vec![len * 2])?;
        let joined = TensorData::concat(&[data.clone(), data])
            .ok_or_else(|| KernelError::execution("Repeat", "concat failed"))?;
        self.output.store(joined)
    }
}

fn single_io(params: &CustomKernelConfigParams) -> KernelResult<(Arc<Tensor>, Arc<Tensor>)> {
    match (params.inputs.first(), params.outputs.first()) {
        (Some(input), Some(output)) => Ok((Arc::clone(input), Arc::clone(output))),
        _ => Err(KernelError::execution("custom", "expects one input and one output")),
    }
}

fn scale_op(factor: f32) -> OpKind {
    OpKind::Custom {
        id: "scale".into(),
        userdata: Arc::from(bytemuck::bytes_of(&factor)),
    }
}

#[test]
fn custom_kernel_receives_types_and_userdata() -> anyhow::Result<()> {
    let seen: Arc<Mutex<Vec<CustomTypeInfo>>> = Arc::default();
    let registry = CustomKernelRegistry::new();
    let record = Arc::clone(&seen);
    registry.register("scale", move |params: CustomKernelConfigParams| {
        let factor: f32 = bytemuck::try_pod_read_unaligned(&params.userdata)
            .map_err(|err| KernelError::execution("Scale", err.to_string()))?;
        record
            .lock()
            .expect("record poisoned")
            .extend(params.input_types.iter().chain(&params.output_types).cloned());
        let (input, output) = single_io(&params)?;
        Ok(Box::new(Scale {
            input,
            output,
            factor,
        }) as Box<dyn Kernel>)
    });
    assert_eq!(registry.ids(), vec!["scale".to_string()]);

    let mut b = GraphBuilder::new();
    let x = b.input(&[3], DataType::Float32);
    let y = b.value(1, DataType::Float32);
    let z = b.output(1, DataType::Float32);
    b.op(scale_op(2.5), [x], [y]);
    b.op(OpKind::Neg, [y], [z]);

    // Custom outputs keep whatever shape the graph declares.
    let mut graph = b.finish();
    *graph.operand_mut(y)?.shape_mut() = nnrt::ir::Shape::new([3]);

    let mut executor = Compiler::default()
        .with_custom_kernels(Arc::new(registry))
        .compile_with(graph, &CpuBackend::new())?;
    assert_eq!(executor.kernel_names(), vec!["Scale", "Neg"]);
    let expected_type = CustomTypeInfo {
        shape: vec![3],
        dtype: DataType::Float32,
    };
    assert_eq!(
        *seen.lock().expect("record poisoned"),
        vec![expected_type.clone(), expected_type]
    );

    executor.set_input(0, &[3], TensorData::from(vec![1.0f32, -2.0, 4.0]))?;
    executor.run()?;
    let (dims, data) = executor.output(0)?;
    assert_eq!(dims, vec![3]);
    assert_eq!(f32s(&data), vec![-2.5, 5.0, -10.0]);
    Ok(())
}

#[test]
fn custom_kernel_sizes_dynamic_outputs() -> anyhow::Result<()> {
    let registry = CustomKernelRegistry::new();
    registry.register("repeat", |params: CustomKernelConfigParams| {
        assert_eq!(params.output_types[0].shape, Vec::<usize>::new());
        let (input, output) = single_io(&params)?;
        Ok(Box::new(Repeat { input, output }) as Box<dyn Kernel>)
    });

    let mut b = GraphBuilder::new();
    let x = b.dynamic_input(1, DataType::Int32);
    let y = b.output(1, DataType::Int32);
    b.op(
        OpKind::Custom {
            id: "repeat".into(),
            userdata: Arc::from(Vec::new()),
        },
        [x],
        [y],
    );

    let mut executor = Compiler::default()
        .with_custom_kernels(Arc::new(registry))
        .compile_with(b.finish(), &CpuBackend::new())?;
    executor.set_input(0, &[2], TensorData::from(vec![7i32, 9]))?;
    executor.run()?;
    let (dims, data) = executor.output(0)?;
    assert_eq!(dims, vec![4]);
    assert_eq!(data.as_i32(), Some(&[7, 9, 7, 9][..]));
    Ok(())
}

#[test]
fn unregistered_custom_op_fails_generation() {
    let mut b = GraphBuilder::new();
    let x = b.input(&[3], DataType::Float32);
    let y = b.output(1, DataType::Float32);
    b.op(scale_op(1.0), [x], [y]);
    let mut graph = b.finish();
    *graph
        .operand_mut(y)
        .expect("operand")
        .shape_mut() = nnrt::ir::Shape::new([3]);

    let err = Compiler::default()
        .compile_with(graph, &CpuBackend::new())
        .expect_err("no kernel registered for `scale`");
    assert!(matches!(
        err,
        CompileError::Generate(GenerateError::UnknownCustomOp { ref id }) if id == "scale"
    ));
}
