use std::sync::{Arc, Mutex};

use nnrt::backend::{DynamicTensorManager, TensorRegistry};
use nnrt::exec::{
    DynamicFunctionSequence, DynamicShapeInferer, ExecuteError, FunctionSequence, KernelEntry,
    ShapeInference,
};
use nnrt::ir::{DataType, Graph, Layout, OpKind, Operation, OperationIndex, Shape, TypeInfo};
use nnrt::shape_inference::ShapeInferenceError;
use nnrt::{Kernel, KernelResult, Tensor, TensorData};

type Log = Arc<Mutex<Vec<String>>>;

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

struct RecordingInferer {
    log: Log,
    fail_on: Option<OperationIndex>,
}

impl ShapeInference for RecordingInferer {
    fn infer(&mut self, operation: OperationIndex) -> Result<(), ShapeInferenceError> {
        if self.fail_on == Some(operation) {
            return Err(ShapeInferenceError::Invalid {
                op: "Test",
                reason: "refused".into(),
            });
        }
        self.log.lock().expect("log poisoned").push(format!("infer {operation}"));
        Ok(())
    }
}

struct RecordingKernel {
    name: &'static str,
    log: Log,
}

impl Kernel for RecordingKernel {
    fn name(&self) -> &'static str {
        self.name
    }

    fn execute(&mut self) -> KernelResult<()> {
        self.log.lock().expect("log poisoned").push(format!("run {}", self.name));
        Ok(())
    }
}

fn recording_sequence(log: &Log, fail_on: Option<OperationIndex>) -> DynamicFunctionSequence {
    let manager = DynamicTensorManager::new(Arc::new(TensorRegistry::new()));
    let mut sequence = DynamicFunctionSequence::new(
        Box::new(RecordingInferer {
            log: Arc::clone(log),
            fail_on,
        }),
        manager,
    );
    for (i, name) in ["First", "Second", "Third"].into_iter().enumerate() {
        sequence.append(KernelEntry::new(
            OperationIndex(i as u32),
            Box::new(RecordingKernel {
                name,
                log: Arc::clone(log),
            }),
            Vec::new(),
        ));
    }
    sequence
}

#[test]
fn inference_precedes_every_kernel() {
    let log: Log = Arc::default();
    let mut sequence = recording_sequence(&log, None);
    assert!(sequence.is_dynamic());
    assert_eq!(sequence.kernel_names(), vec!["First", "Second", "Third"]);

    sequence.run().expect("run");
    assert_eq!(
        *log.lock().expect("log poisoned"),
        vec![
            "infer #0", "run First", "infer #1", "run Second", "infer #2", "run Third"
        ]
    );
}

#[test]
fn failed_inference_stops_before_the_kernel() {
    let log: Log = Arc::default();
    let mut sequence = recording_sequence(&log, Some(OperationIndex(1)));

    let err = sequence.run().expect_err("second inference fails");
    assert!(matches!(
        err,
        ExecuteError::ShapeInference { operation, .. } if operation == OperationIndex(1)
    ));
    assert_eq!(
        *log.lock().expect("log poisoned"),
        vec!["infer #0", "run First"]
    );
}

#[test]
fn runtime_inferer_resolves_value_dependent_shapes() {
    init_tracing();
    let mut graph = Graph::new();
    let f32_info = TypeInfo::new(DataType::Float32);
    let input = graph.add_operand(Shape::new([2, 3]), f32_info);
    let shape = graph.add_operand(Shape::new([2]), TypeInfo::new(DataType::Int32));
    let output = graph.add_operand(Shape::unknown(2), f32_info);
    let reshape = graph
        .add_operation(Operation::new(
            OpKind::Reshape { new_shape: None },
            [input, shape],
            [output],
        ))
        .expect("operands exist");
    graph.finish_building();
    let graph = Arc::new(graph);

    let mut registry = TensorRegistry::new();
    registry.insert(Tensor::new_static(input, f32_info, vec![2, 3], Layout::NHWC));
    let shape_tensor = registry.insert(Tensor::new_static(
        shape,
        TypeInfo::new(DataType::Int32),
        vec![2],
        Layout::NHWC,
    ));
    let out_tensor = registry.insert(Tensor::new_dynamic(output, f32_info, Layout::NHWC));
    let manager = DynamicTensorManager::new(Arc::new(registry));
    let mut inferer = DynamicShapeInferer::new(Arc::clone(&graph), manager, Layout::NHWC);

    // The shape operand has no contents yet.
    let err = inferer.infer(reshape).expect_err("value is unknown");
    assert!(matches!(err, ShapeInferenceError::Unresolved { .. }));

    shape_tensor
        .store(TensorData::from(vec![3i32, -1]))
        .expect("shape buffer");
    inferer.infer(reshape).expect("shape resolves");
    assert_eq!(out_tensor.dims(), Some(vec![3, 2]));
    assert!(out_tensor.has_buffer());
}
