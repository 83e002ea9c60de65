//! Running generated kernels: function sequences, run-time shape inference and
//! the executor that owns a compiled program.

pub mod dynamic_inferer;
pub mod executor;
pub mod sequence;

pub use dynamic_inferer::DynamicShapeInferer;
pub use executor::Executor;
pub use sequence::{
    DynamicFunctionSequence, ExecuteError, ExecuteResult, FunctionSequence, KernelEntry,
    ShapeInference, StaticFunctionSequence,
};
