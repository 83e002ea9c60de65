//! Core of the nnrt inference runtime.
//!
//! The crate owns the graph IR and its structural verifier, the tensor lifetime
//! machinery shared by every backend, the kernel-generation contract, and the
//! execution sequences that run the generated kernels. Numeric kernels live in
//! backend crates such as `nnrt-backend-cpu`.

pub mod backend;
pub mod compiler;
pub mod config;
mod env;
pub mod exec;
pub mod ir;
pub mod shape_inference;
pub mod verifier;

pub use backend::kernel::{Kernel, KernelError, KernelResult};
pub use backend::tensor::Tensor;
pub use compiler::{CompileError, Compiler};
pub use config::CompilerOptions;
pub use exec::executor::Executor;
pub use exec::sequence::ExecuteError;
pub use ir::{Graph, OperandIndex, OperationIndex, TensorData};
