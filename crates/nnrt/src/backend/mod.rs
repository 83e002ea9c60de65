//! Backend-facing contracts: runtime tensors and their lifetimes, the kernel
//! interface, kernel generation, custom kernels and the backend registry.

pub mod custom;
pub mod dynamic;
pub mod generator;
pub mod kernel;
pub mod registry;
pub mod tensor;
pub mod tensor_registry;

pub use custom::{CustomKernelConfigParams, CustomKernelRegistry, CustomTypeInfo};
pub use dynamic::DynamicTensorManager;
pub use generator::{
    generate_sequence, GenerateError, GenerateResult, KernelGenerator, LoweringContext,
    TensorBuilder,
};
pub use kernel::{Kernel, KernelError, KernelResult};
pub use registry::Backend;
pub use tensor::Tensor;
pub use tensor_registry::TensorRegistry;
