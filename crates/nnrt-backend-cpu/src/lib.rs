//! Reference CPU backend for nnrt.
//!
//! Tensors live in host memory in NHWC order and every opcode the runtime
//! knows has a straightforward kernel here, except `ResizeBilinear` and
//! `BatchMatMul` which are reported as unsupported. Kernels favour clarity
//! over speed.

pub mod kernel_generator;
pub mod ops;
pub mod tensor_builder;

use std::sync::Arc;

use nnrt::backend::registry::register_backend;
use nnrt::backend::{
    Backend, CustomKernelRegistry, GenerateResult, KernelGenerator, TensorBuilder,
};
use nnrt::Graph;

pub use kernel_generator::CpuKernelGenerator;
pub use tensor_builder::CpuTensorBuilder;

/// The CPU backend. Dynamic tensors are supported unless disabled.
#[derive(Debug, Clone)]
pub struct CpuBackend {
    dynamic_tensors: bool,
}

impl CpuBackend {
    pub fn new() -> Self {
        Self {
            dynamic_tensors: true,
        }
    }

    /// A variant that only ever builds static function sequences.
    pub fn static_only() -> Self {
        Self {
            dynamic_tensors: false,
        }
    }
}

impl Default for CpuBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl Backend for CpuBackend {
    fn name(&self) -> &str {
        "cpu"
    }

    fn supports_dynamic_tensor(&self) -> bool {
        self.dynamic_tensors
    }

    fn tensor_builder(
        &self,
        graph: &Graph,
        enable_dynamic: bool,
    ) -> GenerateResult<Arc<dyn TensorBuilder>> {
        let builder = CpuTensorBuilder::build(graph, self.dynamic_tensors && enable_dynamic)?;
        Ok(Arc::new(builder))
    }

    fn kernel_generator(&self, custom: Arc<CustomKernelRegistry>) -> Box<dyn KernelGenerator> {
        Box::new(CpuKernelGenerator::new(custom))
    }
}

/// Registers the CPU backend under `"cpu"` with the global backend registry.
///
/// Called automatically on library load, and safe to call again.
pub fn register_cpu_backend() {
    register_backend("cpu", || -> Arc<dyn Backend> { Arc::new(CpuBackend::new()) });
}

// Auto-register on library load
#[cfg(any(target_os = "linux", target_os = "android"))]
#[used]
#[link_section = ".init_array"]
static REGISTER_CPU_BACKEND: extern "C" fn() = {
    extern "C" fn register() {
        register_cpu_backend();
    }
    register
};
