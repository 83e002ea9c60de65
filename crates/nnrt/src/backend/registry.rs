//! Runtime backend registry.
//!
//! Backends are registered by name from their own crates and selected at
//! compile time through [`CompilerOptions::backend`](crate::CompilerOptions).

use std::collections::HashMap;
use std::sync::{Arc, OnceLock, RwLock};

use crate::ir::Graph;

use super::custom::CustomKernelRegistry;
use super::generator::{GenerateResult, KernelGenerator, TensorBuilder};

/// A kernel backend: tensor realisation plus per-opcode lowering.
pub trait Backend: Send + Sync {
    /// Identifier used for registration, e.g. `"cpu"`.
    fn name(&self) -> &str;

    fn supports_dynamic_tensor(&self) -> bool;

    /// Creates and registers a tensor for every operand of `graph`.
    ///
    /// With `enable_dynamic` false, operands of unknown shape are an error even
    /// when the backend could support them.
    fn tensor_builder(
        &self,
        graph: &Graph,
        enable_dynamic: bool,
    ) -> GenerateResult<Arc<dyn TensorBuilder>>;

    fn kernel_generator(&self, custom: Arc<CustomKernelRegistry>) -> Box<dyn KernelGenerator>;
}

/// Factory producing a fresh backend instance.
pub type BackendConstructor = Box<dyn Fn() -> Arc<dyn Backend> + Send + Sync>;

struct BackendRegistry {
    backends: RwLock<HashMap<String, BackendConstructor>>,
}

impl BackendRegistry {
    fn new() -> Self {
        Self {
            backends: RwLock::new(HashMap::new()),
        }
    }

    fn register(&self, name: String, constructor: BackendConstructor) {
        self.backends
            .write()
            .expect("backend registry poisoned")
            .insert(name, constructor);
    }

    fn create(&self, name: &str) -> Option<Arc<dyn Backend>> {
        let registry = self.backends.read().expect("backend registry poisoned");
        let constructor = registry.get(name)?;
        Some(constructor())
    }

    fn list_backends(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .backends
            .read()
            .expect("backend registry poisoned")
            .keys()
            .cloned()
            .collect();
        names.sort();
        names
    }

    fn has_backend(&self, name: &str) -> bool {
        self.backends
            .read()
            .expect("backend registry poisoned")
            .contains_key(name)
    }
}

static GLOBAL_REGISTRY: OnceLock<BackendRegistry> = OnceLock::new();

fn global_registry() -> &'static BackendRegistry {
    GLOBAL_REGISTRY.get_or_init(BackendRegistry::new)
}

/// Registers a backend constructor under `name`, replacing any earlier entry.
///
/// # Example
/// ```ignore
/// use nnrt::backend::registry::register_backend;
///
/// pub fn register() {
///     register_backend("my_backend", || Arc::new(MyBackend::default()));
/// }
/// ```
pub fn register_backend<F>(name: impl Into<String>, constructor: F)
where
    F: Fn() -> Arc<dyn Backend> + Send + Sync + 'static,
{
    global_registry().register(name.into(), Box::new(constructor));
}

/// Creates a backend instance by name, `None` if nothing is registered under it.
pub fn create_backend(name: &str) -> Option<Arc<dyn Backend>> {
    global_registry().create(name)
}

/// Registered backend names, sorted.
pub fn list_backends() -> Vec<String> {
    global_registry().list_backends()
}

pub fn has_backend(name: &str) -> bool {
    global_registry().has_backend(name)
}
