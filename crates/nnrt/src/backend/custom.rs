//! Handler table for user-defined operations.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, RwLock};

use crate::ir::DataType;

use super::generator::{GenerateError, GenerateResult};
use super::kernel::{Kernel, KernelResult};
use super::tensor::Tensor;

/// Immutable type descriptor handed to custom kernel builders.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CustomTypeInfo {
    pub shape: Vec<usize>,
    pub dtype: DataType,
}

/// Everything a custom kernel builder receives for one operation.
pub struct CustomKernelConfigParams {
    pub input_types: Vec<CustomTypeInfo>,
    pub inputs: Vec<Arc<Tensor>>,
    pub output_types: Vec<CustomTypeInfo>,
    pub outputs: Vec<Arc<Tensor>>,
    /// Opaque payload attached to the operation by the importer.
    pub userdata: Arc<[u8]>,
}

type CustomKernelBuilder =
    Arc<dyn Fn(CustomKernelConfigParams) -> KernelResult<Box<dyn Kernel>> + Send + Sync>;

/// Custom kernel builders keyed by operation id.
#[derive(Default)]
pub struct CustomKernelRegistry {
    builders: RwLock<HashMap<String, CustomKernelBuilder>>,
}

impl CustomKernelRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `builder` for `id`, replacing any previous one.
    pub fn register<F>(&self, id: impl Into<String>, builder: F)
    where
        F: Fn(CustomKernelConfigParams) -> KernelResult<Box<dyn Kernel>> + Send + Sync + 'static,
    {
        self.builders
            .write()
            .expect("custom kernel registry poisoned")
            .insert(id.into(), Arc::new(builder));
    }

    pub fn contains(&self, id: &str) -> bool {
        self.builders
            .read()
            .expect("custom kernel registry poisoned")
            .contains_key(id)
    }

    pub fn ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self
            .builders
            .read()
            .expect("custom kernel registry poisoned")
            .keys()
            .cloned()
            .collect();
        ids.sort();
        ids
    }

    /// Builds the kernel for `id`. Unknown ids fail generation.
    pub fn build(
        &self,
        id: &str,
        params: CustomKernelConfigParams,
    ) -> GenerateResult<Box<dyn Kernel>> {
        let builder = self
            .builders
            .read()
            .expect("custom kernel registry poisoned")
            .get(id)
            .cloned()
            .ok_or_else(|| GenerateError::UnknownCustomOp { id: id.to_string() })?;
        Ok(builder(params)?)
    }
}

impl fmt::Debug for CustomKernelRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CustomKernelRegistry")
            .field("ids", &self.ids())
            .finish()
    }
}
