//! Compiler configuration.

use serde::{Deserialize, Serialize};

use crate::env;

/// Options that steer [`crate::Compiler`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompilerOptions {
    /// Name of a backend registered through [`crate::backend::registry::register_backend`].
    pub backend: String,
    /// Run the structural verifier before lowering.
    pub verify: bool,
    /// Allow operands whose shape is only known at run time.
    pub enable_dynamic_tensors: bool,
}

impl Default for CompilerOptions {
    fn default() -> Self {
        Self {
            backend: "cpu".to_string(),
            verify: true,
            enable_dynamic_tensors: true,
        }
    }
}

impl CompilerOptions {
    /// Defaults with `NNRT_BACKEND` / `NNRT_DISABLE_DYNAMIC_TENSORS` applied.
    pub fn from_env() -> Self {
        Self::default().with_env_overrides()
    }

    pub fn with_env_overrides(mut self) -> Self {
        if let Some(backend) = env::backend_override() {
            self.backend = backend.to_string();
        }
        if env::dynamic_tensors_disabled() {
            self.enable_dynamic_tensors = false;
        }
        self
    }

    pub fn with_backend(mut self, backend: impl Into<String>) -> Self {
        self.backend = backend.into();
        self
    }

    pub fn with_verify(mut self, verify: bool) -> Self {
        self.verify = verify;
        self
    }

    pub fn with_dynamic_tensors(mut self, enabled: bool) -> Self {
        self.enable_dynamic_tensors = enabled;
        self
    }
}
