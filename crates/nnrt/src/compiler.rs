//! Compilation pipeline: verify, infer shapes, linearize, realise tensors and
//! lower every op sequence into a function sequence.

use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, info_span};

use crate::backend::custom::CustomKernelRegistry;
use crate::backend::generator::{generate_sequence, GenerateError};
use crate::backend::registry::{create_backend, Backend};
use crate::config::CompilerOptions;
use crate::exec::executor::Executor;
use crate::ir::{Graph, GraphError};
use crate::shape_inference::{ShapeInferenceError, StaticShapeInferer};
use crate::verifier::{verify_graph, VerifyError};

#[derive(Debug, Error)]
pub enum CompileError {
    #[error("graph verification failed: {0}")]
    Verify(#[from] VerifyError),
    #[error("shape inference failed: {0}")]
    ShapeInference(#[from] ShapeInferenceError),
    #[error("kernel generation failed: {0}")]
    Generate(#[from] GenerateError),
    #[error(transparent)]
    Graph(#[from] GraphError),
    #[error("no backend registered as `{0}`")]
    UnknownBackend(String),
}

pub type CompileResult<T> = Result<T, CompileError>;

#[derive(Debug, Default)]
pub struct Compiler {
    options: CompilerOptions,
    custom_kernels: Arc<CustomKernelRegistry>,
}

impl Compiler {
    pub fn new(options: CompilerOptions) -> Self {
        Self {
            options,
            custom_kernels: Arc::new(CustomKernelRegistry::new()),
        }
    }

    pub fn with_custom_kernels(mut self, custom_kernels: Arc<CustomKernelRegistry>) -> Self {
        self.custom_kernels = custom_kernels;
        self
    }

    pub fn options(&self) -> &CompilerOptions {
        &self.options
    }

    pub fn custom_kernels(&self) -> &Arc<CustomKernelRegistry> {
        &self.custom_kernels
    }

    /// Compiles `graph` for the backend named in the options.
    pub fn compile(&self, graph: Graph) -> CompileResult<Executor> {
        let backend = create_backend(&self.options.backend)
            .ok_or_else(|| CompileError::UnknownBackend(self.options.backend.clone()))?;
        self.compile_with(graph, backend.as_ref())
    }

    /// Compiles `graph` for an explicit backend instance.
    pub fn compile_with(&self, mut graph: Graph, backend: &dyn Backend) -> CompileResult<Executor> {
        let span = info_span!("compile", backend = backend.name());
        let _guard = span.enter();

        if self.options.verify {
            verify_graph(&graph)?;
        }
        let unknown = StaticShapeInferer::run(&mut graph)?;
        graph.linearize()?;
        // Tensors and shape inference follow the graph layout.
        for (sequence, op_seq) in graph.op_sequences().iter() {
            if !op_seq.layout().matches(graph.layout()) {
                return Err(GenerateError::SequenceLayout {
                    sequence,
                    sequence_layout: op_seq.layout(),
                    graph_layout: graph.layout(),
                }
                .into());
            }
        }
        debug!(
            operations = graph.operation_count(),
            sequences = graph.op_sequences().len(),
            unknown,
            "graph prepared"
        );

        let graph = Arc::new(graph);
        let tensors = backend.tensor_builder(&graph, self.options.enable_dynamic_tensors)?;
        let generator = backend.kernel_generator(Arc::clone(&self.custom_kernels));
        let mut sequences = Vec::with_capacity(graph.op_sequences().len());
        for (_, op_seq) in graph.op_sequences().iter() {
            sequences.push(generate_sequence(
                &graph,
                op_seq,
                generator.as_ref(),
                &tensors,
            )?);
        }
        Ok(Executor::new(graph, tensors, sequences))
    }
}
