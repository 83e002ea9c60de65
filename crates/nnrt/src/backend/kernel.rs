use thiserror::Error;

use crate::ir::OperandIndex;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum KernelError {
    #[error("{kernel} is not implemented: {reason}")]
    NotImplemented { kernel: &'static str, reason: String },
    #[error("{kernel} failed: {message}")]
    Execution { kernel: &'static str, message: String },
    #[error("shape of {operand} is not resolved")]
    UnresolvedShape { operand: OperandIndex },
    #[error("no tensor is bound to {operand}")]
    UnknownTensor { operand: OperandIndex },
    #[error("{operand} holds no buffer")]
    MissingBuffer { operand: OperandIndex },
    #[error("buffer for {operand} rejected: {reason}")]
    BufferMismatch { operand: OperandIndex, reason: String },
}

impl KernelError {
    pub fn not_implemented(kernel: &'static str, reason: impl Into<String>) -> Self {
        KernelError::NotImplemented {
            kernel,
            reason: reason.into(),
        }
    }

    pub fn execution(kernel: &'static str, message: impl Into<String>) -> Self {
        KernelError::Execution {
            kernel,
            message: message.into(),
        }
    }
}

pub type KernelResult<T> = Result<T, KernelError>;

/// A configured, runnable unit produced by lowering one operation.
///
/// Kernels are configured by their constructors; the sequencer only runs them.
pub trait Kernel: Send {
    fn name(&self) -> &'static str;

    fn execute(&mut self) -> KernelResult<()>;
}
