use std::sync::Arc;

use nnrt::ir::{DataType, TensorData};
use nnrt::{Kernel, KernelError, KernelResult, Tensor};

use super::utils::{expect_dtype, f32_values, reject_quantized};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryType {
    Abs,
    Cos,
    Exp,
    Log,
    Logistic,
    Neg,
    ReLU,
    Round,
    Rsqrt,
    Sin,
    Tanh,
}

impl UnaryType {
    fn name(self) -> &'static str {
        match self {
            UnaryType::Abs => "Abs",
            UnaryType::Cos => "Cos",
            UnaryType::Exp => "Exp",
            UnaryType::Log => "Log",
            UnaryType::Logistic => "Logistic",
            UnaryType::Neg => "Neg",
            UnaryType::ReLU => "ReLU",
            UnaryType::Round => "Round",
            UnaryType::Rsqrt => "Rsqrt",
            UnaryType::Sin => "Sin",
            UnaryType::Tanh => "Tanh",
        }
    }

    fn apply(self, x: f32) -> f32 {
        match self {
            UnaryType::Abs => x.abs(),
            UnaryType::Cos => x.cos(),
            UnaryType::Exp => x.exp(),
            UnaryType::Log => x.ln(),
            UnaryType::Logistic => 1.0 / (1.0 + (-x).exp()),
            UnaryType::Neg => -x,
            UnaryType::ReLU => x.max(0.0),
            // Half to even.
            UnaryType::Round => {
                let rounded = x.round();
                if (x - x.trunc()).abs() == 0.5 {
                    2.0 * (x / 2.0).round()
                } else {
                    rounded
                }
            }
            UnaryType::Rsqrt => 1.0 / x.sqrt(),
            UnaryType::Sin => x.sin(),
            UnaryType::Tanh => x.tanh(),
        }
    }

    /// Integer variant, for the ops that have one.
    fn apply_integer(self, x: i64) -> Option<i64> {
        match self {
            UnaryType::Abs => x.checked_abs(),
            UnaryType::Neg => x.checked_neg(),
            UnaryType::ReLU => Some(x.max(0)),
            _ => None,
        }
    }
}

pub struct ElementwiseUnaryKernel {
    input: Arc<Tensor>,
    output: Arc<Tensor>,
    op: UnaryType,
}

impl ElementwiseUnaryKernel {
    pub fn configure(input: Arc<Tensor>, output: Arc<Tensor>, op: UnaryType) -> KernelResult<Self> {
        reject_quantized(op.name(), &[&input, &output])?;
        expect_dtype(op.name(), &output, input.dtype())?;
        match input.dtype() {
            DataType::Float32 => {}
            DataType::Int32 | DataType::Int64 if op.apply_integer(0).is_some() => {}
            other => {
                return Err(KernelError::not_implemented(
                    op.name(),
                    format!("unsupported element type {other}"),
                ))
            }
        }
        Ok(Self { input, output, op })
    }
}

impl Kernel for ElementwiseUnaryKernel {
    fn name(&self) -> &'static str {
        self.op.name()
    }

    fn execute(&mut self) -> KernelResult<()> {
        let data = self.input.data()?;
        let overflow = || KernelError::execution(self.op.name(), "integer overflow");
        let result = match &data {
            TensorData::I32(values) => TensorData::from(
                values
                    .iter()
                    .map(|&x| {
                        self.op
                            .apply_integer(i64::from(x))
                            .and_then(|v| i32::try_from(v).ok())
                            .ok_or_else(overflow)
                    })
                    .collect::<KernelResult<Vec<i32>>>()?,
            ),
            TensorData::I64(values) => TensorData::from(
                values
                    .iter()
                    .map(|&x| self.op.apply_integer(x).ok_or_else(overflow))
                    .collect::<KernelResult<Vec<i64>>>()?,
            ),
            other => {
                let values = f32_values(self.op.name(), other)?;
                TensorData::from(values.iter().map(|&x| self.op.apply(x)).collect::<Vec<f32>>())
            }
        };
        self.output.store(result)
    }
}

pub struct LogicalNotKernel {
    input: Arc<Tensor>,
    output: Arc<Tensor>,
}

impl LogicalNotKernel {
    pub fn configure(input: Arc<Tensor>, output: Arc<Tensor>) -> KernelResult<Self> {
        expect_dtype("LogicalNot", &input, DataType::Bool8)?;
        expect_dtype("LogicalNot", &output, DataType::Bool8)?;
        Ok(Self { input, output })
    }
}

impl Kernel for LogicalNotKernel {
    fn name(&self) -> &'static str {
        "LogicalNot"
    }

    fn execute(&mut self) -> KernelResult<()> {
        let data = self.input.data()?;
        let values = data
            .as_bool()
            .ok_or_else(|| KernelError::execution("LogicalNot", "expects a boolean tensor"))?;
        self.output
            .store(TensorData::from_bools(values.iter().map(|&v| v == 0)))
    }
}

/// Element type conversion; booleans become `0`/`1` and non-zero becomes `true`.
pub struct CastKernel {
    input: Arc<Tensor>,
    output: Arc<Tensor>,
}

impl CastKernel {
    pub fn configure(input: Arc<Tensor>, output: Arc<Tensor>) -> KernelResult<Self> {
        reject_quantized("Cast", &[&input, &output])?;
        Ok(Self { input, output })
    }
}

impl Kernel for CastKernel {
    fn name(&self) -> &'static str {
        "Cast"
    }

    fn execute(&mut self) -> KernelResult<()> {
        let data = self.input.data()?;
        let converted = if data.dtype() == self.output.dtype() {
            data
        } else {
            TensorData::from_f64(self.output.dtype(), &data.to_f64_vec())
        };
        self.output.store(converted)
    }
}

pub struct ZerosLikeKernel {
    output: Arc<Tensor>,
}

impl ZerosLikeKernel {
    pub fn configure(output: Arc<Tensor>) -> KernelResult<Self> {
        Ok(Self { output })
    }
}

impl Kernel for ZerosLikeKernel {
    fn name(&self) -> &'static str {
        "ZerosLike"
    }

    fn execute(&mut self) -> KernelResult<()> {
        let len = self.output.resolved_dims()?.iter().product();
        self.output
            .store(TensorData::zeros(self.output.dtype(), len))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_is_half_to_even() {
        assert_eq!(UnaryType::Round.apply(2.5), 2.0);
        assert_eq!(UnaryType::Round.apply(3.5), 4.0);
        assert_eq!(UnaryType::Round.apply(-2.5), -2.0);
        assert_eq!(UnaryType::Round.apply(1.4), 1.0);
    }
}
