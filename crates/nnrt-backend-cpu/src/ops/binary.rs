use std::sync::Arc;

use nnrt::ir::{Activation, ComparisonType, DataType, TensorData};
use nnrt::{Kernel, KernelError, KernelResult, Tensor};

use super::utils::{apply_activation, broadcast_pairs, expect_dtype, reject_quantized};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArithmeticType {
    Add,
    Sub,
    Mul,
    Div,
    Pow,
    SquaredDifference,
    Max,
    Min,
}

impl ArithmeticType {
    fn name(self) -> &'static str {
        match self {
            ArithmeticType::Add => "Add",
            ArithmeticType::Sub => "Sub",
            ArithmeticType::Mul => "Mul",
            ArithmeticType::Div => "Div",
            ArithmeticType::Pow => "Pow",
            ArithmeticType::SquaredDifference => "SquaredDifference",
            ArithmeticType::Max => "Max",
            ArithmeticType::Min => "Min",
        }
    }

    fn apply_f32(self, x: f32, y: f32) -> f32 {
        match self {
            ArithmeticType::Add => x + y,
            ArithmeticType::Sub => x - y,
            ArithmeticType::Mul => x * y,
            ArithmeticType::Div => x / y,
            ArithmeticType::Pow => x.powf(y),
            ArithmeticType::SquaredDifference => (x - y) * (x - y),
            ArithmeticType::Max => x.max(y),
            ArithmeticType::Min => x.min(y),
        }
    }

    /// `None` on division by zero, negative exponents or overflow.
    fn apply_i64(self, x: i64, y: i64) -> Option<i64> {
        match self {
            ArithmeticType::Add => x.checked_add(y),
            ArithmeticType::Sub => x.checked_sub(y),
            ArithmeticType::Mul => x.checked_mul(y),
            ArithmeticType::Div => x.checked_div(y),
            ArithmeticType::Pow => u32::try_from(y).ok().and_then(|exp| x.checked_pow(exp)),
            ArithmeticType::SquaredDifference => {
                x.checked_sub(y).and_then(|d| d.checked_mul(d))
            }
            ArithmeticType::Max => Some(x.max(y)),
            ArithmeticType::Min => Some(x.min(y)),
        }
    }
}

/// Broadcasting arithmetic with an optional fused activation.
pub struct BinaryArithmeticKernel {
    lhs: Arc<Tensor>,
    rhs: Arc<Tensor>,
    output: Arc<Tensor>,
    op: ArithmeticType,
    activation: Activation,
}

impl BinaryArithmeticKernel {
    pub fn configure(
        lhs: Arc<Tensor>,
        rhs: Arc<Tensor>,
        output: Arc<Tensor>,
        op: ArithmeticType,
        activation: Activation,
    ) -> KernelResult<Self> {
        reject_quantized(op.name(), &[&lhs, &rhs, &output])?;
        if lhs.dtype() != rhs.dtype() {
            return Err(KernelError::execution(
                op.name(),
                format!("operand types differ: {} vs {}", lhs.dtype(), rhs.dtype()),
            ));
        }
        expect_dtype(op.name(), &output, lhs.dtype())?;
        if !matches!(lhs.dtype(), DataType::Float32 | DataType::Int32 | DataType::Int64) {
            return Err(KernelError::not_implemented(
                op.name(),
                format!("unsupported element type {}", lhs.dtype()),
            ));
        }
        let integer = matches!(lhs.dtype(), DataType::Int32 | DataType::Int64);
        if integer && !matches!(activation, Activation::None | Activation::Relu) {
            return Err(KernelError::not_implemented(
                op.name(),
                format!("{activation:?} activation on integer tensors"),
            ));
        }
        Ok(Self {
            lhs,
            rhs,
            output,
            op,
            activation,
        })
    }

    fn integer<T>(
        &self,
        a: &[T],
        b: &[T],
        pairs: impl Iterator<Item = (usize, usize)>,
    ) -> KernelResult<Vec<T>>
    where
        T: Copy + Into<i64> + TryFrom<i64>,
    {
        let mut result = Vec::new();
        for (i, j) in pairs {
            let value = self
                .op
                .apply_i64(a[i].into(), b[j].into())
                .and_then(|v| T::try_from(v).ok())
                .ok_or_else(|| {
                    KernelError::execution(self.op.name(), "integer overflow or invalid operand")
                })?;
            result.push(value);
        }
        if self.activation == Activation::Relu {
            for value in &mut result {
                if Into::<i64>::into(*value) < 0 {
                    *value = T::try_from(0).map_err(|_| {
                        KernelError::execution(self.op.name(), "integer overflow")
                    })?;
                }
            }
        }
        Ok(result)
    }
}

impl Kernel for BinaryArithmeticKernel {
    fn name(&self) -> &'static str {
        self.op.name()
    }

    fn execute(&mut self) -> KernelResult<()> {
        let out_dims = self.output.resolved_dims()?;
        let pairs = broadcast_pairs(
            &self.lhs.resolved_dims()?,
            &self.rhs.resolved_dims()?,
            &out_dims,
        );
        let result = match (self.lhs.data()?, self.rhs.data()?) {
            (TensorData::F32(a), TensorData::F32(b)) => TensorData::from(
                pairs
                    .map(|(i, j)| apply_activation(self.op.apply_f32(a[i], b[j]), self.activation))
                    .collect::<Vec<f32>>(),
            ),
            (TensorData::I32(a), TensorData::I32(b)) => {
                TensorData::from(self.integer(&a[..], &b[..], pairs)?)
            }
            (TensorData::I64(a), TensorData::I64(b)) => {
                TensorData::from(self.integer(&a[..], &b[..], pairs)?)
            }
            (lhs, _) => {
                return Err(KernelError::not_implemented(
                    self.op.name(),
                    format!("unsupported element type {}", lhs.dtype()),
                ))
            }
        };
        self.output.store(result)
    }
}

/// Element-wise comparison producing booleans.
pub struct ComparisonKernel {
    lhs: Arc<Tensor>,
    rhs: Arc<Tensor>,
    output: Arc<Tensor>,
    comparison: ComparisonType,
}

impl ComparisonKernel {
    pub fn configure(
        lhs: Arc<Tensor>,
        rhs: Arc<Tensor>,
        output: Arc<Tensor>,
        comparison: ComparisonType,
    ) -> KernelResult<Self> {
        reject_quantized("Comparison", &[&lhs, &rhs])?;
        expect_dtype("Comparison", &output, DataType::Bool8)?;
        Ok(Self {
            lhs,
            rhs,
            output,
            comparison,
        })
    }
}

impl Kernel for ComparisonKernel {
    fn name(&self) -> &'static str {
        "Comparison"
    }

    fn execute(&mut self) -> KernelResult<()> {
        let a = self.lhs.data()?.to_f64_vec();
        let b = self.rhs.data()?.to_f64_vec();
        let pairs = broadcast_pairs(
            &self.lhs.resolved_dims()?,
            &self.rhs.resolved_dims()?,
            &self.output.resolved_dims()?,
        );
        let comparison = self.comparison;
        let result = TensorData::from_bools(pairs.map(|(i, j)| {
            let (x, y) = (a[i], b[j]);
            match comparison {
                ComparisonType::Equal => x == y,
                ComparisonType::NotEqual => x != y,
                ComparisonType::Greater => x > y,
                ComparisonType::GreaterEqual => x >= y,
                ComparisonType::Less => x < y,
                ComparisonType::LessEqual => x <= y,
            }
        }));
        self.output.store(result)
    }
}

pub struct LogicalOrKernel {
    lhs: Arc<Tensor>,
    rhs: Arc<Tensor>,
    output: Arc<Tensor>,
}

impl LogicalOrKernel {
    pub fn configure(lhs: Arc<Tensor>, rhs: Arc<Tensor>, output: Arc<Tensor>) -> KernelResult<Self> {
        for tensor in [&lhs, &rhs, &output] {
            expect_dtype("LogicalOr", tensor, DataType::Bool8)?;
        }
        Ok(Self { lhs, rhs, output })
    }
}

impl Kernel for LogicalOrKernel {
    fn name(&self) -> &'static str {
        "LogicalOr"
    }

    fn execute(&mut self) -> KernelResult<()> {
        let (lhs, rhs) = (self.lhs.data()?, self.rhs.data()?);
        let (Some(a), Some(b)) = (lhs.as_bool(), rhs.as_bool()) else {
            return Err(KernelError::execution("LogicalOr", "expects boolean tensors"));
        };
        let pairs = broadcast_pairs(
            &self.lhs.resolved_dims()?,
            &self.rhs.resolved_dims()?,
            &self.output.resolved_dims()?,
        );
        let result = TensorData::from_bools(pairs.map(|(i, j)| a[i] != 0 || b[j] != 0));
        self.output.store(result)
    }
}
