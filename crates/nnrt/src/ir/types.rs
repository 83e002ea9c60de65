use std::fmt;

use serde::{Deserialize, Serialize};

/// Element type of an operand.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DataType {
    Float32,
    Int32,
    Int64,
    Bool8,
    QuantUint8Asymm,
}

impl DataType {
    pub fn size_in_bytes(self) -> usize {
        match self {
            DataType::Float32 | DataType::Int32 => 4,
            DataType::Int64 => 8,
            DataType::Bool8 | DataType::QuantUint8Asymm => 1,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            DataType::Float32 => "f32",
            DataType::Int32 => "i32",
            DataType::Int64 => "i64",
            DataType::Bool8 => "bool8",
            DataType::QuantUint8Asymm => "quant8_asymm",
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct QuantParams {
    pub scale: f32,
    pub zero_point: i32,
}

/// Element type plus optional quantization parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TypeInfo {
    pub dtype: DataType,
    pub quant: Option<QuantParams>,
}

impl TypeInfo {
    pub fn new(dtype: DataType) -> Self {
        Self { dtype, quant: None }
    }

    pub fn quantized(dtype: DataType, scale: f32, zero_point: i32) -> Self {
        Self {
            dtype,
            quant: Some(QuantParams { scale, zero_point }),
        }
    }

    /// Zero point of a quantized type, `0` otherwise.
    pub fn offset(&self) -> i32 {
        self.quant.map(|q| q.zero_point).unwrap_or(0)
    }
}

/// One dimension of a possibly partially known shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Dim {
    Known(usize),
    Unknown,
}

impl Dim {
    pub fn value(self) -> Option<usize> {
        match self {
            Dim::Known(v) => Some(v),
            Dim::Unknown => None,
        }
    }
}

impl fmt::Display for Dim {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Dim::Known(v) => write!(f, "{v}"),
            Dim::Unknown => f.write_str("?"),
        }
    }
}

/// Operand shape. Rank is always known; individual extents may not be.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Shape {
    dims: Vec<Dim>,
}

impl Shape {
    pub fn new(dims: impl IntoIterator<Item = usize>) -> Self {
        Self {
            dims: dims.into_iter().map(Dim::Known).collect(),
        }
    }

    pub fn with_dims(dims: Vec<Dim>) -> Self {
        Self { dims }
    }

    pub fn scalar() -> Self {
        Self { dims: Vec::new() }
    }

    /// Shape of the given rank with every extent unknown.
    pub fn unknown(rank: usize) -> Self {
        Self {
            dims: vec![Dim::Unknown; rank],
        }
    }

    pub fn rank(&self) -> usize {
        self.dims.len()
    }

    pub fn dims(&self) -> &[Dim] {
        &self.dims
    }

    pub fn dim(&self, axis: usize) -> Option<usize> {
        self.dims.get(axis).and_then(|d| d.value())
    }

    pub fn is_fully_known(&self) -> bool {
        self.dims.iter().all(|d| matches!(d, Dim::Known(_)))
    }

    /// Concrete extents, or `None` while any dimension is unknown.
    pub fn known_dims(&self) -> Option<Vec<usize>> {
        self.dims.iter().map(|d| d.value()).collect()
    }

    pub fn num_elements(&self) -> Option<usize> {
        self.known_dims().map(|dims| dims.iter().product())
    }

    /// Forgets every extent, keeping the rank.
    pub fn make_unknown(&mut self) {
        for dim in &mut self.dims {
            *dim = Dim::Unknown;
        }
    }
}

impl From<&[usize]> for Shape {
    fn from(dims: &[usize]) -> Self {
        Shape::new(dims.iter().copied())
    }
}

impl fmt::Display for Shape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[")?;
        for (i, dim) in self.dims.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{dim}")?;
        }
        f.write_str("]")
    }
}

/// Fused activation applied to an operation's result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Activation {
    #[default]
    None,
    Relu,
    Relu1,
    Relu6,
    Tanh,
    Sigmoid,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stride {
    pub vertical: u32,
    pub horizontal: u32,
}

impl Stride {
    pub fn new(vertical: u32, horizontal: u32) -> Self {
        Self {
            vertical,
            horizontal,
        }
    }
}

impl Default for Stride {
    fn default() -> Self {
        Self::new(1, 1)
    }
}
