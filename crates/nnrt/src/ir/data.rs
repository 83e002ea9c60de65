//! Typed host buffers shared by constant operands and runtime tensors.

use std::sync::Arc;

use super::types::DataType;

/// Dense, row-major element storage.
///
/// Buffers are reference counted so that kernels can snapshot inputs without
/// copying. Booleans are stored one byte per element.
#[derive(Debug, Clone, PartialEq)]
pub enum TensorData {
    F32(Arc<[f32]>),
    I32(Arc<[i32]>),
    I64(Arc<[i64]>),
    Bool(Arc<[u8]>),
    U8(Arc<[u8]>),
}

macro_rules! rebuild {
    ($data:expr, $values:ident => $body:expr) => {
        match $data {
            TensorData::F32($values) => TensorData::F32($body),
            TensorData::I32($values) => TensorData::I32($body),
            TensorData::I64($values) => TensorData::I64($body),
            TensorData::Bool($values) => TensorData::Bool($body),
            TensorData::U8($values) => TensorData::U8($body),
        }
    };
}

fn pick<T: Copy>(values: &[T], indices: &[usize]) -> Option<Arc<[T]>> {
    indices.iter().map(|&i| values.get(i).copied()).collect()
}

fn pick_or_default<T: Copy + Default>(values: &[T], indices: &[Option<usize>]) -> Option<Arc<[T]>> {
    indices
        .iter()
        .map(|slot| match slot {
            Some(i) => values.get(*i).copied(),
            None => Some(T::default()),
        })
        .collect()
}

fn join<'a, T: Copy + 'a>(
    parts: &'a [TensorData],
    view: impl Fn(&'a TensorData) -> Option<&'a [T]>,
) -> Option<Arc<[T]>> {
    let mut joined = Vec::new();
    for part in parts {
        joined.extend_from_slice(view(part)?);
    }
    Some(Arc::from(joined))
}

impl TensorData {
    pub fn zeros(dtype: DataType, len: usize) -> Self {
        match dtype {
            DataType::Float32 => TensorData::F32(Arc::from(vec![0.0f32; len])),
            DataType::Int32 => TensorData::I32(Arc::from(vec![0i32; len])),
            DataType::Int64 => TensorData::I64(Arc::from(vec![0i64; len])),
            DataType::Bool8 => TensorData::Bool(Arc::from(vec![0u8; len])),
            DataType::QuantUint8Asymm => TensorData::U8(Arc::from(vec![0u8; len])),
        }
    }

    /// Converts `values` into `dtype`; booleans map non-zero to `1`.
    pub fn from_f64(dtype: DataType, values: &[f64]) -> Self {
        match dtype {
            DataType::Float32 => TensorData::F32(values.iter().map(|&v| v as f32).collect()),
            DataType::Int32 => TensorData::I32(values.iter().map(|&v| v as i32).collect()),
            DataType::Int64 => TensorData::I64(values.iter().map(|&v| v as i64).collect()),
            DataType::Bool8 => TensorData::Bool(values.iter().map(|&v| u8::from(v != 0.0)).collect()),
            DataType::QuantUint8Asymm => {
                TensorData::U8(values.iter().map(|&v| v.round().clamp(0.0, 255.0) as u8).collect())
            }
        }
    }

    pub fn from_bools(values: impl IntoIterator<Item = bool>) -> Self {
        TensorData::Bool(values.into_iter().map(u8::from).collect())
    }

    /// Reinterprets little-endian `bytes` as elements of `dtype`.
    pub fn from_bytes(dtype: DataType, bytes: &[u8]) -> Option<Self> {
        if bytes.len() % dtype.size_in_bytes() != 0 {
            return None;
        }
        Some(match dtype {
            DataType::Float32 => TensorData::F32(Arc::from(bytemuck::pod_collect_to_vec::<u8, f32>(bytes))),
            DataType::Int32 => TensorData::I32(Arc::from(bytemuck::pod_collect_to_vec::<u8, i32>(bytes))),
            DataType::Int64 => TensorData::I64(Arc::from(bytemuck::pod_collect_to_vec::<u8, i64>(bytes))),
            DataType::Bool8 => TensorData::Bool(Arc::from(bytes)),
            DataType::QuantUint8Asymm => TensorData::U8(Arc::from(bytes)),
        })
    }

    pub fn dtype(&self) -> DataType {
        match self {
            TensorData::F32(_) => DataType::Float32,
            TensorData::I32(_) => DataType::Int32,
            TensorData::I64(_) => DataType::Int64,
            TensorData::Bool(_) => DataType::Bool8,
            TensorData::U8(_) => DataType::QuantUint8Asymm,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            TensorData::F32(v) => v.len(),
            TensorData::I32(v) => v.len(),
            TensorData::I64(v) => v.len(),
            TensorData::Bool(v) | TensorData::U8(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn as_f32(&self) -> Option<&[f32]> {
        match self {
            TensorData::F32(v) => Some(&v[..]),
            _ => None,
        }
    }

    pub fn as_i32(&self) -> Option<&[i32]> {
        match self {
            TensorData::I32(v) => Some(&v[..]),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<&[i64]> {
        match self {
            TensorData::I64(v) => Some(&v[..]),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<&[u8]> {
        match self {
            TensorData::Bool(v) => Some(&v[..]),
            _ => None,
        }
    }

    pub fn as_u8(&self) -> Option<&[u8]> {
        match self {
            TensorData::U8(v) => Some(&v[..]),
            _ => None,
        }
    }

    /// Raw little-endian view of the elements.
    pub fn as_bytes(&self) -> &[u8] {
        match self {
            TensorData::F32(v) => bytemuck::cast_slice(&v[..]),
            TensorData::I32(v) => bytemuck::cast_slice(&v[..]),
            TensorData::I64(v) => bytemuck::cast_slice(&v[..]),
            TensorData::Bool(v) | TensorData::U8(v) => &v[..],
        }
    }

    /// Integer view used for index-like operands (axes, shapes, paddings).
    pub fn to_i64_vec(&self) -> Option<Vec<i64>> {
        match self {
            TensorData::I32(v) => Some(v.iter().map(|&x| i64::from(x)).collect()),
            TensorData::I64(v) => Some(v.to_vec()),
            TensorData::Bool(v) | TensorData::U8(v) => Some(v.iter().map(|&x| i64::from(x)).collect()),
            TensorData::F32(_) => None,
        }
    }

    pub fn to_f64_vec(&self) -> Vec<f64> {
        match self {
            TensorData::F32(v) => v.iter().map(|&x| f64::from(x)).collect(),
            TensorData::I32(v) => v.iter().map(|&x| f64::from(x)).collect(),
            TensorData::I64(v) => v.iter().map(|&x| x as f64).collect(),
            TensorData::Bool(v) | TensorData::U8(v) => v.iter().map(|&x| f64::from(x)).collect(),
        }
    }

    /// New buffer holding the elements at `indices`, in order.
    pub fn gather(&self, indices: &[usize]) -> Option<TensorData> {
        Some(rebuild!(self, values => pick(&values[..], indices)?))
    }

    /// Like [`TensorData::gather`], with `None` slots filled with zero.
    pub fn gather_or_zero(&self, indices: &[Option<usize>]) -> Option<TensorData> {
        Some(rebuild!(self, values => pick_or_default(&values[..], indices)?))
    }

    /// Concatenates buffers of one element type; `None` on mixed types.
    pub fn concat(parts: &[TensorData]) -> Option<TensorData> {
        Some(match parts.first()? {
            TensorData::F32(_) => TensorData::F32(join(parts, TensorData::as_f32)?),
            TensorData::I32(_) => TensorData::I32(join(parts, TensorData::as_i32)?),
            TensorData::I64(_) => TensorData::I64(join(parts, TensorData::as_i64)?),
            TensorData::Bool(_) => TensorData::Bool(join(parts, TensorData::as_bool)?),
            TensorData::U8(_) => TensorData::U8(join(parts, TensorData::as_u8)?),
        })
    }
}

impl From<Vec<f32>> for TensorData {
    fn from(values: Vec<f32>) -> Self {
        TensorData::F32(Arc::from(values))
    }
}

impl From<Vec<i32>> for TensorData {
    fn from(values: Vec<i32>) -> Self {
        TensorData::I32(Arc::from(values))
    }
}

impl From<Vec<i64>> for TensorData {
    fn from(values: Vec<i64>) -> Self {
        TensorData::I64(Arc::from(values))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gather_and_concat_keep_element_type() {
        let lhs = TensorData::from(vec![1i32, 2, 3]);
        let rhs = TensorData::from(vec![4i32, 5]);
        let joined = TensorData::concat(&[lhs, rhs]).expect("same dtype");
        assert_eq!(joined.gather(&[4, 0, 2]), Some(TensorData::from(vec![5i32, 1, 3])));
        assert_eq!(joined.gather(&[9]), None);
        assert_eq!(
            joined.gather_or_zero(&[None, Some(1)]),
            Some(TensorData::from(vec![0i32, 2]))
        );
    }

    #[test]
    fn concat_rejects_mixed_types() {
        let parts = [TensorData::from(vec![1.0f32]), TensorData::from(vec![1i32])];
        assert!(TensorData::concat(&parts).is_none());
    }

    #[test]
    fn bytes_round_trip_through_bytemuck() {
        let data = TensorData::from(vec![1.5f32, -2.0]);
        let restored =
            TensorData::from_bytes(DataType::Float32, data.as_bytes()).expect("aligned length");
        assert_eq!(restored, data);
        assert!(TensorData::from_bytes(DataType::Int32, &[0u8; 3]).is_none());
    }

    #[test]
    fn unaligned_bytes_are_copied_out() {
        let mut raw = vec![0u8];
        raw.extend_from_slice(&7i64.to_le_bytes());
        raw.extend_from_slice(&(-3i64).to_le_bytes());
        let data = TensorData::from_bytes(DataType::Int64, &raw[1..]).expect("whole elements");
        assert_eq!(data, TensorData::from(vec![7i64, -3]));
    }
}
