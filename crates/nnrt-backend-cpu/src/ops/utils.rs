use nnrt::ir::{Activation, DataType, TensorData};
use nnrt::{KernelError, KernelResult, Tensor};

pub(crate) fn compute_strides(dims: &[usize]) -> Vec<usize> {
    let mut strides = vec![0; dims.len()];
    let mut acc = 1usize;
    for (i, dim) in dims.iter().enumerate().rev() {
        strides[i] = acc;
        acc *= *dim;
    }
    strides
}

pub(crate) fn unravel_index(mut index: usize, dims: &[usize]) -> Vec<usize> {
    let mut coords = vec![0; dims.len()];
    for (i, dim) in dims.iter().enumerate().rev() {
        if *dim == 0 {
            continue;
        }
        coords[i] = index % *dim;
        index /= *dim;
    }
    coords
}

/// Flat offset into a tensor of `dims` broadcast to the output coordinates `coords`.
pub(crate) fn broadcast_offset(coords: &[usize], dims: &[usize], strides: &[usize]) -> usize {
    let skip = coords.len() - dims.len();
    dims.iter()
        .zip(strides)
        .zip(&coords[skip..])
        .map(|((dim, stride), coord)| if *dim == 1 { 0 } else { coord * stride })
        .sum()
}

/// For every output element, the flat source offsets in `lhs` and `rhs`.
pub(crate) fn broadcast_pairs(
    lhs: &[usize],
    rhs: &[usize],
    out: &[usize],
) -> impl Iterator<Item = (usize, usize)> + 'static {
    let (lhs, rhs, out) = (lhs.to_vec(), rhs.to_vec(), out.to_vec());
    let lhs_strides = compute_strides(&lhs);
    let rhs_strides = compute_strides(&rhs);
    let total: usize = out.iter().product();
    (0..total).map(move |flat| {
        let coords = unravel_index(flat, &out);
        (
            broadcast_offset(&coords, &lhs, &lhs_strides),
            broadcast_offset(&coords, &rhs, &rhs_strides),
        )
    })
}

pub(crate) fn apply_activation(value: f32, activation: Activation) -> f32 {
    match activation {
        Activation::None => value,
        Activation::Relu => value.max(0.0),
        Activation::Relu1 => value.clamp(-1.0, 1.0),
        Activation::Relu6 => value.clamp(0.0, 6.0),
        Activation::Tanh => value.tanh(),
        Activation::Sigmoid => 1.0 / (1.0 + (-value).exp()),
    }
}

pub(crate) fn f32_values<'a>(kernel: &'static str, data: &'a TensorData) -> KernelResult<&'a [f32]> {
    data.as_f32().ok_or_else(|| {
        KernelError::not_implemented(
            kernel,
            format!("only supports f32 tensors, got {}", data.dtype()),
        )
    })
}

/// Integer contents of an index-like tensor (axes, shapes, paddings).
pub(crate) fn index_values(kernel: &'static str, tensor: &Tensor) -> KernelResult<Vec<i64>> {
    let data = tensor.data()?;
    data.to_i64_vec().ok_or_else(|| {
        KernelError::execution(
            kernel,
            format!("{} must hold integers, got {}", tensor.index(), data.dtype()),
        )
    })
}

/// Quantized arithmetic has no reference implementation.
pub(crate) fn reject_quantized(kernel: &'static str, tensors: &[&Tensor]) -> KernelResult<()> {
    if tensors
        .iter()
        .any(|tensor| tensor.dtype() == DataType::QuantUint8Asymm)
    {
        return Err(KernelError::not_implemented(
            kernel,
            "quantized uint8 tensors are not supported",
        ));
    }
    Ok(())
}

/// Float-only kernels have no integer or boolean variant.
pub(crate) fn require_float(kernel: &'static str, tensors: &[&Tensor]) -> KernelResult<()> {
    reject_quantized(kernel, tensors)?;
    if let Some(tensor) = tensors
        .iter()
        .find(|tensor| tensor.dtype() != DataType::Float32)
    {
        return Err(KernelError::not_implemented(
            kernel,
            format!("{} is {}, only f32 is supported", tensor.index(), tensor.dtype()),
        ));
    }
    Ok(())
}

pub(crate) fn expect_dtype(
    kernel: &'static str,
    tensor: &Tensor,
    dtype: DataType,
) -> KernelResult<()> {
    if tensor.dtype() != dtype {
        return Err(KernelError::execution(
            kernel,
            format!("{} must be {dtype}, got {}", tensor.index(), tensor.dtype()),
        ));
    }
    Ok(())
}

/// Moves elements of `input` into `output` following `indices` (source offsets
/// in output order); works for every element type.
pub(crate) fn store_gathered(
    kernel: &'static str,
    input: &TensorData,
    indices: &[usize],
    output: &Tensor,
) -> KernelResult<()> {
    let data = input
        .gather(indices)
        .ok_or_else(|| KernelError::execution(kernel, "source offset out of range"))?;
    output.store(data)
}

pub(crate) struct MultiIndex {
    shape: Vec<usize>,
    current: Vec<usize>,
    first: bool,
}

impl MultiIndex {
    pub(crate) fn new(shape: &[usize]) -> Self {
        Self {
            shape: shape.to_vec(),
            current: vec![0; shape.len()],
            first: true,
        }
    }
}

impl Iterator for MultiIndex {
    type Item = Vec<usize>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.shape.iter().any(|dim| *dim == 0) {
            return None;
        }
        if self.first {
            self.first = false;
            return Some(self.current.clone());
        }
        for i in (0..self.current.len()).rev() {
            self.current[i] += 1;
            if self.current[i] < self.shape[i] {
                return Some(self.current.clone());
            }
            self.current[i] = 0;
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn multi_index_walks_row_major() {
        let visited: Vec<Vec<usize>> = MultiIndex::new(&[2, 2]).collect();
        assert_eq!(visited, vec![vec![0, 0], vec![0, 1], vec![1, 0], vec![1, 1]]);
        assert_eq!(MultiIndex::new(&[]).count(), 1);
        assert_eq!(MultiIndex::new(&[3, 0]).count(), 0);
    }

    #[test]
    fn broadcast_pairs_repeat_unit_axes() {
        let pairs: Vec<(usize, usize)> = broadcast_pairs(&[2, 1], &[3], &[2, 3]).collect();
        assert_eq!(
            pairs,
            vec![(0, 0), (0, 1), (0, 2), (1, 0), (1, 1), (1, 2)]
        );
    }
}
