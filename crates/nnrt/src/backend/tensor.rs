use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use tracing::warn;

use crate::ir::{DataType, Layout, OperandIndex, TensorData, TypeInfo};

use super::kernel::{KernelError, KernelResult};

#[derive(Debug, Default)]
struct TensorState {
    dims: Option<Vec<usize>>,
    data: Option<TensorData>,
}

/// Host realisation of an operand.
///
/// Static tensors know their extents at creation; dynamic tensors receive them
/// from shape inference right before the producing kernel runs. The reference
/// count tracks how many kernel invocations still touch the buffer during the
/// current run; `planned` is the total recorded at generation time.
#[derive(Debug)]
pub struct Tensor {
    index: OperandIndex,
    type_info: TypeInfo,
    layout: Layout,
    dynamic: bool,
    pinned: bool,
    state: RwLock<TensorState>,
    planned: AtomicUsize,
    live: AtomicUsize,
}

impl Tensor {
    pub fn new_static(
        index: OperandIndex,
        type_info: TypeInfo,
        dims: Vec<usize>,
        layout: Layout,
    ) -> Self {
        Self::with_state(
            index,
            type_info,
            layout,
            false,
            TensorState {
                dims: Some(dims),
                data: None,
            },
        )
    }

    pub fn new_dynamic(index: OperandIndex, type_info: TypeInfo, layout: Layout) -> Self {
        Self::with_state(index, type_info, layout, true, TensorState::default())
    }

    /// Static tensor that owns `data` for its whole life, as constants do.
    pub fn new_constant(
        index: OperandIndex,
        type_info: TypeInfo,
        dims: Vec<usize>,
        layout: Layout,
        data: TensorData,
    ) -> Self {
        let mut tensor = Self::with_state(
            index,
            type_info,
            layout,
            false,
            TensorState {
                dims: Some(dims),
                data: Some(data),
            },
        );
        tensor.pinned = true;
        tensor
    }

    fn with_state(
        index: OperandIndex,
        type_info: TypeInfo,
        layout: Layout,
        dynamic: bool,
        state: TensorState,
    ) -> Self {
        Self {
            index,
            type_info,
            layout,
            dynamic,
            pinned: false,
            state: RwLock::new(state),
            planned: AtomicUsize::new(0),
            live: AtomicUsize::new(0),
        }
    }

    /// Keeps the buffer alive across reference-count releases.
    pub fn pinned(mut self) -> Self {
        self.pinned = true;
        self
    }

    pub fn index(&self) -> OperandIndex {
        self.index
    }

    pub fn type_info(&self) -> &TypeInfo {
        &self.type_info
    }

    pub fn dtype(&self) -> DataType {
        self.type_info.dtype
    }

    pub fn layout(&self) -> Layout {
        self.layout
    }

    pub fn is_dynamic(&self) -> bool {
        self.dynamic
    }

    pub fn is_pinned(&self) -> bool {
        self.pinned
    }

    fn read(&self) -> RwLockReadGuard<'_, TensorState> {
        self.state.read().expect("tensor state lock poisoned")
    }

    fn write(&self) -> RwLockWriteGuard<'_, TensorState> {
        self.state.write().expect("tensor state lock poisoned")
    }

    pub fn dims(&self) -> Option<Vec<usize>> {
        self.read().dims.clone()
    }

    pub fn resolved_dims(&self) -> KernelResult<Vec<usize>> {
        self.dims().ok_or(KernelError::UnresolvedShape {
            operand: self.index,
        })
    }

    pub fn has_buffer(&self) -> bool {
        self.read().data.is_some()
    }

    /// Snapshot of the buffer; cheap because storage is shared.
    pub fn data(&self) -> KernelResult<TensorData> {
        self.read().data.clone().ok_or(KernelError::MissingBuffer {
            operand: self.index,
        })
    }

    /// Replaces the buffer after checking element type and count.
    pub fn store(&self, data: TensorData) -> KernelResult<()> {
        let mut state = self.write();
        let dims = state.dims.as_ref().ok_or(KernelError::UnresolvedShape {
            operand: self.index,
        })?;
        let expected: usize = dims.iter().product();
        if data.len() != expected {
            return Err(KernelError::BufferMismatch {
                operand: self.index,
                reason: format!("{} elements for shape {dims:?}", data.len()),
            });
        }
        if data.dtype() != self.type_info.dtype {
            return Err(KernelError::BufferMismatch {
                operand: self.index,
                reason: format!("{} data for a {} tensor", data.dtype(), self.type_info.dtype),
            });
        }
        state.data = Some(data);
        Ok(())
    }

    /// Fixes the extents. Static tensors only accept their declared shape.
    pub fn set_dims(&self, dims: Vec<usize>) -> KernelResult<()> {
        let mut state = self.write();
        if !self.dynamic {
            if state.dims.as_deref() != Some(dims.as_slice()) {
                return Err(KernelError::BufferMismatch {
                    operand: self.index,
                    reason: format!("static shape {:?} cannot become {dims:?}", state.dims),
                });
            }
            return Ok(());
        }
        if state.dims.as_deref() != Some(dims.as_slice()) {
            state.data = None;
        }
        state.dims = Some(dims);
        Ok(())
    }

    /// Materialises a zero-filled buffer when none is present.
    pub fn allocate(&self) -> KernelResult<()> {
        let mut state = self.write();
        if state.data.is_some() {
            return Ok(());
        }
        let dims = state.dims.as_ref().ok_or(KernelError::UnresolvedShape {
            operand: self.index,
        })?;
        let len = dims.iter().product();
        state.data = Some(TensorData::zeros(self.type_info.dtype, len));
        Ok(())
    }

    /// Drops the buffer of an unpinned tensor; dynamic tensors also forget their shape.
    pub fn release(&self) {
        if self.pinned {
            return;
        }
        let mut state = self.write();
        state.data = None;
        if self.dynamic {
            state.dims = None;
        }
    }

    pub fn increase_ref(&self) {
        self.planned.fetch_add(1, Ordering::AcqRel);
        self.live.fetch_add(1, Ordering::AcqRel);
    }

    /// Returns `true` on the call that brings the count to zero.
    pub fn decrease_ref(&self) -> bool {
        let previous = self
            .live
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |count| {
                count.checked_sub(1)
            });
        match previous {
            Ok(count) => count == 1,
            Err(_) => {
                warn!(operand = %self.index, "reference count released below zero");
                false
            }
        }
    }

    pub fn ref_count(&self) -> usize {
        self.live.load(Ordering::Acquire)
    }

    pub fn planned_refs(&self) -> usize {
        self.planned.load(Ordering::Acquire)
    }

    /// Restores the generation-time count before another run.
    pub fn rearm(&self) {
        self.live
            .store(self.planned.load(Ordering::Acquire), Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn f32_tensor(dims: Vec<usize>) -> Tensor {
        Tensor::new_static(
            OperandIndex(0),
            TypeInfo::new(DataType::Float32),
            dims,
            Layout::NHWC,
        )
    }

    #[test]
    fn count_reaches_zero_exactly_once() {
        let tensor = f32_tensor(vec![2]);
        for _ in 0..3 {
            tensor.increase_ref();
        }
        assert_eq!(tensor.ref_count(), 3);
        assert!(!tensor.decrease_ref());
        assert!(!tensor.decrease_ref());
        assert!(tensor.decrease_ref());
        assert!(!tensor.decrease_ref());
        assert_eq!(tensor.ref_count(), 0);

        tensor.rearm();
        assert_eq!(tensor.ref_count(), 3);
        assert_eq!(tensor.planned_refs(), 3);
    }

    #[test]
    fn store_checks_count_and_type() {
        let tensor = f32_tensor(vec![2, 2]);
        tensor
            .store(TensorData::from(vec![1.0f32, 2.0, 3.0, 4.0]))
            .expect("matching buffer");
        assert!(tensor.store(TensorData::from(vec![1.0f32])).is_err());
        assert!(tensor.store(TensorData::from(vec![1i32, 2, 3, 4])).is_err());
    }

    #[test]
    fn release_keeps_pinned_buffers() {
        let pinned = f32_tensor(vec![1]).pinned();
        pinned.allocate().expect("allocate");
        pinned.release();
        assert!(pinned.has_buffer());

        let dynamic = Tensor::new_dynamic(
            OperandIndex(1),
            TypeInfo::new(DataType::Int32),
            Layout::NHWC,
        );
        assert!(dynamic.allocate().is_err());
        dynamic.set_dims(vec![3]).expect("dynamic shape");
        dynamic.allocate().expect("allocate");
        dynamic.release();
        assert!(!dynamic.has_buffer());
        assert_eq!(dynamic.dims(), None);
    }
}
