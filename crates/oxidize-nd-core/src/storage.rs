//! Linear element buffers underlying every tensor.
//!
//! A storage knows nothing about shape: the same storage may back many
//! tensors with different layouts. All methods take `&self`; mutation goes
//! through an internal `RwLock`, so views sharing a storage can write to it.
//! Serializing concurrent writers across views is the caller's concern.

use std::collections::VecDeque;
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::dtype::{DType, Element};
use crate::error::{TensorError, TensorResult};

/// Positional access to a linear buffer of elements of one kind.
pub trait Storage<T: Element>: Send + Sync + fmt::Debug {
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn dtype(&self) -> DType {
        T::DTYPE
    }

    fn get(&self, position: usize) -> TensorResult<T>;

    fn set(&self, position: usize, value: T) -> TensorResult<()>;

    /// Add `value` to the element at `position`.
    fn inc(&self, position: usize, value: T) -> TensorResult<()>;

    fn fill(&self, value: T);

    /// Read `positions` into `out`. Implementations take their lock once.
    fn gather(&self, positions: &[usize], out: &mut [T]) -> TensorResult<()> {
        for (slot, &p) in out.iter_mut().zip(positions) {
            *slot = self.get(p)?;
        }
        Ok(())
    }

    /// Write `values` to `positions`.
    fn scatter(&self, positions: &[usize], values: &[T]) -> TensorResult<()> {
        for (&p, &v) in positions.iter().zip(values) {
            self.set(p, v)?;
        }
        Ok(())
    }
}

// ─── Dense storage ──────────────────────────────────────────────────────────

/// Buffer allocated and owned by the library.
pub struct DenseStorage<T: Element> {
    data: RwLock<Vec<T>>,
}

impl<T: Element> DenseStorage<T> {
    pub fn from_vec(data: Vec<T>) -> Self {
        DenseStorage {
            data: RwLock::new(data),
        }
    }

    pub fn zeros(len: usize) -> Self {
        DenseStorage::from_vec(vec![T::ZERO; len])
    }

    /// Snapshot of the whole buffer.
    pub fn to_vec(&self) -> Vec<T> {
        self.data.read().clone()
    }
}

impl<T: Element> fmt::Debug for DenseStorage<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DenseStorage")
            .field("dtype", &T::DTYPE)
            .field("len", &self.len())
            .finish()
    }
}

fn out_of_range(position: usize, len: usize) -> TensorError {
    TensorError::StorageOutOfRange { position, len }
}

impl<T: Element> Storage<T> for DenseStorage<T> {
    fn len(&self) -> usize {
        self.data.read().len()
    }

    fn get(&self, position: usize) -> TensorResult<T> {
        let data = self.data.read();
        data.get(position).copied().ok_or_else(|| out_of_range(position, data.len()))
    }

    fn set(&self, position: usize, value: T) -> TensorResult<()> {
        let mut data = self.data.write();
        let len = data.len();
        let slot = data.get_mut(position).ok_or_else(|| out_of_range(position, len))?;
        *slot = value;
        Ok(())
    }

    fn inc(&self, position: usize, value: T) -> TensorResult<()> {
        let mut data = self.data.write();
        let len = data.len();
        let slot = data.get_mut(position).ok_or_else(|| out_of_range(position, len))?;
        *slot = slot.elem_add(value);
        Ok(())
    }

    fn fill(&self, value: T) {
        self.data.write().iter_mut().for_each(|v| *v = value);
    }

    fn gather(&self, positions: &[usize], out: &mut [T]) -> TensorResult<()> {
        let data = self.data.read();
        for (slot, &p) in out.iter_mut().zip(positions) {
            *slot = *data.get(p).ok_or_else(|| out_of_range(p, data.len()))?;
        }
        Ok(())
    }

    fn scatter(&self, positions: &[usize], values: &[T]) -> TensorResult<()> {
        let mut data = self.data.write();
        let len = data.len();
        for (&p, &v) in positions.iter().zip(values) {
            *data.get_mut(p).ok_or_else(|| out_of_range(p, len))? = v;
        }
        Ok(())
    }
}

// ─── Adapter storage ────────────────────────────────────────────────────────

/// An externally owned mutable numeric sequence.
pub trait Sequence<T>: Send + Sync {
    fn len(&self) -> usize;
    fn get(&self, index: usize) -> Option<&T>;
    fn get_mut(&mut self, index: usize) -> Option<&mut T>;
}

impl<T: Send + Sync> Sequence<T> for Vec<T> {
    fn len(&self) -> usize {
        Vec::len(self)
    }

    fn get(&self, index: usize) -> Option<&T> {
        self.as_slice().get(index)
    }

    fn get_mut(&mut self, index: usize) -> Option<&mut T> {
        self.as_mut_slice().get_mut(index)
    }
}

impl<T: Send + Sync> Sequence<T> for Box<[T]> {
    fn len(&self) -> usize {
        <[T]>::len(self)
    }

    fn get(&self, index: usize) -> Option<&T> {
        <[T]>::get(self, index)
    }

    fn get_mut(&mut self, index: usize) -> Option<&mut T> {
        <[T]>::get_mut(self, index)
    }
}

impl<T: Send + Sync> Sequence<T> for VecDeque<T> {
    fn len(&self) -> usize {
        VecDeque::len(self)
    }

    fn get(&self, index: usize) -> Option<&T> {
        VecDeque::get(self, index)
    }

    fn get_mut(&mut self, index: usize) -> Option<&mut T> {
        VecDeque::get_mut(self, index)
    }
}

/// Zero-copy storage over a sequence shared with its owner.
///
/// The owner keeps its own handle on the `Arc`; writes made through the
/// storage are visible there and vice versa.
pub struct SequenceStorage<T: Element, S: Sequence<T>> {
    inner: Arc<RwLock<S>>,
    _element: PhantomData<fn() -> T>,
}

impl<T: Element, S: Sequence<T>> SequenceStorage<T, S> {
    pub fn new(inner: Arc<RwLock<S>>) -> Self {
        SequenceStorage {
            inner,
            _element: PhantomData,
        }
    }

    /// Handle on the adapted sequence.
    pub fn shared(&self) -> Arc<RwLock<S>> {
        Arc::clone(&self.inner)
    }
}

impl<T: Element, S: Sequence<T>> fmt::Debug for SequenceStorage<T, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SequenceStorage")
            .field("dtype", &T::DTYPE)
            .field("len", &self.len())
            .finish()
    }
}

impl<T: Element, S: Sequence<T>> Storage<T> for SequenceStorage<T, S> {
    fn len(&self) -> usize {
        self.inner.read().len()
    }

    fn get(&self, position: usize) -> TensorResult<T> {
        let seq = self.inner.read();
        seq.get(position).copied().ok_or_else(|| out_of_range(position, seq.len()))
    }

    fn set(&self, position: usize, value: T) -> TensorResult<()> {
        let mut seq = self.inner.write();
        let len = seq.len();
        *seq.get_mut(position).ok_or_else(|| out_of_range(position, len))? = value;
        Ok(())
    }

    fn inc(&self, position: usize, value: T) -> TensorResult<()> {
        let mut seq = self.inner.write();
        let len = seq.len();
        let slot = seq.get_mut(position).ok_or_else(|| out_of_range(position, len))?;
        *slot = slot.elem_add(value);
        Ok(())
    }

    fn fill(&self, value: T) {
        let mut seq = self.inner.write();
        for i in 0..seq.len() {
            if let Some(slot) = seq.get_mut(i) {
                *slot = value;
            }
        }
    }

    fn gather(&self, positions: &[usize], out: &mut [T]) -> TensorResult<()> {
        let seq = self.inner.read();
        for (slot, &p) in out.iter_mut().zip(positions) {
            *slot = *seq.get(p).ok_or_else(|| out_of_range(p, seq.len()))?;
        }
        Ok(())
    }
}
