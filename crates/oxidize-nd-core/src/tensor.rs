use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::dtype::{DType, Element, Float};
use crate::error::{TensorError, TensorResult};
use crate::iterator::{IndexIterator, StridePointerIterator};
use crate::layout::StrideLayout;
use crate::order::Order;
use crate::parallel::{gather_chunked, ParallelConfig};
use crate::shape::Shape;
use crate::storage::{DenseStorage, Sequence, SequenceStorage, Storage};

/// N-dimensional strided array, the fundamental data structure of OxidizeND.
///
/// A tensor is a `StrideLayout` over a shared `Storage`. Views (reshape,
/// transpose, narrow, take, ...) are new tensors over the same storage with a
/// recomputed layout; they never copy. Operations that produce new values
/// allocate a fresh dense storage unless they carry a `_` suffix, in which
/// case they write through the receiver's storage.
///
/// Writes through one view are visible to every other view of the same
/// storage. Concurrent writers on views sharing a storage must be serialized
/// by the caller.
#[derive(Clone)]
pub struct Tensor<T: Element> {
    layout: StrideLayout,
    storage: Arc<dyn Storage<T>>,
}

// ─── Construction ───────────────────────────────────────────────────────────

impl<T: Element> Tensor<T> {
    fn dense(data: Vec<T>, shape: Shape, order: Order) -> TensorResult<Self> {
        let layout = StrideLayout::of_dense(shape, 0, order)?;
        Ok(Tensor {
            layout,
            storage: Arc::new(DenseStorage::from_vec(data)),
        })
    }

    /// Create a tensor from values laid out densely in `order`.
    pub fn from_vec(data: Vec<T>, dims: &[usize], order: Order) -> TensorResult<Self> {
        let shape = Shape::of(dims)?;
        if data.len() != shape.size() {
            return Err(TensorError::ShapeMismatch {
                expected: shape.to_vec(),
                got: vec![data.len()],
            });
        }
        Tensor::dense(data, shape, order)
    }

    /// Create a 2-D row-major tensor from rows.
    pub fn from_vec2d(rows: &[Vec<T>]) -> TensorResult<Self> {
        let cols = rows.first().map_or(0, Vec::len);
        if rows.iter().any(|r| r.len() != cols) {
            return Err(TensorError::InvalidOperation(
                "All rows must have the same number of columns".to_string(),
            ));
        }
        let flat: Vec<T> = rows.iter().flat_map(|r| r.iter().copied()).collect();
        Tensor::from_vec(flat, &[rows.len(), cols], Order::RowMajor)
    }

    pub fn full(dims: &[usize], value: T) -> TensorResult<Self> {
        let shape = Shape::of(dims)?;
        Tensor::dense(vec![value; shape.size()], shape, Order::default_order())
    }

    pub fn zeros(dims: &[usize]) -> TensorResult<Self> {
        Tensor::full(dims, T::ZERO)
    }

    pub fn ones(dims: &[usize]) -> TensorResult<Self> {
        Tensor::full(dims, T::ONE)
    }

    /// Values `0, 1, 2, ...` laid out in `order`.
    pub fn seq(dims: &[usize], order: Order) -> TensorResult<Self> {
        let shape = Shape::of(dims)?;
        let data = (0..shape.size()).map(T::from_usize).collect();
        Tensor::dense(data, shape, order)
    }

    pub fn scalar(value: T) -> Self {
        Tensor {
            layout: StrideLayout::scalar(0),
            storage: Arc::new(DenseStorage::from_vec(vec![value])),
        }
    }

    /// Identity matrix of size n×n.
    pub fn eye(n: usize) -> TensorResult<Self> {
        let t = Tensor::zeros(&[n, n])?;
        for i in 0..n {
            t.set(&[i, i], T::ONE)?;
        }
        Ok(t)
    }

    /// Tensor over an existing storage. The layout must stay inside it.
    pub fn wrap(storage: Arc<dyn Storage<T>>, layout: StrideLayout) -> TensorResult<Self> {
        if let Some(max) = layout.max_position() {
            if max >= storage.len() {
                return Err(TensorError::StorageOutOfRange {
                    position: max,
                    len: storage.len(),
                });
            }
        }
        Ok(Tensor { layout, storage })
    }

    /// Zero-copy tensor over an externally owned sequence, read densely in
    /// `order`. Writes through the tensor are visible to the owner.
    pub fn adapt<S>(sequence: Arc<RwLock<S>>, dims: &[usize], order: Order) -> TensorResult<Self>
    where
        S: Sequence<T> + 'static,
    {
        let layout = StrideLayout::of_dense(Shape::of(dims)?, 0, order)?;
        Tensor::wrap(Arc::new(SequenceStorage::new(sequence)), layout)
    }

    fn view(&self, layout: StrideLayout) -> Self {
        Tensor {
            layout,
            storage: Arc::clone(&self.storage),
        }
    }
}

impl<T: Float> Tensor<T> {
    /// Uniform values in `[0, 1)` from a seeded generator, laid out in `order`.
    pub fn random(dims: &[usize], seed: u64, order: Order) -> TensorResult<Self> {
        let shape = Shape::of(dims)?;
        let mut rng = StdRng::seed_from_u64(seed);
        let data = (0..shape.size()).map(|_| T::from_f64(rng.gen::<f64>())).collect();
        Tensor::dense(data, shape, order)
    }
}

// ─── Accessors ──────────────────────────────────────────────────────────────

impl<T: Element> Tensor<T> {
    pub fn shape(&self) -> &Shape {
        self.layout.shape()
    }

    pub fn dims(&self) -> &[usize] {
        self.layout.dims()
    }

    pub fn layout(&self) -> &StrideLayout {
        &self.layout
    }

    pub fn dtype(&self) -> DType {
        T::DTYPE
    }

    pub fn rank(&self) -> usize {
        self.layout.rank()
    }

    pub fn size(&self) -> usize {
        self.layout.size()
    }

    pub fn dim(&self, axis: usize) -> TensorResult<usize> {
        self.shape().dim(axis)
    }

    pub fn is_scalar(&self) -> bool {
        self.rank() == 0
    }

    pub fn storage(&self) -> &Arc<dyn Storage<T>> {
        &self.storage
    }

    /// True when both tensors are views of the same storage.
    pub fn shares_storage<U: Element>(&self, other: &Tensor<U>) -> bool {
        std::ptr::addr_eq(Arc::as_ptr(&self.storage), Arc::as_ptr(&other.storage))
    }

    // ─── Element access ─────────────────────────────────────────────────────

    pub fn get(&self, index: &[usize]) -> TensorResult<T> {
        self.storage.get(self.layout.checked_position(index)?)
    }

    pub fn set(&self, index: &[usize], value: T) -> TensorResult<()> {
        self.storage.set(self.layout.checked_position(index)?, value)
    }

    /// Add `value` to the element at `index`.
    pub fn inc(&self, index: &[usize], value: T) -> TensorResult<()> {
        self.storage.inc(self.layout.checked_position(index)?, value)
    }

    /// Read the storage directly at a linear position.
    pub fn ptr_get(&self, position: usize) -> TensorResult<T> {
        self.storage.get(position)
    }

    pub fn ptr_set(&self, position: usize, value: T) -> TensorResult<()> {
        self.storage.set(position, value)
    }

    /// The single element of a size-1 tensor.
    pub fn item(&self) -> TensorResult<T> {
        if self.size() != 1 {
            return Err(TensorError::InvalidOperation(format!(
                "item() requires exactly 1 element, got {}",
                self.size()
            )));
        }
        let position = self.layout.max_position().ok_or(TensorError::EmptyTensor)?;
        self.storage.get(position)
    }

    // ─── Iteration ──────────────────────────────────────────────────────────

    pub fn ptr_iter(&self, order: Order) -> StridePointerIterator {
        StridePointerIterator::new(&self.layout, order)
    }

    pub fn index_iter(&self, order: Order) -> TensorResult<IndexIterator> {
        IndexIterator::new(self.shape(), order)
    }

    /// All values in `order`.
    pub fn to_vec(&self, order: Order) -> TensorResult<Vec<T>> {
        self.to_vec_with(order, &ParallelConfig::default())
    }

    pub fn to_vec_with(&self, order: Order, config: &ParallelConfig) -> TensorResult<Vec<T>> {
        gather_chunked(self.storage.as_ref(), &self.layout, order, config)
    }
}

// ─── Views ──────────────────────────────────────────────────────────────────

impl<T: Element> Tensor<T> {
    /// View with a new shape, reading elements in `order`.
    ///
    /// Fails with `NotContiguous` when the layout is not dense-compatible in
    /// that order; use `to_shape` to allow a copy.
    pub fn reshape(&self, dims: &[usize], order: Order) -> TensorResult<Self> {
        let shape = Shape::of(dims)?;
        match self.layout.reshape(&shape, order)? {
            Some(layout) => Ok(self.view(layout)),
            None => Err(TensorError::NotContiguous {
                shape: self.shape().to_vec(),
                strides: self.layout.strides().to_vec(),
                order: Order::auto_fc(order),
            }),
        }
    }

    /// Reshape as a view when possible, otherwise through a dense copy.
    pub fn to_shape(&self, dims: &[usize], order: Order) -> TensorResult<Self> {
        match self.reshape(dims, order) {
            Err(TensorError::NotContiguous { .. }) => {
                self.copy(Order::auto_fc(order))?.reshape(dims, order)
            }
            other => other,
        }
    }

    /// Reverse all axes.
    pub fn transpose(&self) -> TensorResult<Self> {
        Ok(self.view(self.layout.revert()?))
    }

    /// Swap the last two axes.
    pub fn t(&self) -> TensorResult<Self> {
        let rank = self.rank();
        if rank < 2 {
            return Err(TensorError::InvalidOperation(
                "Cannot transpose tensor with fewer than 2 dimensions".to_string(),
            ));
        }
        self.swap_axis(rank - 2, rank - 1)
    }

    pub fn permute(&self, perm: &[usize]) -> TensorResult<Self> {
        Ok(self.view(self.layout.permute(perm)?))
    }

    pub fn swap_axis(&self, a: usize, b: usize) -> TensorResult<Self> {
        Ok(self.view(self.layout.swap_axis(a, b)?))
    }

    pub fn move_axis(&self, src: usize, dst: usize) -> TensorResult<Self> {
        Ok(self.view(self.layout.move_axis(src, dst)?))
    }

    pub fn narrow(&self, axis: usize, keepdim: bool, start: usize, end: usize) -> TensorResult<Self> {
        Ok(self.view(self.layout.narrow(axis, keepdim, start, end)?))
    }

    pub fn narrow_step(&self, axis: usize, start: usize, end: usize, step: usize) -> TensorResult<Self> {
        Ok(self.view(self.layout.narrow_step(axis, start, end, step)?))
    }

    pub fn narrow_all(&self, starts: &[usize], ends: &[usize]) -> TensorResult<Self> {
        Ok(self.view(self.layout.narrow_all(starts, ends)?))
    }

    pub fn select(&self, axis: usize, index: usize) -> TensorResult<Self> {
        Ok(self.view(self.layout.select(axis, index)?))
    }

    pub fn squeeze(&self) -> TensorResult<Self> {
        Ok(self.view(self.layout.squeeze()?))
    }

    pub fn squeeze_axis(&self, axis: usize) -> TensorResult<Self> {
        Ok(self.view(self.layout.squeeze_axis(axis)?))
    }

    /// Insert a size-1 axis at `axis`.
    pub fn stretch(&self, axis: usize) -> TensorResult<Self> {
        Ok(self.view(self.layout.stretch(axis)?))
    }

    pub fn expand(&self, axis: usize, size: usize) -> TensorResult<Self> {
        Ok(self.view(self.layout.expand(axis, size)?))
    }

    pub fn broadcast_to(&self, dims: &[usize]) -> TensorResult<Self> {
        Ok(self.view(self.layout.broadcast_to(&Shape::of(dims)?)?))
    }

    /// Elements at `indices` along `axis`.
    ///
    /// Indices forming a non-decreasing arithmetic progression are expressed
    /// as a view; any other selection is gathered into a new dense tensor.
    pub fn take(&self, axis: usize, indices: &[usize]) -> TensorResult<Self> {
        let size = self.dim(axis)?;
        if let Some(&bad) = indices.iter().find(|&&i| i >= size) {
            return Err(TensorError::IndexOutOfBounds { index: bad, axis, size });
        }
        if let Some(layout) = self.take_layout(axis, indices)? {
            return Ok(self.view(layout));
        }

        let mut dims = self.dims().to_vec();
        dims[axis] = indices.len();
        let out = Tensor::zeros(&dims)?;
        for (k, &i) in indices.iter().enumerate() {
            out.select(axis, k)?.assign_(&self.select(axis, i)?)?;
        }
        Ok(out)
    }

    fn take_layout(&self, axis: usize, indices: &[usize]) -> TensorResult<Option<StrideLayout>> {
        let step = match indices {
            [] | [_] => 0,
            [a, b, ..] if b >= a => b - a,
            _ => return Ok(None),
        };
        if indices.windows(2).any(|w| w[1] < w[0] || w[1] - w[0] != step) {
            return Ok(None);
        }
        let mut dims = self.dims().to_vec();
        let mut strides = self.layout.strides().to_vec();
        let first = indices.first().copied().unwrap_or(0);
        dims[axis] = indices.len();
        let offset = self.layout.offset() + first * strides[axis];
        strides[axis] *= step;
        StrideLayout::of(Shape::new(dims)?, offset, strides).map(Some)
    }

    /// Main diagonal of a 2-D tensor as a rank-1 view.
    pub fn diagonal(&self) -> TensorResult<Self> {
        if self.rank() != 2 {
            return Err(TensorError::DimensionMismatch(format!(
                "diagonal requires a 2D tensor, got rank {}",
                self.rank()
            )));
        }
        let n = self.dims()[0].min(self.dims()[1]);
        let strides = self.layout.strides();
        let step = if n > 1 {
            strides[0].checked_add(strides[1]).ok_or_else(|| {
                TensorError::InvalidLayout(format!("diagonal stride of {:?} overflows", strides))
            })?
        } else {
            1
        };
        let layout = StrideLayout::of(Shape::of(&[n])?, self.layout.offset(), vec![step])?;
        Ok(self.view(layout))
    }

    /// Views of `axis` cut at `starts`: part `k` runs from `starts[k]` to the
    /// next start, the last part to the end of the axis.
    pub fn split(&self, axis: usize, keepdim: bool, starts: &[usize]) -> TensorResult<Vec<Self>> {
        let size = self.dim(axis)?;
        if let Some(w) = starts.windows(2).find(|w| w[1] < w[0]) {
            return Err(TensorError::InvalidOperation(format!(
                "split starts must be non-decreasing, got {} after {}",
                w[1], w[0]
            )));
        }
        let ends = starts.iter().skip(1).copied().chain(std::iter::once(size));
        starts
            .iter()
            .zip(ends)
            .map(|(&start, end)| self.narrow(axis, keepdim, start, end))
            .collect()
    }

    /// Consecutive views of `step` positions along `axis`; the last one may
    /// be shorter.
    pub fn chunk(&self, axis: usize, keepdim: bool, step: usize) -> TensorResult<Vec<Self>> {
        let size = self.dim(axis)?;
        if step == 0 {
            return Err(TensorError::InvalidOperation("chunk step must be positive".into()));
        }
        let starts: Vec<usize> = (0..size).step_by(step).collect();
        self.split(axis, keepdim, &starts)
    }
}

// ─── Copies ─────────────────────────────────────────────────────────────────

impl<T: Element> Tensor<T> {
    /// Dense copy with a fresh storage laid out in `order`.
    pub fn copy(&self, order: Order) -> TensorResult<Self> {
        self.copy_with(order, &ParallelConfig::default())
    }

    /// `copy` with explicit chunking. `Order::Storage` keeps whichever dense
    /// order matches the source, falling back to the default order.
    pub fn copy_with(&self, order: Order, config: &ParallelConfig) -> TensorResult<Self> {
        let order = match order {
            Order::Storage => Order::auto_fc(self.layout.storage_fast_order()),
            logical => logical,
        };
        let data = self.to_vec_with(order, config)?;
        Tensor::dense(data, self.shape().clone(), order)
    }

    /// Dense 1-D copy of the values visited in `order`.
    pub fn flatten(&self, order: Order) -> TensorResult<Self> {
        self.flatten_with(order, &ParallelConfig::default())
    }

    pub fn flatten_with(&self, order: Order, config: &ParallelConfig) -> TensorResult<Self> {
        let data = self.to_vec_with(order, config)?;
        let len = data.len();
        Tensor::dense(data, Shape::new(vec![len])?, Order::RowMajor)
    }

    /// Explicit conversion to another element kind.
    pub fn cast<U: Element>(&self) -> TensorResult<Tensor<U>> {
        let data = self.to_vec(Order::RowMajor)?.into_iter().map(|v| v.cast::<U>()).collect();
        Tensor::dense(data, self.shape().clone(), Order::RowMajor)
    }

    /// Same shape and the same values in row-major order.
    pub fn deep_equals(&self, other: &Tensor<T>) -> bool {
        if self.shape() != other.shape() {
            return false;
        }
        match (self.to_vec(Order::RowMajor), other.to_vec(Order::RowMajor)) {
            (Ok(a), Ok(b)) => a == b,
            _ => false,
        }
    }
}

impl<T: Element> PartialEq for Tensor<T> {
    fn eq(&self, other: &Self) -> bool {
        self.deep_equals(other)
    }
}

impl<T: Element> fmt::Debug for Tensor<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Tensor")
            .field("dtype", &T::DTYPE)
            .field("layout", &self.layout)
            .field("storage", &self.storage)
            .finish()
    }
}

// ─── Display ────────────────────────────────────────────────────────────────

impl<T: Element> fmt::Display for Tensor<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let value = |index: &[usize]| self.get(index).map_err(|_| fmt::Error);
        match self.rank() {
            0 => write!(f, "tensor({})", value(&[])?),
            1 => {
                write!(f, "tensor([")?;
                for i in 0..self.dims()[0] {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    if i > 6 {
                        write!(f, "...")?;
                        break;
                    }
                    write!(f, "{}", value(&[i])?)?;
                }
                write!(f, "], dtype={})", T::DTYPE)
            }
            2 => {
                let (rows, cols) = (self.dims()[0], self.dims()[1]);
                writeln!(f, "tensor([")?;
                for i in 0..rows.min(8) {
                    write!(f, "  [")?;
                    for j in 0..cols.min(8) {
                        if j > 0 {
                            write!(f, ", ")?;
                        }
                        write!(f, "{}", value(&[i, j])?)?;
                    }
                    if cols > 8 {
                        write!(f, ", ...")?;
                    }
                    writeln!(f, "],")?;
                }
                if rows > 8 {
                    writeln!(f, "  ...")?;
                }
                write!(f, "], shape={}, dtype={})", self.shape(), T::DTYPE)
            }
            _ => write!(f, "tensor(shape={}, dtype={})", self.shape(), T::DTYPE),
        }
    }
}
