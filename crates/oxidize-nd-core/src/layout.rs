use std::fmt;
use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};

use crate::error::{TensorError, TensorResult};
use crate::order::Order;
use crate::shape::Shape;

/// Maps a logical multi-index to a linear storage position:
/// `offset + Σ index[d] * strides[d]`.
///
/// Dense-order flags are derived at construction. Dimensions of size 1 are
/// ignored by the flag checks since their stride is never used.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "LayoutParts", into = "LayoutParts")]
pub struct StrideLayout {
    shape: Shape,
    offset: usize,
    strides: Vec<usize>,
    c_dense: bool,
    f_dense: bool,
}

#[derive(Serialize, Deserialize)]
struct LayoutParts {
    shape: Shape,
    offset: usize,
    strides: Vec<usize>,
}

impl TryFrom<LayoutParts> for StrideLayout {
    type Error = TensorError;

    fn try_from(parts: LayoutParts) -> TensorResult<Self> {
        StrideLayout::of(parts.shape, parts.offset, parts.strides)
    }
}

impl From<StrideLayout> for LayoutParts {
    fn from(layout: StrideLayout) -> Self {
        LayoutParts {
            shape: layout.shape,
            offset: layout.offset,
            strides: layout.strides,
        }
    }
}

/// Canonical strides of a dense layout in the given logical order.
pub(crate) fn dense_strides(dims: &[usize], order: Order) -> TensorResult<Vec<usize>> {
    let overflow = || TensorError::InvalidLayout(format!("dense strides of {:?} overflow", dims));
    let mut strides = vec![1usize; dims.len()];
    match order {
        Order::RowMajor => {
            for i in (0..dims.len().saturating_sub(1)).rev() {
                strides[i] = strides[i + 1].checked_mul(dims[i + 1]).ok_or_else(overflow)?;
            }
        }
        Order::ColMajor => {
            for i in 1..dims.len() {
                strides[i] = strides[i - 1].checked_mul(dims[i - 1]).ok_or_else(overflow)?;
            }
        }
        Order::Storage => {
            return Err(TensorError::InvalidOrder {
                order,
                context: "dense layout",
            })
        }
    }
    Ok(strides)
}

impl StrideLayout {
    /// Layout with arbitrary strides (views).
    pub fn of(shape: Shape, offset: usize, strides: Vec<usize>) -> TensorResult<Self> {
        if shape.rank() != strides.len() {
            return Err(TensorError::InvalidLayout(format!(
                "shape {} has rank {} but {} strides were given",
                shape,
                shape.rank(),
                strides.len()
            )));
        }
        if shape.size() > 0 {
            // One step past the last element along every axis must stay
            // representable, iterators rely on it.
            shape
                .dims()
                .iter()
                .zip(strides.iter())
                .try_fold(offset, |acc, (&d, &s)| d.checked_mul(s).and_then(|v| acc.checked_add(v)))
                .ok_or_else(|| {
                    TensorError::InvalidLayout(format!(
                        "shape {} with offset {} and strides {:?} overflows the position range",
                        shape, offset, strides
                    ))
                })?;
        }
        let mut layout = StrideLayout {
            shape,
            offset,
            strides,
            c_dense: false,
            f_dense: false,
        };
        layout.update_flags();
        Ok(layout)
    }

    /// Dense layout with canonical strides for `order` (row or column major).
    pub fn of_dense(shape: Shape, offset: usize, order: Order) -> TensorResult<Self> {
        let strides = dense_strides(shape.dims(), order)?;
        StrideLayout::of(shape, offset, strides)
    }

    /// Rank-0 layout addressing the single position `offset`.
    pub fn scalar(offset: usize) -> Self {
        StrideLayout {
            shape: Shape::scalar(),
            offset,
            strides: Vec::new(),
            c_dense: true,
            f_dense: true,
        }
    }

    fn update_flags(&mut self) {
        if self.rank() < 2 {
            self.c_dense = true;
            self.f_dense = true;
            return;
        }
        let (dims, strides) = self.non_unit();
        self.c_dense = (1..dims.len()).all(|i| strides[i - 1] == strides[i] * dims[i]);
        self.f_dense = (1..dims.len()).all(|i| strides[i] == strides[i - 1] * dims[i - 1]);
    }

    /// Dimensions and strides with size-1 dimensions removed.
    fn non_unit(&self) -> (Vec<usize>, Vec<usize>) {
        self.shape
            .dims()
            .iter()
            .zip(self.strides.iter())
            .filter(|(d, _)| **d != 1)
            .map(|(&d, &s)| (d, s))
            .unzip()
    }

    // ─── Accessors ──────────────────────────────────────────────────────────

    pub fn shape(&self) -> &Shape {
        &self.shape
    }

    pub fn dims(&self) -> &[usize] {
        self.shape.dims()
    }

    pub fn offset(&self) -> usize {
        self.offset
    }

    pub fn strides(&self) -> &[usize] {
        &self.strides
    }

    pub fn rank(&self) -> usize {
        self.shape.rank()
    }

    pub fn size(&self) -> usize {
        self.shape.size()
    }

    pub fn is_c_ordered(&self) -> bool {
        self.c_dense
    }

    pub fn is_f_ordered(&self) -> bool {
        self.f_dense
    }

    /// True when the elements occupy a gap-free storage range.
    pub fn is_dense(&self) -> bool {
        let (_, strides) = self.non_unit();
        match (strides.first(), strides.last()) {
            (None, None) => true,
            (Some(&first), Some(&last)) => (self.c_dense && last == 1) || (self.f_dense && first == 1),
            _ => false,
        }
    }

    /// The logical order that visits storage contiguously, or
    /// `Order::Storage` when neither does.
    pub fn storage_fast_order(&self) -> Order {
        if self.rank() < 2 {
            return Order::default_order();
        }
        match (self.c_dense, self.f_dense) {
            (true, true) => Order::default_order(),
            (false, true) => Order::ColMajor,
            (true, false) => Order::RowMajor,
            (false, false) => Order::Storage,
        }
    }

    /// Linear position of a multi-index. The index is not validated.
    #[inline]
    pub fn position(&self, index: &[usize]) -> usize {
        index
            .iter()
            .zip(self.strides.iter())
            .fold(self.offset, |acc, (&i, &s)| acc + i * s)
    }

    /// Linear position of a multi-index, checking rank and bounds.
    pub fn checked_position(&self, index: &[usize]) -> TensorResult<usize> {
        if index.len() != self.rank() {
            return Err(TensorError::DimensionMismatch(format!(
                "Expected {} indices, got {}",
                self.rank(),
                index.len()
            )));
        }
        for (axis, (&i, &d)) in index.iter().zip(self.dims().iter()).enumerate() {
            if i >= d {
                return Err(TensorError::IndexOutOfBounds {
                    index: i,
                    axis,
                    size: d,
                });
            }
        }
        Ok(self.position(index))
    }

    /// Highest reachable linear position, `None` for an empty layout.
    pub fn max_position(&self) -> Option<usize> {
        if self.size() == 0 {
            return None;
        }
        Some(
            self.dims()
                .iter()
                .zip(self.strides.iter())
                .fold(self.offset, |acc, (&d, &s)| acc + (d - 1) * s),
        )
    }

    fn check_axis(&self, axis: usize) -> TensorResult<()> {
        if axis >= self.rank() {
            return Err(TensorError::InvalidAxis {
                axis,
                ndim: self.rank(),
            });
        }
        Ok(())
    }

    fn rebuild(&self, dims: Vec<usize>, offset: usize, strides: Vec<usize>) -> TensorResult<Self> {
        StrideLayout::of(Shape::new(dims)?, offset, strides)
    }

    // ─── Views ──────────────────────────────────────────────────────────────

    /// Remove all dimensions of size 1.
    pub fn squeeze(&self) -> TensorResult<Self> {
        if self.shape.unit_dim_count() == 0 {
            return Ok(self.clone());
        }
        let (dims, strides) = self.non_unit();
        self.rebuild(dims, self.offset, strides)
    }

    /// Remove `axis` if it has size 1, otherwise return the layout unchanged.
    pub fn squeeze_axis(&self, axis: usize) -> TensorResult<Self> {
        self.check_axis(axis)?;
        if self.dims()[axis] != 1 {
            return Ok(self.clone());
        }
        let mut dims = self.dims().to_vec();
        let mut strides = self.strides.clone();
        dims.remove(axis);
        strides.remove(axis);
        self.rebuild(dims, self.offset, strides)
    }

    /// Insert a dimension of size 1 at `axis` (`0..=rank`).
    pub fn stretch(&self, axis: usize) -> TensorResult<Self> {
        if axis > self.rank() {
            return Err(TensorError::InvalidAxis {
                axis,
                ndim: self.rank() + 1,
            });
        }
        let mut dims = self.dims().to_vec();
        let mut strides = self.strides.clone();
        dims.insert(axis, 1);
        strides.insert(axis, 0);
        self.rebuild(dims, self.offset, strides)
    }

    /// Virtually repeat a size-1 dimension `size` times (zero stride).
    pub fn expand(&self, axis: usize, size: usize) -> TensorResult<Self> {
        self.check_axis(axis)?;
        if self.dims()[axis] != 1 {
            return Err(TensorError::InvalidOperation(format!(
                "Dimension {} must have size 1 to be expanded, but has size {}",
                axis,
                self.dims()[axis]
            )));
        }
        let mut dims = self.dims().to_vec();
        let mut strides = self.strides.clone();
        dims[axis] = size;
        strides[axis] = 0;
        self.rebuild(dims, self.offset, strides)
    }

    /// Broadcast view to `target`: missing leading dimensions and size-1
    /// dimensions get a zero stride.
    pub fn broadcast_to(&self, target: &Shape) -> TensorResult<Self> {
        let err = || TensorError::BroadcastError {
            shapes: vec![self.shape.to_vec(), target.to_vec()],
        };
        if target.rank() < self.rank() {
            return Err(err());
        }
        let lead = target.rank() - self.rank();
        let mut strides = vec![0usize; target.rank()];
        for (i, &t) in target.dims().iter().enumerate().skip(lead) {
            let d = self.dims()[i - lead];
            if d == t {
                strides[i] = self.strides[i - lead];
            } else if d != 1 {
                return Err(err());
            }
        }
        StrideLayout::of(target.clone(), self.offset, strides)
    }

    /// Reverse the order of all dimensions.
    pub fn revert(&self) -> TensorResult<Self> {
        let mut dims = self.dims().to_vec();
        let mut strides = self.strides.clone();
        dims.reverse();
        strides.reverse();
        self.rebuild(dims, self.offset, strides)
    }

    /// Reorder dimensions; `perm[i]` is the source axis of new axis `i`.
    pub fn permute(&self, perm: &[usize]) -> TensorResult<Self> {
        if perm.len() != self.rank() {
            return Err(TensorError::DimensionMismatch(format!(
                "permutation {:?} does not match rank {}",
                perm,
                self.rank()
            )));
        }
        let mut seen = vec![false; self.rank()];
        for &p in perm {
            if p >= self.rank() || seen[p] {
                return Err(TensorError::InvalidOperation(format!(
                    "{:?} is not a permutation of the axes",
                    perm
                )));
            }
            seen[p] = true;
        }
        let dims = perm.iter().map(|&p| self.dims()[p]).collect();
        let strides = perm.iter().map(|&p| self.strides[p]).collect();
        self.rebuild(dims, self.offset, strides)
    }

    pub fn swap_axis(&self, a: usize, b: usize) -> TensorResult<Self> {
        self.check_axis(a)?;
        self.check_axis(b)?;
        let mut dims = self.dims().to_vec();
        let mut strides = self.strides.clone();
        dims.swap(a, b);
        strides.swap(a, b);
        self.rebuild(dims, self.offset, strides)
    }

    /// Move axis `src` to position `dst`, shifting the axes in between.
    pub fn move_axis(&self, src: usize, dst: usize) -> TensorResult<Self> {
        self.check_axis(src)?;
        self.check_axis(dst)?;
        let mut dims = self.dims().to_vec();
        let mut strides = self.strides.clone();
        let d = dims.remove(src);
        let s = strides.remove(src);
        dims.insert(dst, d);
        strides.insert(dst, s);
        self.rebuild(dims, self.offset, strides)
    }

    /// Restrict `axis` to `start..end`. With `keepdim == false` a resulting
    /// size-1 axis is removed.
    pub fn narrow(&self, axis: usize, keepdim: bool, start: usize, end: usize) -> TensorResult<Self> {
        self.narrow_step(axis, start, end, 1).and_then(|l| {
            if keepdim {
                Ok(l)
            } else {
                l.squeeze_axis(axis)
            }
        })
    }

    /// Restrict `axis` to every `step`-th position of `start..end`.
    pub fn narrow_step(&self, axis: usize, start: usize, end: usize, step: usize) -> TensorResult<Self> {
        self.check_axis(axis)?;
        let size = self.dims()[axis];
        if start > end || end > size {
            return Err(TensorError::IndexOutOfBounds {
                index: end.max(start),
                axis,
                size,
            });
        }
        if step == 0 {
            return Err(TensorError::InvalidOperation("slice step must be positive".into()));
        }
        let mut dims = self.dims().to_vec();
        let mut strides = self.strides.clone();
        dims[axis] = (end - start).div_ceil(step);
        if dims[axis] > 1 {
            strides[axis] = strides[axis].checked_mul(step).ok_or_else(|| {
                TensorError::InvalidLayout(format!(
                    "stride {} times step {} overflows",
                    strides[axis], step
                ))
            })?;
        }
        let offset = if dims[axis] == 0 {
            self.offset
        } else {
            self.offset + start * self.strides[axis]
        };
        self.rebuild(dims, offset, strides)
    }

    /// Restrict every axis at once: axis `i` becomes `starts[i]..ends[i]`.
    pub fn narrow_all(&self, starts: &[usize], ends: &[usize]) -> TensorResult<Self> {
        if starts.len() != self.rank() || ends.len() != self.rank() {
            return Err(TensorError::DimensionMismatch(format!(
                "narrow bounds must have length {}, got {} and {}",
                self.rank(),
                starts.len(),
                ends.len()
            )));
        }
        let mut layout = self.clone();
        for axis in 0..self.rank() {
            layout = layout.narrow_step(axis, starts[axis], ends[axis], 1)?;
        }
        Ok(layout)
    }

    /// Fix `axis` at `index`, removing the axis.
    pub fn select(&self, axis: usize, index: usize) -> TensorResult<Self> {
        self.check_axis(axis)?;
        let size = self.dims()[axis];
        if index >= size {
            return Err(TensorError::IndexOutOfBounds { index, axis, size });
        }
        let mut dims = self.dims().to_vec();
        let mut strides = self.strides.clone();
        dims.remove(axis);
        let stride = strides.remove(axis);
        self.rebuild(dims, self.offset + index * stride, strides)
    }

    /// Layout of the same elements viewed with `shape`, read in `order`.
    ///
    /// Returns `Ok(None)` when the elements are not equally spaced in that
    /// order, in which case a reshape needs a copy.
    pub fn reshape(&self, shape: &Shape, order: Order) -> TensorResult<Option<Self>> {
        if shape.size() != self.size() {
            return Err(TensorError::ReshapeMismatch {
                from: self.shape.to_vec(),
                to: shape.to_vec(),
            });
        }
        let order = Order::auto_fc(order);
        let (_, strides) = self.non_unit();
        let base = match order {
            Order::RowMajor if self.c_dense => strides.last().copied().unwrap_or(1),
            Order::ColMajor if self.f_dense => strides.first().copied().unwrap_or(1),
            _ => return Ok(None),
        };
        let new_strides = dense_strides(shape.dims(), order)?
            .into_iter()
            .map(|s| {
                s.checked_mul(base)
                    .ok_or_else(|| TensorError::InvalidLayout("reshaped strides overflow".into()))
            })
            .collect::<TensorResult<Vec<usize>>>()?;
        StrideLayout::of(shape.clone(), self.offset, new_strides).map(Some)
    }
}

impl PartialEq for StrideLayout {
    fn eq(&self, other: &Self) -> bool {
        self.offset == other.offset && self.shape == other.shape && self.strides == other.strides
    }
}

impl Eq for StrideLayout {}

impl Hash for StrideLayout {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.shape.hash(state);
        self.offset.hash(state);
        self.strides.hash(state);
    }
}

impl fmt::Display for StrideLayout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut flags = Vec::new();
        if self.c_dense {
            flags.push("C_DENSE");
        }
        if self.f_dense {
            flags.push("F_DENSE");
        }
        write!(
            f,
            "StrideLayout{{shape={},offset={},strides={:?},flags=[{}]}}",
            self.shape,
            self.offset,
            self.strides,
            flags.join(",")
        )
    }
}
