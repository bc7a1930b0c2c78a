//! Walks over the index space of a shape or the positions of a layout.
//!
//! Both iterators are finite, pull-based and not restartable. Calling
//! `next_index`/`next_ptr` after `has_next` returned false is an error.

use crate::error::{TensorError, TensorResult};
use crate::layout::StrideLayout;
use crate::order::Order;
use crate::shape::Shape;

/// Yields every multi-index of a shape in row-major or column-major order.
#[derive(Debug, Clone)]
pub struct IndexIterator {
    dims: Vec<usize>,
    order: Order,
    current: Vec<usize>,
    emitted: usize,
    size: usize,
}

impl IndexIterator {
    pub fn new(shape: &Shape, order: Order) -> TensorResult<Self> {
        if !order.is_logical() {
            return Err(TensorError::InvalidOrder {
                order,
                context: "index iteration",
            });
        }
        Ok(IndexIterator {
            dims: shape.to_vec(),
            order,
            current: vec![0; shape.rank()],
            emitted: 0,
            size: shape.size(),
        })
    }

    pub fn has_next(&self) -> bool {
        self.emitted < self.size
    }

    pub fn next_index(&mut self) -> TensorResult<Vec<usize>> {
        if !self.has_next() {
            return Err(TensorError::IterationExhausted { size: self.size });
        }
        let index = self.current.clone();
        self.emitted += 1;
        if self.has_next() {
            self.advance();
        }
        Ok(index)
    }

    fn advance(&mut self) {
        let rank = self.dims.len();
        for k in 0..rank {
            let axis = match self.order {
                Order::ColMajor => k,
                _ => rank - 1 - k,
            };
            self.current[axis] += 1;
            if self.current[axis] < self.dims[axis] {
                return;
            }
            self.current[axis] = 0;
        }
    }
}

impl Iterator for IndexIterator {
    type Item = Vec<usize>;

    fn next(&mut self) -> Option<Vec<usize>> {
        self.next_index().ok()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let left = self.size - self.emitted;
        (left, Some(left))
    }
}

impl ExactSizeIterator for IndexIterator {}

/// Yields the storage positions of a layout.
///
/// Dimensions are walked innermost-first by an odometer. For
/// `Order::Storage` they are sorted by ascending stride (ties by ascending
/// size, zero strides outermost) so that positions come out as close to
/// monotonic as the layout allows. Size-1 dimensions are dropped and
/// neighbours that form one contiguous run are merged into a single one;
/// neither changes the emitted sequence.
#[derive(Debug, Clone)]
pub struct StridePointerIterator {
    // innermost first
    dims: Vec<usize>,
    strides: Vec<usize>,
    counter: Vec<usize>,
    ptr: usize,
    start: usize,
    next: usize,
    end: usize,
}

impl StridePointerIterator {
    pub fn new(layout: &StrideLayout, order: Order) -> Self {
        let (dims, strides) = walk_plan(layout, order);
        StridePointerIterator {
            counter: vec![0; dims.len()],
            dims,
            strides,
            ptr: layout.offset(),
            start: 0,
            next: 0,
            end: layout.size(),
        }
    }

    /// Iterator over the sequence positions `start..end` of the full walk.
    pub fn range(layout: &StrideLayout, order: Order, start: usize, end: usize) -> TensorResult<Self> {
        if start > end || end > layout.size() {
            return Err(TensorError::IndexOutOfBounds {
                index: end.max(start),
                axis: 0,
                size: layout.size(),
            });
        }
        let mut it = StridePointerIterator::new(layout, order);
        it.seek(start);
        it.start = start;
        it.end = end;
        Ok(it)
    }

    fn seek(&mut self, mut n: usize) {
        self.next = n;
        if n == 0 {
            return;
        }
        for k in 0..self.dims.len() {
            let digit = n % self.dims[k];
            n /= self.dims[k];
            self.counter[k] = digit;
            self.ptr += digit * self.strides[k];
        }
    }

    pub fn has_next(&self) -> bool {
        self.next < self.end
    }

    /// Number of positions this iterator yields in total.
    pub fn size(&self) -> usize {
        self.end - self.start
    }

    /// Sequence position of the last emitted element within the full walk,
    /// `None` before the first call.
    pub fn position(&self) -> Option<usize> {
        (self.next > self.start).then(|| self.next - 1)
    }

    pub fn next_ptr(&mut self) -> TensorResult<usize> {
        if !self.has_next() {
            return Err(TensorError::IterationExhausted { size: self.size() });
        }
        let ptr = self.ptr;
        self.next += 1;
        if self.has_next() {
            self.advance();
        }
        Ok(ptr)
    }

    fn advance(&mut self) {
        for k in 0..self.dims.len() {
            self.counter[k] += 1;
            self.ptr += self.strides[k];
            if self.counter[k] < self.dims[k] {
                return;
            }
            self.ptr -= self.dims[k] * self.strides[k];
            self.counter[k] = 0;
        }
    }
}

impl Iterator for StridePointerIterator {
    type Item = usize;

    fn next(&mut self) -> Option<usize> {
        self.next_ptr().ok()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let left = self.end - self.next;
        (left, Some(left))
    }
}

impl ExactSizeIterator for StridePointerIterator {}

/// Innermost-first dimensions and strides for walking `layout` in `order`.
fn walk_plan(layout: &StrideLayout, order: Order) -> (Vec<usize>, Vec<usize>) {
    let rank = layout.rank();
    let mut axes: Vec<usize> = match order {
        Order::RowMajor => (0..rank).rev().collect(),
        Order::ColMajor => (0..rank).collect(),
        Order::Storage => (0..rank).collect(),
    };
    let dims = layout.dims();
    let strides = layout.strides();
    if order == Order::Storage {
        axes.sort_by_key(|&a| (strides[a] == 0, strides[a], dims[a]));
    }

    let mut plan_dims: Vec<usize> = Vec::with_capacity(rank);
    let mut plan_strides: Vec<usize> = Vec::with_capacity(rank);
    for a in axes.into_iter().filter(|&a| dims[a] != 1) {
        match (plan_dims.last_mut(), plan_strides.last()) {
            (Some(d), Some(&s)) if strides[a] == s * *d => *d *= dims[a],
            _ => {
                plan_dims.push(dims[a]);
                plan_strides.push(strides[a]);
            }
        }
    }
    (plan_dims, plan_strides)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn shape(dims: &[usize]) -> Shape {
        Shape::of(dims).unwrap()
    }

    #[test]
    fn test_index_iterator_orders() {
        let s = shape(&[2, 3]);
        let c: Vec<Vec<usize>> = IndexIterator::new(&s, Order::RowMajor).unwrap().collect();
        assert_eq!(c[..4], [vec![0, 0], vec![0, 1], vec![0, 2], vec![1, 0]]);
        let f: Vec<Vec<usize>> = IndexIterator::new(&s, Order::ColMajor).unwrap().collect();
        assert_eq!(f[..4], [vec![0, 0], vec![1, 0], vec![0, 1], vec![1, 1]]);
        assert_eq!(c.len(), 6);
        assert_eq!(f.len(), 6);
    }

    #[test]
    fn test_index_iterator_rejects_storage_order() {
        let err = IndexIterator::new(&shape(&[2]), Order::Storage).unwrap_err();
        assert!(matches!(err, TensorError::InvalidOrder { .. }));
    }

    #[test]
    fn test_index_iterator_exhaustion() {
        let mut it = IndexIterator::new(&Shape::scalar(), Order::RowMajor).unwrap();
        assert_eq!(it.len(), 1);
        assert_eq!(it.next_index().unwrap(), Vec::<usize>::new());
        assert!(!it.has_next());
        assert_eq!(it.next_index().unwrap_err(), TensorError::IterationExhausted { size: 1 });

        let mut empty = IndexIterator::new(&shape(&[3, 0]), Order::ColMajor).unwrap();
        assert!(!empty.has_next());
        assert!(empty.next().is_none());
    }

    fn random_view(rng: &mut StdRng) -> StrideLayout {
        let rank = rng.gen_range(0..5);
        let dims: Vec<usize> = (0..rank).map(|_| rng.gen_range(1..5)).collect();
        let base = StrideLayout::of_dense(
            shape(&dims),
            rng.gen_range(0..4),
            if rng.gen_bool(0.5) { Order::RowMajor } else { Order::ColMajor },
        )
        .unwrap();
        let mut perm: Vec<usize> = (0..rank).collect();
        for i in (1..rank).rev() {
            perm.swap(i, rng.gen_range(0..=i));
        }
        let view = base.permute(&perm).unwrap();
        if rank > 0 && view.dims()[0] > 1 {
            view.narrow(0, true, 1, view.dims()[0]).unwrap()
        } else {
            view
        }
    }

    #[test]
    fn test_pointer_matches_index_lookup() {
        let mut rng = StdRng::seed_from_u64(11);
        for _ in 0..100 {
            let layout = random_view(&mut rng);
            for order in [Order::RowMajor, Order::ColMajor] {
                let expected: Vec<usize> = IndexIterator::new(layout.shape(), order)
                    .unwrap()
                    .map(|idx| layout.position(&idx))
                    .collect();
                let got: Vec<usize> = StridePointerIterator::new(&layout, order).collect();
                assert_eq!(got, expected, "layout {} order {}", layout, order);
            }
        }
    }

    #[test]
    fn test_storage_order_visits_each_position_once() {
        let mut rng = StdRng::seed_from_u64(5);
        for _ in 0..50 {
            let layout = random_view(&mut rng);
            let mut expected: Vec<usize> = IndexIterator::new(layout.shape(), Order::RowMajor)
                .unwrap()
                .map(|idx| layout.position(&idx))
                .collect();
            let mut got: Vec<usize> = StridePointerIterator::new(&layout, Order::Storage).collect();
            expected.sort_unstable();
            got.sort_unstable();
            assert_eq!(got, expected);
        }
    }

    #[test]
    fn test_storage_order_is_monotonic_for_transposed() {
        let layout = StrideLayout::of_dense(shape(&[3, 4, 5]), 2, Order::RowMajor)
            .unwrap()
            .revert()
            .unwrap();
        let positions: Vec<usize> = StridePointerIterator::new(&layout, Order::Storage).collect();
        assert_eq!(positions, (2..62).collect::<Vec<_>>());
    }

    #[test]
    fn test_zero_strides_are_walked_outermost() {
        let layout = StrideLayout::of(shape(&[3, 2]), 0, vec![0, 1]).unwrap();
        let positions: Vec<usize> = StridePointerIterator::new(&layout, Order::Storage).collect();
        assert_eq!(positions, vec![0, 1, 0, 1, 0, 1]);
    }

    #[test]
    fn test_contiguous_dims_are_merged() {
        let layout = StrideLayout::of_dense(shape(&[2, 1, 3, 4]), 0, Order::RowMajor).unwrap();
        let it = StridePointerIterator::new(&layout, Order::RowMajor);
        assert_eq!(it.dims, vec![24]);
        assert_eq!(it.strides, vec![1]);
    }

    #[test]
    fn test_position_and_exhaustion() {
        let layout = StrideLayout::of_dense(shape(&[2, 2]), 0, Order::RowMajor).unwrap();
        let mut it = StridePointerIterator::new(&layout, Order::ColMajor);
        assert_eq!(it.position(), None);
        assert_eq!(it.next_ptr().unwrap(), 0);
        assert_eq!(it.position(), Some(0));
        assert_eq!(it.next_ptr().unwrap(), 2);
        assert_eq!(it.next_ptr().unwrap(), 1);
        assert_eq!(it.next_ptr().unwrap(), 3);
        assert_eq!(it.position(), Some(3));
        assert!(!it.has_next());
        assert_eq!(it.next_ptr().unwrap_err(), TensorError::IterationExhausted { size: 4 });
    }

    #[test]
    fn test_scalar_layout_yields_offset_once() {
        let layout = StrideLayout::of(Shape::scalar(), 9, vec![]).unwrap();
        let positions: Vec<usize> = StridePointerIterator::new(&layout, Order::Storage).collect();
        assert_eq!(positions, vec![9]);
    }

    #[test]
    fn test_range_concatenation_equals_full_walk() {
        let layout = StrideLayout::of_dense(shape(&[3, 5, 7]), 1, Order::RowMajor)
            .unwrap()
            .permute(&[2, 0, 1])
            .unwrap();
        for order in [Order::RowMajor, Order::ColMajor, Order::Storage] {
            let full: Vec<usize> = StridePointerIterator::new(&layout, order).collect();
            let mut joined = Vec::new();
            for start in (0..layout.size()).step_by(16) {
                let end = (start + 16).min(layout.size());
                let mut it = StridePointerIterator::range(&layout, order, start, end).unwrap();
                assert_eq!(it.size(), end - start);
                joined.extend(it.by_ref());
                assert_eq!(it.position(), Some(end - 1));
            }
            assert_eq!(joined, full);
        }
        assert!(StridePointerIterator::range(&layout, Order::RowMajor, 10, 200).is_err());
    }
}
