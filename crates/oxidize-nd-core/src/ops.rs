use std::ops;

use crate::broadcast::ElementWise;
use crate::dtype::Element;
use crate::error::{TensorError, TensorResult};
use crate::order::Order;
use crate::parallel::{map_chunked, ParallelConfig};
use crate::shape::Shape;
use crate::tensor::Tensor;

fn checked_div<T: Element>(a: T, b: T) -> TensorResult<T> {
    a.elem_div(b)
        .ok_or_else(|| TensorError::InvalidOperation("integer division by zero".to_string()))
}

// ─── Element-wise Binary Operations (with broadcasting) ─────────────────────

impl<T: Element> Tensor<T> {
    fn zip_with<F>(&self, other: &Tensor<T>, op: F) -> TensorResult<Tensor<T>>
    where
        F: Fn(T, T) -> TensorResult<T>,
    {
        let ew = ElementWise::new(&[self.shape().clone(), other.shape().clone()]).into_result()?;
        let a = ew.transform(self)?.to_vec(Order::RowMajor)?;
        let b = ew.transform(other)?.to_vec(Order::RowMajor)?;
        let data = a
            .into_iter()
            .zip(b)
            .map(|(x, y)| op(x, y))
            .collect::<TensorResult<Vec<T>>>()?;
        let shape = ew.shape().cloned().unwrap_or_else(Shape::scalar);
        Tensor::from_vec(data, shape.dims(), Order::RowMajor)
    }

    pub fn add(&self, other: &Tensor<T>) -> TensorResult<Tensor<T>> {
        self.zip_with(other, |a, b| Ok(a.elem_add(b)))
    }

    pub fn sub(&self, other: &Tensor<T>) -> TensorResult<Tensor<T>> {
        self.zip_with(other, |a, b| Ok(a.elem_sub(b)))
    }

    pub fn mul(&self, other: &Tensor<T>) -> TensorResult<Tensor<T>> {
        self.zip_with(other, |a, b| Ok(a.elem_mul(b)))
    }

    pub fn div(&self, other: &Tensor<T>) -> TensorResult<Tensor<T>> {
        self.zip_with(other, checked_div)
    }

    // ─── In-place ───────────────────────────────────────────────────────────

    /// Combine every element of `self` with the matching element of `other`
    /// broadcast onto `self`'s shape, writing through `self`'s storage.
    ///
    /// All new values are computed before the first write, so a failing `op`
    /// leaves the storage untouched and `other` may alias `self`.
    fn zip_apply_<F>(&self, other: &Tensor<T>, op: F) -> TensorResult<()>
    where
        F: Fn(T, T) -> TensorResult<T>,
    {
        let src = if other.shape() == self.shape() {
            other.clone()
        } else {
            other.broadcast_to(self.dims())?
        };
        let values = src.to_vec(Order::RowMajor)?;
        let positions: Vec<usize> = self.ptr_iter(Order::RowMajor).collect();
        let mut current = vec![T::ZERO; positions.len()];
        self.storage().gather(&positions, &mut current)?;
        let updated = current
            .into_iter()
            .zip(values)
            .map(|(a, b)| op(a, b))
            .collect::<TensorResult<Vec<T>>>()?;
        self.storage().scatter(&positions, &updated)
    }

    fn map_(&self, op: impl Fn(T) -> TensorResult<T>) -> TensorResult<()> {
        let positions: Vec<usize> = self.ptr_iter(Order::Storage).collect();
        let mut current = vec![T::ZERO; positions.len()];
        self.storage().gather(&positions, &mut current)?;
        let updated = current.into_iter().map(op).collect::<TensorResult<Vec<T>>>()?;
        self.storage().scatter(&positions, &updated)
    }

    /// Copy the values of `other` (broadcast onto this shape) into `self`.
    pub fn assign_(&self, other: &Tensor<T>) -> TensorResult<()> {
        self.zip_apply_(other, |_, b| Ok(b))
    }

    pub fn add_(&self, other: &Tensor<T>) -> TensorResult<()> {
        self.zip_apply_(other, |a, b| Ok(a.elem_add(b)))
    }

    pub fn sub_(&self, other: &Tensor<T>) -> TensorResult<()> {
        self.zip_apply_(other, |a, b| Ok(a.elem_sub(b)))
    }

    pub fn mul_(&self, other: &Tensor<T>) -> TensorResult<()> {
        self.zip_apply_(other, |a, b| Ok(a.elem_mul(b)))
    }

    pub fn div_(&self, other: &Tensor<T>) -> TensorResult<()> {
        self.zip_apply_(other, checked_div)
    }

    pub fn fill_(&self, value: T) -> TensorResult<()> {
        let positions: Vec<usize> = self.ptr_iter(Order::Storage).collect();
        self.storage().scatter(&positions, &vec![value; positions.len()])
    }

    // ─── Element-wise Unary Operations ──────────────────────────────────────

    pub fn apply<F: Fn(T) -> T>(&self, f: F) -> TensorResult<Tensor<T>> {
        let data = self.to_vec(Order::RowMajor)?.into_iter().map(f).collect();
        Tensor::from_vec(data, self.dims(), Order::RowMajor)
    }

    pub fn apply_<F: Fn(T) -> T>(&self, f: F) -> TensorResult<()> {
        self.map_(|x| Ok(f(x)))
    }

    // ─── Scalar Operations ──────────────────────────────────────────────────

    pub fn add_scalar(&self, s: T) -> TensorResult<Tensor<T>> { self.apply(|x| x.elem_add(s)) }
    pub fn sub_scalar(&self, s: T) -> TensorResult<Tensor<T>> { self.apply(|x| x.elem_sub(s)) }
    pub fn mul_scalar(&self, s: T) -> TensorResult<Tensor<T>> { self.apply(|x| x.elem_mul(s)) }

    pub fn div_scalar(&self, s: T) -> TensorResult<Tensor<T>> {
        self.div(&Tensor::scalar(s))
    }

    pub fn add_scalar_(&self, s: T) -> TensorResult<()> { self.apply_(|x| x.elem_add(s)) }
    pub fn sub_scalar_(&self, s: T) -> TensorResult<()> { self.apply_(|x| x.elem_sub(s)) }
    pub fn mul_scalar_(&self, s: T) -> TensorResult<()> { self.apply_(|x| x.elem_mul(s)) }

    pub fn div_scalar_(&self, s: T) -> TensorResult<()> {
        self.map_(|x| checked_div(x, s))
    }

    // ─── Dot Product / Matrix Multiply ──────────────────────────────────────

    /// Dot product of two 1-D tensors, accumulated in `f64`.
    pub fn dot(&self, other: &Tensor<T>) -> TensorResult<T> {
        if self.rank() != 1 || other.rank() != 1 {
            return Err(TensorError::InvalidOperation(
                "dot requires two 1D tensors".to_string(),
            ));
        }
        if self.size() != other.size() {
            return Err(TensorError::ShapeMismatch {
                expected: self.shape().to_vec(),
                got: other.shape().to_vec(),
            });
        }
        let a = self.to_vec(Order::RowMajor)?;
        let b = other.to_vec(Order::RowMajor)?;
        Ok(T::from_f64(a.iter().zip(&b).map(|(x, y)| x.to_f64() * y.to_f64()).sum()))
    }

    pub fn matmul(&self, other: &Tensor<T>) -> TensorResult<Tensor<T>> {
        self.matmul_with(other, &ParallelConfig::default())
    }

    /// Matrix product over the last two axes.
    ///
    /// Leading batch axes are broadcast element-wise; each output element is
    /// accumulated in `f64`.
    pub fn matmul_with(&self, other: &Tensor<T>, config: &ParallelConfig) -> TensorResult<Tensor<T>> {
        if self.rank() < 2 || other.rank() < 2 {
            return Err(TensorError::InvalidOperation(
                "matmul requires tensors with at least 2 dimensions".to_string(),
            ));
        }
        let (a_batch, a_mat) = self.dims().split_at(self.rank() - 2);
        let (b_batch, b_mat) = other.dims().split_at(other.rank() - 2);
        let (m, k) = (a_mat[0], a_mat[1]);
        let (k2, n) = (b_mat[0], b_mat[1]);
        if k != k2 {
            return Err(TensorError::DimensionMismatch(format!(
                "matmul: inner dimensions must match, got {} and {}",
                k, k2
            )));
        }

        let batch = ElementWise::new(&[Shape::of(a_batch)?, Shape::of(b_batch)?]).into_result()?;
        let batch_dims = batch.shape().map(Shape::to_vec).unwrap_or_default();
        let batches: usize = batch_dims.iter().product();

        let full = |tail: [usize; 2]| -> Vec<usize> {
            batch_dims.iter().copied().chain(tail).collect()
        };
        let a = self.broadcast_to(&full([m, k]))?.to_vec_with(Order::RowMajor, config)?;
        let b = other.broadcast_to(&full([k, n]))?.to_vec_with(Order::RowMajor, config)?;

        let data = map_chunked(batches * m * n, config, |i| {
            let (bi, r, c) = (i / (m * n), (i / n) % m, i % n);
            let a_row = &a[bi * m * k + r * k..][..k];
            let b_off = bi * k * n + c;
            let acc: f64 = a_row
                .iter()
                .enumerate()
                .map(|(p, x)| x.to_f64() * b[b_off + p * n].to_f64())
                .sum();
            Ok(T::from_f64(acc))
        })?;
        Tensor::from_vec(data, &full([m, n]), Order::RowMajor)
    }

    /// True for a square 2-D tensor equal to its transpose.
    pub fn is_symmetric(&self) -> TensorResult<bool> {
        if self.rank() != 2 {
            return Err(TensorError::DimensionMismatch(format!(
                "is_symmetric requires a 2D tensor, got rank {}",
                self.rank()
            )));
        }
        if self.dims()[0] != self.dims()[1] {
            return Ok(false);
        }
        let n = self.dims()[0];
        let v = self.to_vec(Order::RowMajor)?;
        Ok((0..n).all(|i| (0..i).all(|j| v[i * n + j] == v[j * n + i])))
    }
}

// ─── Joining ────────────────────────────────────────────────────────────────

fn first_of<'a, T: Element>(tensors: &'a [Tensor<T>], what: &str) -> TensorResult<&'a Tensor<T>> {
    tensors
        .first()
        .ok_or_else(|| TensorError::InvalidOperation(format!("{} needs at least one tensor", what)))
}

impl<T: Element> Tensor<T> {
    /// Join tensors end to end along an existing `axis`. All other
    /// dimensions must agree; the result is a new row-major tensor.
    pub fn concat(axis: usize, tensors: &[Tensor<T>]) -> TensorResult<Tensor<T>> {
        let first = first_of(tensors, "concat")?;
        let rank = first.rank();
        if axis >= rank {
            return Err(TensorError::InvalidAxis { axis, ndim: rank });
        }
        let mut dims = first.dims().to_vec();
        dims[axis] = 0;
        for t in tensors {
            let agrees = t.rank() == rank
                && t.dims().iter().zip(first.dims()).enumerate().all(|(k, (a, b))| k == axis || a == b);
            if !agrees {
                return Err(TensorError::ShapeMismatch {
                    expected: first.dims().to_vec(),
                    got: t.dims().to_vec(),
                });
            }
            dims[axis] += t.dims()[axis];
        }

        let out = Tensor::zeros(&dims)?;
        let mut start = 0;
        for t in tensors {
            let end = start + t.dims()[axis];
            out.narrow(axis, true, start, end)?.assign_(t)?;
            start = end;
        }
        Ok(out)
    }

    /// Join same-shaped tensors along a new `axis` (`0..=rank`).
    pub fn stack(axis: usize, tensors: &[Tensor<T>]) -> TensorResult<Tensor<T>> {
        let first = first_of(tensors, "stack")?;
        if axis > first.rank() {
            return Err(TensorError::InvalidAxis {
                axis,
                ndim: first.rank() + 1,
            });
        }
        if let Some(t) = tensors.iter().find(|t| t.dims() != first.dims()) {
            return Err(TensorError::ShapeMismatch {
                expected: first.dims().to_vec(),
                got: t.dims().to_vec(),
            });
        }
        let mut dims = first.dims().to_vec();
        dims.insert(axis, tensors.len());
        let out = Tensor::zeros(&dims)?;
        for (k, t) in tensors.iter().enumerate() {
            out.select(axis, k)?.assign_(t)?;
        }
        Ok(out)
    }
}

// ─── Operator Overloads ─────────────────────────────────────────────────────

impl<T: Element> ops::Add for &Tensor<T> {
    type Output = TensorResult<Tensor<T>>;
    fn add(self, rhs: Self) -> TensorResult<Tensor<T>> {
        Tensor::add(self, rhs)
    }
}

impl<T: Element> ops::Sub for &Tensor<T> {
    type Output = TensorResult<Tensor<T>>;
    fn sub(self, rhs: Self) -> TensorResult<Tensor<T>> {
        Tensor::sub(self, rhs)
    }
}

impl<T: Element> ops::Mul for &Tensor<T> {
    type Output = TensorResult<Tensor<T>>;
    fn mul(self, rhs: Self) -> TensorResult<Tensor<T>> {
        Tensor::mul(self, rhs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn t(data: Vec<f64>, dims: &[usize]) -> Tensor<f64> {
        Tensor::from_vec(data, dims, Order::RowMajor).unwrap()
    }

    fn values<T: Element>(t: &Tensor<T>) -> Vec<T> {
        t.to_vec(Order::RowMajor).unwrap()
    }

    #[test]
    fn test_arithmetic() {
        let a = t(vec![1.0, 2.0, 3.0, 4.0], &[2, 2]);
        let b = t(vec![5.0, 6.0, 7.0, 8.0], &[2, 2]);
        assert_eq!(values(&a.add(&b).unwrap()), vec![6.0, 8.0, 10.0, 12.0]);
        assert_eq!(values(&(&b - &a).unwrap()), vec![4.0; 4]);
        assert_eq!(values(&(&a * &b).unwrap()), vec![5.0, 12.0, 21.0, 32.0]);
        assert_eq!(values(&b.div(&a).unwrap())[1], 3.0);
    }

    #[test]
    fn test_broadcasting() {
        let a = t(vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0], &[2, 3]);
        let b = t(vec![10.0, 20.0, 30.0], &[1, 3]);
        let c = a.add(&b).unwrap();
        assert_eq!(c.dims(), &[2, 3]);
        assert_eq!(values(&c), vec![11.0, 22.0, 33.0, 14.0, 25.0, 36.0]);

        let col = t(vec![1.0, 2.0], &[2, 1]);
        let row = t(vec![10.0, 20.0, 30.0], &[3]);
        assert_eq!(values(&col.mul(&row).unwrap()), vec![10.0, 20.0, 30.0, 20.0, 40.0, 60.0]);

        let err = a.add(&t(vec![1.0, 2.0], &[2])).unwrap_err();
        assert_eq!(err, TensorError::BroadcastError { shapes: vec![vec![2, 3], vec![2]] });
    }

    #[test]
    fn test_operands_may_be_views() {
        let a: Tensor<i32> = Tensor::seq(&[2, 3], Order::RowMajor).unwrap();
        let sum = a.add(&a.transpose().unwrap().t().unwrap()).unwrap();
        assert_eq!(values(&sum), vec![0, 2, 4, 6, 8, 10]);
    }

    #[test]
    fn test_integer_division_by_zero_is_an_error() {
        let a = Tensor::from_vec(vec![4i32, 6], &[2], Order::RowMajor).unwrap();
        let b = Tensor::from_vec(vec![2i32, 0], &[2], Order::RowMajor).unwrap();
        assert!(matches!(a.div(&b), Err(TensorError::InvalidOperation(_))));
        assert!(a.div_(&b).is_err());
        assert_eq!(values(&a), vec![4, 6]);
        let f = t(vec![1.0], &[1]).div_scalar(0.0).unwrap();
        assert!(values(&f)[0].is_infinite());
    }

    #[test]
    fn test_in_place_ops_write_through_views() {
        let base: Tensor<f64> = Tensor::zeros(&[3, 4]).unwrap();
        let col = base.narrow(1, true, 1, 2).unwrap();
        col.add_(&t(vec![1.0, 2.0, 3.0], &[3, 1])).unwrap();
        col.mul_scalar_(10.0).unwrap();
        assert_eq!(base.get(&[2, 1]).unwrap(), 30.0);
        assert_eq!(base.get(&[2, 2]).unwrap(), 0.0);

        let row = base.select(0, 0).unwrap();
        row.fill_(7.0).unwrap();
        row.sub_(&Tensor::scalar(1.0)).unwrap();
        assert_eq!(values(&row), vec![6.0; 4]);
        assert!(row.add_(&t(vec![1.0, 2.0], &[2])).is_err());
    }

    #[test]
    fn test_assign_with_aliasing_source() {
        let a: Tensor<f64> = Tensor::seq(&[3, 3], Order::RowMajor).unwrap();
        a.assign_(&a.transpose().unwrap()).unwrap();
        assert_eq!(values(&a), vec![0.0, 3.0, 6.0, 1.0, 4.0, 7.0, 2.0, 5.0, 8.0]);
    }

    #[test]
    fn test_apply_and_scalars() {
        let a = t(vec![1.0, -2.0], &[2]);
        assert_eq!(values(&a.apply(|x| x * x).unwrap()), vec![1.0, 4.0]);
        assert_eq!(values(&a.add_scalar(1.0).unwrap()), vec![2.0, -1.0]);
        a.apply_(|x| -x).unwrap();
        assert_eq!(values(&a), vec![-1.0, 2.0]);
        let i = Tensor::from_vec(vec![i8::MAX, 1], &[2], Order::RowMajor).unwrap();
        assert_eq!(values(&i.add_scalar(1).unwrap()), vec![i8::MIN, 2]);
    }

    #[test]
    fn test_dot() {
        let a = t(vec![1.0, 2.0, 3.0], &[3]);
        let b = t(vec![4.0, 5.0, 6.0], &[3]);
        assert_eq!(a.dot(&b).unwrap(), 32.0);
        assert!(a.dot(&t(vec![1.0], &[1])).is_err());
    }

    #[test]
    fn test_matmul() {
        let a = t(vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0], &[2, 3]);
        let b = t(vec![7.0, 8.0, 9.0, 10.0, 11.0, 12.0], &[3, 2]);
        let c = a.matmul(&b).unwrap();
        assert_eq!(c.dims(), &[2, 2]);
        assert_eq!(values(&c), vec![58.0, 64.0, 139.0, 154.0]);
        let ct = b.t().unwrap().matmul(&a.t().unwrap()).unwrap();
        assert!(ct.deep_equals(&c.t().unwrap()));
        assert!(matches!(a.matmul(&a), Err(TensorError::DimensionMismatch(_))));
    }

    #[test]
    fn test_batched_matmul_broadcasts_batches() {
        let a: Tensor<f64> = Tensor::seq(&[2, 1, 2, 3], Order::RowMajor).unwrap();
        let b: Tensor<f64> = Tensor::seq(&[4, 3, 2], Order::RowMajor).unwrap();
        let c = a.matmul(&b).unwrap();
        assert_eq!(c.dims(), &[2, 4, 2, 2]);
        for i in 0..2 {
            for j in 0..4 {
                let lhs = a.select(0, i).unwrap().select(0, 0).unwrap();
                let rhs = b.select(0, j).unwrap();
                let expected = lhs.matmul(&rhs).unwrap();
                let got = c.select(0, i).unwrap().select(0, j).unwrap();
                assert!(got.deep_equals(&expected));
            }
        }
        let bad: Tensor<f64> = Tensor::zeros(&[3, 4, 3, 2]).unwrap();
        assert!(matches!(a.matmul(&bad), Err(TensorError::BroadcastError { .. })));
    }

    #[test]
    fn test_parallel_matmul_matches_sequential() {
        let a: Tensor<f64> = Tensor::random(&[40, 30], 1, Order::RowMajor).unwrap();
        let b: Tensor<f64> = Tensor::random(&[30, 50], 2, Order::ColMajor).unwrap();
        let config = ParallelConfig::default().with_chunk_size(64).with_min_parallel_len(0);
        let par = a.matmul_with(&b, &config).unwrap();
        let seq = a.matmul_with(&b, &ParallelConfig::sequential()).unwrap();
        assert!(par.deep_equals(&seq));
    }

    #[test]
    fn test_concat_along_each_axis() {
        let a: Tensor<i32> = Tensor::seq(&[2, 3], Order::RowMajor).unwrap();
        let b = Tensor::full(&[1, 3], 9).unwrap();
        let rows = Tensor::concat(0, &[a.clone(), b]).unwrap();
        assert_eq!(rows.dims(), &[3, 3]);
        assert_eq!(values(&rows), vec![0, 1, 2, 3, 4, 5, 9, 9, 9]);

        let c = Tensor::full(&[2, 2], -1).unwrap();
        let cols = Tensor::concat(1, &[c, a.t().unwrap().t().unwrap()]).unwrap();
        assert_eq!(values(&cols), vec![-1, -1, 0, 1, 2, -1, -1, 3, 4, 5]);
        assert!(!cols.shares_storage(&a));
    }

    #[test]
    fn test_concat_of_strided_views() {
        let base: Tensor<f64> = Tensor::seq(&[4, 4], Order::ColMajor).unwrap();
        let parts = base.chunk(0, true, 3).unwrap();
        let joined = Tensor::concat(0, &parts).unwrap();
        assert_eq!(values(&joined), values(&base));
        let empty = Tensor::<f64>::zeros(&[0, 4]).unwrap();
        assert_eq!(Tensor::concat(0, &[empty, base.clone()]).unwrap(), base);
    }

    #[test]
    fn test_concat_rejects_bad_inputs() {
        let a = t(vec![1.0, 2.0], &[1, 2]);
        let b = t(vec![1.0, 2.0, 3.0], &[1, 3]);
        assert!(matches!(Tensor::concat(0, &[a.clone(), b.clone()]), Err(TensorError::ShapeMismatch { .. })));
        assert_eq!(Tensor::concat(1, &[a.clone(), b]).unwrap().dims(), &[1, 5]);
        assert!(matches!(Tensor::concat(2, &[a.clone()]), Err(TensorError::InvalidAxis { axis: 2, ndim: 2 })));
        assert!(Tensor::<f64>::concat(0, &[]).is_err());
        let flat = t(vec![1.0, 2.0], &[2]);
        assert!(Tensor::concat(0, &[a, flat]).is_err());
    }

    #[test]
    fn test_stack_inserts_axis() {
        let a = t(vec![1.0, 2.0, 3.0], &[3]);
        let b = t(vec![4.0, 5.0, 6.0], &[3]);
        let s0 = Tensor::stack(0, &[a.clone(), b.clone()]).unwrap();
        assert_eq!(s0.dims(), &[2, 3]);
        assert_eq!(values(&s0), vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
        let s1 = Tensor::stack(1, &[a.clone(), b.clone()]).unwrap();
        assert_eq!(s1.dims(), &[3, 2]);
        assert_eq!(values(&s1), vec![1.0, 4.0, 2.0, 5.0, 3.0, 6.0]);
        assert!(matches!(Tensor::stack(2, &[a.clone()]), Err(TensorError::InvalidAxis { axis: 2, ndim: 2 })));
        let short = t(vec![1.0, 2.0], &[2]);
        assert!(matches!(Tensor::stack(0, &[a, short]), Err(TensorError::ShapeMismatch { .. })));
        let scalars = Tensor::stack(0, &[Tensor::scalar(7.0), Tensor::scalar(8.0)]).unwrap();
        assert_eq!(values(&scalars), vec![7.0, 8.0]);
    }

    #[test]
    fn test_is_symmetric() {
        let x = t(vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0], &[3, 2]);
        let gram = x.t().unwrap().matmul(&x).unwrap();
        assert!(gram.is_symmetric().unwrap());
        assert!(!x.is_symmetric().unwrap());
        assert!(!t(vec![1.0, 2.0, 3.0, 4.0], &[2, 2]).is_symmetric().unwrap());
        assert!(t(vec![1.0], &[1]).is_symmetric().is_err());
    }
}
