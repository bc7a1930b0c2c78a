//! Global and per-axis reductions.
//!
//! Every accumulator is an `f64`, converted back to the element kind at the
//! end (integral results saturate). `min`/`max` propagate NaN; the `nan_*`
//! variants skip NaN values.

use crate::dtype::{Element, Float};
use crate::error::{TensorError, TensorResult};
use crate::iterator::StridePointerIterator;
use crate::layout::StrideLayout;
use crate::order::Order;
use crate::parallel::{map_chunked, ParallelConfig};
use crate::shape::Shape;
use crate::tensor::Tensor;

fn sum_of<T: Element>(v: &[T]) -> f64 {
    v.iter().map(|x| x.to_f64()).sum()
}

fn sum_kernel<T: Element>(v: &[T]) -> TensorResult<T> {
    Ok(T::from_f64(sum_of(v)))
}

fn prod_kernel<T: Element>(v: &[T]) -> TensorResult<T> {
    Ok(T::from_f64(v.iter().map(|x| x.to_f64()).product()))
}

fn mean_of<T: Element>(v: &[T]) -> TensorResult<f64> {
    if v.is_empty() {
        return Err(TensorError::EmptyTensor);
    }
    Ok(sum_of(v) / v.len() as f64)
}

fn mean_kernel<T: Element>(v: &[T]) -> TensorResult<T> {
    mean_of(v).map(T::from_f64)
}

fn var_kernel<T: Element>(v: &[T], ddof: usize) -> TensorResult<T> {
    let mean = mean_of(v)?;
    if ddof >= v.len() {
        return Err(TensorError::InvalidOperation(format!(
            "ddof {} must be smaller than the sample size {}",
            ddof,
            v.len()
        )));
    }
    let ss: f64 = v.iter().map(|x| (x.to_f64() - mean).powi(2)).sum();
    Ok(T::from_f64(ss / (v.len() - ddof) as f64))
}

/// Position of the first value `x` for which `better(x, best)` holds over all
/// others; the first NaN wins outright.
fn arg_extreme<T: Element>(v: &[T], better: impl Fn(T, T) -> bool) -> TensorResult<usize> {
    let mut best_value = *v.first().ok_or(TensorError::EmptyTensor)?;
    if best_value.is_nan() {
        return Ok(0);
    }
    let mut best = 0;
    for (i, &x) in v.iter().enumerate().skip(1) {
        if x.is_nan() {
            return Ok(i);
        }
        if better(x, best_value) {
            best = i;
            best_value = x;
        }
    }
    Ok(best)
}

fn extreme<T: Element>(v: &[T], better: impl Fn(T, T) -> bool) -> TensorResult<T> {
    arg_extreme(v, better).map(|i| v[i])
}

fn min_kernel<T: Element>(v: &[T]) -> TensorResult<T> {
    extreme(v, |x, best| x < best)
}

fn max_kernel<T: Element>(v: &[T]) -> TensorResult<T> {
    extreme(v, |x, best| x > best)
}

fn lane_index(i: usize) -> TensorResult<i32> {
    i32::try_from(i)
        .map_err(|_| TensorError::InvalidOperation(format!("lane index {} does not fit in i32", i)))
}

fn argmin_kernel<T: Element>(v: &[T]) -> TensorResult<i32> {
    arg_extreme(v, |x, best| x < best).and_then(lane_index)
}

fn argmax_kernel<T: Element>(v: &[T]) -> TensorResult<i32> {
    arg_extreme(v, |x, best| x > best).and_then(lane_index)
}

fn without_nan<T: Element>(v: Vec<T>) -> Vec<T> {
    v.into_iter().filter(|x| !x.is_nan()).collect()
}

/// Chunking tuned so that one lane counts as `lane_len` elements of work.
fn lane_config(lane_len: usize) -> ParallelConfig {
    let base = ParallelConfig::default();
    let lane_len = lane_len.max(1);
    let chunk_size = (base.chunk_size / lane_len).max(1);
    let min_parallel_len = base.min_parallel_len / lane_len;
    base.with_chunk_size(chunk_size).with_min_parallel_len(min_parallel_len)
}

impl<T: Element> Tensor<T> {
    fn reduce_all(&self, kernel: impl Fn(&[T]) -> TensorResult<T>) -> TensorResult<T> {
        kernel(&self.to_vec(Order::Storage)?)
    }

    /// Apply `kernel` to every lane along `axis`; the result drops that axis
    /// and is dense row-major.
    fn reduce_axis<U, F>(&self, axis: usize, kernel: F) -> TensorResult<Tensor<U>>
    where
        U: Element,
        F: Fn(&[T]) -> TensorResult<U> + Sync + Send,
    {
        let lane_len = self.dim(axis)?;
        let lane_stride = self.layout().strides()[axis];
        let mut strides = self.layout().strides().to_vec();
        strides.remove(axis);
        let outer = StrideLayout::of(
            Shape::new(self.shape().narrow_dims(axis)?)?,
            self.layout().offset(),
            strides,
        )?;
        let starts: Vec<usize> = StridePointerIterator::new(&outer, Order::RowMajor).collect();
        let storage = self.storage().as_ref();
        let values = map_chunked(starts.len(), &lane_config(lane_len), |i| {
            let positions: Vec<usize> = (0..lane_len).map(|k| starts[i] + k * lane_stride).collect();
            let mut lane = vec![T::ZERO; lane_len];
            storage.gather(&positions, &mut lane)?;
            kernel(&lane)
        })?;
        Tensor::from_vec(values, outer.dims(), Order::RowMajor)
    }

    // ─── Global ─────────────────────────────────────────────────────────────

    pub fn sum(&self) -> TensorResult<T> {
        self.reduce_all(sum_kernel)
    }

    pub fn prod(&self) -> TensorResult<T> {
        self.reduce_all(prod_kernel)
    }

    pub fn mean(&self) -> TensorResult<T> {
        self.reduce_all(mean_kernel)
    }

    /// Variance with `n - ddof` in the denominator.
    pub fn var(&self, ddof: usize) -> TensorResult<T> {
        self.reduce_all(|v| var_kernel(v, ddof))
    }

    pub fn min(&self) -> TensorResult<T> {
        self.reduce_all(min_kernel)
    }

    pub fn max(&self) -> TensorResult<T> {
        self.reduce_all(max_kernel)
    }

    pub fn nan_sum(&self) -> TensorResult<T> {
        sum_kernel(&without_nan(self.to_vec(Order::Storage)?))
    }

    pub fn nan_mean(&self) -> TensorResult<T> {
        mean_kernel(&without_nan(self.to_vec(Order::Storage)?))
    }

    pub fn nan_min(&self) -> TensorResult<T> {
        min_kernel(&without_nan(self.to_vec(Order::Storage)?))
    }

    pub fn nan_max(&self) -> TensorResult<T> {
        max_kernel(&without_nan(self.to_vec(Order::Storage)?))
    }

    pub fn nan_count(&self) -> TensorResult<usize> {
        Ok(self.to_vec(Order::Storage)?.into_iter().filter(|x| x.is_nan()).count())
    }

    /// Row-major flat index of the first smallest element.
    pub fn argmin(&self) -> TensorResult<usize> {
        arg_extreme(&self.to_vec(Order::RowMajor)?, |x, best| x < best)
    }

    /// Row-major flat index of the first largest element. A NaN counts as
    /// the largest and the smallest value.
    pub fn argmax(&self) -> TensorResult<usize> {
        arg_extreme(&self.to_vec(Order::RowMajor)?, |x, best| x > best)
    }

    /// Sum of the main diagonal of a square matrix.
    pub fn trace(&self) -> TensorResult<T> {
        let diagonal = self.diagonal()?;
        let (rows, cols) = (self.dims()[0], self.dims()[1]);
        if rows != cols {
            return Err(TensorError::NotSquare { rows, cols });
        }
        diagonal.sum()
    }

    // ─── Along an axis ──────────────────────────────────────────────────────

    pub fn sum_axis(&self, axis: usize) -> TensorResult<Tensor<T>> {
        self.reduce_axis(axis, sum_kernel)
    }

    pub fn prod_axis(&self, axis: usize) -> TensorResult<Tensor<T>> {
        self.reduce_axis(axis, prod_kernel)
    }

    pub fn mean_axis(&self, axis: usize) -> TensorResult<Tensor<T>> {
        self.reduce_axis(axis, mean_kernel)
    }

    pub fn var_axis(&self, axis: usize, ddof: usize) -> TensorResult<Tensor<T>> {
        self.reduce_axis(axis, move |v| var_kernel(v, ddof))
    }

    pub fn min_axis(&self, axis: usize) -> TensorResult<Tensor<T>> {
        self.reduce_axis(axis, min_kernel)
    }

    pub fn max_axis(&self, axis: usize) -> TensorResult<Tensor<T>> {
        self.reduce_axis(axis, max_kernel)
    }

    /// Index within each lane of its first smallest element.
    pub fn argmin_axis(&self, axis: usize) -> TensorResult<Tensor<i32>> {
        self.reduce_axis(axis, argmin_kernel)
    }

    pub fn argmax_axis(&self, axis: usize) -> TensorResult<Tensor<i32>> {
        self.reduce_axis(axis, argmax_kernel)
    }
}

impl<T: Float> Tensor<T> {
    /// Entry-wise `p`-norm over all elements.
    ///
    /// `p = 0` counts the non-zero entries and `p = inf` gives the largest
    /// magnitude. A negative or NaN `p` is rejected.
    pub fn norm(&self, p: f64) -> TensorResult<T> {
        if p.is_nan() || p < 0.0 {
            return Err(TensorError::InvalidOperation(format!(
                "norm power must be non-negative, got {}",
                p
            )));
        }
        let values = self.to_vec(Order::Storage)?;
        let abs = values.iter().map(|x| x.to_f64().abs());
        let norm = if p == 0.0 {
            abs.filter(|&a| a != 0.0).count() as f64
        } else if p == 1.0 {
            abs.sum()
        } else if p == 2.0 {
            abs.map(|a| a * a).sum::<f64>().sqrt()
        } else if p.is_infinite() {
            abs.fold(0.0, |m: f64, a| if m.is_nan() || a <= m { m } else { a })
        } else {
            abs.map(|a| a.powf(p)).sum::<f64>().powf(p.recip())
        };
        Ok(T::from_f64(norm))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn values<T: Element>(t: &Tensor<T>) -> Vec<T> {
        t.to_vec(Order::RowMajor).unwrap()
    }

    #[test]
    fn test_global_reductions() {
        let a = Tensor::from_vec(vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0], &[2, 3], Order::RowMajor).unwrap();
        assert_eq!(a.sum().unwrap(), 21.0);
        assert_eq!(a.prod().unwrap(), 720.0);
        assert_eq!(a.mean().unwrap(), 3.5);
        assert_relative_eq!(a.var(0).unwrap(), 35.0 / 12.0, epsilon = 1e-12);
        assert_relative_eq!(a.var(1).unwrap(), 3.5, epsilon = 1e-12);
        assert_eq!(a.min().unwrap(), 1.0);
        assert_eq!(a.max().unwrap(), 6.0);
        assert!(a.var(6).is_err());
    }

    #[test]
    fn test_reductions_over_views() {
        let a: Tensor<i32> = Tensor::seq(&[4, 5], Order::RowMajor).unwrap();
        let v = a.narrow(1, true, 1, 3).unwrap().transpose().unwrap();
        assert_eq!(v.sum().unwrap(), 1 + 2 + 6 + 7 + 11 + 12 + 16 + 17);
        assert_eq!(v.max().unwrap(), 17);
    }

    #[test]
    fn test_empty_reductions() {
        let e: Tensor<f64> = Tensor::zeros(&[0, 3]).unwrap();
        assert_eq!(e.sum().unwrap(), 0.0);
        assert_eq!(e.prod().unwrap(), 1.0);
        assert_eq!(e.mean().unwrap_err(), TensorError::EmptyTensor);
        assert_eq!(e.max().unwrap_err(), TensorError::EmptyTensor);
    }

    #[test]
    fn test_narrow_accumulator_is_widened() {
        let n = 1 << 20;
        let ones: Tensor<f32> = Tensor::full(&[n], 0.1).unwrap();
        let expected = n as f64 * 0.1f32 as f64;
        assert_relative_eq!(ones.sum().unwrap() as f64, expected, max_relative = 1e-6);
        let bytes: Tensor<i8> = Tensor::full(&[100], 100).unwrap();
        assert_eq!(bytes.sum().unwrap(), i8::MAX);
        assert_eq!(bytes.mean().unwrap(), 100);
    }

    #[test]
    fn test_nan_aware_reductions() {
        let a = Tensor::from_vec(vec![1.0, f64::NAN, 3.0, f64::NAN], &[4], Order::RowMajor).unwrap();
        assert!(a.sum().unwrap().is_nan());
        assert!(a.max().unwrap().is_nan());
        assert!(a.min().unwrap().is_nan());
        assert_eq!(a.nan_sum().unwrap(), 4.0);
        assert_eq!(a.nan_mean().unwrap(), 2.0);
        assert_eq!(a.nan_min().unwrap(), 1.0);
        assert_eq!(a.nan_max().unwrap(), 3.0);
        assert_eq!(a.nan_count().unwrap(), 2);
        let all_nan = Tensor::from_vec(vec![f64::NAN], &[1], Order::RowMajor).unwrap();
        assert_eq!(all_nan.nan_mean().unwrap_err(), TensorError::EmptyTensor);
    }

    #[test]
    fn test_argmin_argmax() {
        let a = Tensor::from_vec(vec![3.0, 7.0, 1.0, 8.0, 1.0, 5.0], &[2, 3], Order::RowMajor).unwrap();
        assert_eq!(a.argmax().unwrap(), 3);
        assert_eq!(a.argmin().unwrap(), 2);
        // flat index follows row-major order over a transposed view
        let t = a.t().unwrap();
        assert_eq!(t.argmax().unwrap(), 1);
        assert_eq!(t.argmin().unwrap(), 3);
        let n = Tensor::from_vec(vec![1.0, f64::NAN, 9.0], &[3], Order::RowMajor).unwrap();
        assert_eq!(n.argmax().unwrap(), 1);
        assert_eq!(n.argmin().unwrap(), 1);
        let e: Tensor<i32> = Tensor::zeros(&[0]).unwrap();
        assert_eq!(e.argmax().unwrap_err(), TensorError::EmptyTensor);
    }

    #[test]
    fn test_argmin_argmax_axis() {
        let a: Tensor<i8> =
            Tensor::from_vec(vec![4, 0, 9, 2, 8, 1, 9, 1], &[2, 4], Order::RowMajor).unwrap();
        let rows = a.argmax_axis(1).unwrap();
        assert_eq!(rows.dims(), &[2]);
        assert_eq!(values(&rows), vec![2, 2]);
        assert_eq!(values(&a.argmin_axis(1).unwrap()), vec![1, 1]);
        assert_eq!(values(&a.argmax_axis(0).unwrap()), vec![1, 1, 0, 0]);
        assert_eq!(values(&a.argmin_axis(0).unwrap()), vec![0, 0, 0, 1]);
        assert!(matches!(a.argmax_axis(2), Err(TensorError::InvalidAxis { .. })));
        let b: Tensor<f64> = Tensor::random(&[30, 7], 5, Order::ColMajor).unwrap();
        let idx = b.argmin_axis(0).unwrap();
        for j in 0..7 {
            let col = b.select(1, j).unwrap();
            assert_eq!(idx.get(&[j]).unwrap() as usize, col.argmin().unwrap());
        }
    }

    #[test]
    fn test_trace() {
        let a: Tensor<i32> = Tensor::seq(&[3, 3], Order::ColMajor).unwrap();
        assert_eq!(a.trace().unwrap(), 12);
        assert_eq!(a.t().unwrap().trace().unwrap(), 12);
        let inner = a.narrow_all(&[1, 1], &[3, 3]).unwrap();
        assert_eq!(inner.trace().unwrap(), 12);
        let rect: Tensor<f64> = Tensor::zeros(&[2, 3]).unwrap();
        assert!(matches!(rect.trace(), Err(TensorError::NotSquare { rows: 2, cols: 3 })));
        let flat: Tensor<f64> = Tensor::zeros(&[4]).unwrap();
        assert!(matches!(flat.trace(), Err(TensorError::DimensionMismatch(_))));
        assert_eq!(Tensor::<f64>::zeros(&[0, 0]).unwrap().trace().unwrap(), 0.0);
    }

    #[test]
    fn test_norm() {
        let a = Tensor::from_vec(vec![3.0, -4.0, 0.0, 0.0], &[2, 2], Order::RowMajor).unwrap();
        assert_relative_eq!(a.norm(2.0).unwrap(), 5.0, epsilon = 1e-12);
        assert_relative_eq!(a.norm(1.0).unwrap(), 7.0, epsilon = 1e-12);
        assert_eq!(a.norm(0.0).unwrap(), 2.0);
        assert_eq!(a.norm(f64::INFINITY).unwrap(), 4.0);
        assert_relative_eq!(a.norm(3.0).unwrap(), 91f64.powf(1.0 / 3.0), epsilon = 1e-12);
        assert_relative_eq!(a.t().unwrap().norm(2.0).unwrap(), 5.0, epsilon = 1e-12);
        assert!(a.norm(-1.0).is_err());
        assert!(a.norm(f64::NAN).is_err());
        let n = Tensor::from_vec(vec![1.0f32, f32::NAN], &[2], Order::RowMajor).unwrap();
        assert!(n.norm(f64::INFINITY).unwrap().is_nan());
        assert_eq!(Tensor::<f64>::zeros(&[0]).unwrap().norm(2.0).unwrap(), 0.0);
    }

    #[test]
    fn test_sum_axis() {
        let a = Tensor::from_vec(vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0], &[2, 3], Order::RowMajor).unwrap();
        let s0 = a.sum_axis(0).unwrap();
        assert_eq!(s0.dims(), &[3]);
        assert_eq!(values(&s0), vec![5.0, 7.0, 9.0]);
        let s1 = a.sum_axis(1).unwrap();
        assert_eq!(values(&s1), vec![6.0, 15.0]);
        assert!(matches!(a.sum_axis(2), Err(TensorError::InvalidAxis { axis: 2, ndim: 2 })));
        let total = s1.sum_axis(0).unwrap();
        assert!(total.is_scalar());
        assert_eq!(total.item().unwrap(), 21.0);
    }

    #[test]
    fn test_axis_reductions_on_transposed_view() {
        let a: Tensor<f64> = Tensor::seq(&[2, 3, 4], Order::RowMajor).unwrap();
        let p = a.permute(&[2, 0, 1]).unwrap();
        let m = p.max_axis(2).unwrap();
        assert_eq!(m.dims(), &[4, 2]);
        for k in 0..4 {
            for i in 0..2 {
                assert_eq!(m.get(&[k, i]).unwrap(), a.get(&[i, 2, k]).unwrap());
            }
        }
        let mn = p.min_axis(1).unwrap();
        assert_eq!(values(&mn), values(&a.select(0, 0).unwrap().transpose().unwrap()));
        let mean = p.mean_axis(0).unwrap();
        assert_eq!(mean.get(&[1, 2]).unwrap(), 21.5);
        let var = a.var_axis(2, 0).unwrap();
        assert!(values(&var).iter().all(|&v| (v - 1.25).abs() < 1e-12));
        assert_eq!(a.prod_axis(0).unwrap().get(&[0, 1]).unwrap(), 1.0 * 13.0);
    }

    #[test]
    fn test_axis_reductions_in_parallel_lanes() {
        let a: Tensor<f64> = Tensor::random(&[5000, 40], 9, Order::ColMajor).unwrap();
        let s = a.sum_axis(1).unwrap();
        for i in [0, 1234, 4999] {
            let row = a.select(0, i).unwrap();
            assert_relative_eq!(s.get(&[i]).unwrap(), row.sum().unwrap(), max_relative = 1e-12);
        }
    }

    #[test]
    fn test_empty_lanes() {
        let a: Tensor<f64> = Tensor::zeros(&[3, 0]).unwrap();
        assert_eq!(values(&a.sum_axis(1).unwrap()), vec![0.0; 3]);
        assert!(a.mean_axis(1).is_err());
        assert_eq!(a.sum_axis(0).unwrap().dims(), &[0]);
    }
}
