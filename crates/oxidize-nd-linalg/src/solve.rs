use oxidize_nd_core::{Float, Order, Tensor, TensorError, TensorResult};

use crate::decomposition::{lu, CholeskyDecomposition, LuDecomposition};
use crate::matrix::{rhs, Square};

/// Solve the linear system Ax = b using LU decomposition.
///
/// `b` is a vector of length n or an `n x k` matrix; the solution has the
/// same shape.
pub fn solve<T: Float>(a: &Tensor<T>, b: &Tensor<T>) -> TensorResult<Tensor<T>> {
    lu(a)?.solve(b)
}

fn solution<T: Float>(x: Vec<f64>, b: &Tensor<T>) -> TensorResult<Tensor<T>> {
    let data = x.into_iter().map(T::from_f64).collect();
    Tensor::from_vec(data, b.dims(), Order::RowMajor)
}

impl<T: Float> LuDecomposition<T> {
    pub fn solve(&self, b: &Tensor<T>) -> TensorResult<Tensor<T>> {
        let l = Square::from_tensor(&self.l, "lu solve")?;
        let u = Square::from_tensor(&self.u, "lu solve")?;
        let n = l.n();
        let (b_data, ncols) = rhs(b, n)?;
        let mut result = vec![0.0; n * ncols];

        for col in 0..ncols {
            // Forward substitution: L * y = P * b
            let mut y = vec![0.0; n];
            for i in 0..n {
                let sum: f64 = (0..i).map(|j| l[(i, j)] * y[j]).sum();
                y[i] = b_data[self.pivot[i] * ncols + col] - sum;
            }

            // Back substitution: U * x = y
            for i in (0..n).rev() {
                let sum: f64 = ((i + 1)..n).map(|j| u[(i, j)] * result[j * ncols + col]).sum();
                let diag = u[(i, i)];
                if diag == 0.0 {
                    return Err(TensorError::SingularMatrix);
                }
                result[i * ncols + col] = (y[i] - sum) / diag;
            }
        }

        solution(result, b)
    }
}

impl<T: Float> CholeskyDecomposition<T> {
    pub fn solve(&self, b: &Tensor<T>) -> TensorResult<Tensor<T>> {
        let l = Square::from_tensor(&self.l, "cholesky solve")?;
        let n = l.n();
        let (b_data, ncols) = rhs(b, n)?;
        let mut result = vec![0.0; n * ncols];

        for col in 0..ncols {
            // L * y = b
            let mut y = vec![0.0; n];
            for i in 0..n {
                let sum: f64 = (0..i).map(|j| l[(i, j)] * y[j]).sum();
                y[i] = (b_data[i * ncols + col] - sum) / l[(i, i)];
            }
            // Lᵀ * x = y
            for i in (0..n).rev() {
                let sum: f64 = ((i + 1)..n).map(|j| l[(j, i)] * result[j * ncols + col]).sum();
                result[i * ncols + col] = (y[i] - sum) / l[(i, i)];
            }
        }

        solution(result, b)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decomposition::cholesky;
    use approx::assert_relative_eq;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn assert_close(a: &Tensor<f64>, b: &Tensor<f64>, eps: f64) {
        assert_eq!(a.dims(), b.dims());
        let (a, b) = (a.to_vec(Order::RowMajor).unwrap(), b.to_vec(Order::RowMajor).unwrap());
        for (x, y) in a.iter().zip(&b) {
            assert_relative_eq!(*x, *y, epsilon = eps);
        }
    }

    #[test]
    fn test_solve() {
        let a = Tensor::from_vec(vec![2.0, 1.0, 1.0, 3.0], &[2, 2], Order::RowMajor).unwrap();
        let b = Tensor::from_vec(vec![5.0, 7.0], &[2], Order::RowMajor).unwrap();
        let x = solve(&a, &b).unwrap();
        assert_eq!(x.dims(), &[2]);
        assert_relative_eq!(x.get(&[0]).unwrap(), 1.6, epsilon = 1e-10);
        assert_relative_eq!(x.get(&[1]).unwrap(), 1.8, epsilon = 1e-10);
    }

    #[test]
    fn test_solve_multiple_right_hand_sides() {
        let mut rng = StdRng::seed_from_u64(7);
        let n = 6;
        let a_data: Vec<f64> = (0..n * n)
            .map(|k| rng.gen_range(-1.0..1.0) + if k % (n + 1) == 0 { n as f64 } else { 0.0 })
            .collect();
        let a = Tensor::from_vec(a_data, &[n, n], Order::RowMajor).unwrap();
        let x_true = Tensor::<f64>::random(&[n, 3], 11, Order::RowMajor).unwrap();
        let b = a.matmul(&x_true).unwrap();
        assert_close(&solve(&a, &b).unwrap(), &x_true, 1e-10);
    }

    #[test]
    fn test_solve_rejects_mismatched_rhs() {
        let a = Tensor::<f64>::eye(3).unwrap();
        let b = Tensor::<f64>::zeros(&[2]).unwrap();
        assert!(matches!(solve(&a, &b), Err(TensorError::DimensionMismatch(_))));
    }

    #[test]
    fn test_cholesky_solve() {
        // X^T X + I is positive definite
        let x = Tensor::<f64>::random(&[5, 5], 3, Order::RowMajor).unwrap();
        let a = x.t().unwrap().matmul(&x).unwrap().add(&Tensor::eye(5).unwrap()).unwrap();
        let b = Tensor::<f64>::random(&[5], 4, Order::RowMajor).unwrap();
        let by_cholesky = cholesky(&a).unwrap().solve(&b).unwrap();
        let by_lu = solve(&a, &b).unwrap();
        assert_close(&by_cholesky, &by_lu, 1e-10);
        let back = a.matmul(&by_cholesky.reshape(&[5, 1], Order::RowMajor).unwrap()).unwrap();
        assert_close(&back.reshape(&[5], Order::RowMajor).unwrap(), &b, 1e-10);
    }
}
