use oxidize_nd_core::{Float, Tensor, TensorError, TensorResult};

use crate::matrix::Square;

/// LU decomposition result: P * A = L * U
///
/// `pivot[i]` is the row of `A` that ended up in row `i`.
#[derive(Debug, Clone)]
pub struct LuDecomposition<T: Float> {
    pub l: Tensor<T>,
    pub u: Tensor<T>,
    pub pivot: Vec<usize>,
}

/// Cholesky decomposition result: A = L * Lᵀ
#[derive(Debug, Clone)]
pub struct CholeskyDecomposition<T: Float> {
    pub l: Tensor<T>,
}

/// LU decomposition with partial pivoting.
///
/// A pivot below `f64::EPSILON` times the largest entry of `a` makes the
/// matrix singular.
pub fn lu<T: Float>(a: &Tensor<T>) -> TensorResult<LuDecomposition<T>> {
    let mut u = Square::from_tensor(a, "lu")?;
    let n = u.n();
    let mut l = Square::zeros(n);
    let mut pivot: Vec<usize> = (0..n).collect();
    let tol = f64::EPSILON * u.max_abs();

    for k in 0..n {
        // Find pivot
        let mut max_val = u[(k, k)].abs();
        let mut max_row = k;
        for i in (k + 1)..n {
            let v = u[(i, k)].abs();
            if v > max_val {
                max_val = v;
                max_row = i;
            }
        }

        if max_val <= tol || max_val.is_nan() {
            return Err(TensorError::SingularMatrix);
        }

        if max_row != k {
            pivot.swap(k, max_row);
            u.swap_rows(k, max_row, 0..n);
            // only the columns of L computed so far
            l.swap_rows(k, max_row, 0..k);
        }

        l[(k, k)] = 1.0;

        for i in (k + 1)..n {
            let factor = u[(i, k)] / u[(k, k)];
            l[(i, k)] = factor;
            for j in k..n {
                u[(i, j)] -= factor * u[(k, j)];
            }
        }
    }

    Ok(LuDecomposition {
        l: l.to_tensor()?,
        u: u.to_tensor()?,
        pivot,
    })
}

/// Cholesky decomposition of a symmetric positive definite matrix.
///
/// Only the lower triangle of `a` is read.
pub fn cholesky<T: Float>(a: &Tensor<T>) -> TensorResult<CholeskyDecomposition<T>> {
    let a = Square::from_tensor(a, "cholesky")?;
    let n = a.n();
    let mut l = Square::zeros(n);

    for i in 0..n {
        for j in 0..=i {
            let sum: f64 = (0..j).map(|k| l[(i, k)] * l[(j, k)]).sum();
            if i == j {
                let val = a[(i, i)] - sum;
                if val <= 0.0 || val.is_nan() {
                    return Err(TensorError::NotPositiveDefinite);
                }
                l[(i, j)] = val.sqrt();
            } else {
                l[(i, j)] = (a[(i, j)] - sum) / l[(j, j)];
            }
        }
    }

    Ok(CholeskyDecomposition { l: l.to_tensor()? })
}

impl<T: Float> LuDecomposition<T> {
    /// Sign of the row permutation, `1` or `-1`.
    pub fn pivot_sign(&self) -> f64 {
        let n = self.pivot.len();
        let mut swaps = 0usize;
        let mut visited = vec![false; n];
        for i in 0..n {
            if visited[i] {
                continue;
            }
            visited[i] = true;
            let mut j = self.pivot[i];
            let mut cycle_len = 1;
            while j != i {
                visited[j] = true;
                j = self.pivot[j];
                cycle_len += 1;
            }
            // A cycle of length k requires k-1 transpositions
            swaps += cycle_len - 1;
        }
        if swaps % 2 == 1 {
            -1.0
        } else {
            1.0
        }
    }

    pub fn det(&self) -> TensorResult<T> {
        let n = self.pivot.len();
        let mut d = self.pivot_sign();
        for i in 0..n {
            d *= self.u.get(&[i, i])?.to_f64();
        }
        Ok(T::from_f64(d))
    }
}

/// Determinant of a square matrix using LU decomposition. Singular
/// matrices have determinant zero.
pub fn det<T: Float>(a: &Tensor<T>) -> TensorResult<T> {
    match lu(a) {
        Ok(decomp) => decomp.det(),
        Err(TensorError::SingularMatrix) => Ok(T::ZERO),
        Err(e) => Err(e),
    }
}

/// Matrix inverse using LU decomposition.
pub fn inv<T: Float>(a: &Tensor<T>) -> TensorResult<Tensor<T>> {
    let decomp = lu(a)?;
    let identity = Tensor::<T>::eye(decomp.pivot.len())?;
    decomp.solve(&identity)
}
