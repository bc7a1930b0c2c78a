use std::ops::{Index, IndexMut};

use oxidize_nd_core::{Float, Order, Tensor, TensorError, TensorResult};

/// Dense row-major `n x n` working copy in `f64`.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Square {
    n: usize,
    data: Vec<f64>,
}

impl Square {
    pub(crate) fn zeros(n: usize) -> Self {
        Square {
            n,
            data: vec![0.0; n * n],
        }
    }

    pub(crate) fn identity(n: usize) -> Self {
        let mut m = Square::zeros(n);
        for i in 0..n {
            m[(i, i)] = 1.0;
        }
        m
    }

    /// Copy of a square 2-D tensor; `op` names the caller in errors.
    pub(crate) fn from_tensor<T: Float>(a: &Tensor<T>, op: &str) -> TensorResult<Self> {
        if a.rank() != 2 {
            return Err(TensorError::DimensionMismatch(format!(
                "{} requires a 2D tensor, got rank {}",
                op,
                a.rank()
            )));
        }
        let (rows, cols) = (a.dims()[0], a.dims()[1]);
        if rows != cols {
            return Err(TensorError::NotSquare { rows, cols });
        }
        let data = a
            .to_vec(Order::RowMajor)?
            .into_iter()
            .map(|v| v.to_f64())
            .collect();
        Ok(Square { n: rows, data })
    }

    pub(crate) fn to_tensor<T: Float>(&self) -> TensorResult<Tensor<T>> {
        let data = self.data.iter().map(|&v| T::from_f64(v)).collect();
        Tensor::from_vec(data, &[self.n, self.n], Order::RowMajor)
    }

    pub(crate) fn n(&self) -> usize {
        self.n
    }

    /// Largest absolute entry, 0 for an empty matrix.
    pub(crate) fn max_abs(&self) -> f64 {
        self.data.iter().fold(0.0, |acc, v| acc.max(v.abs()))
    }

    pub(crate) fn swap_rows(&mut self, a: usize, b: usize, cols: std::ops::Range<usize>) {
        if a == b {
            return;
        }
        for j in cols {
            self.data.swap(a * self.n + j, b * self.n + j);
        }
    }

    pub(crate) fn swap_cols(&mut self, a: usize, b: usize) {
        if a == b {
            return;
        }
        for i in 0..self.n {
            self.data.swap(i * self.n + a, i * self.n + b);
        }
    }
}

impl Index<(usize, usize)> for Square {
    type Output = f64;

    #[inline]
    fn index(&self, (i, j): (usize, usize)) -> &f64 {
        &self.data[i * self.n + j]
    }
}

impl IndexMut<(usize, usize)> for Square {
    #[inline]
    fn index_mut(&mut self, (i, j): (usize, usize)) -> &mut f64 {
        &mut self.data[i * self.n + j]
    }
}

/// Right-hand side of a linear system as `n x cols` row-major `f64`.
pub(crate) fn rhs<T: Float>(b: &Tensor<T>, n: usize) -> TensorResult<(Vec<f64>, usize)> {
    let cols = match b.rank() {
        1 => 1,
        2 => b.dims()[1],
        r => {
            return Err(TensorError::DimensionMismatch(format!(
                "right-hand side must be 1D or 2D, got rank {}",
                r
            )))
        }
    };
    if b.dims()[0] != n {
        return Err(TensorError::DimensionMismatch(format!(
            "right-hand side has {} rows but the system is {}x{}",
            b.dims()[0],
            n,
            n
        )));
    }
    let data = b
        .to_vec(Order::RowMajor)?
        .into_iter()
        .map(|v| v.to_f64())
        .collect();
    Ok((data, cols))
}
