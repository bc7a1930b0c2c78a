//! Eigenvalue decomposition of a real square matrix.
//!
//! If `A` is symmetric then `A = V * D * Vᵀ` where `D` is diagonal and `V` is
//! orthogonal. Otherwise `D` is block diagonal, with the real eigenvalues in
//! 1x1 blocks and each complex pair `λ ± iμ` in a 2x2 block `[λ, μ; -μ, λ]`,
//! and `A * V = V * D`. `V` may be badly conditioned or singular in that case.
//!
//! Symmetric input is reduced to tridiagonal form with Householder
//! reflections and diagonalized with the implicit QL algorithm (EISPACK
//! tred2 and tql2). Other input is reduced to Hessenberg form (orthes) and
//! then to real Schur form with shifted double QR steps (hqr2).
//!
//! Eigenvalues come out in the reverse of the order the algorithms produce:
//! descending for symmetric input.

use oxidize_nd_core::{Float, Order, Tensor, TensorError, TensorResult};
use tracing::{trace, warn};

use crate::matrix::Square;

/// Shifted QR or QL sweeps allowed per eigenvalue.
pub const MAX_SWEEPS: usize = 500;

const EPS: f64 = f64::EPSILON;

#[derive(Debug, Clone)]
pub struct EigenDecomposition<T: Float> {
    real: Vec<f64>,
    imag: Vec<f64>,
    vectors: Tensor<T>,
}

/// Eigenvalues and eigenvectors of `a`.
pub fn eig<T: Float>(a: &Tensor<T>) -> TensorResult<EigenDecomposition<T>> {
    if a.rank() != 2 {
        return Err(TensorError::DimensionMismatch(format!(
            "eig requires a 2D tensor, got rank {}",
            a.rank()
        )));
    }
    if a.nan_count()? > 0 {
        return Err(TensorError::ContainsNaN);
    }
    let symmetric = a.is_symmetric()?;
    let h = Square::from_tensor(a, "eig")?;
    let n = h.n();
    trace!(n, symmetric, "eigen decomposition");

    let mut solver = Solver {
        n,
        real: vec![0.0; n],
        imag: vec![0.0; n],
        v: Square::zeros(n),
    };
    if n > 0 {
        if symmetric {
            solver.v = h;
            solver.tridiagonalize();
            solver.diagonalize()?;
        } else {
            let mut h = h;
            solver.reduce_to_hessenberg(&mut h);
            solver.hessenberg_to_real_schur(&mut h)?;
        }
    }
    solver.reverse_order();

    Ok(EigenDecomposition {
        real: solver.real,
        imag: solver.imag,
        vectors: solver.v.to_tensor()?,
    })
}

impl<T: Float> EigenDecomposition<T> {
    /// Real parts of the eigenvalues.
    pub fn real(&self) -> TensorResult<Tensor<T>> {
        vector(&self.real)
    }

    /// Imaginary parts of the eigenvalues.
    pub fn imag(&self) -> TensorResult<Tensor<T>> {
        vector(&self.imag)
    }

    /// Eigenvector matrix, one vector per column.
    pub fn v(&self) -> &Tensor<T> {
        &self.vectors
    }

    /// Block diagonal eigenvalue matrix.
    pub fn d(&self) -> TensorResult<Tensor<T>> {
        let n = self.real.len();
        let mut d = Square::zeros(n);
        for i in 0..n {
            d[(i, i)] = self.real[i];
            let mu = self.imag[i];
            if mu > 0.0 && i > 0 {
                d[(i, i - 1)] = mu;
            } else if mu < 0.0 && i + 1 < n {
                d[(i, i + 1)] = mu;
            }
        }
        d.to_tensor()
    }

    /// Set real eigenvalues in `(-tol, 0)` to zero.
    pub fn clamp_real_values(&mut self, tol: f64) {
        for r in self.real.iter_mut() {
            if r.abs() < tol && *r < 0.0 {
                *r = 0.0;
            }
        }
    }

    /// `V * D^p * Vᵀ`, with the diagonal of `D` raised to `p`. Meaningful for
    /// symmetric input, where it is the matrix power `A^p`.
    pub fn power(&self, p: f64) -> TensorResult<Tensor<T>> {
        let lambda = self.d()?;
        for i in 0..self.real.len() {
            let v = lambda.get(&[i, i])?.to_f64();
            lambda.set(&[i, i], T::from_f64(v.powf(p)))?;
        }
        self.vectors.matmul(&lambda)?.matmul(&self.vectors.t()?)
    }
}

fn vector<T: Float>(values: &[f64]) -> TensorResult<Tensor<T>> {
    let data = values.iter().map(|&v| T::from_f64(v)).collect();
    Tensor::from_vec(data, &[values.len()], Order::RowMajor)
}

fn no_convergence(stage: &str, index: usize) -> TensorError {
    warn!(stage, index, sweeps = MAX_SWEEPS, "eigenvalue iteration did not converge");
    TensorError::NoConvergence {
        iterations: MAX_SWEEPS,
    }
}

/// Complex division `(xr + i xi) / (yr + i yi)`.
fn cdiv(xr: f64, xi: f64, yr: f64, yi: f64) -> (f64, f64) {
    if yr.abs() > yi.abs() {
        let r = yi / yr;
        let d = yr + r * yi;
        ((xr + r * xi) / d, (xi - r * xr) / d)
    } else {
        let r = yr / yi;
        let d = yi + r * yr;
        ((r * xr + xi) / d, (r * xi - xr) / d)
    }
}

struct Solver {
    n: usize,
    real: Vec<f64>,
    imag: Vec<f64>,
    v: Square,
}

impl Solver {
    /// Householder reduction of the symmetric matrix in `v` to tridiagonal
    /// form: diagonal in `real`, subdiagonal in `imag[1..]`.
    fn tridiagonalize(&mut self) {
        let n = self.n;
        let (d, e, v) = (&mut self.real, &mut self.imag, &mut self.v);

        for j in 0..n {
            d[j] = v[(n - 1, j)];
        }

        for i in (1..n).rev() {
            // Scale to avoid under/overflow
            let scale: f64 = d[..i].iter().map(|x| x.abs()).sum();
            let mut h: f64 = 0.0;
            if scale == 0.0 {
                e[i] = d[i - 1];
                for j in 0..i {
                    d[j] = v[(i - 1, j)];
                    v[(i, j)] = 0.0;
                    v[(j, i)] = 0.0;
                }
            } else {
                // Generate Householder vector
                for k in 0..i {
                    d[k] /= scale;
                    h += d[k] * d[k];
                }
                let mut f = d[i - 1];
                let mut g = h.sqrt();
                if f > 0.0 {
                    g = -g;
                }
                e[i] = scale * g;
                h -= f * g;
                d[i - 1] = f - g;
                for x in e[..i].iter_mut() {
                    *x = 0.0;
                }

                // Apply similarity transformation to remaining columns
                for j in 0..i {
                    f = d[j];
                    v[(j, i)] = f;
                    g = e[j] + v[(j, j)] * f;
                    for k in (j + 1)..i {
                        g += v[(k, j)] * d[k];
                        e[k] += v[(k, j)] * f;
                    }
                    e[j] = g;
                }
                f = 0.0;
                for j in 0..i {
                    e[j] /= h;
                    f += e[j] * d[j];
                }
                let hh = f / (h + h);
                for j in 0..i {
                    e[j] -= hh * d[j];
                }
                for j in 0..i {
                    f = d[j];
                    g = e[j];
                    for k in j..i {
                        v[(k, j)] -= f * e[k] + g * d[k];
                    }
                    d[j] = v[(i - 1, j)];
                    v[(i, j)] = 0.0;
                }
            }
            d[i] = h;
        }

        // Accumulate transformations
        for i in 0..n.saturating_sub(1) {
            v[(n - 1, i)] = v[(i, i)];
            v[(i, i)] = 1.0;
            let h = d[i + 1];
            if h != 0.0 {
                for k in 0..=i {
                    d[k] = v[(k, i + 1)] / h;
                }
                for j in 0..=i {
                    let g: f64 = (0..=i).map(|k| v[(k, i + 1)] * v[(k, j)]).sum();
                    for k in 0..=i {
                        v[(k, j)] -= g * d[k];
                    }
                }
            }
            for k in 0..=i {
                v[(k, i + 1)] = 0.0;
            }
        }
        for j in 0..n {
            d[j] = v[(n - 1, j)];
            v[(n - 1, j)] = 0.0;
        }
        v[(n - 1, n - 1)] = 1.0;
        e[0] = 0.0;
    }

    /// Implicit QL iterations on the tridiagonal form, then an ascending
    /// sort of eigenvalues and vectors.
    fn diagonalize(&mut self) -> TensorResult<()> {
        let n = self.n;
        let (d, e, v) = (&mut self.real, &mut self.imag, &mut self.v);

        e.copy_within(1..n, 0);
        e[n - 1] = 0.0;

        let mut f = 0.0;
        let mut tst1: f64 = 0.0;
        for l in 0..n {
            // Find small subdiagonal element
            tst1 = tst1.max(d[l].abs() + e[l].abs());
            let mut m = l;
            while m < n - 1 && e[m].abs() > EPS * tst1 {
                m += 1;
            }

            // If m == l, d[l] is an eigenvalue, otherwise iterate
            if m > l {
                let mut sweeps = 0;
                loop {
                    sweeps += 1;
                    if sweeps > MAX_SWEEPS {
                        return Err(no_convergence("tql2", l));
                    }

                    // Compute implicit shift
                    let mut g = d[l];
                    let mut p = (d[l + 1] - g) / (2.0 * e[l]);
                    let mut r = p.hypot(1.0);
                    if p < 0.0 {
                        r = -r;
                    }
                    d[l] = e[l] / (p + r);
                    d[l + 1] = e[l] * (p + r);
                    let dl1 = d[l + 1];
                    let mut h = g - d[l];
                    for x in d[(l + 2)..n].iter_mut() {
                        *x -= h;
                    }
                    f += h;

                    // Implicit QL transformation
                    p = d[m];
                    let mut c = 1.0;
                    let mut c2 = c;
                    let mut c3 = c;
                    let el1 = e[l + 1];
                    let mut s = 0.0;
                    let mut s2 = 0.0;
                    for i in (l..m).rev() {
                        c3 = c2;
                        c2 = c;
                        s2 = s;
                        g = c * e[i];
                        h = c * p;
                        r = p.hypot(e[i]);
                        e[i + 1] = s * r;
                        s = e[i] / r;
                        c = p / r;
                        p = c * d[i] - s * g;
                        d[i + 1] = h + s * (c * g + s * d[i]);

                        // Accumulate transformation
                        for k in 0..n {
                            h = v[(k, i + 1)];
                            v[(k, i + 1)] = s * v[(k, i)] + c * h;
                            v[(k, i)] = c * v[(k, i)] - s * h;
                        }
                    }
                    p = -s * s2 * c3 * el1 * e[l] / dl1;
                    e[l] = s * p;
                    d[l] = c * p;

                    if e[l].abs() <= EPS * tst1 {
                        break;
                    }
                }
            }
            d[l] += f;
            e[l] = 0.0;
        }

        // Sort eigenvalues and corresponding vectors
        for i in 0..n - 1 {
            let mut k = i;
            let mut p = d[i];
            for (j, &dj) in d.iter().enumerate().skip(i + 1) {
                if dj < p {
                    k = j;
                    p = dj;
                }
            }
            if k != i {
                d[k] = d[i];
                d[i] = p;
                v.swap_cols(i, k);
            }
        }
        Ok(())
    }

    /// Orthogonal reduction of `h` to upper Hessenberg form, accumulating
    /// the transformations in `v`.
    fn reduce_to_hessenberg(&mut self, h: &mut Square) {
        let n = self.n;
        let high = n - 1;
        let mut ort = vec![0.0; n];

        for m in 1..high {
            // Scale column
            let scale: f64 = (m..=high).map(|i| h[(i, m - 1)].abs()).sum();
            if scale == 0.0 {
                continue;
            }

            // Compute Householder transformation
            let mut hh: f64 = 0.0;
            for i in (m..=high).rev() {
                ort[i] = h[(i, m - 1)] / scale;
                hh += ort[i] * ort[i];
            }
            let mut g = hh.sqrt();
            if ort[m] > 0.0 {
                g = -g;
            }
            hh -= ort[m] * g;
            ort[m] -= g;

            // H = (I - u * uᵀ / h) * H * (I - u * uᵀ / h)
            for j in m..n {
                let f = (m..=high).rev().map(|i| ort[i] * h[(i, j)]).sum::<f64>() / hh;
                for i in m..=high {
                    h[(i, j)] -= f * ort[i];
                }
            }
            for i in 0..=high {
                let f = (m..=high).rev().map(|j| ort[j] * h[(i, j)]).sum::<f64>() / hh;
                for j in m..=high {
                    h[(i, j)] -= f * ort[j];
                }
            }
            ort[m] *= scale;
            h[(m, m - 1)] = scale * g;
        }

        // Accumulate transformations
        self.v = Square::identity(n);
        let v = &mut self.v;
        for m in (1..high).rev() {
            if h[(m, m - 1)] == 0.0 {
                continue;
            }
            for i in (m + 1)..=high {
                ort[i] = h[(i, m - 1)];
            }
            for j in m..=high {
                let g: f64 = (m..=high).map(|i| ort[i] * v[(i, j)]).sum();
                // double division avoids possible underflow
                let g = (g / ort[m]) / h[(m, m - 1)];
                for i in m..=high {
                    v[(i, j)] += g * ort[i];
                }
            }
        }
    }

    /// Shifted QR reduction of the Hessenberg matrix `h` to real Schur form,
    /// then back substitution for the eigenvectors.
    fn hessenberg_to_real_schur(&mut self, h: &mut Square) -> TensorResult<()> {
        let nn = self.n;
        let high = nn - 1;
        let (d, e, v) = (&mut self.real, &mut self.imag, &mut self.v);
        let mut exshift = 0.0;
        // r, s and z carry over from one back-substitution row to the next
        let (mut r, mut s, mut z): (f64, f64, f64) = (0.0, 0.0, 0.0);
        let mut p: f64;
        let mut q: f64;
        let mut w: f64;
        let mut x: f64;
        let mut y: f64;

        let mut norm = 0.0;
        for i in 0..nn {
            for j in i.saturating_sub(1)..nn {
                norm += h[(i, j)].abs();
            }
        }

        // Outer loop over eigenvalue index; `top` counts the rows still
        // unreduced
        let mut top = nn;
        let mut sweeps = 0;
        while top > 0 {
            let n = top - 1;

            // Look for single small sub-diagonal element
            let mut l = n;
            while l > 0 {
                s = h[(l - 1, l - 1)].abs() + h[(l, l)].abs();
                if s == 0.0 {
                    s = norm;
                }
                if h[(l, l - 1)].abs() < EPS * s {
                    break;
                }
                l -= 1;
            }

            if l == n {
                // One root found
                h[(n, n)] += exshift;
                d[n] = h[(n, n)];
                e[n] = 0.0;
                top -= 1;
                sweeps = 0;
            } else if l + 1 == n {
                // Two roots found
                w = h[(n, n - 1)] * h[(n - 1, n)];
                p = (h[(n - 1, n - 1)] - h[(n, n)]) / 2.0;
                q = p * p + w;
                z = q.abs().sqrt();
                h[(n, n)] += exshift;
                h[(n - 1, n - 1)] += exshift;
                x = h[(n, n)];

                if q >= 0.0 {
                    // Real pair
                    z = if p >= 0.0 { p + z } else { p - z };
                    d[n - 1] = x + z;
                    d[n] = d[n - 1];
                    if z != 0.0 {
                        d[n] = x - w / z;
                    }
                    e[n - 1] = 0.0;
                    e[n] = 0.0;
                    x = h[(n, n - 1)];
                    s = x.abs() + z.abs();
                    p = x / s;
                    q = z / s;
                    r = (p * p + q * q).sqrt();
                    p /= r;
                    q /= r;

                    // Row modification
                    for j in (n - 1)..nn {
                        z = h[(n - 1, j)];
                        h[(n - 1, j)] = q * z + p * h[(n, j)];
                        h[(n, j)] = q * h[(n, j)] - p * z;
                    }

                    // Column modification
                    for i in 0..=n {
                        z = h[(i, n - 1)];
                        h[(i, n - 1)] = q * z + p * h[(i, n)];
                        h[(i, n)] = q * h[(i, n)] - p * z;
                    }

                    // Accumulate transformations
                    for i in 0..=high {
                        z = v[(i, n - 1)];
                        v[(i, n - 1)] = q * z + p * v[(i, n)];
                        v[(i, n)] = q * v[(i, n)] - p * z;
                    }
                } else {
                    // Complex pair
                    d[n - 1] = x + p;
                    d[n] = x + p;
                    e[n - 1] = z;
                    e[n] = -z;
                }
                top -= 2;
                sweeps = 0;
            } else {
                // No convergence yet; form shift
                x = h[(n, n)];
                y = h[(n - 1, n - 1)];
                w = h[(n, n - 1)] * h[(n - 1, n)];

                // Wilkinson's original ad hoc shift
                if sweeps == 10 {
                    exshift += x;
                    for i in 0..=n {
                        h[(i, i)] -= x;
                    }
                    s = h[(n, n - 1)].abs() + h[(n - 1, n - 2)].abs();
                    x = 0.75 * s;
                    y = x;
                    w = -0.4375 * s * s;
                }

                // MATLAB's new ad hoc shift
                if sweeps == 30 {
                    s = (y - x) / 2.0;
                    s = s * s + w;
                    if s > 0.0 {
                        s = s.sqrt();
                        if y < x {
                            s = -s;
                        }
                        s = x - w / ((y - x) / 2.0 + s);
                        for i in 0..=n {
                            h[(i, i)] -= s;
                        }
                        exshift += s;
                        x = 0.964;
                        y = x;
                        w = x;
                    }
                }

                sweeps += 1;
                if sweeps > MAX_SWEEPS {
                    return Err(no_convergence("hqr2", n));
                }

                // Look for two consecutive small sub-diagonal elements
                let mut m = n - 2;
                loop {
                    z = h[(m, m)];
                    r = x - z;
                    s = y - z;
                    p = (r * s - w) / h[(m + 1, m)] + h[(m, m + 1)];
                    q = h[(m + 1, m + 1)] - z - r - s;
                    r = h[(m + 2, m + 1)];
                    s = p.abs() + q.abs() + r.abs();
                    p /= s;
                    q /= s;
                    r /= s;
                    if m == l {
                        break;
                    }
                    if h[(m, m - 1)].abs() * (q.abs() + r.abs())
                        < EPS * (p.abs() * (h[(m - 1, m - 1)].abs() + z.abs() + h[(m + 1, m + 1)].abs()))
                    {
                        break;
                    }
                    m -= 1;
                }

                for i in (m + 2)..=n {
                    h[(i, i - 2)] = 0.0;
                    if i > m + 2 {
                        h[(i, i - 3)] = 0.0;
                    }
                }

                // Double QR step involving rows l..=n and columns m..=n
                for k in m..n {
                    let notlast = k != n - 1;
                    if k != m {
                        p = h[(k, k - 1)];
                        q = h[(k + 1, k - 1)];
                        r = if notlast { h[(k + 2, k - 1)] } else { 0.0 };
                        x = p.abs() + q.abs() + r.abs();
                        if x == 0.0 {
                            continue;
                        }
                        p /= x;
                        q /= x;
                        r /= x;
                    }

                    s = (p * p + q * q + r * r).sqrt();
                    if p < 0.0 {
                        s = -s;
                    }
                    if s == 0.0 {
                        continue;
                    }
                    if k != m {
                        h[(k, k - 1)] = -s * x;
                    } else if l != m {
                        h[(k, k - 1)] = -h[(k, k - 1)];
                    }
                    p += s;
                    x = p / s;
                    y = q / s;
                    z = r / s;
                    q /= p;
                    r /= p;

                    // Row modification
                    for j in k..nn {
                        p = h[(k, j)] + q * h[(k + 1, j)];
                        if notlast {
                            p += r * h[(k + 2, j)];
                            h[(k + 2, j)] -= p * z;
                        }
                        h[(k, j)] -= p * x;
                        h[(k + 1, j)] -= p * y;
                    }

                    // Column modification
                    for i in 0..=n.min(k + 3) {
                        p = x * h[(i, k)] + y * h[(i, k + 1)];
                        if notlast {
                            p += z * h[(i, k + 2)];
                            h[(i, k + 2)] -= p * r;
                        }
                        h[(i, k)] -= p;
                        h[(i, k + 1)] -= p * q;
                    }

                    // Accumulate transformations
                    for i in 0..=high {
                        p = x * v[(i, k)] + y * v[(i, k + 1)];
                        if notlast {
                            p += z * v[(i, k + 2)];
                            v[(i, k + 2)] -= p * r;
                        }
                        v[(i, k)] -= p;
                        v[(i, k + 1)] -= p * q;
                    }
                }
            }
        }

        // Backsubstitute to find vectors of upper triangular form
        if norm == 0.0 {
            return Ok(());
        }

        for n in (0..nn).rev() {
            p = d[n];
            q = e[n];

            if q == 0.0 {
                // Real vector
                let mut l = n;
                h[(n, n)] = 1.0;
                for i in (0..n).rev() {
                    w = h[(i, i)] - p;
                    r = (l..=n).map(|j| h[(i, j)] * h[(j, n)]).sum();
                    if e[i] < 0.0 {
                        z = w;
                        s = r;
                        continue;
                    }
                    l = i;
                    if e[i] == 0.0 {
                        h[(i, n)] = if w != 0.0 { -r / w } else { -r / (EPS * norm) };
                    } else {
                        // Solve real equations
                        x = h[(i, i + 1)];
                        y = h[(i + 1, i)];
                        q = (d[i] - p) * (d[i] - p) + e[i] * e[i];
                        let t = (x * s - z * r) / q;
                        h[(i, n)] = t;
                        h[(i + 1, n)] = if x.abs() > z.abs() {
                            (-r - w * t) / x
                        } else {
                            (-s - y * t) / z
                        };
                    }

                    // Overflow control
                    let t = h[(i, n)].abs();
                    if (EPS * t) * t > 1.0 {
                        for j in i..=n {
                            h[(j, n)] /= t;
                        }
                    }
                }
            } else if q < 0.0 {
                // Complex vector; the last component is imaginary so the
                // matrix is triangular
                let mut l = n - 1;
                if h[(n, n - 1)].abs() > h[(n - 1, n)].abs() {
                    h[(n - 1, n - 1)] = q / h[(n, n - 1)];
                    h[(n - 1, n)] = -(h[(n, n)] - p) / h[(n, n - 1)];
                } else {
                    let (cr, ci) = cdiv(0.0, -h[(n - 1, n)], h[(n - 1, n - 1)] - p, q);
                    h[(n - 1, n - 1)] = cr;
                    h[(n - 1, n)] = ci;
                }
                h[(n, n - 1)] = 0.0;
                h[(n, n)] = 1.0;
                for i in (0..n - 1).rev() {
                    let ra: f64 = (l..=n).map(|j| h[(i, j)] * h[(j, n - 1)]).sum();
                    let sa: f64 = (l..=n).map(|j| h[(i, j)] * h[(j, n)]).sum();
                    w = h[(i, i)] - p;

                    if e[i] < 0.0 {
                        z = w;
                        r = ra;
                        s = sa;
                        continue;
                    }
                    l = i;
                    if e[i] == 0.0 {
                        let (cr, ci) = cdiv(-ra, -sa, w, q);
                        h[(i, n - 1)] = cr;
                        h[(i, n)] = ci;
                    } else {
                        // Solve complex equations
                        x = h[(i, i + 1)];
                        y = h[(i + 1, i)];
                        let mut vr = (d[i] - p) * (d[i] - p) + e[i] * e[i] - q * q;
                        let vi = (d[i] - p) * 2.0 * q;
                        if vr == 0.0 && vi == 0.0 {
                            vr = EPS * norm * (w.abs() + q.abs() + x.abs() + y.abs() + z.abs());
                        }
                        let (cr, ci) =
                            cdiv(x * r - z * ra + q * sa, x * s - z * sa - q * ra, vr, vi);
                        h[(i, n - 1)] = cr;
                        h[(i, n)] = ci;
                        if x.abs() > z.abs() + q.abs() {
                            h[(i + 1, n - 1)] = (-ra - w * h[(i, n - 1)] + q * h[(i, n)]) / x;
                            h[(i + 1, n)] = (-sa - w * h[(i, n)] - q * h[(i, n - 1)]) / x;
                        } else {
                            let (cr, ci) =
                                cdiv(-r - y * h[(i, n - 1)], -s - y * h[(i, n)], z, q);
                            h[(i + 1, n - 1)] = cr;
                            h[(i + 1, n)] = ci;
                        }
                    }

                    // Overflow control
                    let t = h[(i, n - 1)].abs().max(h[(i, n)].abs());
                    if (EPS * t) * t > 1.0 {
                        for j in i..=n {
                            h[(j, n - 1)] /= t;
                            h[(j, n)] /= t;
                        }
                    }
                }
            }
        }

        // Back transformation to get eigenvectors of original matrix
        for j in (0..nn).rev() {
            for i in 0..=high {
                z = (0..=j.min(high)).map(|k| v[(i, k)] * h[(k, j)]).sum();
                v[(i, j)] = z;
            }
        }
        Ok(())
    }

    fn reverse_order(&mut self) {
        let n = self.n;
        self.real.reverse();
        self.imag.reverse();
        for i in 0..n / 2 {
            self.v.swap_cols(i, n - 1 - i);
        }
    }
}
