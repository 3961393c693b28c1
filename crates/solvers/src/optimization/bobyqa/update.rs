use ndarray::{Array1, Array2};

/// Factored inverse of the interpolation system's KKT matrix.
///
/// With `m` interpolation points and `n` variables, `bmat` is the
/// `(m + n) × n` matrix holding the last `n` columns of the inverse, and
/// `zmat` is the `m × (m − n − 1)` factor whose product `Z·Zᵀ` is the leading
/// `m × m` block. The trailing `n × n` block of `bmat` is symmetric.
#[derive(Debug, Clone)]
pub(super) struct InverseKkt {
    pub(super) bmat: Array2<f64>,
    pub(super) zmat: Array2<f64>,
}

impl InverseKkt {
    pub(super) fn zeros(npt: usize, n: usize) -> Self {
        Self {
            bmat: Array2::zeros((npt + n, n)),
            zmat: Array2::zeros((npt, npt - n - 1)),
        }
    }

    /// Returns `Z·Zᵀ` at `(k, k)`, the diagonal of the leading block.
    pub(super) fn hdiag(&self, k: usize) -> f64 {
        self.zmat.row(k).dot(&self.zmat.row(k))
    }

    /// Updates the factorization after interpolation point `knew` moves.
    ///
    /// `vlag` holds the Lagrange values of the new point in its first `npt`
    /// entries and the `bmat`-related terms in the last `n`. It is used as
    /// workspace and left modified. `denom` must be positive.
    pub(super) fn update(&mut self, vlag: &mut Array1<f64>, beta: f64, denom: f64, knew: usize) {
        let (npt, nptm) = self.zmat.dim();
        let n = self.bmat.ncols();
        let zmat = &mut self.zmat;
        let bmat = &mut self.bmat;

        let ztest = 1e-20 * zmat.iter().fold(0.0_f64, |acc, z| acc.max(z.abs()));

        // Rotate so that only the first column of Z has a nonzero in row `knew`.
        for j in 1..nptm {
            if zmat[[knew, j]].abs() > ztest {
                let temp = zmat[[knew, 0]].hypot(zmat[[knew, j]]);
                let tempa = zmat[[knew, 0]] / temp;
                let tempb = zmat[[knew, j]] / temp;
                for i in 0..npt {
                    let rotated = tempa * zmat[[i, 0]] + tempb * zmat[[i, j]];
                    zmat[[i, j]] = tempa * zmat[[i, j]] - tempb * zmat[[i, 0]];
                    zmat[[i, 0]] = rotated;
                }
            }
            zmat[[knew, j]] = 0.0;
        }

        let mut w = Array1::<f64>::zeros(npt + n);
        for i in 0..npt {
            w[i] = zmat[[knew, 0]] * zmat[[i, 0]];
        }
        let alpha = w[knew];
        let tau = vlag[knew];
        vlag[knew] -= 1.0;

        let sqrt_denom = denom.sqrt();
        let tempb = zmat[[knew, 0]] / sqrt_denom;
        let tempa = tau / sqrt_denom;
        for i in 0..npt {
            zmat[[i, 0]] = tempa * zmat[[i, 0]] - tempb * vlag[i];
        }

        for j in 0..n {
            let jp = npt + j;
            w[jp] = bmat[[knew, j]];
            let tempa = (alpha * vlag[jp] - tau * w[jp]) / denom;
            let tempb = (-beta * w[jp] - tau * vlag[jp]) / denom;
            for i in 0..=jp {
                bmat[[i, j]] += tempa * vlag[i] + tempb * w[i];
                if i >= npt {
                    bmat[[jp, i - npt]] = bmat[[i, j]];
                }
            }
        }
    }
}
