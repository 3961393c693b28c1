use ndarray::{Array1, Array2, ArrayView1};

use super::{symmetric::SymmetricMatrix, update::InverseKkt};

/// The interpolation set and the quadratic model built on it.
///
/// All points are stored as offsets from `xbase`. The model is
///
/// ```text
/// Q(xopt + d) = fopt + gopt·d + ½ dᵀ (HQ + Σₖ pqₖ xptₖ xptₖᵀ) d
/// ```
///
/// where the second-derivative matrix is split into an explicit part `hq`
/// and an implicit part carried by the interpolation points.
#[derive(Debug, Clone)]
pub(super) struct ModelState {
    pub(super) xbase: Array1<f64>,
    /// One row per interpolation point.
    pub(super) xpt: Array2<f64>,
    pub(super) fval: Array1<f64>,
    /// Index of the point with the least objective value.
    pub(super) kopt: usize,
    pub(super) xopt: Array1<f64>,
    /// Model gradient at `xopt`.
    pub(super) gopt: Array1<f64>,
    pub(super) hq: SymmetricMatrix,
    pub(super) pq: Array1<f64>,
    pub(super) kkt: InverseKkt,
    /// Lower bounds as offsets from `xbase`.
    pub(super) sl: Array1<f64>,
    /// Upper bounds as offsets from `xbase`.
    pub(super) su: Array1<f64>,
    lower: Array1<f64>,
    upper: Array1<f64>,
}

/// Lagrange function values at a candidate point `xopt + d`.
#[derive(Debug, Clone)]
pub(super) struct Lagrange {
    /// Values of the `npt` Lagrange functions, followed by `n` terms that
    /// feed the update of `bmat`.
    pub(super) vlag: Array1<f64>,
    pub(super) beta: f64,
    /// `xptₖ·d` for each interpolation point.
    pub(super) xpt_d: Array1<f64>,
}

/// An interpolation point chosen to make room for a new one.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(super) struct Discard {
    pub(super) index: usize,
    pub(super) denom: f64,
}

/// The least Frobenius norm model interpolating the current values.
pub(super) struct FrobeniusModel {
    gradient: Array1<f64>,
    pq: Array1<f64>,
    /// Squared norm of the projected gradient of the current model.
    pub(super) current_sq: f64,
    /// Squared norm of the projected gradient of the alternative model.
    pub(super) alternative_sq: f64,
}

impl ModelState {
    /// Creates an empty model around `xbase`.
    ///
    /// `sl` and `su` are the bounds relative to `xbase`; `lower` and `upper`
    /// are the caller's bounds, used to snap evaluated points exactly.
    pub(super) fn new(
        xbase: Array1<f64>,
        sl: Array1<f64>,
        su: Array1<f64>,
        lower: Array1<f64>,
        upper: Array1<f64>,
        npt: usize,
    ) -> Self {
        let n = xbase.len();
        Self {
            xbase,
            xpt: Array2::zeros((npt, n)),
            fval: Array1::zeros(npt),
            kopt: 0,
            xopt: Array1::zeros(n),
            gopt: Array1::zeros(n),
            hq: SymmetricMatrix::zeros(n),
            pq: Array1::zeros(npt),
            kkt: InverseKkt::zeros(npt, n),
            sl,
            su,
            lower,
            upper,
        }
    }

    pub(super) fn n(&self) -> usize {
        self.xbase.len()
    }

    pub(super) fn npt(&self) -> usize {
        self.fval.len()
    }

    pub(super) fn fopt(&self) -> f64 {
        self.fval[self.kopt]
    }

    /// Converts an offset from `xbase` to the caller's coordinates.
    ///
    /// The result is clamped to the bounds, and offsets that sit exactly on
    /// a relative bound map exactly onto the caller's bound.
    pub(super) fn absolute(&self, offset: ArrayView1<'_, f64>) -> Vec<f64> {
        (0..self.n())
            .map(|i| {
                if offset[i] == self.sl[i] {
                    self.lower[i]
                } else if offset[i] == self.su[i] {
                    self.upper[i]
                } else {
                    (self.xbase[i] + offset[i])
                        .min(self.upper[i])
                        .max(self.lower[i])
                }
            })
            .collect()
    }

    /// Returns the model Hessian times `s`.
    pub(super) fn hessian_times(&self, s: ArrayView1<'_, f64>) -> Array1<f64> {
        let mut hs = self.hq.dot(s);
        for (k, &pq) in self.pq.iter().enumerate() {
            if pq != 0.0 {
                let row = self.xpt.row(k);
                hs.scaled_add(pq * row.dot(&s), &row);
            }
        }
        hs
    }

    /// Returns the curvature of the model along coordinate `j`.
    pub(super) fn diagonal_curvature(&self, j: usize) -> f64 {
        self.hq.get(j, j)
            + self
                .pq
                .iter()
                .zip(self.xpt.column(j))
                .map(|(pq, x)| pq * x * x)
                .sum::<f64>()
    }

    /// Returns `Q(xopt + d) − Q(xopt)`.
    pub(super) fn predicted_change(&self, d: ArrayView1<'_, f64>, xpt_d: &Array1<f64>) -> f64 {
        let implicit: f64 = self
            .pq
            .iter()
            .zip(xpt_d)
            .map(|(pq, xd)| pq * xd * xd)
            .sum();
        self.gopt.dot(&d) + 0.5 * self.hq.quadratic_form(d) + 0.5 * implicit
    }

    /// Moves the model gradient from `xbase` to `xopt`.
    pub(super) fn recenter_gradient(&mut self) {
        let shift = self.hessian_times(self.xopt.view());
        self.gopt += &shift;
    }

    /// Moves `xbase` to `xbase + xopt`, so that `xopt` becomes zero.
    ///
    /// Every offset is re-expressed against the new base, including the
    /// caller's `xnew`. The model and its factorization are transformed to
    /// describe the same interpolant.
    pub(super) fn shift_base(&mut self, xnew: &mut Array1<f64>) {
        let (n, npt) = (self.n(), self.npt());
        let xoptsq = self.xopt.dot(&self.xopt);
        let fracsq = 0.25 * xoptsq;
        let sumpq: f64 = self.pq.sum();
        let bmat = &mut self.kkt.bmat;
        let zmat = &self.kkt.zmat;

        let mut sums = Array1::<f64>::zeros(npt);
        let mut w = Array1::<f64>::zeros(n);
        let mut v = Array1::<f64>::zeros(n);
        for k in 0..npt {
            let sum = self.xpt.row(k).dot(&self.xopt) - 0.5 * xoptsq;
            sums[k] = sum;
            let temp = fracsq - 0.5 * sum;
            for i in 0..n {
                w[i] = bmat[[k, i]];
                v[i] = sum * self.xpt[[k, i]] + temp * self.xopt[i];
                let ip = npt + i;
                for j in 0..=i {
                    bmat[[ip, j]] += w[i] * v[j] + v[i] * w[j];
                }
            }
        }

        let mut scaled = Array1::<f64>::zeros(npt);
        for jj in 0..zmat.ncols() {
            let column = zmat.column(jj);
            let sumz = column.sum();
            for k in 0..npt {
                scaled[k] = sums[k] * column[k];
            }
            let sumw = scaled.sum();
            for j in 0..n {
                let sum = (fracsq * sumz - 0.5 * sumw) * self.xopt[j]
                    + scaled.dot(&self.xpt.column(j));
                w[j] = sum;
                for k in 0..npt {
                    bmat[[k, j]] += sum * column[k];
                }
            }
            for i in 0..n {
                let ip = npt + i;
                for j in 0..=i {
                    bmat[[ip, j]] += w[i] * w[j];
                }
            }
        }

        for j in 0..n {
            w[j] = -0.5 * sumpq * self.xopt[j];
            for k in 0..npt {
                w[j] += self.pq[k] * self.xpt[[k, j]];
                self.xpt[[k, j]] -= self.xopt[j];
            }
            for i in 0..=j {
                self.hq.add(i, j, w[i] * self.xopt[j] + self.xopt[i] * w[j]);
                bmat[[npt + i, j]] = bmat[[npt + j, i]];
            }
        }

        self.xbase += &self.xopt;
        *xnew -= &self.xopt;
        self.sl -= &self.xopt;
        self.su -= &self.xopt;
        self.xopt.fill(0.0);
    }

    /// Evaluates the Lagrange functions and the update denominator term
    /// `beta` at `xopt + d`.
    pub(super) fn lagrange_values(&self, d: ArrayView1<'_, f64>) -> Lagrange {
        let (n, npt) = (self.n(), self.npt());
        let bmat = &self.kkt.bmat;
        let zmat = &self.kkt.zmat;

        let mut vlag = Array1::<f64>::zeros(npt + n);
        let mut xpt_d = Array1::<f64>::zeros(npt);
        let mut w = Array1::<f64>::zeros(npt);
        for k in 0..npt {
            let row = self.xpt.row(k);
            let suma = row.dot(&d);
            let sumb = row.dot(&self.xopt);
            w[k] = suma * (0.5 * suma + sumb);
            vlag[k] = bmat.row(k).dot(&d);
            xpt_d[k] = suma;
        }

        let mut beta = 0.0;
        for jj in 0..zmat.ncols() {
            let column = zmat.column(jj);
            let sum = column.dot(&w);
            beta -= sum * sum;
            for k in 0..npt {
                vlag[k] += sum * column[k];
            }
        }

        let mut dsq = 0.0;
        let mut bsum = 0.0;
        let mut dx = 0.0;
        for j in 0..n {
            dsq += d[j] * d[j];
            let mut sum = bmat.column(j).slice(ndarray::s![..npt]).dot(&w);
            bsum += sum * d[j];
            sum += bmat.row(npt + j).dot(&d);
            vlag[npt + j] = sum;
            bsum += sum * d[j];
            dx += d[j] * self.xopt[j];
        }

        let xoptsq = self.xopt.dot(&self.xopt);
        beta = dx * dx + dsq * (xoptsq + dx + dx + 0.5 * dsq) + beta - bsum;
        vlag[self.kopt] += 1.0;

        Lagrange { vlag, beta, xpt_d }
    }

    /// Chooses the interpolation point to replace with a trust region step.
    ///
    /// Points are weighted by the update denominator and by their distance
    /// from `center`. Returns `None` when cancellation makes every choice
    /// unreliable.
    pub(super) fn select_discard(
        &self,
        lagrange: &Lagrange,
        delta: f64,
        center: ArrayView1<'_, f64>,
        skip: Option<usize>,
    ) -> Option<Discard> {
        let delsq = delta * delta;
        let mut scaden = 0.0;
        let mut biglsq = 0.0_f64;
        let mut chosen = None;

        for k in 0..self.npt() {
            if skip == Some(k) {
                continue;
            }
            let vlag = lagrange.vlag[k];
            let den = lagrange.beta * self.kkt.hdiag(k) + vlag * vlag;
            let distsq: f64 = self
                .xpt
                .row(k)
                .iter()
                .zip(center)
                .map(|(x, c)| (x - c) * (x - c))
                .sum();
            let weight = (distsq / delsq).powi(2).max(1.0);
            if weight * den > scaden {
                scaden = weight * den;
                chosen = Some(Discard { index: k, denom: den });
            }
            biglsq = biglsq.max(weight * vlag * vlag);
        }

        if scaden <= 0.5 * biglsq { None } else { chosen }
    }

    /// Replaces interpolation point `knew` by `xnew = xopt + d` with value `f`.
    ///
    /// `diff` is the model's error at the new point. The factorization, the
    /// model, and the best point all move to the new interpolation set.
    pub(super) fn replace_point(
        &mut self,
        knew: usize,
        xnew: &Array1<f64>,
        d: &Array1<f64>,
        f: f64,
        diff: f64,
        mut lagrange: Lagrange,
        denom: f64,
    ) {
        let (n, npt) = (self.n(), self.npt());
        let fopt = self.fopt();

        self.kkt.update(&mut lagrange.vlag, lagrange.beta, denom, knew);

        // The implicit part of the Hessian tied to the old point becomes explicit.
        let pqold = self.pq[knew];
        self.pq[knew] = 0.0;
        for i in 0..n {
            let temp = pqold * self.xpt[[knew, i]];
            for j in 0..=i {
                self.hq.add(i, j, temp * self.xpt[[knew, j]]);
            }
        }
        for jj in 0..self.kkt.zmat.ncols() {
            let temp = diff * self.kkt.zmat[[knew, jj]];
            for k in 0..npt {
                self.pq[k] += temp * self.kkt.zmat[[k, jj]];
            }
        }

        self.fval[knew] = f;
        self.xpt.row_mut(knew).assign(xnew);

        let mut w = self.kkt.bmat.row(knew).to_owned();
        for k in 0..npt {
            let suma = self.kkt.zmat.row(knew).dot(&self.kkt.zmat.row(k));
            let sumb = self.xpt.row(k).dot(&self.xopt);
            w.scaled_add(suma * sumb, &self.xpt.row(k));
        }
        self.gopt.scaled_add(diff, &w);

        if f < fopt {
            self.kopt = knew;
            self.xopt.assign(xnew);
            let shift = self.hessian_times(d.view());
            self.gopt += &shift;
        }
    }

    /// Builds the model of least Frobenius norm that interpolates the
    /// current function values, without installing it.
    pub(super) fn least_frobenius(&self) -> FrobeniusModel {
        let (n, npt) = (self.n(), self.npt());
        let fopt = self.fopt();
        let residual = self.fval.mapv(|f| f - fopt);

        let mut pq = Array1::<f64>::zeros(npt);
        for column in self.kkt.zmat.columns() {
            let sum = column.dot(&residual);
            pq.scaled_add(sum, &column);
        }
        let weights: Array1<f64> = (0..npt)
            .map(|k| self.xpt.row(k).dot(&self.xopt) * pq[k])
            .collect();

        let mut gradient = Array1::<f64>::zeros(n);
        let mut current_sq = 0.0;
        let mut alternative_sq = 0.0;
        for i in 0..n {
            let sum = self
                .kkt
                .bmat
                .column(i)
                .slice(ndarray::s![..npt])
                .dot(&residual)
                + self.xpt.column(i).dot(&weights);
            let (current, alternative) = if self.xopt[i] == self.sl[i] {
                (self.gopt[i].min(0.0), sum.min(0.0))
            } else if self.xopt[i] == self.su[i] {
                (self.gopt[i].max(0.0), sum.max(0.0))
            } else {
                (self.gopt[i], sum)
            };
            current_sq += current * current;
            alternative_sq += alternative * alternative;
            gradient[i] = sum;
        }

        FrobeniusModel {
            gradient,
            pq,
            current_sq,
            alternative_sq,
        }
    }

    /// Replaces the quadratic model by `model`.
    pub(super) fn install(&mut self, model: FrobeniusModel) {
        self.gopt = model.gradient;
        self.pq = model.pq;
        self.hq.set_zero();
    }

    /// Returns the largest gap between the model and the stored values over
    /// the interpolation set.
    #[cfg(test)]
    pub(super) fn interpolation_error(&self) -> f64 {
        let fopt = self.fopt();
        (0..self.npt())
            .map(|k| {
                let s = &self.xpt.row(k) - &self.xopt;
                let hs = self.hessian_times(s.view());
                let model = self.gopt.dot(&s) + 0.5 * s.dot(&hs);
                (model - (self.fval[k] - fopt)).abs()
            })
            .fold(0.0, f64::max)
    }
}
