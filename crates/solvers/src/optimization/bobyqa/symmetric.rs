use ndarray::{Array1, ArrayView1};

/// A dense symmetric matrix stored as its packed lower triangle.
///
/// Element `(i, j)` and element `(j, i)` share one storage slot, so the
/// matrix is symmetric by construction.
#[derive(Debug, Clone, PartialEq)]
pub(super) struct SymmetricMatrix {
    dim: usize,
    packed: Vec<f64>,
}

impl SymmetricMatrix {
    /// Creates a `dim × dim` zero matrix.
    pub(super) fn zeros(dim: usize) -> Self {
        Self {
            dim,
            packed: vec![0.0; dim * (dim + 1) / 2],
        }
    }

    fn slot(&self, i: usize, j: usize) -> usize {
        debug_assert!(i < self.dim && j < self.dim, "index out of range");
        let (row, col) = if i >= j { (i, j) } else { (j, i) };
        row * (row + 1) / 2 + col
    }

    pub(super) fn get(&self, i: usize, j: usize) -> f64 {
        self.packed[self.slot(i, j)]
    }

    pub(super) fn set(&mut self, i: usize, j: usize, value: f64) {
        let slot = self.slot(i, j);
        self.packed[slot] = value;
    }

    /// Adds `value` to element `(i, j)`, which is also element `(j, i)`.
    pub(super) fn add(&mut self, i: usize, j: usize, value: f64) {
        let slot = self.slot(i, j);
        self.packed[slot] += value;
    }

    pub(super) fn set_zero(&mut self) {
        self.packed.fill(0.0);
    }

    /// Returns the matrix-vector product `A·v`.
    pub(super) fn dot(&self, v: ArrayView1<'_, f64>) -> Array1<f64> {
        let mut out = Array1::zeros(self.dim);
        for j in 0..self.dim {
            for i in 0..j {
                let a = self.get(i, j);
                out[j] += a * v[i];
                out[i] += a * v[j];
            }
            out[j] += self.get(j, j) * v[j];
        }
        out
    }

    /// Returns `vᵀ·A·v`.
    pub(super) fn quadratic_form(&self, v: ArrayView1<'_, f64>) -> f64 {
        self.dot(v).dot(&v)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use approx::assert_relative_eq;
    use ndarray::{Array2, array};
    use proptest::prelude::*;

    #[test]
    fn off_diagonal_elements_share_storage() {
        let mut m = SymmetricMatrix::zeros(3);
        m.set(0, 2, 4.0);
        assert_relative_eq!(m.get(2, 0), 4.0);

        m.add(2, 0, 1.5);
        assert_relative_eq!(m.get(0, 2), 5.5);
        assert_relative_eq!(m.get(1, 1), 0.0);
    }

    #[test]
    fn matrix_vector_product() {
        // [[2, 1, 0], [1, 3, -1], [0, -1, 4]]
        let mut m = SymmetricMatrix::zeros(3);
        m.set(0, 0, 2.0);
        m.set(1, 0, 1.0);
        m.set(1, 1, 3.0);
        m.set(2, 1, -1.0);
        m.set(2, 2, 4.0);

        let v = array![1.0, -2.0, 0.5];
        let product = m.dot(v.view());

        assert_relative_eq!(product[0], 0.0);
        assert_relative_eq!(product[1], -5.5);
        assert_relative_eq!(product[2], 4.0);
        assert_relative_eq!(m.quadratic_form(v.view()), 13.0);
    }

    proptest! {
        #[test]
        fn product_matches_dense_symmetric(
            entries in prop::collection::vec(-10.0..10.0_f64, 10),
            v in prop::collection::vec(-10.0..10.0_f64, 4),
        ) {
            let mut m = SymmetricMatrix::zeros(4);
            let mut dense = Array2::<f64>::zeros((4, 4));
            let mut next = entries.iter();
            for i in 0..4 {
                for j in 0..=i {
                    let value = *next.next().unwrap();
                    m.set(j, i, value);
                    dense[[i, j]] = value;
                    dense[[j, i]] = value;
                }
            }

            let v = Array1::from(v);
            let expected = dense.dot(&v);
            let actual = m.dot(v.view());
            for i in 0..4 {
                prop_assert!((expected[i] - actual[i]).abs() <= 1e-9 * (1.0 + expected[i].abs()));
                for j in 0..4 {
                    prop_assert_eq!(m.get(i, j).to_bits(), m.get(j, i).to_bits());
                }
            }
        }
    }
}
