//! Legendre polynomials and their first two derivatives.
//!
//! All quantities are computed with three-term recurrences that remain valid on the closed
//! interval `[-1, 1]`, which the hierarchical shape functions need at element vertices.

/// Value, first and second derivative of the Legendre polynomials `L_0, ..., L_n` at a point.
#[derive(Debug, Clone, PartialEq)]
pub struct LegendreTable {
    values: Vec<f64>,
    derivatives: Vec<f64>,
    second_derivatives: Vec<f64>,
}

impl LegendreTable {
    /// Tabulates `L_k(x)`, `L_k'(x)` and `L_k''(x)` for `k = 0, ..., max_degree`.
    pub fn evaluate(max_degree: usize, x: f64) -> Self {
        let n = max_degree + 1;
        let mut values = vec![0.0; n];
        let mut derivatives = vec![0.0; n];
        let mut second_derivatives = vec![0.0; n];

        values[0] = 1.0;
        if n > 1 {
            values[1] = x;
            derivatives[1] = 1.0;
        }

        for k in 1..max_degree {
            let kf = k as f64;
            //  (k + 1) L_{k + 1} = (2k + 1) x L_k - k L_{k - 1}
            values[k + 1] = ((2.0 * kf + 1.0) * x * values[k] - kf * values[k - 1]) / (kf + 1.0);
            //  L'_{k + 1} = L'_{k - 1} + (2k + 1) L_k
            derivatives[k + 1] = derivatives[k - 1] + (2.0 * kf + 1.0) * values[k];
            second_derivatives[k + 1] = second_derivatives[k - 1] + (2.0 * kf + 1.0) * derivatives[k];
        }

        Self {
            values,
            derivatives,
            second_derivatives,
        }
    }

    pub fn max_degree(&self) -> usize {
        self.values.len() - 1
    }

    pub fn value(&self, k: usize) -> f64 {
        self.values[k]
    }

    pub fn derivative(&self, k: usize) -> f64 {
        self.derivatives[k]
    }

    pub fn second_derivative(&self, k: usize) -> f64 {
        self.second_derivatives[k]
    }
}

/// The integrated Legendre kernel `phi_k(x) = (L_k(x) - L_{k-2}(x)) / sqrt(2 (2k - 1))` and its
/// derivative `sqrt((2k - 1) / 2) L_{k-1}(x)`.
///
/// The kernels vanish at `x = -1` and `x = 1` and are the edge and bubble building blocks of
/// hierarchical H1 bases.
///
/// # Panics
///
/// Panics if `k < 2` or if the table does not contain degree `k`.
pub fn integrated_legendre(table: &LegendreTable, k: usize) -> (f64, f64) {
    assert!(k >= 2, "integrated Legendre kernels start at degree 2");
    let kf = k as f64;
    let scale = (2.0 * (2.0 * kf - 1.0)).sqrt();
    let value = (table.value(k) - table.value(k - 2)) / scale;
    let derivative = ((2.0 * kf - 1.0) / 2.0).sqrt() * table.value(k - 1);
    (value, derivative)
}

/// The kernel `psi_k` with `phi_k(x) = (1 - x^2) / 4 * psi_k(x)`, together with its derivative.
///
/// On triangles, edge functions are written as `l_a l_b psi_k(l_b - l_a)`, whose trace on the
/// edge coincides with `phi_k`.
///
/// # Panics
///
/// Panics if `k < 2` or if the table does not contain degree `k - 1`.
pub fn edge_kernel(table: &LegendreTable, k: usize) -> (f64, f64) {
    assert!(k >= 2, "edge kernels start at degree 2");
    let kf = k as f64;
    // L_k - L_{k-2} = (2k - 1) / (k (k - 1)) (x^2 - 1) L'_{k-1}
    let c = -4.0 * (2.0 * kf - 1.0) / (kf * (kf - 1.0) * (2.0 * (2.0 * kf - 1.0)).sqrt());
    (c * table.derivative(k - 1), c * table.second_derivative(k - 1))
}
