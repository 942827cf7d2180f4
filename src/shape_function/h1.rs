//! Hierarchical H1-conforming (nodal) functions built from integrated Legendre polynomials.

use super::{FaceBasis, Mapping, Projection, ShapeBuffer, ShapeFunctionFamily};
use crate::element::FaceKind;
use nalgebra::Point2;
use weakform_quadrature::legendre::{edge_kernel, integrated_legendre, LegendreTable};

/// The `h1` family.
///
/// Vertex functions are the linear (triangle) or bilinear (quadrilateral) hat functions.
/// An edge of order `q` carries `q - 1` functions whose trace is `phi_k(t)` for
/// `k = 2, ..., q`, with `t` running from the lower to the higher global vertex index, so
/// neighbouring faces agree on shared edges. Face bubbles complete the space to the
/// requested order.
#[derive(Debug, Copy, Clone, Default)]
pub struct H1;

fn sub(a: [f64; 2], b: [f64; 2]) -> [f64; 2] {
    [a[0] - b[0], a[1] - b[1]]
}

fn axpy(alpha: f64, a: [f64; 2], beta: f64, b: [f64; 2]) -> [f64; 2] {
    [alpha * a[0] + beta * b[0], alpha * a[1] + beta * b[1]]
}

impl H1 {
    fn evaluate_triangle(&self, basis: &FaceBasis, xi: &Point2<f64>, buffer: &mut ShapeBuffer) {
        let (values, gradients) = FaceKind::Triangle.vertex_functions(xi);
        let lambda = [values[0], values[1], values[2]];
        let grad_lambda = [gradients[0], gradients[1], gradients[2]];

        for v in 0..3 {
            buffer.push_scalar(lambda[v], grad_lambda[v]);
        }

        for e in 0..3 {
            let q = basis.edge_orders[e] as usize;
            if q < 2 {
                continue;
            }
            let [a, b] = basis.oriented_edge(e);
            let s = lambda[b] - lambda[a];
            let grad_s = sub(grad_lambda[b], grad_lambda[a]);
            let blend = lambda[a] * lambda[b];
            let grad_blend = axpy(lambda[b], grad_lambda[a], lambda[a], grad_lambda[b]);
            let table = LegendreTable::evaluate(q - 1, s);
            for k in 2..=q {
                let (psi, dpsi) = edge_kernel(&table, k);
                let gradient = axpy(psi, grad_blend, blend * dpsi, grad_s);
                buffer.push_scalar(blend * psi, gradient);
            }
        }

        let p = basis.face_order as usize;
        if p >= 3 {
            let bubble = lambda[0] * lambda[1] * lambda[2];
            let grad_bubble = [0, 1].map(|d| {
                grad_lambda[0][d] * lambda[1] * lambda[2]
                    + lambda[0] * grad_lambda[1][d] * lambda[2]
                    + lambda[0] * lambda[1] * grad_lambda[2][d]
            });
            let u = lambda[1] - lambda[0];
            let grad_u = sub(grad_lambda[1], grad_lambda[0]);
            let w = 2.0 * lambda[2] - 1.0;
            let grad_w = [2.0 * grad_lambda[2][0], 2.0 * grad_lambda[2][1]];
            let table_u = LegendreTable::evaluate(p - 3, u);
            let table_w = LegendreTable::evaluate(p - 3, w);
            for i in 0..=p - 3 {
                for j in 0..=p - 3 - i {
                    let (li, dli) = (table_u.value(i), table_u.derivative(i));
                    let (lj, dlj) = (table_w.value(j), table_w.derivative(j));
                    let gradient = [0, 1].map(|d| {
                        grad_bubble[d] * li * lj + bubble * (dli * grad_u[d] * lj + li * dlj * grad_w[d])
                    });
                    buffer.push_scalar(bubble * li * lj, gradient);
                }
            }
        }
    }

    fn evaluate_quadrilateral(&self, basis: &FaceBasis, xi: &Point2<f64>, buffer: &mut ShapeBuffer) {
        let (values, gradients) = FaceKind::Quadrilateral.vertex_functions(xi);
        for v in 0..4 {
            buffer.push_scalar(values[v], gradients[v]);
        }

        let (x, y) = (xi.x, xi.y);
        for e in 0..4 {
            let q = basis.edge_orders[e] as usize;
            if q < 2 {
                continue;
            }
            // Edge coordinate in local edge direction and the transverse linear blend
            let (mut t, mut grad_t, blend, grad_blend) = match e {
                0 => (x, [1.0, 0.0], 0.5 * (1.0 - y), [0.0, -0.5]),
                1 => (y, [0.0, 1.0], 0.5 * (1.0 + x), [0.5, 0.0]),
                2 => (-x, [-1.0, 0.0], 0.5 * (1.0 + y), [0.0, 0.5]),
                _ => (-y, [0.0, -1.0], 0.5 * (1.0 - x), [-0.5, 0.0]),
            };
            if !basis.edge_is_positive(e) {
                t = -t;
                grad_t = [-grad_t[0], -grad_t[1]];
            }
            let table = LegendreTable::evaluate(q, t);
            for k in 2..=q {
                let (phi, dphi) = integrated_legendre(&table, k);
                let gradient = axpy(dphi * blend, grad_t, phi, grad_blend);
                buffer.push_scalar(phi * blend, gradient);
            }
        }

        let p = basis.face_order as usize;
        if p >= 2 {
            let table_x = LegendreTable::evaluate(p, x);
            let table_y = LegendreTable::evaluate(p, y);
            for i in 2..=p {
                let (phi_i, dphi_i) = integrated_legendre(&table_x, i);
                for j in 2..=p {
                    let (phi_j, dphi_j) = integrated_legendre(&table_y, j);
                    buffer.push_scalar(phi_i * phi_j, [dphi_i * phi_j, phi_i * dphi_j]);
                }
            }
        }
    }
}

impl ShapeFunctionFamily for H1 {
    fn name(&self) -> &'static str {
        "h1"
    }

    fn value_dim(&self) -> usize {
        1
    }

    fn mapping(&self) -> Mapping {
        Mapping::Identity
    }

    fn projection(&self) -> Projection {
        Projection::Hierarchical
    }

    fn default_order(&self) -> u32 {
        1
    }

    fn check_order(&self, order: u32) {
        assert!(order >= 1, "h1 fields require an interpolation order of at least 1, got {}", order);
    }

    fn check_face(&self, _kind: FaceKind) {}

    fn num_vertex_functions(&self) -> usize {
        1
    }

    fn num_edge_functions(&self, edge_order: u32) -> usize {
        edge_order.saturating_sub(1) as usize
    }

    fn num_face_functions(&self, kind: FaceKind, face_order: u32) -> usize {
        let p = face_order as usize;
        match kind {
            FaceKind::Triangle if p >= 3 => (p - 1) * (p - 2) / 2,
            FaceKind::Quadrilateral if p >= 2 => (p - 1) * (p - 1),
            _ => 0,
        }
    }

    fn polynomial_degree(&self, order: u32) -> u32 {
        order
    }

    fn evaluate(&self, basis: &FaceBasis, xi: &Point2<f64>, buffer: &mut ShapeBuffer) {
        buffer.clear();
        match basis.kind {
            FaceKind::Triangle => self.evaluate_triangle(basis, xi, buffer),
            FaceKind::Quadrilateral => self.evaluate_quadrilateral(basis, xi, buffer),
        }
    }
}
