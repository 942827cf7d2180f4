use super::{FaceBasis, Mapping, Projection, ShapeBuffer, ShapeFunctionFamily};
use crate::element::FaceKind;
use nalgebra::{Matrix2, Point2, Vector2};

/// The `hcurl` family: lowest-order Whitney edge functions `l_a grad(l_b) - l_b grad(l_a)`.
///
/// Each edge carries one function, oriented from the lower to the higher global vertex index
/// and normalized to a unit tangential integral along the edge. Only order 0 on triangles is
/// available.
#[derive(Debug, Copy, Clone, Default)]
pub struct HCurl;

impl ShapeFunctionFamily for HCurl {
    fn name(&self) -> &'static str {
        "hcurl"
    }

    fn value_dim(&self) -> usize {
        2
    }

    fn mapping(&self) -> Mapping {
        Mapping::Covariant
    }

    fn projection(&self) -> Projection {
        Projection::EdgeTangential
    }

    fn default_order(&self) -> u32 {
        0
    }

    fn check_order(&self, order: u32) {
        assert_eq!(order, 0, "hcurl fields only support interpolation order 0, got {}", order);
    }

    fn check_face(&self, kind: FaceKind) {
        assert_eq!(
            kind,
            FaceKind::Triangle,
            "hcurl fields are only available on triangles"
        );
    }

    fn num_vertex_functions(&self) -> usize {
        0
    }

    fn num_edge_functions(&self, _edge_order: u32) -> usize {
        1
    }

    fn num_face_functions(&self, _kind: FaceKind, _face_order: u32) -> usize {
        0
    }

    fn polynomial_degree(&self, _order: u32) -> u32 {
        1
    }

    fn evaluate(&self, basis: &FaceBasis, xi: &Point2<f64>, buffer: &mut ShapeBuffer) {
        self.check_face(basis.kind);
        buffer.clear();
        let (lambda, grad_lambda) = FaceKind::Triangle.vertex_functions(xi);
        for e in 0..3 {
            let [a, b] = basis.oriented_edge(e);
            let (ga, gb) = (grad_lambda[a], grad_lambda[b]);
            let value = Vector2::new(
                lambda[a] * gb[0] - lambda[b] * ga[0],
                lambda[a] * gb[1] - lambda[b] * ga[1],
            );
            // d w_c / d xi_d = d l_a / d xi_d * (grad l_b)_c - d l_b / d xi_d * (grad l_a)_c
            let gradient = Matrix2::from_fn(|c, d| ga[d] * gb[c] - gb[d] * ga[c]);
            buffer.values.push(value);
            buffer.gradients.push(gradient);
        }
    }
}
