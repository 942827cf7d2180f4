use super::{FaceBasis, Mapping, Projection, ShapeBuffer, ShapeFunctionFamily};
use crate::element::FaceKind;
use nalgebra::Point2;

/// The `one` family: a single constant function per face.
#[derive(Debug, Copy, Clone, Default)]
pub struct One;

impl ShapeFunctionFamily for One {
    fn name(&self) -> &'static str {
        "one"
    }

    fn value_dim(&self) -> usize {
        1
    }

    fn mapping(&self) -> Mapping {
        Mapping::Identity
    }

    fn projection(&self) -> Projection {
        Projection::FaceMean
    }

    fn default_order(&self) -> u32 {
        0
    }

    fn check_order(&self, order: u32) {
        assert_eq!(order, 0, "one fields are piecewise constant, got interpolation order {}", order);
    }

    fn check_face(&self, _kind: FaceKind) {}

    fn num_vertex_functions(&self) -> usize {
        0
    }

    fn num_edge_functions(&self, _edge_order: u32) -> usize {
        0
    }

    fn num_face_functions(&self, _kind: FaceKind, _face_order: u32) -> usize {
        1
    }

    fn polynomial_degree(&self, _order: u32) -> u32 {
        0
    }

    fn evaluate(&self, _basis: &FaceBasis, _xi: &Point2<f64>, buffer: &mut ShapeBuffer) {
        buffer.clear();
        buffer.push_scalar(1.0, [0.0, 0.0]);
    }
}
