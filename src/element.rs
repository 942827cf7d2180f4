//! Reference geometry of straight-sided triangles and quadrilaterals.
//!
//! The reference triangle has vertices `(0, 0)`, `(1, 0)` and `(0, 1)`, the reference
//! quadrilateral is `[-1, 1]^2` with counter-clockwise vertices starting at `(-1, -1)`.
//! Edges are parametrized by `t` in `[-1, 1]`, running from their first to their second
//! local vertex.

use nalgebra::{Matrix2, Point2, Vector2};
use serde::{Deserialize, Serialize};
use weakform_quadrature::simplex::triangle_gauss_for_degree;
use weakform_quadrature::tensor::quadrilateral_gauss_for_degree;
use weakform_quadrature::Rule2d;

const MAX_INVERSE_MAP_ITERATIONS: usize = 30;

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FaceKind {
    Triangle,
    Quadrilateral,
}

static TRIANGLE_EDGES: [[usize; 2]; 3] = [[0, 1], [1, 2], [2, 0]];
static QUADRILATERAL_EDGES: [[usize; 2]; 4] = [[0, 1], [1, 2], [2, 3], [3, 0]];

static TRIANGLE_VERTICES: [[f64; 2]; 3] = [[0.0, 0.0], [1.0, 0.0], [0.0, 1.0]];
static QUADRILATERAL_VERTICES: [[f64; 2]; 4] = [[-1.0, -1.0], [1.0, -1.0], [1.0, 1.0], [-1.0, 1.0]];

impl FaceKind {
    pub fn num_vertices(&self) -> usize {
        match self {
            Self::Triangle => 3,
            Self::Quadrilateral => 4,
        }
    }

    pub fn local_edges(&self) -> &'static [[usize; 2]] {
        match self {
            Self::Triangle => &TRIANGLE_EDGES,
            Self::Quadrilateral => &QUADRILATERAL_EDGES,
        }
    }

    pub fn reference_vertex(&self, v: usize) -> Point2<f64> {
        let [x, y] = match self {
            Self::Triangle => TRIANGLE_VERTICES[v],
            Self::Quadrilateral => QUADRILATERAL_VERTICES[v],
        };
        Point2::new(x, y)
    }

    /// Reference area.
    pub fn reference_measure(&self) -> f64 {
        match self {
            Self::Triangle => 0.5,
            Self::Quadrilateral => 4.0,
        }
    }

    /// The reference point at parameter `t` on local edge `e`.
    pub fn edge_point(&self, e: usize, t: f64) -> Point2<f64> {
        let [a, b] = self.local_edges()[e];
        let (pa, pb) = (self.reference_vertex(a), self.reference_vertex(b));
        Point2::from(pa.coords * (0.5 * (1.0 - t)) + pb.coords * (0.5 * (1.0 + t)))
    }

    /// Derivative of [`FaceKind::edge_point`] with respect to `t`.
    pub fn edge_tangent(&self, e: usize) -> Vector2<f64> {
        let [a, b] = self.local_edges()[e];
        0.5 * (self.reference_vertex(b) - self.reference_vertex(a))
    }

    pub fn contains_reference_point(&self, xi: &Point2<f64>, tolerance: f64) -> bool {
        match self {
            Self::Triangle => xi.x >= -tolerance && xi.y >= -tolerance && xi.x + xi.y <= 1.0 + tolerance,
            Self::Quadrilateral => xi.x.abs() <= 1.0 + tolerance && xi.y.abs() <= 1.0 + tolerance,
        }
    }

    /// A rule integrating polynomials of the given degree exactly on the reference face.
    ///
    /// On quadrilaterals the degree applies per variable.
    pub fn quadrature(&self, degree: usize) -> Rule2d {
        match self {
            Self::Triangle => triangle_gauss_for_degree(degree),
            Self::Quadrilateral => quadrilateral_gauss_for_degree(degree),
        }
    }

    /// Values and reference gradients of the geometric (linear / bilinear) vertex functions.
    pub fn vertex_functions(&self, xi: &Point2<f64>) -> ([f64; 4], [[f64; 2]; 4]) {
        let (x, y) = (xi.x, xi.y);
        match self {
            Self::Triangle => (
                [1.0 - x - y, x, y, 0.0],
                [[-1.0, -1.0], [1.0, 0.0], [0.0, 1.0], [0.0, 0.0]],
            ),
            Self::Quadrilateral => {
                let mut values = [0.0; 4];
                let mut gradients = [[0.0; 2]; 4];
                for (v, [xv, yv]) in QUADRILATERAL_VERTICES.iter().copied().enumerate() {
                    values[v] = 0.25 * (1.0 + xv * x) * (1.0 + yv * y);
                    gradients[v] = [0.25 * xv * (1.0 + yv * y), 0.25 * yv * (1.0 + xv * x)];
                }
                (values, gradients)
            }
        }
    }
}

/// A face with concrete vertex coordinates.
#[derive(Debug, Clone, PartialEq)]
pub struct FaceGeometry {
    kind: FaceKind,
    vertices: [Point2<f64>; 4],
}

impl FaceGeometry {
    /// # Panics
    ///
    /// Panics if the number of vertices does not match the kind.
    pub fn new(kind: FaceKind, vertices: &[Point2<f64>]) -> Self {
        assert_eq!(vertices.len(), kind.num_vertices(), "vertex count does not match face kind");
        let mut padded = [Point2::origin(); 4];
        padded[..vertices.len()].copy_from_slice(vertices);
        Self { kind, vertices: padded }
    }

    pub fn kind(&self) -> FaceKind {
        self.kind
    }

    pub fn vertices(&self) -> &[Point2<f64>] {
        &self.vertices[..self.kind.num_vertices()]
    }

    pub fn map(&self, xi: &Point2<f64>) -> Point2<f64> {
        let (values, _) = self.kind.vertex_functions(xi);
        let mut x = Vector2::zeros();
        for (v, vertex) in self.vertices().iter().enumerate() {
            x += values[v] * vertex.coords;
        }
        Point2::from(x)
    }

    /// The Jacobian `dx / dxi`, with columns holding the derivatives along each reference
    /// direction.
    pub fn jacobian(&self, xi: &Point2<f64>) -> Matrix2<f64> {
        let (_, gradients) = self.kind.vertex_functions(xi);
        let mut j = Matrix2::zeros();
        for (v, vertex) in self.vertices().iter().enumerate() {
            let [dx, dy] = gradients[v];
            j += vertex.coords * Vector2::new(dx, dy).transpose();
        }
        j
    }

    /// Signed area of the face.
    pub fn area(&self) -> f64 {
        let vertices = self.vertices();
        let n = vertices.len();
        let twice_area: f64 = (0..n)
            .map(|i| {
                let (a, b) = (vertices[i], vertices[(i + 1) % n]);
                a.x * b.y - b.x * a.y
            })
            .sum();
        0.5 * twice_area
    }

    pub fn centroid(&self) -> Point2<f64> {
        let sum = self
            .vertices()
            .iter()
            .fold(Vector2::zeros(), |acc, v| acc + v.coords);
        Point2::from(sum / self.vertices().len() as f64)
    }

    /// Axis-aligned bounds `(min, max)`.
    pub fn bounds(&self) -> ([f64; 2], [f64; 2]) {
        let mut min = [f64::INFINITY; 2];
        let mut max = [f64::NEG_INFINITY; 2];
        for v in self.vertices() {
            for i in 0..2 {
                min[i] = min[i].min(v[i]);
                max[i] = max[i].max(v[i]);
            }
        }
        (min, max)
    }

    /// Physical endpoints of local edge `e`.
    pub fn edge_vertices(&self, e: usize) -> [Point2<f64>; 2] {
        let [a, b] = self.kind.local_edges()[e];
        [self.vertices[a], self.vertices[b]]
    }

    /// Outward unit normal on local edge `e` of a counter-clockwise face.
    pub fn outward_normal(&self, e: usize) -> Vector2<f64> {
        let [a, b] = self.edge_vertices(e);
        let t = b - a;
        Vector2::new(t.y, -t.x).normalize()
    }

    /// Finds the reference coordinates of a physical point.
    ///
    /// Returns `None` if the map could not be inverted (degenerate face). The result may lie
    /// outside the reference face, use [`FaceKind::contains_reference_point`] to check.
    pub fn map_inverse(&self, x: &Point2<f64>) -> Option<Point2<f64>> {
        let mut xi = match self.kind {
            FaceKind::Triangle => Point2::new(1.0 / 3.0, 1.0 / 3.0),
            FaceKind::Quadrilateral => Point2::origin(),
        };
        // Exact after one step on triangles
        for _ in 0..MAX_INVERSE_MAP_ITERATIONS {
            let residual = x - self.map(&xi);
            let step = self.jacobian(&xi).try_inverse()? * residual;
            xi += step;
            if step.norm() <= 1e-14 {
                return Some(xi);
            }
        }
        let residual = x - self.map(&xi);
        let scale = self.bounds().1[0] - self.bounds().0[0] + self.bounds().1[1] - self.bounds().0[1];
        (residual.norm() <= 1e-10 * scale).then_some(xi)
    }
}
