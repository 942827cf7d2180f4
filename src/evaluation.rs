//! Integration domains, physical quadrature points and fields evaluated on a face.
//!
//! Shared by assembly and the post-processing evaluators. Edges and vertices are integrated
//! through an adjacent face (the one with the lowest index), so that all fields and their
//! gradients are available on lower-dimensional domains.

use crate::dof::{CoefficientKey, FieldDiscretization};
use crate::element::FaceKind;
use crate::expression::{Environment, Leaf, ParameterId};
use crate::field::{Field, FieldId};
use crate::mesh::Mesh;
use crate::region::EntitySet;
use crate::shape_function::{FaceBasis, Mapping, ShapeBuffer, ShapeFunctionFamily};
use eyre::eyre;
use nalgebra::{Matrix2, Point2, Vector2};
use weakform_quadrature::univariate::gauss_for_degree;

/// A piece of a region that is integrated with one quadrature rule.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Domain {
    Face(usize),
    Edge { edge: usize, face: usize, local_edge: usize },
    Vertex { vertex: usize, face: usize, local_vertex: usize },
}

impl Domain {
    /// The face whose geometry and shape functions are used on this domain.
    pub fn face(&self) -> usize {
        match *self {
            Domain::Face(face) => face,
            Domain::Edge { face, .. } | Domain::Vertex { face, .. } => face,
        }
    }
}

/// The domains of a region's highest-dimensional entities.
pub fn integration_domains(mesh: &Mesh, entities: &EntitySet) -> Vec<Domain> {
    match entities.dimension() {
        Some(2) => entities.faces.iter().map(|&face| Domain::Face(face)).collect(),
        Some(1) => entities
            .edges
            .iter()
            .filter_map(|&edge| {
                let &face = mesh.edge_faces(edge).first()?;
                let local_edge = mesh.local_edge_index(face, edge)?;
                Some(Domain::Edge { edge, face, local_edge })
            })
            .collect(),
        Some(0) => {
            let mut vertex_faces = vec![None; mesh.vertices().len()];
            for (face_index, face) in mesh.faces().iter().enumerate().rev() {
                for (local_vertex, &vertex) in face.vertices().iter().enumerate() {
                    vertex_faces[vertex] = Some((face_index, local_vertex));
                }
            }
            entities
                .vertices
                .iter()
                .filter_map(|&vertex| {
                    let (face, local_vertex) = vertex_faces[vertex]?;
                    Some(Domain::Vertex {
                        vertex,
                        face,
                        local_vertex,
                    })
                })
                .collect()
        }
        _ => Vec::new(),
    }
}

/// A quadrature point with its physical data.
///
/// The weight includes the measure of the mapping. On vertices the weight is one, so
/// integrating over a set of vertices sums point values.
#[derive(Debug, Clone, PartialEq)]
pub struct QuadraturePoint {
    pub xi: Point2<f64>,
    pub x: Point2<f64>,
    pub jacobian_inverse: Matrix2<f64>,
    pub weight: f64,
    pub normal: Option<Vector2<f64>>,
}

/// Fills `points` with the quadrature points of a domain for the given polynomial degree.
pub fn quadrature_points(
    mesh: &Mesh,
    domain: &Domain,
    degree: usize,
    points: &mut Vec<QuadraturePoint>,
) -> eyre::Result<()> {
    points.clear();
    let face = domain.face();
    let geometry = mesh.face_geometry(face);
    let kind = geometry.kind();
    let inverse = |xi: &Point2<f64>| {
        let j = geometry.jacobian(xi);
        j.try_inverse()
            .map(|j_inv| (j, j_inv))
            .ok_or_else(|| eyre!("face {} has a singular Jacobian at reference point {}", face, xi))
    };

    match *domain {
        Domain::Face(_) => {
            let (weights, reference_points) = kind.quadrature(degree);
            for (w, xi) in weights.iter().zip(reference_points) {
                let xi = Point2::from(xi);
                let (j, jacobian_inverse) = inverse(&xi)?;
                points.push(QuadraturePoint {
                    xi,
                    x: geometry.map(&xi),
                    jacobian_inverse,
                    weight: w * j.determinant().abs(),
                    normal: None,
                });
            }
        }
        Domain::Edge { local_edge, .. } => {
            let (weights, parameters) = gauss_for_degree(degree);
            let normal = geometry.outward_normal(local_edge);
            for (w, [t]) in weights.iter().zip(parameters) {
                let xi = kind.edge_point(local_edge, t);
                let (j, jacobian_inverse) = inverse(&xi)?;
                let tangent = j * kind.edge_tangent(local_edge);
                points.push(QuadraturePoint {
                    xi,
                    x: geometry.map(&xi),
                    jacobian_inverse,
                    weight: w * tangent.norm(),
                    normal: Some(normal),
                });
            }
        }
        Domain::Vertex { local_vertex, .. } => {
            let xi = kind.reference_vertex(local_vertex);
            let (_, jacobian_inverse) = inverse(&xi)?;
            points.push(QuadraturePoint {
                xi,
                x: geometry.map(&xi),
                jacobian_inverse,
                weight: 1.0,
                normal: None,
            });
        }
    }
    Ok(())
}

/// A field restricted to one face: its local coefficients and its shape functions evaluated
/// at the current point.
#[derive(Debug, Clone)]
pub struct FaceField {
    field: FieldId,
    family: &'static dyn ShapeFunctionFamily,
    components: usize,
    basis: FaceBasis,
    keys: Vec<CoefficientKey>,
    coefficients: Vec<f64>,
    reference: ShapeBuffer,
    values: Vec<Vector2<f64>>,
    gradients: Vec<Matrix2<f64>>,
}

impl FaceField {
    pub fn new(
        mesh: &Mesh,
        face: usize,
        field_id: FieldId,
        field: &Field,
        discretization: &FieldDiscretization,
    ) -> Self {
        let (basis, _, keys) = discretization.local_layout(mesh, face);
        let coefficients = keys.iter().map(|key| field.coefficient(key)).collect();
        let field_type = discretization.field_type();
        Self {
            field: field_id,
            family: field_type.family(),
            components: field_type.components,
            basis,
            keys,
            coefficients,
            reference: ShapeBuffer::default(),
            values: Vec::new(),
            gradients: Vec::new(),
        }
    }

    pub fn field(&self) -> FieldId {
        self.field
    }

    pub fn kind(&self) -> FaceKind {
        self.basis.kind
    }

    /// Coefficient keys of the local DOFs.
    pub fn keys(&self) -> &[CoefficientKey] {
        &self.keys
    }

    pub fn num_local_dofs(&self) -> usize {
        self.keys.len()
    }

    /// Evaluates the physical shape functions at a point.
    pub fn evaluate_at(&mut self, point: &QuadraturePoint) {
        self.family.evaluate(&self.basis, &point.xi, &mut self.reference);
        let j_inv = &point.jacobian_inverse;
        self.values.clear();
        self.gradients.clear();
        match self.family.mapping() {
            Mapping::Identity => {
                self.values.extend_from_slice(&self.reference.values);
                self.gradients
                    .extend(self.reference.gradients.iter().map(|g| g * j_inv));
            }
            Mapping::Covariant => {
                let j_inv_t = j_inv.transpose();
                self.values
                    .extend(self.reference.values.iter().map(|v| j_inv_t * v));
                self.gradients
                    .extend(self.reference.gradients.iter().map(|g| j_inv_t * g * j_inv));
            }
        }
    }

    /// Value of a leaf for the shape function of a local DOF at the current point.
    pub fn shape_value(&self, local_dof: usize, leaf: &Leaf) -> f64 {
        let value_dim = self.family.value_dim();
        let (function, component) = (local_dof / self.components, local_dof % self.components);
        if component != leaf.component / value_dim {
            return 0.0;
        }
        let value_index = leaf.component % value_dim;
        match leaf.derivative {
            None => self.values[function][value_index],
            Some(direction) => self.gradients[function][(value_index, direction)],
        }
    }

    /// Value of a leaf for the field itself at the current point.
    pub fn value(&self, leaf: &Leaf) -> f64 {
        let component = leaf.component / self.family.value_dim();
        (0..self.values.len())
            .map(|function| {
                let local_dof = function * self.components + component;
                self.coefficients[local_dof] * self.shape_value(local_dof, leaf)
            })
            .sum()
    }
}

/// Leaf values at a quadrature point.
pub struct PointEnvironment<'a> {
    pub point: &'a QuadraturePoint,
    pub parameters: &'a [f64],
    pub fields: &'a [FaceField],
}

impl Environment for PointEnvironment<'_> {
    fn coordinate(&self, direction: usize) -> f64 {
        self.point.x.coords.get(direction).copied().unwrap_or(0.0)
    }

    fn normal(&self, direction: usize) -> f64 {
        match self.point.normal {
            Some(normal) => normal[direction],
            None => panic!("normal() is only defined on edges"),
        }
    }

    fn parameter(&self, parameter: ParameterId) -> f64 {
        self.parameters[parameter.0]
    }

    fn field(&self, leaf: &Leaf) -> f64 {
        self.fields
            .iter()
            .find(|f| f.field == leaf.field)
            .map(|f| f.value(leaf))
            .unwrap_or_else(|| panic!("field {:?} is not evaluated on this face", leaf.field))
    }
}
