//! Degrees of freedom: coefficient keys, per-field discretizations, global numbering and the
//! projection of constraint values onto coefficients.

use crate::element::FaceGeometry;
use crate::expression::{evaluate, Environment, Expr, Leaf, ParameterId};
use crate::field::{Constraint, Field, FieldId};
use crate::mesh::Mesh;
use crate::region::{EntitySet, RegionTable};
use crate::shape_function::{FaceBasis, FieldType, LocalEntity, LocalFunction, Projection, ShapeBuffer};
use itertools::Itertools;
use nalgebra::{DMatrix, DVector, Point2};
use rustc_hash::FxHashMap;
use std::collections::{BTreeMap, BTreeSet};
use weakform_quadrature::legendre::{integrated_legendre, LegendreTable};
use weakform_quadrature::univariate::gauss_for_degree;

/// A mesh entity by global index.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Entity {
    Vertex(usize),
    Edge(usize),
    Face(usize),
}

/// Identifies one coefficient of a field: the entity, the function index on that entity and
/// the field component.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CoefficientKey {
    pub entity: Entity,
    pub function: usize,
    pub component: usize,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DofKey {
    pub field: FieldId,
    pub key: CoefficientKey,
}

/// The resolved entity orders of one field on the current mesh.
#[derive(Debug, Clone)]
pub struct FieldDiscretization {
    field_type: FieldType,
    face_orders: Vec<u32>,
    /// Index of the order declaration covering each face, `0` for the default order.
    face_groups: Vec<usize>,
    edge_orders: Vec<u32>,
}

impl FieldDiscretization {
    /// Resolves orders with the latest declaration covering an entity winning.
    ///
    /// Declarations on regions with faces set face orders, declarations on regions with only
    /// edges raise edge orders. An edge takes the maximum over its adjacent faces.
    pub fn new(mesh: &Mesh, regions: &RegionTable, field: &Field) -> Self {
        let field_type = field.field_type();
        let default_order = field_type.family().default_order();
        let mut face_orders = vec![default_order; mesh.faces().len()];
        let mut face_groups = vec![0; mesh.faces().len()];
        let mut explicit_edge_orders = vec![None; mesh.edges().len()];

        for (declaration, (region, &order)) in field.orders().iter().enumerate() {
            let entities = regions.resolve(mesh, region);
            if !entities.faces.is_empty() {
                for &face in &entities.faces {
                    face_orders[face] = order;
                    face_groups[face] = declaration + 1;
                }
            } else {
                for &edge in &entities.edges {
                    explicit_edge_orders[edge] = Some(order);
                }
            }
        }

        let edge_orders = (0..mesh.edges().len())
            .map(|edge| {
                let adjacent = mesh
                    .edge_faces(edge)
                    .iter()
                    .map(|&face| face_orders[face])
                    .max()
                    .unwrap_or(default_order);
                explicit_edge_orders[edge].map_or(adjacent, |order: u32| order.max(adjacent))
            })
            .collect();

        Self {
            field_type,
            face_orders,
            face_groups,
            edge_orders,
        }
    }

    pub fn field_type(&self) -> FieldType {
        self.field_type
    }

    pub fn face_order(&self, face: usize) -> u32 {
        self.face_orders[face]
    }

    pub fn edge_order(&self, edge: usize) -> u32 {
        self.edge_orders[edge]
    }

    pub fn face_group(&self, face: usize) -> usize {
        self.face_groups[face]
    }

    pub fn face_basis(&self, mesh: &Mesh, face: usize) -> FaceBasis {
        let mut edge_orders = [0; 4];
        for (e, &edge) in mesh.face_edges(face).iter().enumerate() {
            edge_orders[e] = self.edge_orders[edge];
        }
        FaceBasis {
            kind: mesh.face(face).kind(),
            vertices: mesh.face(face).padded_vertices(),
            face_order: self.face_orders[face],
            edge_orders,
        }
    }

    /// The global entity a local function of a face is attached to.
    pub fn global_entity(&self, mesh: &Mesh, face: usize, local: &LocalFunction) -> Entity {
        match local.entity {
            LocalEntity::Vertex(v) => Entity::Vertex(mesh.face(face).vertices()[v]),
            LocalEntity::Edge(e) => Entity::Edge(mesh.face_edges(face)[e]),
            LocalEntity::Face => Entity::Face(face),
        }
    }

    /// Basis, local functions and coefficient keys of a face.
    ///
    /// Keys are ordered by local function, then by component.
    ///
    /// # Panics
    ///
    /// Panics if the field's family does not support the face kind.
    pub fn local_layout(&self, mesh: &Mesh, face: usize) -> (FaceBasis, Vec<LocalFunction>, Vec<CoefficientKey>) {
        let family = self.field_type.family();
        family.check_face(mesh.face(face).kind());
        let basis = self.face_basis(mesh, face);
        let functions = basis.local_functions(family);
        let keys = functions
            .iter()
            .flat_map(|local| {
                let entity = self.global_entity(mesh, face, local);
                (0..self.field_type.components).map(move |component| CoefficientKey {
                    entity,
                    function: local.index,
                    component,
                })
            })
            .collect();
        (basis, functions, keys)
    }

    /// Coefficients fixed by the field's constraints, applied in declaration order.
    pub fn constrained_coefficients(
        &self,
        mesh: &Mesh,
        regions: &RegionTable,
        field: &Field,
        parameters: &[f64],
    ) -> FxHashMap<CoefficientKey, f64> {
        let mut fixed = FxHashMap::default();
        for (region, constraint) in field.constraints().iter() {
            let entities = regions.resolve(mesh, region).closure(mesh);
            let values = match constraint {
                Constraint::Zero => vec![Expr::Constant(0.0); self.field_type.value_len()],
                Constraint::Value(array) => array.entries().to_vec(),
            };
            fixed.extend(self.project(mesh, &entities, &values, parameters));
        }
        fixed
    }

    /// Coefficients on the given entities approximating point values, one expression per value
    /// component.
    ///
    /// Hierarchical families interpolate at vertices and project the remainder on edges and
    /// faces. Tangential families integrate along edges, piecewise constant families average
    /// over faces.
    pub fn project(
        &self,
        mesh: &Mesh,
        entities: &EntitySet,
        values: &[Expr],
        parameters: &[f64],
    ) -> Vec<(CoefficientKey, f64)> {
        let projector = ConstraintProjector {
            discretization: self,
            mesh,
            values,
            parameters,
        };
        projector.project(entities)
    }
}

struct ConstraintEnvironment<'a> {
    x: Point2<f64>,
    parameters: &'a [f64],
}

impl Environment for ConstraintEnvironment<'_> {
    fn coordinate(&self, direction: usize) -> f64 {
        self.x.coords.get(direction).copied().unwrap_or(0.0)
    }

    fn normal(&self, _direction: usize) -> f64 {
        panic!("normals are not available in constraint values")
    }

    fn parameter(&self, parameter: ParameterId) -> f64 {
        self.parameters[parameter.0]
    }

    fn field(&self, _leaf: &Leaf) -> f64 {
        panic!("field values are not available in constraint values")
    }
}

struct ConstraintProjector<'a> {
    discretization: &'a FieldDiscretization,
    mesh: &'a Mesh,
    values: &'a [Expr],
    parameters: &'a [f64],
}

impl ConstraintProjector<'_> {
    fn evaluate(&self, x: Point2<f64>) -> Vec<f64> {
        let env = ConstraintEnvironment {
            x,
            parameters: self.parameters,
        };
        self.values.iter().map(|value| evaluate(value, &env)).collect()
    }

    fn project(&self, entities: &EntitySet) -> Vec<(CoefficientKey, f64)> {
        match self.discretization.field_type.family().projection() {
            Projection::Hierarchical => self.project_hierarchical(entities),
            Projection::EdgeTangential => self.project_tangential(entities),
            Projection::FaceMean => self.project_mean(entities),
        }
    }

    fn project_hierarchical(&self, entities: &EntitySet) -> Vec<(CoefficientKey, f64)> {
        let components = self.discretization.field_type.components;
        let mut fixed = Vec::new();

        let vertex_values: FxHashMap<usize, Vec<f64>> = entities
            .vertices
            .iter()
            .map(|&v| (v, self.evaluate(self.mesh.vertices()[v])))
            .collect();
        for &v in &entities.vertices {
            let values = &vertex_values[&v];
            for c in 0..components {
                fixed.push((key(Entity::Vertex(v), 0, c), values[c]));
            }
        }

        // Rows are edge functions, columns components
        let mut edge_coefficients: FxHashMap<usize, DMatrix<f64>> = FxHashMap::default();
        for &edge in &entities.edges {
            let q = self.discretization.edge_orders[edge] as usize;
            if q < 2 {
                continue;
            }
            let [lo, hi] = self.mesh.edges()[edge];
            let (x_lo, x_hi) = (self.mesh.vertices()[lo], self.mesh.vertices()[hi]);
            let (g_lo, g_hi) = (self.evaluate(x_lo), self.evaluate(x_hi));
            let n = q - 1;
            let mut mass = DMatrix::zeros(n, n);
            let mut rhs = DMatrix::zeros(n, components);
            let (weights, points) = gauss_for_degree(2 * q + 2);
            for (w, [t]) in weights.iter().zip(points) {
                let s = 0.5 * (1.0 + t);
                let g = self.evaluate(Point2::from(x_lo.coords * (1.0 - s) + x_hi.coords * s));
                let table = LegendreTable::evaluate(q, t);
                let phi = (2..=q).map(|k| integrated_legendre(&table, k).0).collect_vec();
                for i in 0..n {
                    for j in 0..n {
                        mass[(i, j)] += w * phi[i] * phi[j];
                    }
                    for c in 0..components {
                        let remainder = g[c] - g_lo[c] * (1.0 - s) - g_hi[c] * s;
                        rhs[(i, c)] += w * remainder * phi[i];
                    }
                }
            }
            let coefficients = solve_spd(mass, rhs);
            for i in 0..n {
                for c in 0..components {
                    fixed.push((key(Entity::Edge(edge), i, c), coefficients[(i, c)]));
                }
            }
            edge_coefficients.insert(edge, coefficients);
        }

        let family = self.discretization.field_type.family();
        let mut buffer = ShapeBuffer::default();
        for &face in &entities.faces {
            let basis = self.discretization.face_basis(self.mesh, face);
            let num_bubbles = family.num_face_functions(basis.kind, basis.face_order);
            if num_bubbles == 0 {
                continue;
            }
            let functions = basis.local_functions(family);
            let geometry = self.mesh.face_geometry(face);
            let p = basis.face_order as usize;
            let (weights, points) = basis.kind.quadrature(2 * p + 2);
            let mut mass = DMatrix::zeros(num_bubbles, num_bubbles);
            let mut rhs = DMatrix::zeros(num_bubbles, components);
            for (w, xi) in weights.iter().zip(points) {
                let xi = Point2::from(xi);
                let dx = w * geometry.jacobian(&xi).determinant().abs();
                let g = self.evaluate(geometry.map(&xi));
                family.evaluate(&basis, &xi, &mut buffer);

                let mut remainder = g;
                let mut bubbles = Vec::with_capacity(num_bubbles);
                for (local, value) in functions.iter().zip(&buffer.values) {
                    match self.discretization.global_entity(self.mesh, face, local) {
                        Entity::Vertex(v) => {
                            for c in 0..components {
                                remainder[c] -= vertex_values[&v][c] * value.x;
                            }
                        }
                        Entity::Edge(edge) => {
                            if let Some(coefficients) = edge_coefficients.get(&edge) {
                                for c in 0..components {
                                    remainder[c] -= coefficients[(local.index, c)] * value.x;
                                }
                            }
                        }
                        Entity::Face(_) => bubbles.push(value.x),
                    }
                }
                for i in 0..num_bubbles {
                    for j in 0..num_bubbles {
                        mass[(i, j)] += dx * bubbles[i] * bubbles[j];
                    }
                    for c in 0..components {
                        rhs[(i, c)] += dx * remainder[c] * bubbles[i];
                    }
                }
            }
            let coefficients = solve_spd(mass, rhs);
            for i in 0..num_bubbles {
                for c in 0..components {
                    fixed.push((key(Entity::Face(face), i, c), coefficients[(i, c)]));
                }
            }
        }
        fixed
    }

    fn project_tangential(&self, entities: &EntitySet) -> Vec<(CoefficientKey, f64)> {
        let (weights, points) = gauss_for_degree(8);
        entities
            .edges
            .iter()
            .map(|&edge| {
                let [lo, hi] = self.mesh.edges()[edge];
                let (x_lo, x_hi) = (self.mesh.vertices()[lo], self.mesh.vertices()[hi]);
                let half_tangent = 0.5 * (x_hi - x_lo);
                let circulation: f64 = weights
                    .iter()
                    .zip(&points)
                    .map(|(w, [t])| {
                        let s = 0.5 * (1.0 + t);
                        let g = self.evaluate(Point2::from(x_lo.coords * (1.0 - s) + x_hi.coords * s));
                        w * (g[0] * half_tangent.x + g[1] * half_tangent.y)
                    })
                    .sum();
                (key(Entity::Edge(edge), 0, 0), circulation)
            })
            .collect()
    }

    fn project_mean(&self, entities: &EntitySet) -> Vec<(CoefficientKey, f64)> {
        let components = self.discretization.field_type.components;
        let mut fixed = Vec::new();
        for &face in &entities.faces {
            let geometry: FaceGeometry = self.mesh.face_geometry(face);
            let (weights, points) = geometry.kind().quadrature(6);
            let mut area = 0.0;
            let mut integral = vec![0.0; components];
            for (w, xi) in weights.iter().zip(points) {
                let xi = Point2::from(xi);
                let dx = w * geometry.jacobian(&xi).determinant().abs();
                let g = self.evaluate(geometry.map(&xi));
                area += dx;
                for c in 0..components {
                    integral[c] += dx * g[c];
                }
            }
            for c in 0..components {
                fixed.push((key(Entity::Face(face), 0, c), integral[c] / area));
            }
        }
        fixed
    }
}

fn key(entity: Entity, function: usize, component: usize) -> CoefficientKey {
    CoefficientKey {
        entity,
        function,
        component,
    }
}

fn solve_spd(matrix: DMatrix<f64>, rhs: DMatrix<f64>) -> DMatrix<f64> {
    matrix
        .cholesky()
        .map(|cholesky| cholesky.solve(&rhs))
        .unwrap_or_else(|| panic!("projection mass matrix is not positive definite"))
}

/// Where a DOF ended up in the global system.
#[derive(Debug, Copy, Clone, PartialEq)]
pub enum GlobalDof {
    /// Index of an unknown.
    Free(usize),
    /// A constrained DOF with its known value.
    Fixed(f64),
}

/// The global numbering of unknowns for one assembly.
#[derive(Debug, Clone, Default)]
pub struct DofNumbering {
    indices: FxHashMap<DofKey, usize>,
    keys: Vec<DofKey>,
    fixed: FxHashMap<DofKey, f64>,
}

impl DofNumbering {
    /// Numbers the DOFs of the given fields on their support faces.
    ///
    /// Fields are visited in id order. Faces of a field are grouped by the order declaration
    /// covering them, default-order faces first. Within a face, keys are visited vertices
    /// first, then edges, then the face, and the first visit of a key numbers it. Constrained
    /// keys receive their fixed value instead of an index.
    pub fn build(
        mesh: &Mesh,
        regions: &RegionTable,
        fields: &[Field],
        discretizations: &[FieldDiscretization],
        support: &BTreeMap<FieldId, BTreeSet<usize>>,
        parameters: &[f64],
    ) -> Self {
        let mut numbering = Self::default();
        for (&field_id, faces) in support {
            let discretization = &discretizations[field_id.0];
            let constrained =
                discretization.constrained_coefficients(mesh, regions, &fields[field_id.0], parameters);
            let ordered_faces = faces
                .iter()
                .copied()
                .sorted_by_key(|&face| (discretization.face_group(face), face));
            for face in ordered_faces {
                let (_, _, keys) = discretization.local_layout(mesh, face);
                for key in keys {
                    let dof = DofKey { field: field_id, key };
                    if numbering.indices.contains_key(&dof) || numbering.fixed.contains_key(&dof) {
                        continue;
                    }
                    match constrained.get(&key) {
                        Some(&value) => {
                            numbering.fixed.insert(dof, value);
                        }
                        None => {
                            numbering.indices.insert(dof, numbering.keys.len());
                            numbering.keys.push(dof);
                        }
                    }
                }
            }
        }
        numbering
    }

    pub fn num_unknowns(&self) -> usize {
        self.keys.len()
    }

    pub fn num_fixed(&self) -> usize {
        self.fixed.len()
    }

    /// Keys of the unknowns, by index.
    pub fn keys(&self) -> &[DofKey] {
        &self.keys
    }

    pub fn lookup(&self, dof: &DofKey) -> Option<GlobalDof> {
        self.indices
            .get(dof)
            .map(|&index| GlobalDof::Free(index))
            .or_else(|| self.fixed.get(dof).map(|&value| GlobalDof::Fixed(value)))
    }

    /// Stores a solution vector and the fixed values into the fields.
    ///
    /// # Panics
    ///
    /// Panics if the solution length differs from the number of unknowns.
    pub fn write_solution(&self, fields: &mut [Field], solution: &DVector<f64>) {
        assert_eq!(solution.len(), self.keys.len(), "solution length does not match number of unknowns");
        for (dof, value) in self.keys.iter().zip(solution.iter()) {
            fields[dof.field.0].set_coefficient(dof.key, *value);
        }
        for (dof, value) in &self.fixed {
            fields[dof.field.0].set_coefficient(dof.key, *value);
        }
    }
}
