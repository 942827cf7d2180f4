//! The shape-function type registry and the basis families it indexes.
//!
//! Function spaces are declared by name (`"h1"`, `"hcurl"`, `"one"`, optionally followed by a
//! component suffix, see [`FieldType`]) and referred to internally by their catalog index.
//! The index selects a [`ShapeFunctionFamily`], which enumerates and evaluates the local
//! shape functions of a face.
//!
//! Lookups of unknown names or indices are programmer errors and panic. Callers validating
//! user input should use [`try_type_number`] and [`try_type_name`] instead.

use crate::element::FaceKind;
use nalgebra::{Matrix2, Point2, Vector2};
use std::fmt;
use std::fmt::{Debug, Display, Formatter};

mod h1;
mod hcurl;
mod one;

pub use h1::H1;
pub use hcurl::HCurl;
pub use one::One;

/// Basis family names, in index order.
const CATALOG: [&str; 3] = ["h1", "hcurl", "one"];

static FAMILIES: [&(dyn ShapeFunctionFamily); 3] = [&H1, &HCurl, &One];

/// An entry of the shape-function type catalog.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct ShapeFunctionType {
    name: &'static str,
    index: usize,
}

impl ShapeFunctionType {
    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn family(&self) -> &'static dyn ShapeFunctionFamily {
        FAMILIES[self.index]
    }
}

/// Iterates over the catalog in index order.
pub fn catalog() -> impl Iterator<Item = ShapeFunctionType> {
    CATALOG
        .iter()
        .enumerate()
        .map(|(index, &name)| ShapeFunctionType { name, index })
}

pub fn num_types() -> usize {
    CATALOG.len()
}

#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum RegistryError {
    UnknownTypeName(String),
    UnknownTypeIndex(usize),
}

impl Display for RegistryError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownTypeName(name) => {
                write!(f, "unknown shape function type name '{}'", name)?;
                write!(f, " (known types: {})", CATALOG.join(", "))
            }
            Self::UnknownTypeIndex(index) => write!(
                f,
                "shape function type index {} is out of range (catalog has {} entries)",
                index,
                CATALOG.len()
            ),
        }
    }
}

impl std::error::Error for RegistryError {}

pub fn try_type_number(name: &str) -> Result<usize, RegistryError> {
    CATALOG
        .iter()
        .position(|&candidate| candidate == name)
        .ok_or_else(|| RegistryError::UnknownTypeName(name.to_string()))
}

pub fn try_type_name(index: usize) -> Result<&'static str, RegistryError> {
    CATALOG
        .get(index)
        .copied()
        .ok_or(RegistryError::UnknownTypeIndex(index))
}

/// Resolves a basis family name to its catalog index.
///
/// # Panics
///
/// Panics if the name is not in the catalog.
pub fn type_number(name: &str) -> usize {
    try_type_number(name).unwrap_or_else(|err| panic!("Error in shape function registry: {}", err))
}

/// Resolves a catalog index to the basis family name.
///
/// # Panics
///
/// Panics if the index is out of range.
pub fn type_name(index: usize) -> &'static str {
    try_type_name(index).unwrap_or_else(|err| panic!("Error in shape function registry: {}", err))
}

/// The family implementing the catalog entry with the given index.
///
/// # Panics
///
/// Panics if the index is out of range.
pub fn family(index: usize) -> &'static dyn ShapeFunctionFamily {
    type_name(index);
    FAMILIES[index]
}

/// A field type name: a catalog family plus a component count.
///
/// Scalar-valued families accept the suffixes `xy` (2 components) and `xyz` (3 components),
/// so `h1xy` is a two-component nodal field. Vector-valued families take no suffix.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct FieldType {
    pub family: usize,
    pub components: usize,
}

impl FieldType {
    pub fn try_parse(name: &str) -> Result<Self, RegistryError> {
        let (base, components) = if let Some(base) = name.strip_suffix("xyz") {
            (base, 3)
        } else if let Some(base) = name.strip_suffix("xy") {
            (base, 2)
        } else {
            (name, 1)
        };
        let family_index =
            try_type_number(base).map_err(|_| RegistryError::UnknownTypeName(name.to_string()))?;
        if components > 1 && FAMILIES[family_index].value_dim() > 1 {
            return Err(RegistryError::UnknownTypeName(name.to_string()));
        }
        Ok(Self {
            family: family_index,
            components,
        })
    }

    /// # Panics
    ///
    /// Panics if the name does not denote a known field type.
    pub fn parse(name: &str) -> Self {
        Self::try_parse(name).unwrap_or_else(|err| panic!("Error in shape function registry: {}", err))
    }

    pub fn family(&self) -> &'static dyn ShapeFunctionFamily {
        FAMILIES[self.family]
    }

    /// Number of scalar values a field of this type has at a point.
    pub fn value_len(&self) -> usize {
        self.components * self.family().value_dim()
    }
}

/// How reference values are transformed to physical values.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Mapping {
    /// Values are unchanged, gradients transform with the inverse Jacobian.
    Identity,
    /// Covariant Piola mapping `v = J^{-T} v_ref`, preserving tangential traces.
    Covariant,
}

/// How fixed values are converted into coefficients of a family.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Projection {
    /// Vertex values, then L2 projections of the remainder on edges and faces.
    Hierarchical,
    /// Tangential line integrals along the globally oriented edges.
    EdgeTangential,
    /// Mean value over each face.
    FaceMean,
}

/// The mesh entity a local shape function is attached to, in face-local numbering.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum LocalEntity {
    Vertex(usize),
    Edge(usize),
    Face,
}

/// A local shape function: its entity and its index among the functions of that entity.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct LocalFunction {
    pub entity: LocalEntity,
    pub index: usize,
}

/// Everything a family needs to enumerate and evaluate the shape functions of one face.
#[derive(Debug, Clone, PartialEq)]
pub struct FaceBasis {
    pub kind: FaceKind,
    /// Global vertex indices of the face, in local order.
    pub vertices: [usize; 4],
    pub face_order: u32,
    /// Orders of the local edges.
    pub edge_orders: [u32; 4],
}

impl FaceBasis {
    pub fn num_vertices(&self) -> usize {
        self.kind.num_vertices()
    }

    /// Whether local edge `e` runs from the lower to the higher global vertex index.
    pub fn edge_is_positive(&self, e: usize) -> bool {
        let [a, b] = self.kind.local_edges()[e];
        self.vertices[a] < self.vertices[b]
    }

    /// Local vertex indices of edge `e`, ordered from lower to higher global index.
    pub fn oriented_edge(&self, e: usize) -> [usize; 2] {
        let [a, b] = self.kind.local_edges()[e];
        if self.vertices[a] < self.vertices[b] {
            [a, b]
        } else {
            [b, a]
        }
    }

    /// Enumerates the local functions in canonical order: vertices, edges, face.
    pub fn local_functions(&self, family: &dyn ShapeFunctionFamily) -> Vec<LocalFunction> {
        let mut functions = Vec::new();
        for v in 0..self.num_vertices() {
            for index in 0..family.num_vertex_functions() {
                functions.push(LocalFunction {
                    entity: LocalEntity::Vertex(v),
                    index,
                });
            }
        }
        for e in 0..self.num_vertices() {
            for index in 0..family.num_edge_functions(self.edge_orders[e]) {
                functions.push(LocalFunction {
                    entity: LocalEntity::Edge(e),
                    index,
                });
            }
        }
        for index in 0..family.num_face_functions(self.kind, self.face_order) {
            functions.push(LocalFunction {
                entity: LocalEntity::Face,
                index,
            });
        }
        functions
    }
}

/// Shape function values and gradients at a single reference point.
///
/// Values have up to two components; scalar families only use the first. Row `c` of a
/// gradient holds the derivatives of component `c`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ShapeBuffer {
    pub values: Vec<Vector2<f64>>,
    pub gradients: Vec<Matrix2<f64>>,
}

impl ShapeBuffer {
    pub fn clear(&mut self) {
        self.values.clear();
        self.gradients.clear();
    }

    pub(crate) fn push_scalar(&mut self, value: f64, gradient: [f64; 2]) {
        self.values.push(Vector2::new(value, 0.0));
        self.gradients
            .push(Matrix2::new(gradient[0], gradient[1], 0.0, 0.0));
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// A basis family: enumeration and reference evaluation of local shape functions.
pub trait ShapeFunctionFamily: Sync + Debug {
    fn name(&self) -> &'static str;

    /// Number of components of a single shape function value.
    fn value_dim(&self) -> usize;

    fn mapping(&self) -> Mapping;

    fn projection(&self) -> Projection;

    fn default_order(&self) -> u32;

    /// # Panics
    ///
    /// Panics if the family does not support the order.
    fn check_order(&self, order: u32);

    /// # Panics
    ///
    /// Panics if the family does not support the face kind.
    fn check_face(&self, kind: FaceKind);

    fn num_vertex_functions(&self) -> usize;

    fn num_edge_functions(&self, edge_order: u32) -> usize;

    fn num_face_functions(&self, kind: FaceKind, face_order: u32) -> usize;

    /// Polynomial degree of the basis at the given order, per variable on quadrilaterals and
    /// total on triangles.
    fn polynomial_degree(&self, order: u32) -> u32;

    /// Evaluates all local functions, in the order of [`FaceBasis::local_functions`], at the
    /// reference point `xi`. Gradients are with respect to the reference coordinates.
    fn evaluate(&self, basis: &FaceBasis, xi: &Point2<f64>, buffer: &mut ShapeBuffer);
}
