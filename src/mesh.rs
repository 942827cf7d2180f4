//! Planar meshes of triangles and quadrilaterals with tagged physical regions.

use crate::element::{FaceGeometry, FaceKind};
use crate::region::{EntitySet, RegionId};
use itertools::Itertools;
use nalgebra::Point2;
use rustc_hash::FxHashMap;
use std::collections::{BTreeMap, BTreeSet};

pub mod procedural;

/// A face given by its kind and its vertex indices in counter-clockwise order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Face {
    kind: FaceKind,
    vertices: [usize; 4],
}

impl Face {
    pub fn triangle(vertices: [usize; 3]) -> Self {
        let [a, b, c] = vertices;
        Self {
            kind: FaceKind::Triangle,
            vertices: [a, b, c, usize::MAX],
        }
    }

    pub fn quadrilateral(vertices: [usize; 4]) -> Self {
        Self {
            kind: FaceKind::Quadrilateral,
            vertices,
        }
    }

    pub fn kind(&self) -> FaceKind {
        self.kind
    }

    pub fn vertices(&self) -> &[usize] {
        &self.vertices[..self.kind.num_vertices()]
    }

    /// Vertex indices padded to four entries.
    pub fn padded_vertices(&self) -> [usize; 4] {
        self.vertices
    }

    fn reversed(&self) -> Self {
        let mut reversed = self.clone();
        reversed.vertices[..self.kind.num_vertices()].reverse();
        reversed
    }
}

/// A planar mesh.
///
/// Edges are derived from the faces and stored with their vertex indices in ascending order,
/// which defines the global orientation of every edge.
#[derive(Debug, Clone)]
pub struct Mesh {
    vertices: Vec<Point2<f64>>,
    faces: Vec<Face>,
    edges: Vec<[usize; 2]>,
    edge_lookup: FxHashMap<[usize; 2], usize>,
    face_edges: Vec<[usize; 4]>,
    edge_faces: Vec<Vec<usize>>,
    physical_regions: BTreeMap<RegionId, EntitySet>,
}

impl Mesh {
    /// Creates a mesh from vertices and faces.
    ///
    /// Clockwise faces are reoriented.
    ///
    /// # Panics
    ///
    /// Panics if a face references a vertex that does not exist.
    pub fn new(vertices: Vec<Point2<f64>>, faces: Vec<Face>) -> Self {
        let faces: Vec<Face> = faces
            .into_iter()
            .map(|face| {
                for &v in face.vertices() {
                    assert!(v < vertices.len(), "face references vertex {} which does not exist", v);
                }
                let points = face.vertices().iter().map(|&v| vertices[v]).collect_vec();
                if FaceGeometry::new(face.kind(), &points).area() < 0.0 {
                    face.reversed()
                } else {
                    face
                }
            })
            .collect();

        let mut edges = Vec::new();
        let mut edge_lookup = FxHashMap::default();
        let mut face_edges = Vec::with_capacity(faces.len());
        let mut edge_faces: Vec<Vec<usize>> = Vec::new();
        for (face_index, face) in faces.iter().enumerate() {
            let mut local = [usize::MAX; 4];
            for (e, &[a, b]) in face.kind().local_edges().iter().enumerate() {
                let (va, vb) = (face.vertices[a], face.vertices[b]);
                let key = [va.min(vb), va.max(vb)];
                let edge_index = *edge_lookup.entry(key).or_insert_with(|| {
                    edges.push(key);
                    edge_faces.push(Vec::new());
                    edges.len() - 1
                });
                edge_faces[edge_index].push(face_index);
                local[e] = edge_index;
            }
            face_edges.push(local);
        }

        Self {
            vertices,
            faces,
            edges,
            edge_lookup,
            face_edges,
            edge_faces,
            physical_regions: BTreeMap::new(),
        }
    }

    pub fn vertices(&self) -> &[Point2<f64>] {
        &self.vertices
    }

    pub fn faces(&self) -> &[Face] {
        &self.faces
    }

    pub fn face(&self, index: usize) -> &Face {
        &self.faces[index]
    }

    /// Edges as ascending vertex index pairs.
    pub fn edges(&self) -> &[[usize; 2]] {
        &self.edges
    }

    pub fn find_edge(&self, a: usize, b: usize) -> Option<usize> {
        self.edge_lookup.get(&[a.min(b), a.max(b)]).copied()
    }

    /// Global indices of the local edges of a face.
    pub fn face_edges(&self, face: usize) -> &[usize] {
        &self.face_edges[face][..self.faces[face].kind().num_vertices()]
    }

    /// Faces adjacent to an edge, in ascending order.
    pub fn edge_faces(&self, edge: usize) -> &[usize] {
        &self.edge_faces[edge]
    }

    pub fn face_geometry(&self, face: usize) -> FaceGeometry {
        let face = &self.faces[face];
        let points = face.vertices().iter().map(|&v| self.vertices[v]).collect_vec();
        FaceGeometry::new(face.kind(), &points)
    }

    /// Tags faces with a physical region.
    ///
    /// # Panics
    ///
    /// Panics if a face index is out of bounds.
    pub fn tag_faces(&mut self, region: RegionId, faces: impl IntoIterator<Item = usize>) {
        let n = self.faces.len();
        let set = self.physical_regions.entry(region).or_default();
        for face in faces {
            assert!(face < n, "face {} does not exist", face);
            set.faces.insert(face);
        }
    }

    /// Tags edges, given by their vertex pairs, with a physical region.
    ///
    /// # Panics
    ///
    /// Panics if a pair of vertices does not form an edge of the mesh.
    pub fn tag_edges(&mut self, region: RegionId, edges: impl IntoIterator<Item = [usize; 2]>) {
        let indices = edges
            .into_iter()
            .map(|[a, b]| {
                self.find_edge(a, b)
                    .unwrap_or_else(|| panic!("vertices {} and {} do not form an edge", a, b))
            })
            .collect_vec();
        self.physical_regions
            .entry(region)
            .or_default()
            .edges
            .extend(indices);
    }

    /// Tags vertices with a physical region.
    pub fn tag_vertices(&mut self, region: RegionId, vertices: impl IntoIterator<Item = usize>) {
        let n = self.vertices.len();
        let set = self.physical_regions.entry(region).or_default();
        for vertex in vertices {
            assert!(vertex < n, "vertex {} does not exist", vertex);
            set.vertices.insert(vertex);
        }
    }

    pub fn physical_region(&self, region: RegionId) -> Option<&EntitySet> {
        self.physical_regions.get(&region)
    }

    pub fn physical_region_ids(&self) -> impl '_ + Iterator<Item = RegionId> {
        self.physical_regions.keys().copied()
    }

    /// Edges adjacent to exactly one of the given faces.
    pub fn boundary_edges(&self, faces: &BTreeSet<usize>) -> BTreeSet<usize> {
        faces
            .iter()
            .flat_map(|&face| self.face_edges(face).iter().copied())
            .filter(|&edge| {
                self.edge_faces(edge)
                    .iter()
                    .filter(|&&face| faces.contains(&face))
                    .count()
                    == 1
            })
            .collect()
    }

    /// Vertices adjacent to exactly one of the given edges.
    pub fn boundary_vertices(&self, edges: &BTreeSet<usize>) -> BTreeSet<usize> {
        let mut counts = BTreeMap::new();
        for &edge in edges {
            for v in self.edges[edge] {
                *counts.entry(v).or_insert(0) += 1;
            }
        }
        counts
            .into_iter()
            .filter(|&(_, count)| count == 1)
            .map(|(v, _)| v)
            .collect()
    }

    /// The local index of a global edge within a face, if the face contains it.
    pub fn local_edge_index(&self, face: usize, edge: usize) -> Option<usize> {
        self.face_edges(face).iter().position(|&e| e == edge)
    }
}
