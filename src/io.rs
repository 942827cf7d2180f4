//! Output of field values for visualization.

use crate::dof::FieldDiscretization;
use crate::evaluation::{FaceField, QuadraturePoint};
use crate::expression::Leaf;
use crate::field::FieldHandle;
use crate::model::Model;
use crate::region::RegionId;
use eyre::eyre;
use nalgebra::Point2;
use std::collections::BTreeMap;
use std::path::Path;

pub mod vtk;

pub use vtk::VtkWriter;

/// Writes a field restricted to a region to a file.
pub trait OutputWriter {
    fn write(&self, model: &Model, field: &FieldHandle, region: RegionId, path: &Path) -> eyre::Result<()>;
}

/// A writer for the format indicated by the path's extension.
pub fn writer_for_path(path: &Path) -> eyre::Result<Box<dyn OutputWriter>> {
    match path.extension().and_then(|extension| extension.to_str()) {
        Some("vtk") | Some("vtu") => Ok(Box::new(VtkWriter::default())),
        Some(extension) => Err(eyre!("Unsupported output format '{}'", extension)),
        None => Err(eyre!("Cannot determine the output format of {}", path.display())),
    }
}

/// Writes a field with the writer chosen by the path's extension.
pub fn write(model: &Model, field: &FieldHandle, region: RegionId, path: &Path) -> eyre::Result<()> {
    writer_for_path(path)?.write(model, field, region, path)
}

/// The cells of a region with the values of a field at their vertices.
#[derive(Debug, Clone, PartialEq)]
pub struct VertexSamples {
    /// The sampled mesh vertices, in ascending mesh vertex order.
    pub points: Vec<Point2<f64>>,
    /// Cells as indices into `points`. Faces if the region has faces, edges otherwise.
    pub cells: Vec<Vec<usize>>,
    /// `value_len` values per point.
    pub values: Vec<f64>,
    pub value_len: usize,
}

impl VertexSamples {
    pub fn value(&self, point: usize) -> &[f64] {
        &self.values[point * self.value_len..(point + 1) * self.value_len]
    }
}

/// Evaluates a field at the vertices of a region.
///
/// Each vertex is evaluated in the lowest-index face of the region containing it, or, for
/// regions of edges, in the lowest-index face adjacent to one of the region's edges at it.
pub fn sample_at_vertices(model: &Model, field: &FieldHandle, region: RegionId) -> eyre::Result<VertexSamples> {
    let mesh = model.mesh();
    assert!(model.regions().is_known(mesh, region), "region {} is not defined", region);
    let entities = model.resolve_region(region).closure(mesh);

    // Cells in mesh vertex numbering, each with the face evaluating it
    let mut global_cells: Vec<(Vec<usize>, usize)> = Vec::new();
    if !entities.faces.is_empty() {
        for &face in &entities.faces {
            global_cells.push((mesh.face(face).vertices().to_vec(), face));
        }
    } else {
        for &edge in &entities.edges {
            let &face = mesh
                .edge_faces(edge)
                .first()
                .ok_or_else(|| eyre!("edge {} is not adjacent to any face", edge))?;
            global_cells.push((mesh.edges()[edge].to_vec(), face));
        }
    }

    let mut owners = BTreeMap::new();
    for (vertices, face) in &global_cells {
        for &vertex in vertices {
            owners
                .entry(vertex)
                .and_modify(|owner: &mut usize| *owner = (*owner).min(*face))
                .or_insert(*face);
        }
    }
    let local_index: BTreeMap<usize, usize> = owners
        .keys()
        .enumerate()
        .map(|(local, &vertex)| (vertex, local))
        .collect();

    let discretization = FieldDiscretization::new(mesh, model.regions(), model.field(field));
    let value_len = field.value_len();
    let leaves: Vec<Leaf> = (0..value_len)
        .map(|component| Leaf {
            field: field.id(),
            component,
            derivative: None,
        })
        .collect();
    let mut points = Vec::with_capacity(owners.len());
    let mut values = Vec::with_capacity(owners.len() * value_len);
    for (&vertex, &face) in &owners {
        let geometry = mesh.face_geometry(face);
        let local_vertex = mesh
            .face(face)
            .vertices()
            .iter()
            .position(|&v| v == vertex)
            .ok_or_else(|| eyre!("vertex {} is not a vertex of face {}", vertex, face))?;
        let xi = geometry.kind().reference_vertex(local_vertex);
        let jacobian_inverse = geometry
            .jacobian(&xi)
            .try_inverse()
            .ok_or_else(|| eyre!("face {} has a singular Jacobian at vertex {}", face, vertex))?;
        let point = QuadraturePoint {
            xi,
            x: mesh.vertices()[vertex],
            jacobian_inverse,
            weight: 1.0,
            normal: None,
        };
        let mut face_field = FaceField::new(mesh, face, field.id(), model.field(field), &discretization);
        face_field.evaluate_at(&point);
        values.extend(leaves.iter().map(|leaf| face_field.value(leaf)));
        points.push(point.x);
    }

    let cells = global_cells
        .into_iter()
        .map(|(vertices, _)| vertices.iter().map(|vertex| local_index[vertex]).collect())
        .collect();

    Ok(VertexSamples {
        points,
        cells,
        values,
        value_len,
    })
}
