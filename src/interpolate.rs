//! Evaluation of expressions at arbitrary points of a region.

use crate::dof::FieldDiscretization;
use crate::error::InterpolationError;
use crate::evaluation::{FaceField, PointEnvironment, QuadraturePoint};
use crate::expression::{evaluate, Array};
use crate::field::FieldId;
use crate::mesh::Mesh;
use crate::model::Model;
use crate::region::RegionId;
use nalgebra::Point2;
use rstar::primitives::{GeomWithData, Rectangle};
use rstar::RTree;

/// Reference coordinates may exceed the reference face by this much.
const REFERENCE_TOLERANCE: f64 = 1e-10;

/// Largest third coordinate of a point still considered to lie in the mesh plane.
const PLANE_TOLERANCE: f64 = 1e-10;

/// Finds the face containing a point among a set of faces.
#[derive(Debug, Clone)]
pub struct FaceLocator {
    tree: RTree<GeomWithData<Rectangle<[f64; 2]>, usize>>,
}

impl FaceLocator {
    pub fn new(mesh: &Mesh, faces: impl IntoIterator<Item = usize>) -> Self {
        let boxes = faces
            .into_iter()
            .map(|face| {
                let (min, max) = mesh.face_geometry(face).bounds();
                // Enlarged to account for round-off in the inverse mapping
                let center = [0.5 * (min[0] + max[0]), 0.5 * (min[1] + max[1])];
                let scaled = |bound: [f64; 2]| {
                    [
                        center[0] + 1.01 * (bound[0] - center[0]),
                        center[1] + 1.01 * (bound[1] - center[1]),
                    ]
                };
                GeomWithData::new(Rectangle::from_corners(scaled(min), scaled(max)), face)
            })
            .collect();
        Self {
            tree: RTree::bulk_load(boxes),
        }
    }

    /// The lowest-index face containing the point, with the point's reference coordinates.
    pub fn locate(&self, mesh: &Mesh, point: &Point2<f64>) -> Option<(usize, Point2<f64>)> {
        let mut candidates: Vec<usize> = self
            .tree
            .locate_all_at_point(&[point.x, point.y])
            .map(|geom| geom.data)
            .collect();
        candidates.sort_unstable();
        candidates.into_iter().find_map(|face| {
            let geometry = mesh.face_geometry(face);
            geometry
                .map_inverse(point)
                .filter(|xi| geometry.kind().contains_reference_point(xi, REFERENCE_TOLERANCE))
                .map(|xi| (face, xi))
        })
    }
}

/// Evaluates every entry of a placeholder-free array at a point of a region.
///
/// The point has two coordinates, or three where the last one must lie within a small tolerance
/// of the mesh plane `z = 0`. Points on shared edges are evaluated in the face with the lowest
/// index.
///
/// # Panics
///
/// Panics if the array contains placeholders or normals, if the region is unknown or if the
/// point does not have two or three coordinates.
pub fn interpolate(
    model: &Model,
    region: RegionId,
    array: &Array,
    point: &[f64],
) -> Result<Vec<f64>, InterpolationError> {
    assert!(
        point.len() == 2 || point.len() == 3,
        "points must have two or three coordinates, got {}",
        point.len()
    );
    assert!(
        array.entries().iter().all(|entry| !entry.has_placeholder()),
        "only expressions without unknown or test placeholders can be interpolated"
    );
    let mesh = model.mesh();
    assert!(model.regions().is_known(mesh, region), "region {} is not defined", region);

    let x = Point2::new(point[0], point[1]);
    let outside = || InterpolationError::PointOutsideRegion {
        point: [x.x, x.y],
        region,
    };
    if point.len() == 3 && point[2].abs() > PLANE_TOLERANCE {
        return Err(outside());
    }
    let entities = model.resolve_region(region).closure(mesh);
    let locator = FaceLocator::new(mesh, entities.faces.iter().copied());
    let (face, xi) = locator.locate(mesh, &x).ok_or_else(outside)?;
    let jacobian_inverse = mesh
        .face_geometry(face)
        .jacobian(&xi)
        .try_inverse()
        .ok_or_else(outside)?;
    let quadrature_point = QuadraturePoint {
        xi,
        x,
        jacobian_inverse,
        weight: 1.0,
        normal: None,
    };

    let mut field_ids: Vec<FieldId> = array
        .entries()
        .iter()
        .flat_map(|entry| entry.field_leaves())
        .map(|leaf| leaf.field)
        .collect();
    field_ids.sort_unstable();
    field_ids.dedup();
    let fields: Vec<FaceField> = field_ids
        .iter()
        .map(|&id| {
            let field = &model.fields()[id.0];
            let discretization = FieldDiscretization::new(mesh, model.regions(), field);
            let mut face_field = FaceField::new(mesh, face, id, field, &discretization);
            face_field.evaluate_at(&quadrature_point);
            face_field
        })
        .collect();

    let parameters = model.parameter_values();
    let environment = PointEnvironment {
        point: &quadrature_point,
        parameters: &parameters,
        fields: &fields,
    };
    Ok(array
        .entries()
        .iter()
        .map(|entry| evaluate(entry, &environment))
        .collect())
}
