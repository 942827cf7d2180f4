//! Basic procedural mesh generation routines.
//!
//! Meshes are assembled from structured quadrangle blocks. Vertices shared between blocks are
//! merged, and the sides of a block can be tagged with physical regions.
use crate::mesh::{Face, Mesh};
use crate::region::RegionId;
use nalgebra::Point2;
use rustc_hash::FxHashMap;

/// Coordinates closer than this are considered identical when merging block vertices.
const MERGE_RESOLUTION: f64 = 1e-12;

/// A structured block of `subdivisions[0] x subdivisions[1]` quadrilaterals.
///
/// Corners are given counter-clockwise. `subdivisions[0]` counts cells along the sides
/// `corner 0 -> corner 1` and `corner 2 -> corner 3`. Side `k` runs from corner `k` to
/// corner `k + 1`.
#[derive(Debug, Clone, PartialEq)]
pub struct QuadrangleBlock {
    pub corners: [Point2<f64>; 4],
    pub subdivisions: [usize; 2],
    pub region: RegionId,
    pub side_regions: [Option<RegionId>; 4],
}

impl QuadrangleBlock {
    pub fn new(corners: [Point2<f64>; 4], subdivisions: [usize; 2], region: RegionId) -> Self {
        Self {
            corners,
            subdivisions,
            region,
            side_regions: [None; 4],
        }
    }

    /// An axis-aligned rectangle.
    pub fn rectangle(min: [f64; 2], max: [f64; 2], subdivisions: [usize; 2], region: RegionId) -> Self {
        let corners = [
            Point2::new(min[0], min[1]),
            Point2::new(max[0], min[1]),
            Point2::new(max[0], max[1]),
            Point2::new(min[0], max[1]),
        ];
        Self::new(corners, subdivisions, region)
    }

    pub fn with_side_region(mut self, side: usize, region: RegionId) -> Self {
        self.side_regions[side] = Some(region);
        self
    }

    fn point(&self, s: f64, t: f64) -> Point2<f64> {
        let [c0, c1, c2, c3] = self.corners;
        let p = c0.coords * ((1.0 - s) * (1.0 - t))
            + c1.coords * (s * (1.0 - t))
            + c2.coords * (s * t)
            + c3.coords * ((1.0 - s) * t);
        Point2::from(p)
    }
}

#[derive(Debug, Default)]
pub struct MeshBuilder {
    vertices: Vec<Point2<f64>>,
    lookup: FxHashMap<[i64; 2], usize>,
    faces: Vec<Face>,
    face_regions: Vec<(RegionId, usize)>,
    edge_regions: Vec<(RegionId, [usize; 2])>,
    triangulate: bool,
}

impl MeshBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Split every quadrilateral into two triangles.
    pub fn split_into_triangles(mut self, triangulate: bool) -> Self {
        self.triangulate = triangulate;
        self
    }

    fn vertex(&mut self, point: Point2<f64>) -> usize {
        let key = [
            (point.x / MERGE_RESOLUTION).round() as i64,
            (point.y / MERGE_RESOLUTION).round() as i64,
        ];
        let vertices = &mut self.vertices;
        *self.lookup.entry(key).or_insert_with(|| {
            vertices.push(point);
            vertices.len() - 1
        })
    }

    /// # Panics
    ///
    /// Panics if a block has zero subdivisions.
    pub fn add_block(mut self, block: QuadrangleBlock) -> Self {
        let [nx, ny] = block.subdivisions;
        assert!(nx > 0 && ny > 0, "quadrangle blocks need at least one subdivision per direction");

        let mut grid = vec![0; (nx + 1) * (ny + 1)];
        for j in 0..=ny {
            for i in 0..=nx {
                let point = block.point(i as f64 / nx as f64, j as f64 / ny as f64);
                grid[j * (nx + 1) + i] = self.vertex(point);
            }
        }
        let at = |i: usize, j: usize| grid[j * (nx + 1) + i];

        for j in 0..ny {
            for i in 0..nx {
                let quad = [at(i, j), at(i + 1, j), at(i + 1, j + 1), at(i, j + 1)];
                let faces = if self.triangulate {
                    vec![
                        Face::triangle([quad[0], quad[1], quad[2]]),
                        Face::triangle([quad[0], quad[2], quad[3]]),
                    ]
                } else {
                    vec![Face::quadrilateral(quad)]
                };
                for face in faces {
                    self.face_regions.push((block.region, self.faces.len()));
                    self.faces.push(face);
                }
            }
        }

        for (side, region) in block.side_regions.iter().enumerate() {
            let Some(region) = *region else { continue };
            let side_vertices: Vec<usize> = match side {
                0 => (0..=nx).map(|i| at(i, 0)).collect(),
                1 => (0..=ny).map(|j| at(nx, j)).collect(),
                2 => (0..=nx).rev().map(|i| at(i, ny)).collect(),
                _ => (0..=ny).rev().map(|j| at(0, j)).collect(),
            };
            for pair in side_vertices.windows(2) {
                self.edge_regions.push((region, [pair[0], pair[1]]));
            }
        }
        self
    }

    pub fn build(self) -> Mesh {
        let mut mesh = Mesh::new(self.vertices, self.faces);
        for (region, face) in self.face_regions {
            mesh.tag_faces(region, [face]);
        }
        for (region, edge) in self.edge_regions {
            mesh.tag_edges(region, [edge]);
        }
        mesh
    }
}

/// A uniform mesh of the rectangle `[min, max]`.
///
/// Faces belong to `region`, and the boundary edges, when `boundary` is given, to that region.
pub fn create_rectangular_mesh(
    min: [f64; 2],
    max: [f64; 2],
    cells: [usize; 2],
    region: RegionId,
    boundary: Option<RegionId>,
    triangulate: bool,
) -> Mesh {
    let mut block = QuadrangleBlock::rectangle(min, max, cells, region);
    if let Some(boundary) = boundary {
        for side in 0..4 {
            block = block.with_side_region(side, boundary);
        }
    }
    MeshBuilder::new()
        .split_into_triangles(triangulate)
        .add_block(block)
        .build()
}

/// Unit square mesh of quadrilaterals with faces in region 1 and boundary edges in region 2.
pub fn create_unit_square_quad_mesh(cells_per_dim: usize) -> Mesh {
    create_rectangular_mesh(
        [0.0, 0.0],
        [1.0, 1.0],
        [cells_per_dim; 2],
        RegionId(1),
        Some(RegionId(2)),
        false,
    )
}

/// Unit square mesh of triangles with faces in region 1 and boundary edges in region 2.
pub fn create_unit_square_triangle_mesh(cells_per_dim: usize) -> Mesh {
    create_rectangular_mesh(
        [0.0, 0.0],
        [1.0, 1.0],
        [cells_per_dim; 2],
        RegionId(1),
        Some(RegionId(2)),
        true,
    )
}

/// Region ids of [`create_step_channel_mesh`].
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct StepChannelRegions {
    pub fluid: RegionId,
    pub inlet: RegionId,
    pub outlet: RegionId,
}

/// A channel that widens after a backward-facing step.
///
/// The thin inlet part `[0, l_thin] x [0, h_thin]` continues into a wide part
/// `[l_thin, l_thin + l_thick] x [0, h_thin + h_thick]`. The inlet is the left side of the
/// thin part, the outlet the right side of the wide part. Subdivisions are cell counts along
/// the thin length, the thick length, the thin height and the thick height.
pub fn create_step_channel_mesh(
    l_thin: f64,
    h_thin: f64,
    l_thick: f64,
    h_thick: f64,
    subdivisions: [usize; 4],
    regions: StepChannelRegions,
) -> Mesh {
    let [n_thin, n_thick, n_h_thin, n_h_thick] = subdivisions;
    let StepChannelRegions { fluid, inlet, outlet } = regions;
    let x_end = l_thin + l_thick;
    MeshBuilder::new()
        .add_block(
            QuadrangleBlock::rectangle([0.0, 0.0], [l_thin, h_thin], [n_thin, n_h_thin], fluid)
                .with_side_region(3, inlet),
        )
        .add_block(
            QuadrangleBlock::rectangle([l_thin, 0.0], [x_end, h_thin], [n_thick, n_h_thin], fluid)
                .with_side_region(1, outlet),
        )
        .add_block(
            QuadrangleBlock::rectangle([l_thin, h_thin], [x_end, h_thin + h_thick], [n_thick, n_h_thick], fluid)
                .with_side_region(1, outlet),
        )
        .build()
}
