use crate::field::FieldHandle;
use crate::io::{sample_at_vertices, OutputWriter, VertexSamples};
use crate::model::Model;
use crate::region::RegionId;
use eyre::eyre;
use std::path::Path;
use vtkio::model::{
    Attribute, Attributes, ByteOrder, CellType, Cells, DataArray, DataSet, ElementType, IOBuffer, Piece,
    UnstructuredGridPiece, Version, VertexNumbers, Vtk,
};

/// Writes vertex values of a field as an unstructured grid.
///
/// Legacy `.vtk` or XML `.vtu`, depending on the extension of the path.
#[derive(Debug, Clone, Default)]
pub struct VtkWriter {
    title: Option<String>,
}

impl VtkWriter {
    pub fn with_title(self, title: impl Into<String>) -> Self {
        Self {
            title: Some(title.into()),
        }
    }
}

/// Builds the data set of sampled vertex values, with the values stored as a point attribute.
pub fn build_data_set(samples: &VertexSamples, name: &str) -> eyre::Result<DataSet> {
    let points: Vec<f64> = samples
        .points
        .iter()
        .flat_map(|p| [p.x, p.y, 0.0])
        .collect();

    // Vertices is laid out as follows: N, i_1, i_2, ... i_N
    let mut vertices: Vec<u32> = Vec::new();
    let mut types = Vec::with_capacity(samples.cells.len());
    for cell in &samples.cells {
        vertices.push(u32::try_from(cell.len())?);
        for &index in cell {
            vertices.push(u32::try_from(index)?);
        }
        types.push(match cell.len() {
            2 => CellType::Line,
            3 => CellType::Triangle,
            4 => CellType::Quad,
            n => return Err(eyre!("Cannot export a cell with {} vertices", n)),
        });
    }

    // Two-dimensional vectors are padded with a zero third component
    let (elem, data) = match samples.value_len {
        1 => (
            ElementType::Scalars {
                num_comp: 1,
                lookup_table: None,
            },
            samples.values.clone(),
        ),
        2 | 3 => {
            let data: Vec<f64> = (0..samples.points.len())
                .flat_map(|point| {
                    let value = samples.value(point);
                    [0, 1, 2].map(|i| value.get(i).copied().unwrap_or(0.0))
                })
                .collect();
            (ElementType::Vectors, data)
        }
        n => (ElementType::Generic(u32::try_from(n)?), samples.values.clone()),
    };

    let piece = UnstructuredGridPiece {
        points: points.into(),
        cells: Cells {
            cell_verts: VertexNumbers::Legacy {
                num_cells: u32::try_from(samples.cells.len())?,
                vertices,
            },
            types,
        },
        data: Attributes {
            point: vec![Attribute::DataArray(DataArray {
                name: name.to_string(),
                elem,
                data: IOBuffer::F64(data),
            })],
            cell: Vec::new(),
        },
    };

    Ok(DataSet::UnstructuredGrid {
        meta: None,
        pieces: vec![Piece::Inline(Box::new(piece))],
    })
}

impl OutputWriter for VtkWriter {
    fn write(&self, model: &Model, field: &FieldHandle, region: RegionId, path: &Path) -> eyre::Result<()> {
        let samples = sample_at_vertices(model, field, region)?;
        let name = model.field(field).name().to_string();
        let data = build_data_set(&samples, &name)?;
        let fallback_title = path
            .file_stem()
            .map(|os_str| os_str.to_string_lossy().to_string())
            .unwrap_or_else(|| name.clone());
        Vtk {
            version: Version { major: 4, minor: 1 },
            title: self.title.clone().unwrap_or(fallback_title),
            byte_order: ByteOrder::BigEndian,
            data,
            file_path: None,
        }
        .export(path)
        .map_err(|err| eyre!("Failed to write {}: {}", path.display(), err))?;
        Ok(())
    }
}
