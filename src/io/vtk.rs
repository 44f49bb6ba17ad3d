//! VTK output for nodal fields on P2 meshes.
//!
//! Writes VTU (XML UnstructuredGrid) files readable by ParaView and other
//! VTK-compatible tools. Elements are written as native quadratic cells
//! (`VTK_QUADRATIC_TRIANGLE = 22`, `VTK_QUADRATIC_TETRA = 24`), whose node
//! order matches the mesh's quadratic node order, so every mesh node is one
//! VTK point.
//!
//! # Example
//!
//! ```no_run
//! use sl_rs::io::write_vtu;
//! use sl_rs::mesh::MeshTopology2D;
//!
//! let mesh = MeshTopology2D::uniform_rectangle(0.0, 1.0, 0.0, 1.0, 8, 8).unwrap();
//! let c: Vec<f64> = mesh.x.iter().map(|x| x.sin()).collect();
//! write_vtu("concentration.vtu", &mesh, &[("c", c.as_slice())], Some(0.0)).unwrap();
//! ```

use std::fmt::Display;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use log::debug;
use thiserror::Error;

use crate::mesh::{Point, SimplexMesh};
use crate::types::{ElementIndex, NodeIndex};

/// Error type for VTK operations.
#[derive(Debug, Error)]
pub enum VtkError {
    /// I/O error during file operations.
    #[error("VTK I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A field does not have one value per node.
    #[error("field '{name}' has {found} values, mesh has {expected} nodes")]
    FieldLength {
        name: String,
        found: usize,
        expected: usize,
    },

    /// The mesh dimension has no quadratic VTK cell type.
    #[error("no quadratic VTK cell for dimension {0}")]
    UnsupportedDimension(usize),
}

/// VTK cell type of the quadratic simplex of dimension `dim`.
fn cell_type(dim: usize) -> Result<u8, VtkError> {
    match dim {
        2 => Ok(22),
        3 => Ok(24),
        d => Err(VtkError::UnsupportedDimension(d)),
    }
}

/// Indented XML output that tracks its open elements.
struct VtkWriter<W: Write> {
    out: BufWriter<W>,
    open: Vec<&'static str>,
}

impl<W: Write> VtkWriter<W> {
    /// Write the XML prolog and open the `VTKFile` root.
    fn begin(writer: W) -> io::Result<Self> {
        let mut vtk = Self {
            out: BufWriter::new(writer),
            open: Vec::new(),
        };
        vtk.line("<?xml version=\"1.0\"?>")?;
        vtk.open(
            "VTKFile",
            &[
                ("type", "UnstructuredGrid"),
                ("version", "0.1"),
                ("byte_order", "LittleEndian"),
            ],
        )?;
        Ok(vtk)
    }

    /// One line, indented by the number of open elements.
    fn line(&mut self, text: impl Display) -> io::Result<()> {
        writeln!(self.out, "{:width$}{}", "", text, width = 2 * self.open.len())
    }

    fn open(&mut self, tag: &'static str, attrs: &[(&str, &str)]) -> io::Result<()> {
        let attrs: String = attrs
            .iter()
            .map(|(key, value)| format!(" {key}=\"{value}\""))
            .collect();
        self.line(format_args!("<{tag}{attrs}>"))?;
        self.open.push(tag);
        Ok(())
    }

    /// Close the innermost open element.
    fn close(&mut self) -> io::Result<()> {
        if let Some(tag) = self.open.pop() {
            self.line(format_args!("</{tag}>"))?;
        }
        Ok(())
    }

    /// Close whatever is still open and flush.
    fn finish(mut self) -> io::Result<()> {
        while !self.open.is_empty() {
            self.close()?;
        }
        self.out.flush()
    }

    /// One ascii `DataArray`, `per_line` values to a line.
    fn data_array<T: Display>(
        &mut self,
        attrs: &[(&str, &str)],
        data: &[T],
        per_line: usize,
    ) -> io::Result<()> {
        let mut attrs = attrs.to_vec();
        attrs.push(("format", "ascii"));
        self.open("DataArray", &attrs)?;
        for row in data.chunks(per_line.max(1)) {
            let row: Vec<String> = row.iter().map(ToString::to_string).collect();
            self.line(row.join(" "))?;
        }
        self.close()
    }

    fn scalars(&mut self, name: &str, data: &[f64]) -> io::Result<()> {
        let formatted: Vec<Sci> = data.iter().map(|&v| Sci(v)).collect();
        self.data_array(&[("type", "Float64"), ("Name", name)], &formatted, 6)
    }

    fn points<M: SimplexMesh>(&mut self, mesh: &M) -> io::Result<()> {
        let coords: Vec<Sci> = NodeIndex::iter(mesh.n_nodes())
            .flat_map(|n| {
                let p = mesh.node(n);
                (0..3).map(move |d| Sci(if d < M::DIM { p.coord(d) } else { 0.0 }))
            })
            .collect();
        self.open("Points", &[])?;
        self.data_array(&[("type", "Float64"), ("NumberOfComponents", "3")], &coords, 6)?;
        self.close()
    }

    fn cells<M: SimplexMesh>(&mut self, mesh: &M, vtk_cell: u8) -> io::Result<()> {
        let npe = M::NODES_PER_ELEMENT;
        let n_cells = mesh.n_elements();
        let connectivity: Vec<usize> = ElementIndex::iter(n_cells)
            .flat_map(|k| mesh.element_nodes(k).iter().copied())
            .collect();
        // Offsets are cumulative node counts
        let offsets: Vec<usize> = (1..=n_cells).map(|i| i * npe).collect();

        self.open("Cells", &[])?;
        self.data_array(&[("type", "Int64"), ("Name", "connectivity")], &connectivity, npe)?;
        self.data_array(&[("type", "Int64"), ("Name", "offsets")], &offsets, 20)?;
        self.data_array(&[("type", "UInt8"), ("Name", "types")], &vec![vtk_cell; n_cells], 20)?;
        self.close()
    }

    fn time_value(&mut self, time: f64) -> io::Result<()> {
        self.open("FieldData", &[])?;
        self.data_array(
            &[("type", "Float64"), ("Name", "TimeValue"), ("NumberOfTuples", "1")],
            &[Sci(time)],
            1,
        )?;
        self.close()
    }
}

/// `f64` in the `{:.10e}` format used for all floating point output.
struct Sci(f64);

impl Display for Sci {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:.10e}", self.0)
    }
}

/// Write nodal fields on a P2 mesh to a VTU file.
///
/// `fields` are `(name, values)` pairs with one value per mesh node.
/// `time`, if given, is stored as the `TimeValue` field data.
pub fn write_vtu<M: SimplexMesh>(
    path: impl AsRef<Path>,
    mesh: &M,
    fields: &[(&str, &[f64])],
    time: Option<f64>,
) -> Result<(), VtkError> {
    let vtk_cell = cell_type(M::DIM)?;
    let n_points = mesh.n_nodes();
    for (name, values) in fields {
        if values.len() != n_points {
            return Err(VtkError::FieldLength {
                name: name.to_string(),
                found: values.len(),
                expected: n_points,
            });
        }
    }

    let path = path.as_ref();
    let n_cells = mesh.n_elements();
    let (points, cells) = (n_points.to_string(), n_cells.to_string());
    let mut vtk = VtkWriter::begin(File::create(path)?)?;

    vtk.open("UnstructuredGrid", &[])?;
    vtk.open("Piece", &[("NumberOfPoints", &points), ("NumberOfCells", &cells)])?;
    vtk.points(mesh)?;
    vtk.cells(mesh, vtk_cell)?;

    match fields.first() {
        Some((first, _)) => vtk.open("PointData", &[("Scalars", *first)])?,
        None => vtk.open("PointData", &[])?,
    }
    for (name, values) in fields {
        vtk.scalars(name, values)?;
    }
    vtk.close()?;

    let element_ids: Vec<usize> = (0..n_cells).collect();
    vtk.open("CellData", &[("Scalars", "element_id")])?;
    vtk.data_array(&[("type", "Int64"), ("Name", "element_id")], &element_ids, 20)?;
    vtk.close()?;
    vtk.close()?;

    // TimeValue sits beside Piece, inside UnstructuredGrid
    if let Some(time) = time {
        vtk.time_value(time)?;
    }
    vtk.finish()?;

    debug!(
        "wrote {} ({} points, {} cells, {} fields)",
        path.display(),
        n_points,
        n_cells,
        fields.len()
    );
    Ok(())
}

/// Write one file of a time series as `{base}_{step:04}.vtu`.
///
/// Returns the path written.
pub fn write_vtu_series<M: SimplexMesh>(
    base_path: impl AsRef<Path>,
    step: usize,
    mesh: &M,
    fields: &[(&str, &[f64])],
    time: f64,
) -> Result<PathBuf, VtkError> {
    let base = base_path.as_ref();
    let stem = base
        .file_name()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let path = base.with_file_name(format!("{}_{:04}.vtu", stem, step));
    write_vtu(&path, mesh, fields, Some(time))?;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mesh::{MeshTopology2D, MeshTopology3D};
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_write_vtu_2d() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("tri.vtu");
        let mesh = MeshTopology2D::uniform_rectangle(0.0, 1.0, 0.0, 1.0, 2, 2).unwrap();
        let c = mesh.x.clone();

        write_vtu(&path, &mesh, &[("c", c.as_slice())], Some(0.5)).unwrap();

        let content = fs::read_to_string(&path).unwrap();
        assert!(content.contains("NumberOfPoints=\"25\""));
        assert!(content.contains("NumberOfCells=\"8\""));
        assert!(content.contains("Name=\"c\""));
        assert!(content.contains("TimeValue"));
        // 8 quadratic triangles
        assert!(content.contains(&["22"; 8].join(" ")));

        // Every element is closed, at the depth it was opened
        assert_eq!(content.matches("<DataArray").count(), content.matches("</DataArray>").count());
        assert!(content.contains("\n    <Piece NumberOfPoints"));
        assert!(content.contains("\n    </Piece>\n"));
        assert!(content.trim_end().ends_with("</VTKFile>"));
    }

    #[test]
    fn test_write_vtu_3d_cell_type() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("tet.vtu");
        let mesh = MeshTopology3D::uniform_box([0.0; 3], [1.0; 3], [1, 1, 1]).unwrap();

        write_vtu(&path, &mesh, &[], None).unwrap();

        let content = fs::read_to_string(&path).unwrap();
        assert!(content.contains("NumberOfCells=\"6\""));
        assert!(content.contains(&["24"; 6].join(" ")));
        assert!(content.contains("60"), "last offset is 6 * 10");
        assert!(!content.contains("TimeValue"));
    }

    #[test]
    fn test_field_length_checked() {
        let dir = tempdir().unwrap();
        let mesh = MeshTopology2D::uniform_rectangle(0.0, 1.0, 0.0, 1.0, 1, 1).unwrap();
        let short = vec![0.0; 3];
        let err = write_vtu(dir.path().join("bad.vtu"), &mesh, &[("c", short.as_slice())], None).unwrap_err();
        assert!(matches!(err, VtkError::FieldLength { found: 3, expected: 9, .. }));
    }

    #[test]
    fn test_write_vtu_series_naming() {
        let dir = tempdir().unwrap();
        let base = dir.path().join("output");
        let mesh = MeshTopology2D::uniform_rectangle(0.0, 1.0, 0.0, 1.0, 1, 1).unwrap();
        let c = vec![1.0; mesh.n_nodes()];

        let path = write_vtu_series(&base, 42, &mesh, &[("c", c.as_slice())], 4.2).unwrap();

        assert!(path.to_string_lossy().contains("output_0042.vtu"));
        assert!(path.exists());
    }
}
