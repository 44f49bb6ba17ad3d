//! Gmsh mesh file input.
//!
//! Reads Gmsh MSH format version 2.2 (ASCII) with second-order simplices.
//!
//! ## Supported Element Types
//! - 9 = 6-node triangle (2D element, or boundary face of a 3D mesh)
//! - 11 = 10-node tetrahedron
//! - 8 = 3-node line (boundary edge of a 2D mesh)
//!
//! Other element types (points, linear elements) are skipped. Boundary
//! entities are grouped by their physical tag so that Dirichlet masks can
//! be derived from them.
//!
//! ## Example
//! ```no_run
//! use sl_rs::mesh::gmsh::read_gmsh_2d;
//! use std::path::Path;
//!
//! let gmsh = read_gmsh_2d(Path::new("channel.msh")).expect("Failed to read mesh");
//! let dirichlet = gmsh.dirichlet_mask(&[1, 3]);
//! ```

use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use log::{debug, info};
use thiserror::Error;

use crate::mesh::{MeshError, MeshTopology2D, MeshTopology3D, SimplexMesh};

/// Error type for Gmsh I/O operations.
#[derive(Debug, Error)]
pub enum GmshError {
    /// File could not be opened or read.
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// Invalid file format.
    #[error("Parse error: {0}")]
    ParseError(String),

    /// Unsupported mesh format version or binary file.
    #[error("Unsupported Gmsh version: {0}")]
    UnsupportedVersion(String),

    /// Missing required section.
    #[error("Missing section: {0}")]
    MissingSection(String),

    /// An element references a node id not listed in `$Nodes`.
    #[error("Unknown node id {0}")]
    UnknownNode(usize),

    /// A node id is listed twice in `$Nodes`.
    #[error("Duplicate node id {0}")]
    DuplicateNode(usize),

    /// The connectivity does not form a valid mesh.
    #[error("Invalid mesh: {0}")]
    Mesh(#[from] MeshError),
}

/// Gmsh element types handled by the reader.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum GmshElementType {
    Line3 = 8,
    Triangle6 = 9,
    Tetrahedron10 = 11,
}

impl GmshElementType {
    fn from_code(code: i32) -> Option<Self> {
        match code {
            8 => Some(Self::Line3),
            9 => Some(Self::Triangle6),
            11 => Some(Self::Tetrahedron10),
            _ => None,
        }
    }

    fn n_nodes(self) -> usize {
        match self {
            Self::Line3 => 3,
            Self::Triangle6 => 6,
            Self::Tetrahedron10 => 10,
        }
    }
}

/// Gmsh stores the last two tet10 mid-edge nodes as (2,3), (1,3).
const GMSH_TET10_ORDER: [usize; 10] = [0, 1, 2, 3, 4, 5, 6, 7, 9, 8];

/// A mesh read from Gmsh plus its tagged boundary node sets.
#[derive(Clone, Debug)]
pub struct GmshMesh<M> {
    pub mesh: M,
    /// Physical tag → sorted node indices on entities carrying that tag.
    pub physical_nodes: HashMap<i32, Vec<usize>>,
}

impl<M: SimplexMesh> GmshMesh<M> {
    /// Nodes on boundary entities with the given physical tag.
    pub fn boundary_nodes(&self, tag: i32) -> &[usize] {
        self.physical_nodes.get(&tag).map_or(&[], Vec::as_slice)
    }

    /// Per-node mask, true for nodes carrying any of `tags`.
    pub fn dirichlet_mask(&self, tags: &[i32]) -> Vec<bool> {
        let mut mask = vec![false; self.mesh.n_nodes()];
        for tag in tags {
            for &n in self.boundary_nodes(*tag) {
                mask[n] = true;
            }
        }
        mask
    }
}

/// Parsed file content before assembly.
#[derive(Debug, Default)]
struct RawGmsh {
    coords: Vec<[f64; 3]>,
    node_ids: HashMap<usize, usize>,
    elements: Vec<RawElement>,
}

#[derive(Debug)]
struct RawElement {
    kind: GmshElementType,
    physical_tag: i32,
    nodes: Vec<usize>,
}

impl RawGmsh {
    fn index_of(&self, id: usize) -> Result<usize, GmshError> {
        self.node_ids.get(&id).copied().ok_or(GmshError::UnknownNode(id))
    }

    fn local_nodes<const N: usize>(&self, element: &RawElement) -> Result<[usize; N], GmshError> {
        let mut out = [0usize; N];
        for (slot, &id) in out.iter_mut().zip(&element.nodes) {
            *slot = self.index_of(id)?;
        }
        Ok(out)
    }

    fn split_xyz(&self) -> (Vec<f64>, Vec<f64>, Vec<f64>) {
        let x = self.coords.iter().map(|c| c[0]).collect();
        let y = self.coords.iter().map(|c| c[1]).collect();
        let z = self.coords.iter().map(|c| c[2]).collect();
        (x, y, z)
    }

    fn tag_nodes(&self, tags: &mut HashMap<i32, Vec<usize>>, element: &RawElement) -> Result<(), GmshError> {
        let entry = tags.entry(element.physical_tag).or_default();
        for &id in &element.nodes {
            entry.push(self.index_of(id)?);
        }
        Ok(())
    }
}

fn finish_tags(mut tags: HashMap<i32, Vec<usize>>) -> HashMap<i32, Vec<usize>> {
    for nodes in tags.values_mut() {
        nodes.sort_unstable();
        nodes.dedup();
    }
    tags
}

/// Read a 2D mesh of 6-node triangles.
pub fn read_gmsh_2d(path: &Path) -> Result<GmshMesh<MeshTopology2D>, GmshError> {
    let file = File::open(path)?;
    info!("reading Gmsh 2D mesh {}", path.display());
    parse_gmsh_2d(BufReader::new(file))
}

/// Read a 3D mesh of 10-node tetrahedra.
pub fn read_gmsh_3d(path: &Path) -> Result<GmshMesh<MeshTopology3D>, GmshError> {
    let file = File::open(path)?;
    info!("reading Gmsh 3D mesh {}", path.display());
    parse_gmsh_3d(BufReader::new(file))
}

/// Parse a 2D mesh from any buffered reader.
pub fn parse_gmsh_2d<R: BufRead>(reader: R) -> Result<GmshMesh<MeshTopology2D>, GmshError> {
    let raw = parse_raw(reader)?;
    let mut nodes = Vec::new();
    let mut tags = HashMap::new();

    for element in &raw.elements {
        match element.kind {
            GmshElementType::Triangle6 => nodes.push(raw.local_nodes::<6>(element)?),
            GmshElementType::Line3 => raw.tag_nodes(&mut tags, element)?,
            GmshElementType::Tetrahedron10 => {}
        }
    }
    if nodes.is_empty() {
        return Err(GmshError::MissingSection("Elements (6-node triangles)".to_string()));
    }

    let (x, y, _) = raw.split_xyz();
    let mesh = MeshTopology2D::from_p2(x, y, nodes)?;
    Ok(GmshMesh {
        mesh,
        physical_nodes: finish_tags(tags),
    })
}

/// Parse a 3D mesh from any buffered reader.
pub fn parse_gmsh_3d<R: BufRead>(reader: R) -> Result<GmshMesh<MeshTopology3D>, GmshError> {
    let raw = parse_raw(reader)?;
    let mut nodes = Vec::new();
    let mut tags = HashMap::new();

    for element in &raw.elements {
        match element.kind {
            GmshElementType::Tetrahedron10 => {
                let gmsh = raw.local_nodes::<10>(element)?;
                nodes.push(GMSH_TET10_ORDER.map(|i| gmsh[i]));
            }
            GmshElementType::Triangle6 => raw.tag_nodes(&mut tags, element)?,
            GmshElementType::Line3 => {}
        }
    }
    if nodes.is_empty() {
        return Err(GmshError::MissingSection("Elements (10-node tetrahedra)".to_string()));
    }

    let (x, y, z) = raw.split_xyz();
    let mesh = MeshTopology3D::from_p2(x, y, z, nodes)?;
    Ok(GmshMesh {
        mesh,
        physical_nodes: finish_tags(tags),
    })
}

fn parse_raw<R: BufRead>(reader: R) -> Result<RawGmsh, GmshError> {
    let mut lines = reader.lines();
    let mut raw = RawGmsh::default();
    let mut seen_nodes = false;

    while let Some(line_result) = lines.next() {
        let line = line_result?;
        let line = line.trim();

        if line.starts_with("$MeshFormat") {
            parse_mesh_format(&mut lines)?;
        } else if line.starts_with("$Nodes") {
            parse_nodes(&mut lines, &mut raw)?;
            seen_nodes = true;
        } else if line.starts_with("$Elements") {
            parse_elements(&mut lines, &mut raw)?;
        }
    }

    if !seen_nodes {
        return Err(GmshError::MissingSection("Nodes".to_string()));
    }
    debug!(
        "gmsh: {} nodes, {} supported elements",
        raw.coords.len(),
        raw.elements.len()
    );
    Ok(raw)
}

fn next_line<I>(lines: &mut I, what: &str) -> Result<String, GmshError>
where
    I: Iterator<Item = std::io::Result<String>>,
{
    match lines.next() {
        Some(line) => Ok(line?),
        None => Err(GmshError::ParseError(format!("Unexpected end of file in {what}"))),
    }
}

fn skip_to_end<I>(lines: &mut I, marker: &str) -> Result<(), GmshError>
where
    I: Iterator<Item = std::io::Result<String>>,
{
    for line_result in lines.by_ref() {
        if line_result?.trim().starts_with(marker) {
            return Ok(());
        }
    }
    Err(GmshError::MissingSection(marker.to_string()))
}

fn parse_count(line: &str, what: &str) -> Result<usize, GmshError> {
    line.trim()
        .parse::<usize>()
        .map_err(|_| GmshError::ParseError(format!("Invalid {what} count: {line}")))
}

/// Parse the $MeshFormat section.
fn parse_mesh_format<I>(lines: &mut I) -> Result<(), GmshError>
where
    I: Iterator<Item = std::io::Result<String>>,
{
    let line = next_line(lines, "MeshFormat")?;
    let parts: Vec<&str> = line.split_whitespace().collect();
    let version = parts
        .first()
        .ok_or_else(|| GmshError::ParseError("Empty MeshFormat line".to_string()))?;
    if !version.starts_with("2.") {
        return Err(GmshError::UnsupportedVersion(version.to_string()));
    }
    if parts.get(1).is_some_and(|&file_type| file_type != "0") {
        return Err(GmshError::UnsupportedVersion(format!("{version} (binary)")));
    }
    skip_to_end(lines, "$EndMeshFormat")
}

/// Parse the $Nodes section.
fn parse_nodes<I>(lines: &mut I, raw: &mut RawGmsh) -> Result<(), GmshError>
where
    I: Iterator<Item = std::io::Result<String>>,
{
    let n_nodes = parse_count(&next_line(lines, "Nodes")?, "node")?;
    raw.coords.reserve(n_nodes);

    for _ in 0..n_nodes {
        let line = next_line(lines, "Nodes")?;
        let parts: Vec<&str> = line.split_whitespace().collect();
        if parts.len() < 4 {
            return Err(GmshError::ParseError(format!("Invalid node line: {line}")));
        }

        // Format: node_id x y z
        let id: usize = parts[0]
            .parse()
            .map_err(|_| GmshError::ParseError(format!("Invalid node id: {}", parts[0])))?;
        let mut xyz = [0.0; 3];
        for (axis, value) in xyz.iter_mut().enumerate() {
            *value = parts[1 + axis].parse().map_err(|_| {
                GmshError::ParseError(format!("Invalid coordinate: {}", parts[1 + axis]))
            })?;
        }

        if raw.node_ids.insert(id, raw.coords.len()).is_some() {
            return Err(GmshError::DuplicateNode(id));
        }
        raw.coords.push(xyz);
    }

    skip_to_end(lines, "$EndNodes")
}

/// Parse the $Elements section, keeping only supported element types.
fn parse_elements<I>(lines: &mut I, raw: &mut RawGmsh) -> Result<(), GmshError>
where
    I: Iterator<Item = std::io::Result<String>>,
{
    let n_elements = parse_count(&next_line(lines, "Elements")?, "element")?;

    for _ in 0..n_elements {
        let line = next_line(lines, "Elements")?;
        let parts: Vec<&str> = line.split_whitespace().collect();
        if parts.len() < 3 {
            return Err(GmshError::ParseError(format!("Invalid element line: {line}")));
        }

        // Format: elem_id elem_type n_tags tag1 ... tagN node1 node2 ...
        let code: i32 = parts[1]
            .parse()
            .map_err(|_| GmshError::ParseError(format!("Invalid element type: {}", parts[1])))?;
        let Some(kind) = GmshElementType::from_code(code) else {
            continue;
        };
        let n_tags: usize = parts[2]
            .parse()
            .map_err(|_| GmshError::ParseError(format!("Invalid tag count: {}", parts[2])))?;

        let physical_tag = if n_tags > 0 {
            parts
                .get(3)
                .and_then(|t| t.parse::<i32>().ok())
                .unwrap_or(0)
        } else {
            0
        };

        let node_start = 3 + n_tags;
        if parts.len() < node_start + kind.n_nodes() {
            return Err(GmshError::ParseError(format!(
                "{kind:?} needs {} nodes: {line}",
                kind.n_nodes()
            )));
        }
        let nodes = parts[node_start..node_start + kind.n_nodes()]
            .iter()
            .map(|s| {
                s.parse::<usize>()
                    .map_err(|_| GmshError::ParseError(format!("Invalid node id: {s}")))
            })
            .collect::<Result<Vec<_>, _>>()?;

        raw.elements.push(RawElement {
            kind,
            physical_tag,
            nodes,
        });
    }

    skip_to_end(lines, "$EndElements")
}
