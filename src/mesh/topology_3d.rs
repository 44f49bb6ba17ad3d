//! Quadratic tetrahedron mesh with cached inverse Jacobians and adjacency.

use log::info;

use crate::mesh::adjacency::{
    AdjacencyBuilder, AdjacencyReport, MeshOptions, NodeIncidence, TETRAHEDRON_FACES,
    validate_connectivity,
};
use crate::mesh::geometric::AffineFactors3D;
use crate::mesh::topology_2d::initial_reference_elements;
use crate::mesh::{MeshError, SimplexMesh};
use crate::types::{ElementIndex, FaceIndex, NodeIndex};

/// Immutable 10-node tetrahedron mesh.
///
/// Quadratic node order is `[c0, c1, c2, c3, m01, m12, m02, m03, m13, m23]`,
/// the VTK quadratic tetrahedron order.
#[derive(Clone, Debug)]
pub struct MeshTopology3D {
    pub x: Vec<f64>,
    pub y: Vec<f64>,
    pub z: Vec<f64>,
    corners: Vec<[usize; 4]>,
    nodes: Vec<[usize; 10]>,
    factors: AffineFactors3D,
    neighbors: Vec<[Option<ElementIndex>; 4]>,
    incidence: NodeIncidence,
    report: AdjacencyReport,
}

impl MeshTopology3D {
    pub fn new(
        x: Vec<f64>,
        y: Vec<f64>,
        z: Vec<f64>,
        corners: Vec<[usize; 4]>,
        nodes: Vec<[usize; 10]>,
    ) -> Result<Self, MeshError> {
        Self::with_options(x, y, z, corners, nodes, MeshOptions::default())
    }

    /// Build from quadratic node lists only; corners are their first four entries.
    pub fn from_p2(
        x: Vec<f64>,
        y: Vec<f64>,
        z: Vec<f64>,
        nodes: Vec<[usize; 10]>,
    ) -> Result<Self, MeshError> {
        let corners = nodes.iter().map(|n| [n[0], n[1], n[2], n[3]]).collect();
        Self::new(x, y, z, corners, nodes)
    }

    pub fn with_options(
        x: Vec<f64>,
        y: Vec<f64>,
        z: Vec<f64>,
        corners: Vec<[usize; 4]>,
        nodes: Vec<[usize; 10]>,
        options: MeshOptions,
    ) -> Result<Self, MeshError> {
        if x.len() != y.len() || x.len() != z.len() {
            return Err(MeshError::CoordinateLengthMismatch {
                lengths: vec![x.len(), y.len(), z.len()],
            });
        }
        validate_connectivity(x.len(), &corners, &nodes)?;

        let factors = AffineFactors3D::compute(&x, &y, &z, &corners)?;
        let incidence = NodeIncidence::build(x.len(), &nodes);
        let adjacency = AdjacencyBuilder::new(&corners, &TETRAHEDRON_FACES)
            .with_policy(options.non_manifold)
            .build(&incidence)?;

        info!(
            "3D P2 mesh: {} nodes, {} tetrahedra, {} boundary faces",
            x.len(),
            corners.len(),
            adjacency.report.boundary_faces
        );

        Ok(Self {
            x,
            y,
            z,
            corners,
            nodes,
            factors,
            neighbors: adjacency.neighbors,
            incidence,
            report: adjacency.report,
        })
    }

    pub fn corners(&self) -> &[[usize; 4]] {
        &self.corners
    }

    pub fn quadratic_nodes(&self) -> &[[usize; 10]] {
        &self.nodes
    }

    pub fn factors(&self) -> &AffineFactors3D {
        &self.factors
    }

    pub fn incidence(&self) -> &NodeIncidence {
        &self.incidence
    }

    pub fn adjacency_report(&self) -> AdjacencyReport {
        self.report
    }

    /// Local coordinates `(p, q, r)` of `point` in element `k`.
    pub fn to_local(&self, k: ElementIndex, point: [f64; 3]) -> [f64; 3] {
        let [_, p, q, r] = self.factors.barycentric(k.get(), &point);
        [p, q, r]
    }

    pub fn to_physical(&self, k: ElementIndex, local: [f64; 3]) -> [f64; 3] {
        let [p, q, r] = local;
        self.factors.physical(k.get(), &[1.0 - p - q - r, p, q, r])
    }

    pub fn h_min(&self) -> f64 {
        self.factors.diameter.iter().copied().fold(f64::INFINITY, f64::min)
    }

    pub fn h_max(&self) -> f64 {
        self.factors.diameter.iter().copied().fold(0.0, f64::max)
    }

    /// Starting element for every node: the last element listing it.
    pub fn initial_reference_elements(&self) -> Vec<ElementIndex> {
        initial_reference_elements(&self.incidence)
    }
}

impl SimplexMesh for MeshTopology3D {
    type Point = [f64; 3];
    type Barycentric = [f64; 4];

    const DIM: usize = 3;
    const CORNERS: usize = 4;
    const NODES_PER_ELEMENT: usize = 10;
    const DEFAULT_FOOT_TOLERANCE: f64 = 1e-6;

    #[inline]
    fn n_nodes(&self) -> usize {
        self.x.len()
    }

    #[inline]
    fn n_elements(&self) -> usize {
        self.nodes.len()
    }

    #[inline]
    fn node(&self, n: NodeIndex) -> [f64; 3] {
        [self.x[n], self.y[n], self.z[n]]
    }

    #[inline]
    fn element_nodes(&self, k: ElementIndex) -> &[usize] {
        &self.nodes[k]
    }

    #[inline]
    fn neighbor(&self, k: ElementIndex, face: FaceIndex) -> Option<ElementIndex> {
        self.neighbors[k][face.get()]
    }

    #[inline]
    fn barycentric(&self, k: ElementIndex, point: &[f64; 3]) -> [f64; 4] {
        self.factors.barycentric(k.get(), point)
    }

    #[inline]
    fn physical(&self, k: ElementIndex, bary: &[f64; 4]) -> [f64; 3] {
        self.factors.physical(k.get(), bary)
    }
}
