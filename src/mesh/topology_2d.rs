//! Quadratic triangle mesh with cached affine maps and adjacency.

use log::info;

use crate::characteristics::shape::TRIANGLE_EDGES;
use crate::mesh::adjacency::{
    AdjacencyBuilder, AdjacencyReport, MeshOptions, NodeIncidence, TRIANGLE_FACES,
    validate_connectivity,
};
use crate::mesh::geometric::AffineFactors2D;
use crate::mesh::{MeshError, SimplexMesh};
use crate::types::{ElementIndex, FaceIndex, NodeIndex};

/// Immutable 6-node triangle mesh.
///
/// Nodes are stored struct-of-arrays (`x`, `y`); each element lists its
/// quadratic nodes as `[c0, c1, c2, m01, m12, m02]`.
///
/// # Example
///
/// ```
/// use sl_rs::mesh::{MeshTopology2D, SimplexMesh};
/// use sl_rs::types::{ElementIndex, FaceIndex};
///
/// // One P2 triangle on (0,0), (1,0), (0,1)
/// let x = vec![0.0, 1.0, 0.0, 0.5, 0.5, 0.0];
/// let y = vec![0.0, 0.0, 1.0, 0.0, 0.5, 0.5];
/// let mesh = MeshTopology2D::from_p2(x, y, vec![[0, 1, 2, 3, 4, 5]]).unwrap();
///
/// assert_eq!(mesh.n_elements(), 1);
/// assert!(mesh.neighbor(ElementIndex::new(0), FaceIndex::new(0)).is_none());
/// ```
#[derive(Clone, Debug)]
pub struct MeshTopology2D {
    /// Node x-coordinates.
    pub x: Vec<f64>,
    /// Node y-coordinates.
    pub y: Vec<f64>,
    corners: Vec<[usize; 3]>,
    nodes: Vec<[usize; 6]>,
    factors: AffineFactors2D,
    neighbors: Vec<[Option<ElementIndex>; 3]>,
    incidence: NodeIncidence,
    report: AdjacencyReport,
}

impl MeshTopology2D {
    /// Build from coordinates, corner triples and quadratic node lists.
    pub fn new(
        x: Vec<f64>,
        y: Vec<f64>,
        corners: Vec<[usize; 3]>,
        nodes: Vec<[usize; 6]>,
    ) -> Result<Self, MeshError> {
        Self::with_options(x, y, corners, nodes, MeshOptions::default())
    }

    /// Build from quadratic node lists only; corners are their first three entries.
    pub fn from_p2(x: Vec<f64>, y: Vec<f64>, nodes: Vec<[usize; 6]>) -> Result<Self, MeshError> {
        let corners = nodes.iter().map(|n| [n[0], n[1], n[2]]).collect();
        Self::new(x, y, corners, nodes)
    }

    pub fn with_options(
        x: Vec<f64>,
        y: Vec<f64>,
        corners: Vec<[usize; 3]>,
        nodes: Vec<[usize; 6]>,
        options: MeshOptions,
    ) -> Result<Self, MeshError> {
        if x.len() != y.len() {
            return Err(MeshError::CoordinateLengthMismatch {
                lengths: vec![x.len(), y.len()],
            });
        }
        validate_connectivity(x.len(), &corners, &nodes)?;

        let factors = AffineFactors2D::compute(&x, &y, &corners)?;
        let incidence = NodeIncidence::build(x.len(), &nodes);
        let adjacency = AdjacencyBuilder::new(&corners, &TRIANGLE_FACES)
            .with_policy(options.non_manifold)
            .build(&incidence)?;

        info!(
            "2D P2 mesh: {} nodes, {} triangles, {} boundary edges",
            x.len(),
            corners.len(),
            adjacency.report.boundary_faces
        );

        Ok(Self {
            x,
            y,
            corners,
            nodes,
            factors,
            neighbors: adjacency.neighbors,
            incidence,
            report: adjacency.report,
        })
    }

    pub fn corners(&self) -> &[[usize; 3]] {
        &self.corners
    }

    pub fn quadratic_nodes(&self) -> &[[usize; 6]] {
        &self.nodes
    }

    pub fn factors(&self) -> &AffineFactors2D {
        &self.factors
    }

    pub fn incidence(&self) -> &NodeIncidence {
        &self.incidence
    }

    pub fn adjacency_report(&self) -> AdjacencyReport {
        self.report
    }

    /// Local coordinates `(p, q)` of `(px, py)` in element `k`.
    pub fn to_local(&self, k: ElementIndex, px: f64, py: f64) -> (f64, f64) {
        let [_, p, q] = self.factors.barycentric(k.get(), px, py);
        (p, q)
    }

    /// Physical position of local coordinates `(p, q)` in element `k`.
    pub fn to_physical(&self, k: ElementIndex, p: f64, q: f64) -> (f64, f64) {
        let [x, y] = self.factors.physical(k.get(), &[1.0 - p - q, p, q]);
        (x, y)
    }

    pub fn h_min(&self) -> f64 {
        self.factors.diameter.iter().copied().fold(f64::INFINITY, f64::min)
    }

    pub fn h_max(&self) -> f64 {
        self.factors.diameter.iter().copied().fold(0.0, f64::max)
    }

    /// Starting element for every node: the last element listing it.
    ///
    /// Nodes not referenced by any element get element 0.
    pub fn initial_reference_elements(&self) -> Vec<ElementIndex> {
        initial_reference_elements(&self.incidence)
    }

    /// Check that mid-edge nodes sit at the midpoints of their edges.
    ///
    /// Returns the largest deviation relative to the element diameter.
    pub fn midpoint_deviation(&self) -> f64 {
        let mut worst: f64 = 0.0;
        for (k, n) in self.nodes.iter().enumerate() {
            for (e, &[a, b]) in TRIANGLE_EDGES.iter().enumerate() {
                let m = n[3 + e];
                let dx = self.x[m] - 0.5 * (self.x[n[a]] + self.x[n[b]]);
                let dy = self.y[m] - 0.5 * (self.y[n[a]] + self.y[n[b]]);
                worst = worst.max(dx.hypot(dy) / self.factors.diameter[k]);
            }
        }
        worst
    }
}

pub(crate) fn initial_reference_elements(incidence: &NodeIncidence) -> Vec<ElementIndex> {
    (0..incidence.n_nodes())
        .map(|n| {
            incidence
                .elements_of(n)
                .last()
                .map_or(ElementIndex::ZERO, |&k| ElementIndex::new(k))
        })
        .collect()
}

impl SimplexMesh for MeshTopology2D {
    type Point = [f64; 2];
    type Barycentric = [f64; 3];

    const DIM: usize = 2;
    const CORNERS: usize = 3;
    const NODES_PER_ELEMENT: usize = 6;
    const DEFAULT_FOOT_TOLERANCE: f64 = 1e-8;

    #[inline]
    fn n_nodes(&self) -> usize {
        self.x.len()
    }

    #[inline]
    fn n_elements(&self) -> usize {
        self.nodes.len()
    }

    #[inline]
    fn node(&self, n: NodeIndex) -> [f64; 2] {
        [self.x[n], self.y[n]]
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
    fn barycentric(&self, k: ElementIndex, point: &[f64; 2]) -> [f64; 3] {
        self.factors.barycentric(k.get(), point[0], point[1])
    }

    #[inline]
    fn physical(&self, k: ElementIndex, bary: &[f64; 3]) -> [f64; 2] {
        self.factors.physical(k.get(), bary)
    }

    /// Exit edge chosen from the signs of `(p, q)`.
    ///
    /// When two coordinates are violated, the edge is picked by comparing
    /// the violation against the distance to the hypotenuse
    /// `|p + q - 1| / √2`.
    fn exit_face(bary: &[f64; 3]) -> FaceIndex {
        let [_, p, q] = *bary;
        let d_diag = (p + q - 1.0).abs() / std::f64::consts::SQRT_2;

        let face = if p < 0.0 {
            if q > 0.0 {
                if q < 1.0 || d_diag < -p { 1 } else { 0 }
            } else if -q < -p {
                1
            } else {
                2
            }
        } else if q < 0.0 {
            if p > 1.0 && -q < d_diag { 0 } else { 2 }
        } else {
            0
        };
        FaceIndex::new(face)
    }
}
