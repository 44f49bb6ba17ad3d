//! Dimension-independent view of a P2 simplex mesh.
//!
//! [`SimplexMesh`] is what the point locator, the characteristic tracer and
//! the antidiffusion pass are written against. Two implementations exist:
//! [`MeshTopology2D`](crate::mesh::MeshTopology2D) (6-node triangles) and
//! [`MeshTopology3D`](crate::mesh::MeshTopology3D) (10-node tetrahedra).
//!
//! # Example
//! ```
//! use sl_rs::mesh::{MeshTopology2D, SimplexMesh};
//! use sl_rs::types::{ElementIndex, FaceIndex};
//!
//! fn count_boundary_faces<M: SimplexMesh>(mesh: &M) -> usize {
//!     ElementIndex::iter(mesh.n_elements())
//!         .map(|k| {
//!             FaceIndex::iter(M::CORNERS)
//!                 .filter(|&f| mesh.neighbor(k, f).is_none())
//!                 .count()
//!         })
//!         .sum()
//! }
//!
//! let mesh = MeshTopology2D::uniform_rectangle(0.0, 1.0, 0.0, 1.0, 2, 2).unwrap();
//! assert_eq!(count_boundary_faces(&mesh), 8);
//! ```

use crate::characteristics::shape::QuadraticBasis;
use crate::types::{ElementIndex, FaceIndex, NodeIndex};

use super::point::Point;

/// Read-only geometry and adjacency of a quadratic simplex mesh.
///
/// Local face `i` of an element is the edge/face opposite corner `i`, so
/// a negative barycentric weight `l_i` means the point lies beyond face `i`.
pub trait SimplexMesh: Send + Sync {
    /// Physical coordinate type.
    type Point: Point;

    /// Barycentric weights `[l0, l1, .., lD]` with `l0 = 1 - p - q [- r]`.
    type Barycentric: QuadraticBasis;

    /// Spatial dimension.
    const DIM: usize;

    /// Corner nodes (and faces) per element: `DIM + 1`.
    const CORNERS: usize;

    /// Quadratic nodes per element: 6 (triangle) or 10 (tetrahedron).
    const NODES_PER_ELEMENT: usize;

    /// Foot-search convergence tolerance used when none is configured.
    const DEFAULT_FOOT_TOLERANCE: f64;

    fn n_nodes(&self) -> usize;

    fn n_elements(&self) -> usize;

    /// Physical position of a node.
    fn node(&self, n: NodeIndex) -> Self::Point;

    /// Quadratic node list of an element, corners first.
    fn element_nodes(&self, k: ElementIndex) -> &[usize];

    /// Corner nodes of an element.
    fn corner_nodes(&self, k: ElementIndex) -> &[usize] {
        &self.element_nodes(k)[..Self::CORNERS]
    }

    /// Element across local face `face`, `None` on the domain boundary.
    fn neighbor(&self, k: ElementIndex, face: FaceIndex) -> Option<ElementIndex>;

    /// Barycentric weights of `point` relative to element `k`.
    fn barycentric(&self, k: ElementIndex, point: &Self::Point) -> Self::Barycentric;

    /// Physical point with barycentric weights `bary` in element `k`.
    fn physical(&self, k: ElementIndex, bary: &Self::Barycentric) -> Self::Point;

    /// Face through which a point with weights `bary` left the element.
    ///
    /// Defaults to the face opposite the most negative weight.
    fn exit_face(bary: &Self::Barycentric) -> FaceIndex {
        FaceIndex::new(most_negative(bary.as_ref()))
    }

    /// Axis-aligned bounding box of all nodes as `(min, max)`.
    fn bounding_box(&self) -> (Self::Point, Self::Point) {
        let mut lo = [f64::INFINITY; 3];
        let mut hi = [f64::NEG_INFINITY; 3];
        for n in NodeIndex::iter(self.n_nodes()) {
            let p = self.node(n);
            for d in 0..Self::DIM {
                lo[d] = lo[d].min(p.coord(d));
                hi[d] = hi[d].max(p.coord(d));
            }
        }
        (Self::Point::from_slice(&lo), Self::Point::from_slice(&hi))
    }
}

/// Index of the smallest entry (first one on ties).
pub(crate) fn most_negative(values: &[f64]) -> usize {
    let mut best = 0;
    for (i, &v) in values.iter().enumerate().skip(1) {
        if v < values[best] {
            best = i;
        }
    }
    best
}
