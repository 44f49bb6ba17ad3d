//! Node incidence and element-to-element adjacency.
//!
//! Adjacency is built once per mesh. A compressed (CSR) node→element index
//! is assembled first; the neighbor across a face is then the element other
//! than `self` that appears in the incidence lists of all the face's
//! corner nodes. Zero matches means a boundary face, more than one means
//! the mesh is non-manifold there.
//!
//! ```
//! use sl_rs::mesh::{AdjacencyBuilder, NodeIncidence, TRIANGLE_FACES};
//! use sl_rs::types::{ElementIndex, FaceIndex};
//!
//! // Two triangles sharing the edge (1, 2)
//! let corners = [[0, 1, 2], [3, 2, 1]];
//! let incidence = NodeIncidence::build(4, &corners);
//! let adjacency = AdjacencyBuilder::new(&corners, &TRIANGLE_FACES)
//!     .build(&incidence)
//!     .unwrap();
//!
//! assert_eq!(adjacency.neighbors[0][0], Some(ElementIndex::new(1)));
//! assert_eq!(adjacency.neighbors[1][0], Some(ElementIndex::new(0)));
//! assert_eq!(adjacency.report.boundary_faces, 4);
//! ```

use log::{debug, warn};

use crate::mesh::MeshError;
use crate::types::{ElementIndex, FaceIndex};

/// Local corner indices of each triangle edge; edge `i` is opposite corner `i`.
pub const TRIANGLE_FACES: [&[usize]; 3] = [&[1, 2], &[0, 2], &[0, 1]];

/// Local corner indices of each tetrahedron face; face `i` is opposite corner `i`.
pub const TETRAHEDRON_FACES: [&[usize]; 4] = [&[1, 2, 3], &[0, 2, 3], &[0, 1, 3], &[0, 1, 2]];

/// What to do with a face shared by more than two elements.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum NonManifoldPolicy {
    /// Fail mesh construction with [`MeshError::NonManifold`].
    #[default]
    Reject,
    /// Log a warning and keep the first matching element.
    Warn,
}

/// Options for building a mesh topology.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct MeshOptions {
    pub non_manifold: NonManifoldPolicy,
}

impl MeshOptions {
    pub fn with_non_manifold(mut self, policy: NonManifoldPolicy) -> Self {
        self.non_manifold = policy;
        self
    }
}

/// Compressed node→element incidence.
///
/// `elements[offsets[n]..offsets[n + 1]]` lists, in ascending order, the
/// elements that contain node `n`.
#[derive(Clone, Debug, Default)]
pub struct NodeIncidence {
    pub offsets: Vec<usize>,
    pub elements: Vec<usize>,
}

impl NodeIncidence {
    /// Build the index from per-element node lists.
    ///
    /// Node indices must be `< n_nodes`.
    pub fn build<E: AsRef<[usize]>>(n_nodes: usize, element_nodes: &[E]) -> Self {
        let mut counts = vec![0usize; n_nodes + 1];
        for nodes in element_nodes {
            for &n in nodes.as_ref() {
                counts[n + 1] += 1;
            }
        }
        for n in 0..n_nodes {
            counts[n + 1] += counts[n];
        }
        let offsets = counts;

        let mut cursor = offsets.clone();
        let mut elements = vec![0usize; offsets[n_nodes]];
        for (k, nodes) in element_nodes.iter().enumerate() {
            for &n in nodes.as_ref() {
                elements[cursor[n]] = k;
                cursor[n] += 1;
            }
        }

        Self { offsets, elements }
    }

    /// Elements containing node `n`, ascending.
    #[inline]
    pub fn elements_of(&self, n: usize) -> &[usize] {
        &self.elements[self.offsets[n]..self.offsets[n + 1]]
    }

    pub fn n_nodes(&self) -> usize {
        self.offsets.len().saturating_sub(1)
    }

    /// Largest number of elements sharing one node.
    pub fn max_degree(&self) -> usize {
        self.offsets.windows(2).map(|w| w[1] - w[0]).max().unwrap_or(0)
    }
}

/// Face counts collected while building adjacency.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct AdjacencyReport {
    /// Element faces with a neighbor (each shared face counted from both sides).
    pub interior_faces: usize,
    pub boundary_faces: usize,
    /// Faces that matched more than one other element (only under `Warn`).
    pub non_manifold_faces: usize,
}

/// Per-element neighbors plus the construction report.
#[derive(Clone, Debug)]
pub struct Adjacency<const C: usize> {
    pub neighbors: Vec<[Option<ElementIndex>; C]>,
    pub report: AdjacencyReport,
}

/// Builds element adjacency from corner connectivity.
#[derive(Clone, Debug)]
pub struct AdjacencyBuilder<'a, const C: usize> {
    corners: &'a [[usize; C]],
    faces: &'a [&'a [usize]; C],
    policy: NonManifoldPolicy,
}

impl<'a, const C: usize> AdjacencyBuilder<'a, C> {
    pub fn new(corners: &'a [[usize; C]], faces: &'a [&'a [usize]; C]) -> Self {
        Self {
            corners,
            faces,
            policy: NonManifoldPolicy::default(),
        }
    }

    pub fn with_policy(mut self, policy: NonManifoldPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Resolve every face of every element.
    pub fn build(&self, incidence: &NodeIncidence) -> Result<Adjacency<C>, MeshError> {
        let mut neighbors = vec![[None; C]; self.corners.len()];
        let mut report = AdjacencyReport::default();
        let mut matches = Vec::new();

        for (k, corner) in self.corners.iter().enumerate() {
            for (face, local) in self.faces.iter().enumerate() {
                let nodes: Vec<usize> = local.iter().map(|&i| corner[i]).collect();
                shared_elements(incidence, k, &nodes, &mut matches);

                match matches.len() {
                    0 => report.boundary_faces += 1,
                    1 => {
                        neighbors[k][face] = Some(ElementIndex::new(matches[0]));
                        report.interior_faces += 1;
                    }
                    count => match self.policy {
                        NonManifoldPolicy::Reject => {
                            return Err(MeshError::NonManifold {
                                element: ElementIndex::new(k),
                                face: FaceIndex::new(face),
                                nodes,
                                count,
                            });
                        }
                        NonManifoldPolicy::Warn => {
                            warn!(
                                "non-manifold face {} of element E{} (nodes {:?}) shared with {} elements, keeping E{}",
                                face, k, nodes, count, matches[0]
                            );
                            neighbors[k][face] = Some(ElementIndex::new(matches[0]));
                            report.interior_faces += 1;
                            report.non_manifold_faces += 1;
                        }
                    },
                }
            }
        }

        debug!(
            "adjacency: {} elements, {} interior / {} boundary faces",
            self.corners.len(),
            report.interior_faces,
            report.boundary_faces
        );

        Ok(Adjacency { neighbors, report })
    }
}

/// Elements other than `exclude` that contain every node in `nodes`.
fn shared_elements(incidence: &NodeIncidence, exclude: usize, nodes: &[usize], out: &mut Vec<usize>) {
    out.clear();
    let Some((&first, rest)) = nodes.split_first() else {
        return;
    };
    for &e in incidence.elements_of(first) {
        if e != exclude
            && rest
                .iter()
                .all(|&n| incidence.elements_of(n).binary_search(&e).is_ok())
            && !out.contains(&e)
        {
            out.push(e);
        }
    }
}

/// Check corner/quadratic connectivity against the node count.
pub(crate) fn validate_connectivity<const C: usize, const N: usize>(
    n_nodes: usize,
    corners: &[[usize; C]],
    nodes: &[[usize; N]],
) -> Result<(), MeshError> {
    if corners.len() != nodes.len() {
        return Err(MeshError::ConnectivityLengthMismatch {
            corners: corners.len(),
            nodes: nodes.len(),
        });
    }
    if corners.is_empty() {
        return Err(MeshError::EmptyMesh);
    }

    for (k, (corner, quad)) in corners.iter().zip(nodes).enumerate() {
        if let Some(&node) = quad.iter().find(|&&n| n >= n_nodes) {
            return Err(MeshError::NodeOutOfRange {
                element: ElementIndex::new(k),
                node,
                n_nodes,
            });
        }
        if corner[..] != quad[..C] {
            return Err(MeshError::CornerMismatch {
                element: ElementIndex::new(k),
                corners: corner.to_vec(),
                nodes: quad.to_vec(),
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Unit square split into two triangles along the diagonal (0, 2).
    fn square() -> Vec<[usize; 3]> {
        vec![[0, 1, 2], [0, 2, 3]]
    }

    #[test]
    fn test_incidence_csr() {
        let inc = NodeIncidence::build(4, &square());
        assert_eq!(inc.n_nodes(), 4);
        assert_eq!(inc.elements_of(0), &[0, 1]);
        assert_eq!(inc.elements_of(1), &[0]);
        assert_eq!(inc.elements_of(2), &[0, 1]);
        assert_eq!(inc.elements_of(3), &[1]);
        assert_eq!(inc.max_degree(), 2);
    }

    #[test]
    fn test_incidence_skips_unused_nodes() {
        let inc = NodeIncidence::build(5, &[[0, 1, 2]]);
        assert!(inc.elements_of(4).is_empty());
    }

    #[test]
    fn test_two_triangle_adjacency() {
        let corners = square();
        let inc = NodeIncidence::build(4, &corners);
        let adj = AdjacencyBuilder::new(&corners, &TRIANGLE_FACES).build(&inc).unwrap();

        // Element 0 = (0,1,2): the diagonal (0,2) is opposite corner 1
        assert_eq!(adj.neighbors[0], [None, Some(ElementIndex::new(1)), None]);
        // Element 1 = (0,2,3): the diagonal (0,2) is opposite corner 2
        assert_eq!(adj.neighbors[1], [None, None, Some(ElementIndex::new(0))]);
        assert_eq!(adj.report.interior_faces, 2);
        assert_eq!(adj.report.boundary_faces, 4);
    }

    fn fan() -> Vec<[usize; 3]> {
        // Three triangles hinged on edge (0, 1)
        vec![[0, 1, 2], [0, 1, 3], [0, 1, 4]]
    }

    #[test]
    fn test_non_manifold_rejected() {
        let corners = fan();
        let inc = NodeIncidence::build(5, &corners);
        let err = AdjacencyBuilder::new(&corners, &TRIANGLE_FACES)
            .build(&inc)
            .unwrap_err();
        match err {
            MeshError::NonManifold { element, face, count, .. } => {
                assert_eq!(element, ElementIndex::new(0));
                assert_eq!(face, FaceIndex::new(2));
                assert_eq!(count, 2);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_non_manifold_warn_keeps_first_match() {
        let corners = fan();
        let inc = NodeIncidence::build(5, &corners);
        let adj = AdjacencyBuilder::new(&corners, &TRIANGLE_FACES)
            .with_policy(NonManifoldPolicy::Warn)
            .build(&inc)
            .unwrap();
        assert_eq!(adj.neighbors[0][2], Some(ElementIndex::new(1)));
        assert_eq!(adj.neighbors[1][2], Some(ElementIndex::new(0)));
        assert_eq!(adj.report.non_manifold_faces, 3);
    }

    #[test]
    fn test_tetrahedra_sharing_a_face() {
        let corners = vec![[0, 1, 2, 3], [4, 1, 2, 3]];
        let inc = NodeIncidence::build(5, &corners);
        let adj = AdjacencyBuilder::new(&corners, &TETRAHEDRON_FACES)
            .build(&inc)
            .unwrap();
        assert_eq!(adj.neighbors[0][0], Some(ElementIndex::new(1)));
        assert_eq!(adj.neighbors[1][0], Some(ElementIndex::new(0)));
        assert_eq!(adj.report.boundary_faces, 6);
    }

    #[test]
    fn test_validate_connectivity() {
        let corners = [[0, 1, 2]];
        assert!(validate_connectivity(6, &corners, &[[0, 1, 2, 3, 4, 5]]).is_ok());
        assert!(matches!(
            validate_connectivity(5, &corners, &[[0, 1, 2, 3, 4, 5]]),
            Err(MeshError::NodeOutOfRange { node: 5, .. })
        ));
        assert!(matches!(
            validate_connectivity(6, &corners, &[[1, 0, 2, 3, 4, 5]]),
            Err(MeshError::CornerMismatch { .. })
        ));
        assert!(matches!(
            validate_connectivity::<3, 6>(6, &[], &[]),
            Err(MeshError::EmptyMesh)
        ));
    }
}
