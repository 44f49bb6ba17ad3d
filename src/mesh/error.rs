//! Construction-time mesh errors.

use thiserror::Error;

use crate::types::{ElementIndex, FaceIndex};

/// Inconsistency discovered while building a mesh topology.
///
/// Raised before any time stepping starts; every variant names the
/// offending element or node.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum MeshError {
    /// Coordinate arrays differ in length.
    #[error("coordinate arrays have different lengths: {lengths:?}")]
    CoordinateLengthMismatch { lengths: Vec<usize> },

    /// Corner and quadratic connectivity describe different element counts.
    #[error("{corners} corner tuples but {nodes} quadratic node tuples")]
    ConnectivityLengthMismatch { corners: usize, nodes: usize },

    /// The mesh has no elements.
    #[error("mesh has no elements")]
    EmptyMesh,

    /// An element references a node that does not exist.
    #[error("element {element} references node {node}, but the mesh has {n_nodes} nodes")]
    NodeOutOfRange {
        element: ElementIndex,
        node: usize,
        n_nodes: usize,
    },

    /// The leading quadratic nodes are not the element's corners.
    #[error("element {element}: quadratic nodes {nodes:?} do not start with corners {corners:?}")]
    CornerMismatch {
        element: ElementIndex,
        corners: Vec<usize>,
        nodes: Vec<usize>,
    },

    /// Element with (near) zero area or volume.
    #[error("element {element} is degenerate: det = {det:e} near {centroid:?}")]
    DegenerateElement {
        element: ElementIndex,
        det: f64,
        centroid: Vec<f64>,
    },

    /// A face is shared by more than two elements.
    #[error("face {face} of element {element} (nodes {nodes:?}) is shared with {count} other elements")]
    NonManifold {
        element: ElementIndex,
        face: FaceIndex,
        nodes: Vec<usize>,
        count: usize,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages_name_the_element() {
        let err = MeshError::DegenerateElement {
            element: ElementIndex::new(4),
            det: 0.0,
            centroid: vec![0.5, 0.5],
        };
        assert!(err.to_string().contains("E4"));

        let err = MeshError::NonManifold {
            element: ElementIndex::new(2),
            face: FaceIndex::new(1),
            nodes: vec![3, 9],
            count: 2,
        };
        let msg = err.to_string();
        assert!(msg.contains("F1") && msg.contains("[3, 9]"));
    }
}
