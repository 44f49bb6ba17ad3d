//! Per-step tracer errors.

use thiserror::Error;

use crate::types::{ElementIndex, NodeIndex};

/// Failure of a trace or antidiffusion call.
///
/// Input-shape variants are raised before any node is traced, so a failed
/// call leaves the caller's buffers untouched. `WalkNonConvergence` is only
/// produced under [`WalkFailurePolicy::Abort`](super::WalkFailurePolicy).
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CharacteristicsError {
    /// Wrong number of velocity components for the mesh dimension.
    #[error("{what} has {found} components, expected {expected}")]
    ComponentCount {
        what: &'static str,
        found: usize,
        expected: usize,
    },

    /// A per-node array does not have one entry per node.
    #[error("{what} has length {found}, expected {expected}")]
    FieldLength {
        what: &'static str,
        found: usize,
        expected: usize,
    },

    /// Input and output field lists differ, or no field was given.
    #[error("{found} fields given where {expected} were expected")]
    FieldCount { found: usize, expected: usize },

    /// A reference element index is out of range.
    #[error("reference element {element} of node {node} is out of range ({n_elements} elements)")]
    InvalidReference {
        node: NodeIndex,
        element: ElementIndex,
        n_elements: usize,
    },

    /// The time step is not finite.
    #[error("invalid time step {dt}")]
    InvalidTimeStep { dt: f64 },

    /// A configuration value is out of range.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// The mesh walk hit its step cap.
    #[error("mesh walk for node {node} did not converge; stopped in {element} at {point:?}")]
    WalkNonConvergence {
        node: NodeIndex,
        element: ElementIndex,
        point: Vec<f64>,
    },
}

pub type Result<T> = std::result::Result<T, CharacteristicsError>;
