//! # sl-rs
//!
//! Semi-Lagrangian transport of nodal fields on unstructured quadratic
//! simplex meshes.
//!
//! This crate provides the building blocks of a characteristic-based
//! advection step:
//! - P2 triangle and tetrahedron meshes with cached affine maps and adjacency
//! - Point location by walking across element faces
//! - Backward characteristic foot search with second-order displacement
//! - Clamped quadratic interpolation at the foot
//! - Optional antidiffusive correction
//! - Gmsh input and VTK output
//!
//! ## Example
//!
//! ```
//! use sl_rs::{CharacteristicTracer, CharacteristicsConfig, MeshTopology2D, SimplexMesh, StepInput};
//!
//! let mesh = MeshTopology2D::uniform_rectangle(0.0, 1.0, 0.0, 1.0, 8, 8).unwrap();
//! let tracer = CharacteristicTracer::new(&mesh, CharacteristicsConfig::default()).unwrap();
//!
//! // Solid-body rotation about the domain center
//! let u: Vec<f64> = mesh.y.iter().map(|y| 0.5 - y).collect();
//! let v: Vec<f64> = mesh.x.iter().map(|x| x - 0.5).collect();
//! let velocity = [u.as_slice(), v.as_slice()];
//!
//! let mut c: Vec<f64> = mesh.x.iter().zip(&mesh.y).map(|(x, y)| x * y).collect();
//! let mut reference = mesh.initial_reference_elements();
//! let report = tracer
//!     .advect(&StepInput::new(&velocity, &velocity, 0.05), &mut [&mut c[..]], &mut reference)
//!     .unwrap();
//! assert_eq!(report.nodes_traced, mesh.n_nodes());
//! ```

pub mod characteristics;
pub mod io;
pub mod mesh;
pub mod types;

// Re-export main types for convenience
pub use characteristics::{
    AntidiffusionConfig, AntidiffusionCorrector, AntidiffusionReport, CharacteristicTracer,
    CharacteristicsConfig, CharacteristicsError, CollectingSink, DiagnosticsSink, FootQuadrature,
    LocateOptions, LocateStatus, LogSink, NullSink, PointLocator, StepInput, SweepMode,
    TraceEvent, TraceReport, WalkFailurePolicy,
};
pub use io::{VtkError, write_vtu, write_vtu_series};
pub use mesh::{
    GmshError, GmshMesh, MeshError, MeshOptions, MeshTopology2D, MeshTopology3D,
    NonManifoldPolicy, Point, SimplexMesh, read_gmsh_2d, read_gmsh_3d,
};
pub use types::{ElementIndex, FaceIndex, NodeIndex};
