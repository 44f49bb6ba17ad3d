//! Mesh representation.
//!
//! Provides the unstructured P2 simplex meshes the tracer works on:
//! - 6-node triangle mesh ([`MeshTopology2D`])
//! - 10-node tetrahedron mesh ([`MeshTopology3D`])
//! - Node incidence and element adjacency construction
//! - Cached affine element maps
//! - Structured rectangle/box meshes for tests and benchmarks
//! - Gmsh mesh file input

mod adjacency;
mod error;
mod geometric;
pub mod gmsh;
mod structured;
mod topology_2d;
mod topology_3d;
pub mod traits;

pub use adjacency::{
    Adjacency, AdjacencyBuilder, AdjacencyReport, MeshOptions, NodeIncidence, NonManifoldPolicy,
    TETRAHEDRON_FACES, TRIANGLE_FACES,
};
pub use error::MeshError;
pub use geometric::{AffineFactors2D, AffineFactors3D, DEGENERACY_TOLERANCE};
pub use gmsh::{GmshError, GmshMesh, read_gmsh_2d, read_gmsh_3d};
pub use topology_2d::MeshTopology2D;
pub use topology_3d::MeshTopology3D;
pub use traits::{Point, SimplexMesh};
