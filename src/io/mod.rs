//! I/O utilities for writing results.
//!
//! - **VTK output**: nodal fields on P2 meshes as VTU files for ParaView
//!
//! Mesh input lives in [`crate::mesh::gmsh`].

pub mod vtk;

pub use vtk::{VtkError, write_vtu, write_vtu_series};
