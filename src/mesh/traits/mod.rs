//! Abstract mesh traits for dimension-independent operations.
//!
//! - [`Point`]: coordinate type abstraction for 2D and 3D
//! - [`SimplexMesh`]: P2 connectivity, affine maps and adjacency

pub mod point;
pub mod simplex;

pub use point::Point;
pub use simplex::SimplexMesh;
pub(crate) use simplex::most_negative;
