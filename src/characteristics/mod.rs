//! Semi-Lagrangian characteristic tracing.
//!
//! The pieces, leaf first:
//! - [`shape`]: P2 shape functions and clamped interpolation
//! - [`locate`]: point location by walking across element faces
//! - [`tracer`]: foot search and per-node sampling, sequential or parallel
//! - [`antidiffusion`]: optional relaxation pass against interpolation smoothing
//! - [`diagnostics`]: per-step counters, events and sinks
//!
//! All of them work on any [`SimplexMesh`](crate::mesh::SimplexMesh), i.e.
//! on 6-node triangles and on 10-node tetrahedra.

pub mod antidiffusion;
pub mod config;
pub mod diagnostics;
pub mod error;
pub mod locate;
pub mod shape;
pub mod tracer;

pub use antidiffusion::{AntidiffusionCorrector, AntidiffusionReport};
pub use config::{
    AntidiffusionConfig, CharacteristicsConfig, DEFAULT_BOUNDARY_TOLERANCE, DEFAULT_MAX_ITERATIONS,
    FootQuadrature, LocateOptions, SweepMode, WalkFailurePolicy,
};
pub use diagnostics::{
    CollectingSink, DiagnosticsSink, LogSink, NullSink, TraceEvent, TraceReport,
};
pub use error::CharacteristicsError;
pub use locate::{LocateStatus, Location, PointLocator};
pub use shape::{QuadraticBasis, TETRAHEDRON_EDGES, TRIANGLE_EDGES};
pub use tracer::{CharacteristicTracer, Foot, NodeTrace, StepInput};
