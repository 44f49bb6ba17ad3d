//! Semi-Lagrangian transport along backward characteristics.
//!
//! For every node `x_j` the tracer solves for the displacement `α` of the
//! characteristic over one step with the fixed-point iteration
//!
//! ```text
//! α ← dt · (1.5 · v(x_j - α/2) - 0.5 · v_prev(x_j - α/2))
//! ```
//!
//! starting from the node's own velocity, then samples every transported
//! field at the foot `x_j - α` with clamped P2 interpolation.
//!
//! Nodes are independent: with the `parallel` feature the per-node work is
//! spread over rayon's pool, each node writing only its own output slot.

use log::debug;
#[cfg(feature = "parallel")]
use rayon::prelude::*;

use crate::characteristics::antidiffusion::AntidiffusionCorrector;
use crate::characteristics::config::{CharacteristicsConfig, FootQuadrature, WalkFailurePolicy};
use crate::characteristics::diagnostics::{DiagnosticsSink, LogSink, TraceEvent, TraceReport};
use crate::characteristics::error::{CharacteristicsError, Result};
use crate::characteristics::locate::{LocateStatus, Location, PointLocator};
use crate::characteristics::shape::sample;
use crate::mesh::{Point, SimplexMesh};
use crate::types::{ElementIndex, NodeIndex};

/// Per-step inputs shared by all nodes.
#[derive(Clone, Copy, Debug)]
pub struct StepInput<'a> {
    /// Velocity components at the current level, one slice per axis.
    pub velocity: &'a [&'a [f64]],
    /// Velocity components at the previous level.
    pub velocity_previous: &'a [&'a [f64]],
    pub dt: f64,
    /// Nodes whose values are held fixed.
    pub dirichlet: Option<&'a [bool]>,
}

impl<'a> StepInput<'a> {
    pub fn new(velocity: &'a [&'a [f64]], velocity_previous: &'a [&'a [f64]], dt: f64) -> Self {
        Self {
            velocity,
            velocity_previous,
            dt,
            dirichlet: None,
        }
    }

    pub fn with_dirichlet(mut self, mask: &'a [bool]) -> Self {
        self.dirichlet = Some(mask);
        self
    }

    #[inline]
    pub fn is_dirichlet(&self, n: NodeIndex) -> bool {
        self.dirichlet.is_some_and(|mask| mask[n])
    }

    /// Adams–Bashforth displacement `dt·(1.5·v - 0.5·v_prev)` of node `n` along axis `d`.
    #[inline]
    pub fn displacement(&self, d: usize, n: NodeIndex) -> f64 {
        self.dt * (1.5 * self.velocity[d][n] - 0.5 * self.velocity_previous[d][n])
    }

    /// Check component counts, lengths and the time step against `mesh`.
    pub fn validate<M: SimplexMesh>(&self, mesh: &M) -> Result<()> {
        if !self.dt.is_finite() {
            return Err(CharacteristicsError::InvalidTimeStep { dt: self.dt });
        }
        let n_nodes = mesh.n_nodes();
        for (what, components) in [
            ("velocity", self.velocity),
            ("velocity_previous", self.velocity_previous),
        ] {
            if components.len() != M::DIM {
                return Err(CharacteristicsError::ComponentCount {
                    what,
                    found: components.len(),
                    expected: M::DIM,
                });
            }
            if let Some(c) = components.iter().find(|c| c.len() != n_nodes) {
                return Err(CharacteristicsError::FieldLength {
                    what,
                    found: c.len(),
                    expected: n_nodes,
                });
            }
        }
        if let Some(mask) = self.dirichlet
            && mask.len() != n_nodes
        {
            return Err(CharacteristicsError::FieldLength {
                what: "dirichlet",
                found: mask.len(),
                expected: n_nodes,
            });
        }
        Ok(())
    }
}

/// Result of the foot search for one node.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Foot<P> {
    /// Displacement `α`; the foot is `x - α`.
    pub displacement: P,
    /// Last element found while sampling velocities.
    pub element: ElementIndex,
    pub iterations: usize,
    /// False if the iteration hit the cap and fell back to first order.
    pub converged: bool,
}

/// Traced foot and sampled values of one node.
#[derive(Clone, Debug, PartialEq)]
pub struct NodeTrace<P> {
    pub foot: P,
    pub element: ElementIndex,
    pub status: LocateStatus,
    /// One value per requested field.
    pub values: Vec<f64>,
    /// Counters for this node alone.
    pub report: TraceReport,
}

/// Per-node sample without the values, which go to a caller slot.
struct Sampled<P> {
    foot: P,
    element: ElementIndex,
    status: LocateStatus,
    report: TraceReport,
}

/// Backward characteristic tracer over a [`SimplexMesh`].
///
/// # Example
///
/// ```
/// use sl_rs::characteristics::{CharacteristicTracer, CharacteristicsConfig, StepInput};
/// use sl_rs::mesh::{MeshTopology2D, SimplexMesh};
///
/// let mesh = MeshTopology2D::uniform_rectangle(0.0, 1.0, 0.0, 1.0, 8, 8).unwrap();
/// let tracer = CharacteristicTracer::new(&mesh, CharacteristicsConfig::default()).unwrap();
///
/// let u = vec![1.0; mesh.n_nodes()];
/// let v = vec![0.0; mesh.n_nodes()];
/// let velocity = [u.as_slice(), v.as_slice()];
///
/// let mut c = mesh.x.clone();
/// let mut reference = mesh.initial_reference_elements();
/// let report = tracer
///     .advect(&StepInput::new(&velocity, &velocity, 0.1), &mut [&mut c[..]], &mut reference)
///     .unwrap();
///
/// assert_eq!(report.nodes_traced, mesh.n_nodes());
/// ```
pub struct CharacteristicTracer<'m, M> {
    mesh: &'m M,
    config: CharacteristicsConfig,
    sink: Box<dyn DiagnosticsSink>,
    parallel: bool,
}

impl<'m, M: SimplexMesh> CharacteristicTracer<'m, M> {
    pub fn new(mesh: &'m M, config: CharacteristicsConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            mesh,
            config,
            sink: Box::new(LogSink),
            parallel: cfg!(feature = "parallel"),
        })
    }

    /// Replace the default [`LogSink`].
    pub fn with_sink(mut self, sink: impl DiagnosticsSink + 'static) -> Self {
        self.sink = Box::new(sink);
        self
    }

    /// Trace nodes on rayon's pool. Ignored without the `parallel` feature.
    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel && cfg!(feature = "parallel");
        self
    }

    pub fn mesh(&self) -> &'m M {
        self.mesh
    }

    pub fn config(&self) -> &CharacteristicsConfig {
        &self.config
    }

    fn locator(&self) -> PointLocator<'m, M> {
        PointLocator::new(self.mesh).with_options(self.config.locate_options())
    }

    /// Locate `point` for `node`, counting walk statistics into `report`.
    fn walk(
        &self,
        node: NodeIndex,
        point: &M::Point,
        start: ElementIndex,
        report: &mut TraceReport,
    ) -> Result<Location<M::Barycentric>> {
        let loc = self.locator().locate(point, start);
        report.walk_steps += loc.steps;
        report.leaps += loc.leaps;
        if loc.status == LocateStatus::Exhausted {
            report.walk_cap_hits += 1;
            if self.config.walk_failure == WalkFailurePolicy::Abort {
                return Err(CharacteristicsError::WalkNonConvergence {
                    node,
                    element: loc.element,
                    point: point.to_vec(),
                });
            }
            self.sink.record(&TraceEvent::WalkCapHit {
                node,
                element: loc.element,
                point: point.to_vec(),
            });
        }
        Ok(loc)
    }

    /// Solve for the characteristic displacement of `node`.
    ///
    /// The walk for each velocity sample starts where the previous one ended,
    /// beginning at `start`.
    pub fn trace_node(
        &self,
        node: NodeIndex,
        input: &StepInput<'_>,
        start: ElementIndex,
    ) -> Result<Foot<M::Point>> {
        self.foot_search(node, input, start, &mut TraceReport::default())
    }

    fn foot_search(
        &self,
        node: NodeIndex,
        input: &StepInput<'_>,
        start: ElementIndex,
        report: &mut TraceReport,
    ) -> Result<Foot<M::Point>> {
        let x = self.mesh.node(node);
        let tol = self.config.foot_tolerance_or(M::DEFAULT_FOOT_TOLERANCE);
        let clamp = self.config.clamp_to_corners;
        let max_iterations = self.config.max_iterations;

        let mut alpha = M::Point::default();
        let mut element = start;

        for iteration in 0..max_iterations {
            let next = if iteration == 0 {
                M::Point::from_fn(|d| input.displacement(d, node))
            } else {
                let at = match self.config.foot_quadrature {
                    FootQuadrature::Midpoint => x.sub(&alpha.scale(0.5)),
                    FootQuadrature::Endpoint => x.sub(&alpha),
                };
                let loc = self.walk(node, &at, element, report)?;
                element = loc.element;
                let phi = loc.weights();
                let nodes = self.mesh.element_nodes(loc.element);
                M::Point::from_fn(|d| {
                    let v = sample(phi.as_ref(), nodes, M::CORNERS, input.velocity[d], clamp);
                    let vp = sample(phi.as_ref(), nodes, M::CORNERS, input.velocity_previous[d], clamp);
                    input.dt * (1.5 * v - 0.5 * vp)
                })
            };

            let change = next.distance(&alpha);
            alpha = next;
            if change <= tol {
                report.foot_iterations += iteration + 1;
                return Ok(Foot {
                    displacement: alpha,
                    element,
                    iterations: iteration + 1,
                    converged: true,
                });
            }
        }

        report.foot_iterations += max_iterations;
        report.foot_fallbacks += 1;
        self.sink.record(&TraceEvent::FootFallback {
            node,
            iterations: max_iterations,
        });
        Ok(Foot {
            displacement: M::Point::from_fn(|d| input.dt * input.velocity[d][node]),
            element,
            iterations: max_iterations,
            converged: false,
        })
    }

    /// Trace `node` and sample each of `fields` at its foot.
    ///
    /// Dirichlet nodes keep their values. `start` is the walk's starting
    /// element; the returned element is the one the foot was found in.
    pub fn trace_and_sample(
        &self,
        node: NodeIndex,
        input: &StepInput<'_>,
        fields: &[&[f64]],
        start: ElementIndex,
    ) -> Result<NodeTrace<M::Point>> {
        let mut values = vec![0.0; fields.len()];
        let sampled = self.sample_into(node, input, fields, start, &mut values)?;
        Ok(NodeTrace {
            foot: sampled.foot,
            element: sampled.element,
            status: sampled.status,
            values,
            report: sampled.report,
        })
    }

    fn sample_into(
        &self,
        node: NodeIndex,
        input: &StepInput<'_>,
        fields: &[&[f64]],
        start: ElementIndex,
        out: &mut [f64],
    ) -> Result<Sampled<M::Point>> {
        let x = self.mesh.node(node);
        let mut report = TraceReport::default();
        let keep = |out: &mut [f64]| {
            for (slot, field) in out.iter_mut().zip(fields) {
                *slot = field[node];
            }
        };

        if input.is_dirichlet(node) {
            report.dirichlet_nodes = 1;
            keep(out);
            return Ok(Sampled {
                foot: x,
                element: start,
                status: LocateStatus::Inside,
                report,
            });
        }

        report.nodes_traced = 1;
        let foot = self.foot_search(node, input, start, &mut report)?;
        if foot.displacement.is_zero() {
            report.stationary_nodes = 1;
            keep(out);
            return Ok(Sampled {
                foot: x,
                element: start,
                status: LocateStatus::Inside,
                report,
            });
        }

        let point = x.sub(&foot.displacement);
        let loc = self.walk(node, &point, start, &mut report)?;
        if loc.status == LocateStatus::Boundary {
            report.boundary_clamps = 1;
            self.sink.record(&TraceEvent::BoundaryClamp {
                node,
                element: loc.element,
                point: point.to_vec(),
            });
        }

        let phi = loc.weights();
        let nodes = self.mesh.element_nodes(loc.element);
        for (slot, field) in out.iter_mut().zip(fields) {
            *slot = sample(phi.as_ref(), nodes, M::CORNERS, field, self.config.clamp_to_corners);
        }

        Ok(Sampled {
            foot: point,
            element: loc.element,
            status: loc.status,
            report,
        })
    }

    /// Advect `fields` in place over one step.
    ///
    /// `reference` holds each node's starting element and receives the
    /// element its foot was found in. On error both the fields and
    /// `reference` are restored to their values on entry.
    pub fn advect(
        &self,
        input: &StepInput<'_>,
        fields: &mut [&mut [f64]],
        reference: &mut [ElementIndex],
    ) -> Result<TraceReport> {
        self.validate(input, fields.len(), fields.iter().map(|f| f.len()), reference)?;

        // A single pass without antidiffusion only writes fields on success.
        let start = reference.to_vec();
        let keep_originals = self.config.substeps > 1 || self.config.antidiffusion.is_some();
        let originals: Vec<Vec<f64>> = if keep_originals {
            fields.iter().map(|f| f.to_vec()).collect()
        } else {
            Vec::new()
        };

        match self.step(input, fields, reference, &start, &originals) {
            Ok(report) => {
                self.sink.step_finished(&report);
                Ok(report)
            }
            Err(err) => {
                reference.copy_from_slice(&start);
                for (field, original) in fields.iter_mut().zip(&originals) {
                    field.copy_from_slice(original);
                }
                Err(err)
            }
        }
    }

    fn step(
        &self,
        input: &StepInput<'_>,
        fields: &mut [&mut [f64]],
        reference: &mut [ElementIndex],
        start: &[ElementIndex],
        originals: &[Vec<f64>],
    ) -> Result<TraceReport> {
        let mut clamped = vec![false; self.mesh.n_nodes()];
        let mut report = TraceReport::default();
        let substeps = self.config.substeps;

        if substeps == 1 {
            report.merge(&self.pass(input, fields, reference, &mut clamped)?);
        } else {
            let h = input.dt / substeps as f64;
            for s in 0..substeps {
                let current = extrapolate(input, s as f64 / substeps as f64);
                let previous = extrapolate(input, (s as f64 - 1.0) / substeps as f64);
                let current: Vec<&[f64]> = current.iter().map(Vec::as_slice).collect();
                let previous: Vec<&[f64]> = previous.iter().map(Vec::as_slice).collect();
                let sub = StepInput {
                    velocity: &current,
                    velocity_previous: &previous,
                    dt: h,
                    dirichlet: input.dirichlet,
                };
                report.merge(&self.pass(&sub, fields, reference, &mut clamped)?);
            }
        }

        if let Some(config) = self.config.antidiffusion {
            let corrector = AntidiffusionCorrector::prepare(
                self.mesh,
                config,
                self.config.locate_options(),
                input,
                start,
                &clamped,
            )?
            .with_parallel(self.parallel);
            for (field, original) in fields.iter_mut().zip(originals) {
                let ad = corrector.correct(original, field)?;
                report.antidiffusion_sweeps += ad.sweeps;
                debug!(
                    "antidiffusion: {} sweeps, max residual {:.3e} -> {:.3e}",
                    ad.sweeps, ad.initial_max_residual, ad.final_max_residual
                );
            }
        }

        Ok(report)
    }

    /// Advect `inputs` into `outputs`, leaving the inputs untouched.
    pub fn advect_into(
        &self,
        input: &StepInput<'_>,
        inputs: &[&[f64]],
        outputs: &mut [&mut [f64]],
        reference: &mut [ElementIndex],
    ) -> Result<TraceReport> {
        if inputs.len() != outputs.len() {
            return Err(CharacteristicsError::FieldCount {
                found: outputs.len(),
                expected: inputs.len(),
            });
        }
        self.validate(input, inputs.len(), inputs.iter().map(|f| f.len()), reference)?;
        for (out, field) in outputs.iter_mut().zip(inputs) {
            if out.len() != field.len() {
                return Err(CharacteristicsError::FieldLength {
                    what: "output field",
                    found: out.len(),
                    expected: field.len(),
                });
            }
            out.copy_from_slice(field);
        }
        self.advect(input, outputs, reference)
    }

    fn validate(
        &self,
        input: &StepInput<'_>,
        n_fields: usize,
        lengths: impl Iterator<Item = usize>,
        reference: &[ElementIndex],
    ) -> Result<()> {
        input.validate(self.mesh)?;
        let n_nodes = self.mesh.n_nodes();
        if n_fields == 0 {
            return Err(CharacteristicsError::FieldCount {
                found: 0,
                expected: 1,
            });
        }
        for len in lengths {
            if len != n_nodes {
                return Err(CharacteristicsError::FieldLength {
                    what: "field",
                    found: len,
                    expected: n_nodes,
                });
            }
        }
        if reference.len() != n_nodes {
            return Err(CharacteristicsError::FieldLength {
                what: "reference",
                found: reference.len(),
                expected: n_nodes,
            });
        }
        let n_elements = self.mesh.n_elements();
        if let Some((n, &element)) = reference
            .iter()
            .enumerate()
            .find(|(_, k)| k.get() >= n_elements)
        {
            return Err(CharacteristicsError::InvalidReference {
                node: NodeIndex::new(n),
                element,
                n_elements,
            });
        }
        Ok(())
    }

    /// One substep over all nodes: sample into scratch, then copy back.
    fn pass(
        &self,
        input: &StepInput<'_>,
        fields: &mut [&mut [f64]],
        reference: &mut [ElementIndex],
        clamped: &mut [bool],
    ) -> Result<TraceReport> {
        let n_fields = fields.len();
        let mut scratch = vec![0.0; self.mesh.n_nodes() * n_fields];

        let mut report = {
            let sources: Vec<&[f64]> = fields.iter().map(|f| &**f).collect();
            let node_pass = |n: usize,
                             out: &mut [f64],
                             reference: &mut ElementIndex,
                             clamped: &mut bool|
             -> Result<TraceReport> {
                let sampled = self.sample_into(NodeIndex::new(n), input, &sources, *reference, out)?;
                *reference = sampled.element;
                *clamped |= sampled.status.is_clamped();
                Ok(sampled.report)
            };

            self.run_nodes(&mut scratch, n_fields, reference, clamped, node_pass)?
        };
        report.substeps = 1;

        for (n, values) in scratch.chunks_exact(n_fields).enumerate() {
            for (field, &value) in fields.iter_mut().zip(values) {
                field[n] = value;
            }
        }
        Ok(report)
    }
}

impl<M: SimplexMesh> CharacteristicTracer<'_, M> {
    fn run_nodes<F>(
        &self,
        scratch: &mut [f64],
        n_fields: usize,
        reference: &mut [ElementIndex],
        clamped: &mut [bool],
        node_pass: F,
    ) -> Result<TraceReport>
    where
        F: Fn(usize, &mut [f64], &mut ElementIndex, &mut bool) -> Result<TraceReport> + Sync,
    {
        #[cfg(feature = "parallel")]
        {
            if self.parallel {
                return scratch
                    .par_chunks_mut(n_fields)
                    .zip(reference.par_iter_mut())
                    .zip(clamped.par_iter_mut())
                    .enumerate()
                    .map(|(n, ((out, r), c))| node_pass(n, out, r, c))
                    .try_reduce(TraceReport::default, |a, b| Ok(a.merged(b)));
            }
        }
        sequential(scratch, n_fields, reference, clamped, node_pass)
    }
}

fn sequential<F>(
    scratch: &mut [f64],
    n_fields: usize,
    reference: &mut [ElementIndex],
    clamped: &mut [bool],
    node_pass: F,
) -> Result<TraceReport>
where
    F: Fn(usize, &mut [f64], &mut ElementIndex, &mut bool) -> Result<TraceReport>,
{
    scratch
        .chunks_mut(n_fields)
        .zip(reference.iter_mut())
        .zip(clamped.iter_mut())
        .enumerate()
        .try_fold(TraceReport::default(), |acc, (n, ((out, r), c))| {
            Ok(acc.merged(node_pass(n, out, r, c)?))
        })
}

/// Velocity components `v + θ·(v - v_prev)`.
fn extrapolate(input: &StepInput<'_>, theta: f64) -> Vec<Vec<f64>> {
    input
        .velocity
        .iter()
        .zip(input.velocity_previous)
        .map(|(v, vp)| {
            v.iter()
                .zip(vp.iter())
                .map(|(&a, &b)| a + theta * (a - b))
                .collect()
        })
        .collect()
}
